//! Elasticsearch-compatible REST document store

use super::DocumentStore;
use crate::config::StoreConfig;
use crate::document::{FieldPatch, TypeCollection};
use crate::error::SyncError;
use reqwest::blocking::{Client, Response};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub struct HttpStore {
    base: Url,
    index: String,
    client: Client,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    script: Script<'a>,
}

#[derive(Serialize)]
struct Script<'a> {
    source: String,
    lang: &'static str,
    params: &'a Map<String, Value>,
}

#[derive(Deserialize)]
struct DeleteByQueryResponse {
    #[serde(default)]
    deleted: u64,
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Deserialize)]
struct GetResponse {
    #[serde(rename = "_source")]
    source: Option<Value>,
}

/// `_update` body that assigns each patched field from script params
pub fn update_body(patch: &FieldPatch) -> crate::Result<Value> {
    let mut params = Map::new();
    let mut source = String::new();
    for (name, value) in patch.fields() {
        source.push_str(&format!("ctx._source['{0}'] = params['{0}']; ", name));
        params.insert(name.to_string(), value.clone());
    }
    let request = UpdateRequest {
        script: Script {
            source: source.trim_end().to_string(),
            lang: "painless",
            params: &params,
        },
    };
    Ok(serde_json::to_value(request)?)
}

/// `_delete_by_query` body matching `prefix` itself and ids under `prefix/`
pub fn delete_by_prefix_body(prefix: &str) -> Value {
    let under = if prefix == "/" {
        "/".to_string()
    } else {
        format!("{}/", prefix)
    };
    json!({
        "query": {
            "bool": {
                "should": [
                    { "term": { "id": prefix } },
                    { "prefix": { "id": under } }
                ],
                "minimum_should_match": 1
            }
        }
    })
}

impl HttpStore {
    pub fn new(config: &StoreConfig) -> crate::Result<Self> {
        let base = Url::parse(&config.url)
            .map_err(|e| SyncError::ConfigParse(format!("store.url {}: {}", config.url, e)))?;
        if base.cannot_be_a_base() {
            return Err(SyncError::ConfigParse(format!(
                "store.url {} cannot carry a path",
                config.url
            )));
        }
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            base,
            index: config.index.clone(),
            client,
        })
    }

    /// Build `{base}/{index}/{segments...}`. Segments are percent-encoded,
    /// so path ids keep their slashes inside a single segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(&self.index).extend(segments);
        }
        url
    }

    fn doc_url(&self, kind: TypeCollection, id: &str, action: Option<&str>) -> Url {
        match action {
            Some(action) => self.url(&[kind.as_str(), id, action]),
            None => self.url(&[kind.as_str(), id]),
        }
    }
}

/// Turn a non-success response into `StoreResponse`
fn check(operation: &'static str, resp: Response) -> crate::Result<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().unwrap_or_default();
    Err(SyncError::StoreResponse {
        operation,
        status,
        body,
    })
}

impl DocumentStore for HttpStore {
    fn create(&self, kind: TypeCollection, id: &str, body: &Value) -> crate::Result<()> {
        let resp = self
            .client
            .put(self.doc_url(kind, id, Some("_create")))
            .json(body)
            .send()?;
        if resp.status() == StatusCode::CONFLICT {
            return Err(SyncError::DuplicateDocument {
                kind: kind.as_str(),
                id: id.to_string(),
            });
        }
        check("create", resp)?;
        Ok(())
    }

    fn exists(&self, kind: TypeCollection, id: &str) -> crate::Result<bool> {
        let resp = self.client.head(self.doc_url(kind, id, None)).send()?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            _ => check("exists", resp).map(|_| true),
        }
    }

    fn patch(&self, kind: TypeCollection, id: &str, patch: &FieldPatch) -> crate::Result<()> {
        let resp = self
            .client
            .post(self.doc_url(kind, id, Some("_update")))
            .json(&update_body(patch)?)
            .send()?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(SyncError::DocumentNotFound {
                kind: kind.as_str(),
                id: id.to_string(),
            });
        }
        check("patch", resp)?;
        Ok(())
    }

    fn remove(&self, kind: TypeCollection, id: &str) -> crate::Result<bool> {
        let resp = self.client.delete(self.doc_url(kind, id, None)).send()?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            _ => check("remove", resp).map(|_| true),
        }
    }

    fn remove_by_prefix(&self, prefix: &str) -> crate::Result<u64> {
        let resp = self
            .client
            .post(self.url(&["_delete_by_query"]))
            .json(&delete_by_prefix_body(prefix))
            .send()?;
        let parsed: DeleteByQueryResponse = check("remove_by_prefix", resp)?.json()?;
        Ok(parsed.deleted)
    }

    fn get(&self, kind: TypeCollection, id: &str) -> crate::Result<Option<Value>> {
        let resp = self.client.get(self.doc_url(kind, id, None)).send()?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let parsed: GetResponse = check("get", resp)?.json()?;
        Ok(parsed.source)
    }

    fn count(&self, kind: TypeCollection) -> crate::Result<u64> {
        let resp = self
            .client
            .get(self.url(&[kind.as_str(), "_count"]))
            .send()?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        let parsed: CountResponse = check("count", resp)?.json()?;
        Ok(parsed.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(url: &str) -> HttpStore {
        let config = StoreConfig {
            url: url.to_string(),
            ..StoreConfig::default()
        };
        HttpStore::new(&config).unwrap()
    }

    #[test]
    fn test_document_urls_encode_path_ids() {
        let store = store("http://localhost:9200/");
        let url = store.doc_url(TypeCollection::File, "/z/home/a/f.txt", Some("_create"));
        assert_eq!(
            url.as_str(),
            "http://localhost:9200/data/file/%2Fz%2Fhome%2Fa%2Ff.txt/_create"
        );

        let count = store.url(&["folder", "_count"]);
        assert_eq!(count.path(), "/data/folder/_count");
    }

    #[test]
    fn test_base_path_is_kept() {
        let store = store("http://search.internal/es");
        let url = store.url(&["_delete_by_query"]);
        assert_eq!(url.path(), "/es/data/_delete_by_query");
    }

    #[test]
    fn test_rejects_unusable_url() {
        let config = StoreConfig {
            url: "mailto:index@example.org".to_string(),
            ..StoreConfig::default()
        };
        assert!(matches!(
            HttpStore::new(&config),
            Err(SyncError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_update_body_assigns_each_field() {
        let patch = FieldPatch::new()
            .date_modified("2024-01-01T00:00:00.000")
            .file_size(42);
        let body = update_body(&patch).unwrap();
        let source = body["script"]["source"].as_str().unwrap();
        assert!(source.contains("ctx._source['dateModified'] = params['dateModified'];"));
        assert!(source.contains("ctx._source['fileSize'] = params['fileSize'];"));
        assert_eq!(body["script"]["lang"], "painless");
        assert_eq!(body["script"]["params"]["fileSize"], 42);
        assert!(body["script"]["params"].get("fileType").is_none());
    }

    #[test]
    fn test_delete_by_prefix_body_matches_on_boundary() {
        let body = delete_by_prefix_body("/z/home/a");
        let should = &body["query"]["bool"]["should"];
        assert_eq!(should[0]["term"]["id"], "/z/home/a");
        assert_eq!(should[1]["prefix"]["id"], "/z/home/a/");
        assert_eq!(body["query"]["bool"]["minimum_should_match"], 1);
    }
}
