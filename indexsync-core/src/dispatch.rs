//! Routing key to handler table and the per-event session scope

use crate::config::RepositoryConfig;
use crate::event::{ChangeEvent, EventKind};
use crate::handlers::{self, Handler};
use crate::repository::{with_session, SessionFactory};
use crate::store::DocumentStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What to do with an event
#[derive(Clone, Copy)]
pub enum Route {
    Handle(&'static dyn Handler),
    /// Known key that needs no index change
    Ignored,
    /// Key the repository does not publish
    Unrecognized,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Handle(handler) => f.debug_tuple("Handle").field(&handler.name()).finish(),
            Self::Ignored => f.write_str("Ignored"),
            Self::Unrecognized => f.write_str("Unrecognized"),
        }
    }
}

pub fn route_for(kind: EventKind) -> Route {
    use EventKind::*;
    match kind {
        CollectionAdd => Route::Handle(&handlers::ADD_COLLECTION),
        CollectionRm => Route::Handle(&handlers::REMOVE_COLLECTION),
        CollectionMv => Route::Handle(&handlers::RENAME_COLLECTION),
        CollectionAclMod => Route::Handle(&handlers::COLLECTION_ACL),
        CollectionMetadataAdd
        | CollectionMetadataAddA
        | CollectionMetadataMod
        | CollectionMetadataRm
        | CollectionMetadataRmW
        | CollectionMetadataSet => Route::Handle(&handlers::COLLECTION_METADATA),
        CollectionMetadataCp => Route::Handle(&handlers::COLLECTION_METADATA_COPY),
        DataObjectAdd => Route::Handle(&handlers::ADD_DATA_OBJECT),
        DataObjectCp => Route::Handle(&handlers::COPY_DATA_OBJECT),
        DataObjectMv => Route::Handle(&handlers::RENAME_DATA_OBJECT),
        DataObjectRm => Route::Handle(&handlers::REMOVE_DATA_OBJECT),
        DataObjectMod => Route::Handle(&handlers::DATA_OBJECT_SIZE),
        DataObjectSysMetadataMod => Route::Handle(&handlers::DATA_OBJECT_SYS_METADATA),
        DataObjectAclMod => Route::Handle(&handlers::DATA_OBJECT_ACL),
        DataObjectMetadataAdd
        | DataObjectMetadataAddA
        | DataObjectMetadataMod
        | DataObjectMetadataRm
        | DataObjectMetadataRmW
        | DataObjectMetadataSet => Route::Handle(&handlers::DATA_OBJECT_METADATA),
        DataObjectMetadataCp => Route::Handle(&handlers::DATA_OBJECT_METADATA_COPY),
        DataObjectMetadataAddW => Route::Handle(&handlers::DATA_OBJECT_METADATA_GLOB),
        ZoneMv => Route::Ignored,
    }
}

pub fn resolve(routing_key: &str) -> Route {
    EventKind::parse(routing_key).map_or(Route::Unrecognized, route_for)
}

/// Result of consuming one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Handled,
    Ignored,
    Unrecognized,
}

/// Entry point for delivered events. Shared across workers.
pub struct Dispatcher<F: SessionFactory> {
    factory: F,
    config: RepositoryConfig,
    store: Arc<dyn DocumentStore>,
}

impl<F: SessionFactory> Dispatcher<F> {
    pub fn new(factory: F, config: RepositoryConfig, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            factory,
            config,
            store,
        }
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Apply one event to the index.
    ///
    /// A repository session is opened only when a handler runs, and is
    /// released before this returns. Handler errors are passed through
    /// unchanged.
    pub fn consume(&self, routing_key: &str, event: &ChangeEvent) -> crate::Result<Outcome> {
        let handler = match resolve(routing_key) {
            Route::Handle(handler) => handler,
            Route::Ignored => {
                tracing::trace!(routing_key, "ignored event");
                return Ok(Outcome::Ignored);
            }
            Route::Unrecognized => {
                tracing::warn!(routing_key, "unrecognized routing key, dropping event");
                return Ok(Outcome::Unrecognized);
            }
        };

        let _span =
            tracing::info_span!("consume", routing_key, handler = handler.name()).entered();
        with_session(&self.factory, &self.config, |session| {
            handler.handle(session, self.store.as_ref(), event)
        })?;
        tracing::info!(entity = ?event.entity, "event handled");
        Ok(Outcome::Handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::repository::MemoryRepository;
    use crate::store::SqliteStore;

    fn dispatcher() -> (MemoryRepository, Dispatcher<MemoryRepository>) {
        let repo = MemoryRepository::new();
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let dispatcher = Dispatcher::new(repo.clone(), RepositoryConfig::default(), store);
        (repo, dispatcher)
    }

    #[test]
    fn test_every_published_key_has_a_route() {
        for kind in EventKind::ALL {
            match route_for(kind) {
                Route::Handle(_) => assert_ne!(kind, EventKind::ZoneMv),
                Route::Ignored => assert_eq!(kind, EventKind::ZoneMv),
                Route::Unrecognized => panic!("{} routed as unrecognized", kind),
            }
        }
    }

    #[test]
    fn test_resolve_names_the_handler() {
        let Route::Handle(handler) = resolve("data-object.cp") else {
            panic!("copy should be handled");
        };
        assert_eq!(handler.name(), "copy-data-object");

        let Route::Handle(handler) = resolve("collection.metadata.rmw") else {
            panic!("metadata removal should be handled");
        };
        assert_eq!(handler.name(), "collection-metadata");

        assert!(matches!(resolve("zone.mv"), Route::Ignored));
        assert!(matches!(resolve("foo.bar"), Route::Unrecognized));
    }

    #[test]
    fn test_unrecognized_and_ignored_open_no_session() {
        let (repo, dispatcher) = dispatcher();
        let event = ChangeEvent::for_entity("/z");
        assert_eq!(
            dispatcher.consume("foo.bar", &event).unwrap(),
            Outcome::Unrecognized
        );
        assert_eq!(
            dispatcher.consume("zone.mv", &event).unwrap(),
            Outcome::Ignored
        );
        assert_eq!(repo.sessions_opened(), 0);
    }

    #[test]
    fn test_handler_error_still_releases_session() {
        let (repo, dispatcher) = dispatcher();
        let err = dispatcher
            .consume("data-object.rm", &ChangeEvent::default())
            .unwrap_err();
        assert!(matches!(err, SyncError::MissingField("entity")));
        assert_eq!(repo.sessions_opened(), 1);
        assert_eq!(repo.sessions_active(), 0);
    }

    #[test]
    fn test_outcome_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Outcome::Unrecognized).unwrap(),
            "\"unrecognized\""
        );
    }
}
