use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;

/// Seed a catalog and write a config pointing at it and at a fresh store
fn create_test_env() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    let conn = indexsync_core::repository::init_catalog(&root.join("catalog.db")).unwrap();
    conn.execute_batch(
        "
        INSERT INTO collections VALUES ('/z', '/', 'rods', '1600000000000', '1600000000000');
        INSERT INTO collections VALUES ('/z/home', '/z', 'rods', '1600000000000', '1600000000000');
        INSERT INTO collections VALUES ('/z/home/a', '/z/home', 'alice', '1700000000000', '1700000000000');
        INSERT INTO data_objects VALUES ('/z/home/a/f.txt', '/z/home/a', 'alice', 120, 'text', '1700000060000', '1700000060000');
        INSERT INTO access VALUES ('/z/home/a', 'alice', 'z', 'own');
        INSERT INTO access VALUES ('/z/home/a/f.txt', 'alice', 'z', 'own');
        ",
    )
    .unwrap();
    drop(conn);

    let config = format!(
        "[repository]\ncatalog_path = '{}'\nzone = 'z'\n\n[store]\nbackend = 'sqlite'\npath = '{}'\n",
        root.join("catalog.db").display(),
        root.join("index.db").display(),
    );
    std::fs::write(root.join("indexsync.toml"), config).unwrap();
    dir
}

/// Helper to find a free port
fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Helper to wait for the service to be ready
fn wait_for_service(base_url: &str, timeout: Duration) -> bool {
    let client = reqwest::blocking::Client::new();
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if client.get(format!("{}/status", base_url)).send().is_ok() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    false
}

struct Service(Child);

impl Drop for Service {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

#[test]
fn test_service_lifecycle() {
    let env = create_test_env();
    let port = free_port();
    let base_url = format!("http://127.0.0.1:{}", port);

    let _service = Service(
        Command::new(env!("CARGO_BIN_EXE_indexsync-service"))
            .args(["--port", &port.to_string()])
            .arg("--config")
            .arg(env.path().join("indexsync.toml"))
            .spawn()
            .expect("Failed to start indexsync-service"),
    );

    assert!(
        wait_for_service(&base_url, Duration::from_secs(5)),
        "Service failed to start"
    );

    let client = reqwest::blocking::Client::new();

    // 1. Add a data object
    let resp: serde_json::Value = client
        .post(format!("{}/events", base_url))
        .json(&serde_json::json!({
            "routing_key": "data-object.add",
            "event": {
                "entity": "/z/home/a/f.txt",
                "creator": "alice",
                "size": 120,
                "type": "text"
            }
        }))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(resp["outcome"], "handled");
    assert!(resp["delivery_id"].as_str().is_some());

    // 2. Unknown routing key is accepted and dropped
    let resp: serde_json::Value = client
        .post(format!("{}/events", base_url))
        .json(&serde_json::json!({
            "routing_key": "foo.bar",
            "event": { "entity": "/z/home/a" }
        }))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(resp["outcome"], "unrecognized");

    // 3. Malformed payload comes back as an error envelope
    let resp = client
        .post(format!("{}/events", base_url))
        .json(&serde_json::json!({
            "routing_key": "collection.mv",
            "event": { "entity": "/z/home/a" }
        }))
        .send()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["code"], "malformed_event");

    // 4. A body that is not an event record also gets an envelope
    let resp = client
        .post(format!("{}/events", base_url))
        .json(&serde_json::json!({ "routing_key": "collection.add", "event": "not an object" }))
        .send()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["code"], "malformed_event");
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));

    let resp = client
        .post(format!("{}/events", base_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["code"], "malformed_event");

    // 5. Status reflects the three dispatched deliveries and the written documents
    let status: serde_json::Value = client
        .get(format!("{}/status", base_url))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(status["events"]["handled"], 1);
    assert_eq!(status["events"]["unrecognized"], 1);
    assert_eq!(status["events"]["failed"], 1);
    assert_eq!(status["documents"]["files"], 1);
    assert_eq!(status["documents"]["folders"], 1);
}
