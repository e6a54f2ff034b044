use std::process::{Command, Output};
use tempfile::TempDir;

fn indexsync(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_indexsync"))
        .current_dir(dir.path())
        .env_remove("INDEXSYNC_CONFIG")
        .env("RUST_LOG", "off")
        .args(args)
        .output()
        .expect("Failed to run indexsync")
}

#[test]
fn test_init_then_status_and_show() {
    let dir = TempDir::new().unwrap();

    // 1. init writes the default config, and refuses to overwrite it
    let out = indexsync(&dir, &["init"]);
    assert!(out.status.success());
    assert!(dir.path().join("indexsync.toml").exists());
    let out = indexsync(&dir, &["init"]);
    assert!(!out.status.success());

    // 2. status loads that config and reports an empty store
    let out = indexsync(&dir, &["status", "--json"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let status: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(status["folders"], 0);
    assert_eq!(status["files"], 0);
    assert!(dir.path().join("index.db").exists());

    // 3. show on an unknown id fails with an envelope
    let out = indexsync(&dir, &["show", "/z/nope", "--json"]);
    assert!(!out.status.success());
    let envelope: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert_eq!(envelope["code"], "internal_error");
}
