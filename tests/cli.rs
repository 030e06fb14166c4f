use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let src = root.join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("a.py"), "print('hello')\n").unwrap();

    let config_content = format!(
        r#"[store]
path = "{root}/data/vectors.sqlite"

[registry]
path = "{root}/data/projects.json"

[ingest]
uploads_dir = "{root}/data/uploads"

[server]
bind = "127.0.0.1:7341"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("cba.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_cba(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = env!("CARGO_BIN_EXE_cba");
    let output = Command::new(binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run cba binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).unwrap_or_else(|e| panic!("not JSON ({}): {}", e, stdout))
}

fn create_project(config_path: &Path, root: &Path) -> String {
    let (stdout, stderr, ok) = run_cba(
        config_path,
        &[
            "project",
            "create",
            "demo",
            "--root-path",
            root.join("src").to_str().unwrap(),
        ],
    );
    assert!(ok, "create failed: {}", stderr);
    json(&stdout)["project_id"].as_str().unwrap().to_string()
}

#[test]
fn test_init_is_idempotent() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, ok) = run_cba(&config_path, &["init"]);
    assert!(ok, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Initialized store"));
    assert!(tmp.path().join("data/vectors.sqlite").exists());
    assert!(tmp.path().join("data/projects.json").exists());

    let (_, stderr, ok) = run_cba(&config_path, &["init"]);
    assert!(ok, "second init failed: {}", stderr);
}

#[test]
fn test_project_lifecycle() {
    let (tmp, config_path) = setup_test_env();
    run_cba(&config_path, &["init"]);

    let id = create_project(&config_path, tmp.path());
    assert!(id.starts_with("proj_"));

    let (stdout, _, ok) = run_cba(&config_path, &["project", "list"]);
    assert!(ok);
    let list = json(&stdout);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["project_name"], "demo");
    assert_eq!(list[0]["chunk_count"], 0);

    let (stdout, _, ok) = run_cba(&config_path, &["stats", &id]);
    assert!(ok);
    assert_eq!(json(&stdout)["chunk_count"], 0);

    let (stdout, _, ok) = run_cba(&config_path, &["project", "delete", &id]);
    assert!(ok);
    let deleted = json(&stdout);
    assert_eq!(deleted["status"], "deleted");
    assert_eq!(deleted["project_id"], id.as_str());

    let (_, stderr, ok) = run_cba(&config_path, &["project", "show", &id]);
    assert!(!ok);
    assert!(stderr.contains("project not found"));
}

#[test]
fn test_create_without_source_fails() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, ok) = run_cba(&config_path, &["project", "create", "demo"]);
    assert!(!ok);
    assert!(stderr.contains("Provide either repo_url or root_path."));
}

#[test]
fn test_reembed_without_root_path_explains() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, stderr, ok) = run_cba(
        &config_path,
        &["project", "create", "remote", "--repo-url", "https://example.com/r.git"],
    );
    assert!(ok, "create failed: {}", stderr);
    let id = json(&stdout)["project_id"].as_str().unwrap().to_string();

    let (stdout, stderr, ok) = run_cba(&config_path, &["reembed", &id]);
    assert!(ok, "reembed failed: {}", stderr);
    let result = json(&stdout);
    assert_eq!(result["deleted_chunks"], 0);
    assert!(result["message"].as_str().unwrap().contains("No root_path on record"));

    let (_, stderr, ok) = run_cba(&config_path, &["reembed", &id, "--strategy", "merge"]);
    assert!(!ok);
    assert!(stderr.contains("strategy must be"));
}

#[test]
fn test_ingest_with_disabled_embeddings_skips_files() {
    let (tmp, config_path) = setup_test_env();
    let id = create_project(&config_path, tmp.path());

    let src = tmp.path().join("src");
    let (stdout, stderr, ok) = run_cba(
        &config_path,
        &["ingest", "folder", &id, src.to_str().unwrap()],
    );
    assert!(ok, "ingest failed: {}", stderr);
    let result = json(&stdout);
    assert_eq!(result["files_ingested"], 0);
    assert_eq!(result["chunks_upserted"], 0);

    let (stdout, _, ok) = run_cba(&config_path, &["files", &id]);
    assert!(ok);
    assert!(json(&stdout).as_array().unwrap().is_empty());
}

#[test]
fn test_sweep_on_empty_store() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, stderr, ok) = run_cba(&config_path, &["sweep"]);
    assert!(ok, "sweep failed: {}", stderr);
    assert_eq!(json(&stdout)["deleted"], serde_json::json!({}));
}
