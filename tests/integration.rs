use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn vsearch_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("vsearch");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let vault = root.join("vault");
    fs::create_dir_all(vault.join("animals")).unwrap();
    fs::create_dir_all(vault.join(".obsidian")).unwrap();

    fs::write(
        vault.join("fox.md"),
        "# Fox\n\nThe quick brown fox jumps over the lazy dog.",
    )
    .unwrap();
    fs::write(
        vault.join("rust.md"),
        "# Rust\n\nOwnership and borrowing keep memory safe without a garbage collector.",
    )
    .unwrap();
    fs::write(
        vault.join("animals/owl.md"),
        "Owls hunt at night and can turn their heads a long way.",
    )
    .unwrap();
    fs::write(vault.join(".obsidian/workspace.md"), "editor state").unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_content = format!(
        r#"[vault]
root = "{root}/vault"

[embedding]
provider = "disabled"

[llm]
provider = "disabled"

[storage]
use_persistent_storage = true
snapshot_path = "{root}/data/snapshot.json"
"#,
        root = root.display()
    );
    let config_path = config_dir.join("vaultsearch.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_vsearch(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = vsearch_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--quiet")
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run vsearch binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_index_reports_and_writes_snapshot() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_vsearch(&config, &["index"]);
    assert!(ok, "index failed: {}", stderr);
    assert!(stdout.contains("notes scanned: 3"), "stdout: {}", stdout);
    assert!(stdout.contains("notes indexed: 3"));
    assert!(stdout.trim_end().ends_with("ok"));
    assert!(tmp.path().join("data/snapshot.json").exists());
}

#[test]
fn test_index_is_incremental() {
    let (tmp, config) = setup_test_env();
    run_vsearch(&config, &["index"]);

    let (stdout, _, ok) = run_vsearch(&config, &["index"]);
    assert!(ok);
    assert!(stdout.contains("notes indexed: 0"), "stdout: {}", stdout);
    assert!(stdout.contains("notes unchanged: 3"));

    fs::remove_file(tmp.path().join("vault/rust.md")).unwrap();
    let (stdout, _, ok) = run_vsearch(&config, &["index"]);
    assert!(ok);
    assert!(stdout.contains("notes removed: 1"), "stdout: {}", stdout);

    let (stdout, _, ok) = run_vsearch(&config, &["index", "--full"]);
    assert!(ok);
    assert!(stdout.contains("notes indexed: 2"), "stdout: {}", stdout);
}

#[test]
fn test_search_ranks_lexical_match_first() {
    let (_tmp, config) = setup_test_env();
    run_vsearch(&config, &["index"]);

    let (stdout, stderr, ok) = run_vsearch(&config, &["search", "quick brown fox", "--no-rerank"]);
    assert!(ok, "search failed: {}", stderr);
    let first = stdout.lines().next().unwrap_or_default();
    assert!(first.starts_with("1. ["), "stdout: {}", stdout);
    assert!(first.contains("fox.md / fox"), "stdout: {}", stdout);
}

#[test]
fn test_search_with_reranking() {
    let (_tmp, config) = setup_test_env();
    run_vsearch(&config, &["index"]);

    let (stdout, _, ok) = run_vsearch(&config, &["search", "quick brown fox", "--limit", "1"]);
    assert!(ok);
    assert!(stdout.contains("fox.md"), "stdout: {}", stdout);
    assert!(!stdout.contains("2. ["));
}

#[test]
fn test_search_empty_query() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, ok) = run_vsearch(&config, &["search", "   "]);
    assert!(ok);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_before_index_is_empty() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, ok) = run_vsearch(&config, &["search", "fox"]);
    assert!(ok);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_remove_document() {
    let (_tmp, config) = setup_test_env();
    run_vsearch(&config, &["index"]);

    let (stdout, _, ok) = run_vsearch(&config, &["remove", "fox.md"]);
    assert!(ok);
    assert!(stdout.starts_with("removed 1 chunk"), "stdout: {}", stdout);

    let (stdout, _, _) = run_vsearch(&config, &["search", "quick brown fox", "--no-rerank"]);
    assert!(!stdout.contains("fox.md"), "stdout: {}", stdout);

    let (stdout, _, ok) = run_vsearch(&config, &["remove", "fox.md"]);
    assert!(ok);
    assert!(stdout.starts_with("removed 0 chunks"));
}

#[test]
fn test_stats() {
    let (_tmp, config) = setup_test_env();
    run_vsearch(&config, &["index"]);

    let (stdout, stderr, ok) = run_vsearch(&config, &["stats"]);
    assert!(ok, "stats failed: {}", stderr);
    assert!(stdout.contains("Documents:   3"), "stdout: {}", stdout);
    assert!(stdout.contains("Model:       disabled"));
    assert!(stdout.contains("(384 dims)"));
}

#[test]
fn test_stats_without_persistence_indexes_in_memory() {
    let (tmp, config) = setup_test_env();
    let content = fs::read_to_string(&config)
        .unwrap()
        .replace("use_persistent_storage = true", "use_persistent_storage = false");
    fs::write(&config, content).unwrap();

    let (stdout, stderr, ok) = run_vsearch(&config, &["stats"]);
    assert!(ok, "stats failed: {}", stderr);
    assert!(stdout.contains("Documents:   3"), "stdout: {}", stdout);
    assert!(stdout.contains("Snapshot:    disabled"));
    assert!(!tmp.path().join("data/snapshot.json").exists());
}

#[test]
fn test_ask_without_llm_fails() {
    let (_tmp, config) = setup_test_env();
    run_vsearch(&config, &["index"]);

    let (_, stderr, ok) = run_vsearch(&config, &["ask", "what does the fox do?"]);
    assert!(!ok);
    assert!(stderr.contains("answer generation failed"), "stderr: {}", stderr);
}

#[test]
fn test_completions_need_no_config() {
    let binary = vsearch_binary();
    let output = Command::new(&binary)
        .args(["--config", "/nonexistent/vaultsearch.toml", "completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("vsearch"));
}

#[test]
fn test_invalid_config() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    fs::write(
        &config_path,
        "[vault]\nroot = \"/tmp\"\n\n[chunking]\nmax_chunk_size = 100\nchunk_overlap = 100\n",
    )
    .unwrap();

    let (_, stderr, ok) = run_vsearch(&config_path, &["stats"]);
    assert!(!ok);
    assert!(stderr.contains("chunk_overlap"), "stderr: {}", stderr);
}

#[test]
fn test_missing_config() {
    let (_, stderr, ok) = run_vsearch(Path::new("/nonexistent/vaultsearch.toml"), &["stats"]);
    assert!(!ok);
    assert!(stderr.contains("Failed to read config file"));
}
