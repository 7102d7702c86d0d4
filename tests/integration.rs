use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn docchat_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_docchat"))
}

fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "# Alpha Document\n\nThis is the alpha document about Rust programming.\n\nIt contains information about cargo and crates.",
    )
    .unwrap();
    fs::write(
        files_dir.join("beta.md"),
        "# Beta Document\n\nThis document discusses Python and machine learning.\n\nDeep learning frameworks like PyTorch are covered.",
    )
    .unwrap();
    fs::write(
        files_dir.join("gamma.txt"),
        "Gamma plain text file.\n\nContains notes about deployment and infrastructure.\n\nKubernetes and Docker are mentioned here.",
    )
    .unwrap();
    fs::write(files_dir.join("picture.png"), b"\x89PNG").unwrap();

    let config_path = root.join("docchat.toml");
    fs::write(
        &config_path,
        r#"[chunking]
target_size = 200
overlap = 40

[retrieval]
top_k = 3
min_relevance_score = 0.01

[generation]
provider = "disabled"
"#,
    )
    .unwrap();

    (tmp, config_path, files_dir)
}

fn run_docchat(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docchat_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docchat binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_inspect_lists_documents() {
    let (_tmp, config, files) = setup_test_env();
    let files = files.to_str().unwrap();

    let (stdout, stderr, success) = run_docchat(&config, &["inspect", files, "--chunks"]);
    assert!(success, "inspect failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("alpha.md [Markdown File]"));
    assert!(stdout.contains("gamma.txt [Text File]"));
    assert!(stdout.contains("Total: 3 documents"));
    assert!(stdout.contains("#0 0.."));
    // png is outside the default include globs
    assert!(!stdout.contains("picture.png"));
}

#[test]
fn test_search_ranks_matching_document() {
    let (_tmp, config, files) = setup_test_env();
    let files = files.to_str().unwrap();

    let (stdout, stderr, success) = run_docchat(&config, &["search", "kubernetes docker", files]);
    assert!(success, "search failed: stderr={}", stderr);
    assert!(stdout.starts_with("1. ["), "unexpected output: {}", stdout);
    assert!(stdout.lines().next().unwrap().contains("gamma.txt"));
    assert!(!stdout.contains("beta.md"));
}

#[test]
fn test_search_no_results() {
    let (_tmp, config, files) = setup_test_env();
    let files = files.to_str().unwrap();

    let (stdout, _, success) = run_docchat(&config, &["search", "zebra", files]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_ask_with_disabled_generation_degrades() {
    let (tmp, config, files) = setup_test_env();
    let files = files.to_str().unwrap();
    let session = tmp.path().join("state/session.json");

    let (stdout, stderr, success) = run_docchat(
        &config,
        &["ask", "What about cargo?", files, "--session", session.to_str().unwrap()],
    );
    assert!(success, "ask failed: stderr={}", stderr);
    assert!(stdout.contains("Sorry"));
    assert!(stderr.contains("Generation failed"));

    let saved = fs::read_to_string(&session).unwrap();
    let json: serde_json::Value = serde_json::from_str(&saved).unwrap();
    assert_eq!(json["messages"].as_array().unwrap().len(), 2);
    assert_eq!(json["documents"].as_array().unwrap().len(), 3);

    // Second ask restores the session without re-loading files.
    let (_, stderr, success) = run_docchat(
        &config,
        &["ask", "And Python?", "--session", session.to_str().unwrap()],
    );
    assert!(success, "resumed ask failed: {}", stderr);
    let saved = fs::read_to_string(&session).unwrap();
    let json: serde_json::Value = serde_json::from_str(&saved).unwrap();
    assert_eq!(json["messages"].as_array().unwrap().len(), 4);
}

#[test]
fn test_chat_repl_commands() {
    let (_tmp, config, files) = setup_test_env();

    let mut child = Command::new(docchat_binary())
        .arg("--config")
        .arg(&config)
        .arg("chat")
        .arg(&files)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"/docs\n/remove beta.md\n/personality lawyer\n/stats\n/quit\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("3 document(s) loaded"));
    assert!(stdout.contains("beta.md (Markdown File,"));
    assert!(stdout.contains("Removed beta.md."));
    assert!(stdout.contains("Personality set to Legal Expert."));
    assert!(stdout.contains("2 documents"));
}

#[test]
fn test_no_documents_is_error() {
    let (tmp, config, _) = setup_test_env();
    let empty = tmp.path().join("empty");
    fs::create_dir_all(&empty).unwrap();

    let (_, stderr, success) = run_docchat(&config, &["inspect", empty.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("No documents loaded"));
}

#[test]
fn test_corrupt_file_reported_but_batch_continues() {
    let (_tmp, config, files) = setup_test_env();
    fs::write(files.join("broken.pdf"), b"not a pdf").unwrap();

    let (stdout, stderr, success) =
        run_docchat(&config, &["inspect", files.to_str().unwrap()]);
    assert!(success, "stderr={}", stderr);
    assert!(stderr.contains("Skipped"));
    assert!(stderr.contains("broken.pdf"));
    assert!(stdout.contains("Total: 3 documents"));
}

#[test]
fn test_invalid_config_fails() {
    let (tmp, _, files) = setup_test_env();
    let bad = tmp.path().join("bad.toml");
    fs::write(&bad, "[chunking]\ntarget_size = 100\noverlap = 150\n").unwrap();

    let (_, stderr, success) = run_docchat(&bad, &["inspect", files.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("overlap"));
}

#[test]
fn test_personalities_listed() {
    let (_tmp, config, _) = setup_test_env();
    let (stdout, _, success) = run_docchat(&config, &["personalities"]);
    assert!(success);
    for key in ["general", "researcher", "business", "lawyer", "student"] {
        assert!(stdout.contains(key), "missing {}", key);
    }
    assert!(stdout.starts_with("* general"));
}

#[test]
fn test_unknown_analysis_kind_fails() {
    let (_tmp, config, files) = setup_test_env();
    let (_, _, success) = run_docchat(&config, &["analyze", "haiku", files.to_str().unwrap()]);
    assert!(!success);
}

#[test]
fn test_mind_map_without_generation_fails_cleanly() {
    let (_tmp, config, files) = setup_test_env();
    let (stdout, stderr, success) = run_docchat(
        &config,
        &["analyze", "mind_map", files.to_str().unwrap(), "--mermaid"],
    );
    assert!(!success);
    assert!(stdout.is_empty());
    assert!(stderr.contains("mind_map analysis failed"));
}

#[test]
fn test_mermaid_flag_requires_mind_map() {
    let (_tmp, config, files) = setup_test_env();
    let (_, stderr, success) =
        run_docchat(&config, &["analyze", "summary", files.to_str().unwrap(), "--mermaid"]);
    assert!(!success);
    assert!(stderr.contains("--mermaid"));
}

#[test]
fn test_resumed_session_does_not_report_loaded_files() {
    let (tmp, config, files) = setup_test_env();
    let files = files.to_str().unwrap();
    let session = tmp.path().join("session.json");
    let session = session.to_str().unwrap();

    let (_, stderr, success) = run_docchat(&config, &["ask", "cargo?", files, "--session", session]);
    assert!(success, "first ask failed: {}", stderr);
    assert!(!stderr.contains("Skipped"));

    let (_, stderr, success) = run_docchat(&config, &["ask", "python?", files, "--session", session]);
    assert!(success, "second ask failed: {}", stderr);
    assert!(!stderr.contains("Skipped"), "unexpected: {}", stderr);
    assert!(!stderr.contains("already loaded"));
}
