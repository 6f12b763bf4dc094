//! CLI tests that run the `resume-advisor` binary. None of them reach the
//! network: `inspect` makes no model calls and the others fail before one.

mod common;

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn setup() -> (TempDir, std::path::PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("advisor.toml");
    fs::write(
        &config,
        r#"[chunking]
chunk_size = 60
overlap = 10

[embedding]
provider = "hashing"
dims = 64

[llm]
api_key_env = "RESUME_ADVISOR_TEST_TOKEN_UNSET"
"#,
    )
    .unwrap();
    fs::write(tmp.path().join("jane.pdf"), common::resume_pdf()).unwrap();
    (tmp, config)
}

fn run(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_resume-advisor"))
        .current_dir(dir)
        .env_remove("RESUME_ADVISOR_TEST_TOKEN_UNSET")
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run resume-advisor: {}", e));
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn inspect_prints_pages_and_chunks() {
    let (tmp, config) = setup();
    let (stdout, stderr, success) = run(
        tmp.path(),
        &[
            "--config",
            config.to_str().unwrap(),
            "--progress",
            "off",
            "inspect",
            "jane.pdf",
            "--preview",
            "2",
        ],
    );
    assert!(success, "inspect failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("jane.pdf"), "{}", stdout);
    assert!(stdout.contains("pages:  2"), "{}", stdout);
    assert!(stdout.contains("size 60 / overlap 10"), "{}", stdout);
    assert!(stdout.contains("[0] page 1"), "{}", stdout);
}

#[test]
fn inspect_rejects_unreadable_pdf() {
    let (tmp, config) = setup();
    fs::write(tmp.path().join("scan.pdf"), b"not a pdf at all").unwrap();
    let (_, stderr, success) = run(
        tmp.path(),
        &["--config", config.to_str().unwrap(), "inspect", "scan.pdf"],
    );
    assert!(!success);
    assert!(stderr.contains("text extraction failed"), "{}", stderr);
}

#[test]
fn ask_without_token_fails_with_guidance() {
    let (tmp, config) = setup();
    let (_, stderr, success) = run(
        tmp.path(),
        &[
            "--config",
            config.to_str().unwrap(),
            "ask",
            "jane.pdf",
            "What are the key skills?",
        ],
    );
    assert!(!success);
    assert!(stderr.contains("RESUME_ADVISOR_TEST_TOKEN_UNSET"), "{}", stderr);
}

#[test]
fn invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("bad.toml");
    fs::write(&config, "[chunking]\nchunk_size = 100\noverlap = 100\n").unwrap();
    fs::write(tmp.path().join("jane.pdf"), common::resume_pdf()).unwrap();

    let (_, stderr, success) = run(
        tmp.path(),
        &["--config", config.to_str().unwrap(), "inspect", "jane.pdf"],
    );
    assert!(!success);
    assert!(stderr.contains("overlap"), "{}", stderr);
}
