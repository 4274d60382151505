//! Exit status tests for the `strategy-host` binary

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output};

fn strategy_host(args: &[&str]) -> Output {
    let scratch = tempfile::tempdir().unwrap();
    Command::new(env!("CARGO_BIN_EXE_strategy-host"))
        .args(args)
        .current_dir(scratch.path())
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn demo_script() -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("scripts/strategy.wat")
        .display()
        .to_string()
}

#[test]
fn test_successful_run_exits_zero() {
    let output = strategy_host(&["--script", &demo_script(), "--report"]);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(output.status.code(), Some(0));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Host configuration loaded"), "{stderr}");

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["orders"][0]["order"]["order_id"], 1);
    assert_eq!(report["orders"][0]["order"]["price"], 759.11);
}

#[test]
fn test_missing_script_exits_one_with_trace() {
    let output = strategy_host(&["--script", "does/not/exist.wat"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("strategy host error"), "{stderr}");
    assert!(stderr.contains("does/not/exist.wat"), "{stderr}");
}

#[test]
fn test_syntax_error_exits_one() {
    let mut file = tempfile::Builder::new().suffix(".wat").tempfile().unwrap();
    file.write_all(b"(module (func").unwrap();
    file.flush().unwrap();

    let output = strategy_host(&["--script", &file.path().display().to_string()]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("strategy host error"), "{stderr}");
}

#[test]
fn test_missing_config_file_exits_one() {
    let output = strategy_host(&["--config", "missing-config.toml"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Strategy host failed"), "{stderr}");
    assert!(stderr.contains("strategy host error"), "{stderr}");
}
