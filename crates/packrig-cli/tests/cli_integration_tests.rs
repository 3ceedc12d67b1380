//! CLI integration tests
//!
//! These drive the built `packrig` binary against configuration files in a
//! temporary directory.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;

fn write_config(temp_dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = temp_dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn packrig(temp_dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_packrig"))
        .current_dir(temp_dir.path())
        .args(args)
        .output()
        .expect("Failed to execute CLI")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
        panic!(
            "stdout should be JSON ({err}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

#[test]
fn test_resolve_prints_defaults() {
    let temp_dir = TempDir::new().unwrap();
    write_config(
        &temp_dir,
        "packrig.json",
        r#"{"mode": "development", "output": {"filename": "bundle.js"}}"#,
    );

    let output = packrig(&temp_dir, &["resolve", "packrig.json"]);

    assert!(
        output.status.success(),
        "resolve should succeed. Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let resolved = stdout_json(&output);
    assert_eq!(resolved["devtool"], "eval");
    assert_eq!(resolved["output"]["chunkFilename"], "[id].bundle.js");
    assert_eq!(resolved["optimization"]["splitChunks"]["maxAsyncRequests"], "Infinity");
    assert!(resolved["output"]["path"]
        .as_str()
        .unwrap()
        .ends_with("dist"));
}

#[test]
fn test_resolve_applies_flag_overrides() {
    let temp_dir = TempDir::new().unwrap();
    write_config(&temp_dir, "packrig.json", r#"{"mode": "development"}"#);

    let output = packrig(
        &temp_dir,
        &["resolve", "packrig.json", "--mode", "production", "--target", "node"],
    );

    assert!(output.status.success());
    let resolved = stdout_json(&output);
    assert_eq!(resolved["mode"], "production");
    assert_eq!(resolved["output"]["globalObject"], "global");
    assert_eq!(resolved["performance"], false);
}

#[test]
fn test_resolve_toml_array_form() {
    let temp_dir = TempDir::new().unwrap();
    write_config(
        &temp_dir,
        "packrig.toml",
        r#"
[[configs]]
name = "client"

[[configs]]
name = "server"
target = "node"
"#,
    );

    let output = packrig(&temp_dir, &["resolve", "packrig.toml"]);

    assert!(output.status.success());
    let resolved = stdout_json(&output);
    let configs = resolved.as_array().expect("array of resolved configs");
    assert_eq!(configs.len(), 2);
    assert_eq!(configs[0]["resolve"]["mainFields"][0], "browser");
    assert_eq!(configs[1]["resolve"]["mainFields"][0], "module");
}

#[test]
fn test_validate_reports_every_violation() {
    let temp_dir = TempDir::new().unwrap();
    write_config(
        &temp_dir,
        "packrig.json",
        r#"{"mode": "fast", "target": "moon", "entyr": "./src"}"#,
    );

    let output = packrig(&temp_dir, &["validate", "packrig.json"]);

    assert!(!output.status.success(), "invalid config should fail");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().filter(|l| l.starts_with(" - ")).count(), 3);
    assert!(stdout.contains("configuration.mode"));
    assert!(stdout.contains("unknown property 'entyr'"));
}

#[test]
fn test_validate_accepts_valid_config() {
    let temp_dir = TempDir::new().unwrap();
    write_config(&temp_dir, "packrig.json", r#"{"entry": {"main": "./src/index.js"}}"#);

    let output = packrig(&temp_dir, &["validate", "packrig.json"]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("is valid"));
}

#[test]
fn test_build_prints_dry_run_summary() {
    let temp_dir = TempDir::new().unwrap();
    write_config(
        &temp_dir,
        "packrig.json",
        r#"{"name": "app", "entry": "./src/main.js"}"#,
    );

    let output = packrig(&temp_dir, &["build", "packrig.json", "--log-format", "json"]);

    assert!(
        output.status.success(),
        "build should succeed. Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let summary = stdout_json(&output);
    assert_eq!(summary["name"], "app");
    assert_eq!(summary["entry"], "./src/main.js");
    assert_eq!(summary["dry_run"], true);
    let plugins: Vec<&str> = summary["plugins"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p.as_str())
        .collect();
    assert_eq!(plugins.first(), Some(&"EnvironmentPlugin"));
    assert!(plugins.contains(&"EntryOptionPlugin"));
}

#[test]
fn test_build_watch_reports_every_member() {
    let temp_dir = TempDir::new().unwrap();
    write_config(
        &temp_dir,
        "packrig.json",
        r#"[{"name": "a"}, {"name": "b", "watchOptions": {"aggregateTimeout": 10}}]"#,
    );

    let output = packrig(&temp_dir, &["build", "packrig.json", "--watch"]);

    assert!(output.status.success());
    let summaries = stdout_json(&output);
    let summaries = summaries.as_array().expect("one summary per config");
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[1]["name"], "b");
}

#[test]
fn test_invalid_config_fails_with_code() {
    let temp_dir = TempDir::new().unwrap();
    write_config(&temp_dir, "packrig.json", r#"{"mode": "fast"}"#);

    let output = packrig(&temp_dir, &["build", "packrig.json"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERR_CONFIG_VALIDATION"), "stderr: {stderr}");
}

#[test]
fn test_missing_file_fails() {
    let temp_dir = TempDir::new().unwrap();

    let output = packrig(&temp_dir, &["resolve", "nope.json"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read"));
}
