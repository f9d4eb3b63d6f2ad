//! Tests for the CLI layer: config precedence and exit codes.

use abyss::cli::{self, Cli};
use abyss_core::types::exit;
use abyss_core::Error;
use clap::Parser;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("abyss").chain(args.iter().copied())).unwrap()
}

fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

fn no_env() -> impl Fn(&str) -> Option<String> {
    env(&[])
}

fn write_config(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("abyss.toml");
    std::fs::write(&path, body).unwrap();
    path
}

// ===========================================================================
// Config precedence
// ===========================================================================

#[test]
fn file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[layers]\ncount = 5\n[methods]\ntimeout_secs = 20\n");
    let cli = parse(&["--config", path.to_str().unwrap()]);

    let config = cli::resolve_config_with(&cli, no_env()).unwrap();
    assert_eq!(config.layers.count, 5);
    assert_eq!(config.methods.timeout_secs, 20);
    assert_eq!(config.pacing.method_pause_ms, 100);
}

#[test]
fn env_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[layers]\ncount = 5\n[methods]\ndir = \"/from-file\"\n");
    let cli = parse(&["--config", path.to_str().unwrap()]);

    let config = cli::resolve_config_with(
        &cli,
        env(&[("ABYSS_LAYER_COUNT", "7"), ("ABYSS_METHODS_DIR", "/from-env")]),
    )
    .unwrap();
    assert_eq!(config.layers.count, 7);
    assert_eq!(config.methods.dir, PathBuf::from("/from-env"));
}

#[test]
fn flags_override_env() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[layers]\ncount = 5\n");
    let cli = parse(&[
        "--config",
        path.to_str().unwrap(),
        "--layers",
        "9",
        "--methods-dir",
        "/from-flag",
        "--timeout-secs",
        "3",
    ]);

    let config = cli::resolve_config_with(
        &cli,
        env(&[("ABYSS_LAYER_COUNT", "7"), ("ABYSS_METHODS_DIR", "/from-env")]),
    )
    .unwrap();
    assert_eq!(config.layers.count, 9);
    assert_eq!(config.methods.dir, PathBuf::from("/from-flag"));
    assert_eq!(config.methods.timeout_secs, 3);
}

#[test]
fn non_numeric_layer_count_env_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[layers]\ncount = 5\n");
    let cli = parse(&["--config", path.to_str().unwrap()]);

    let config = cli::resolve_config_with(&cli, env(&[("ABYSS_LAYER_COUNT", "many")])).unwrap();
    assert_eq!(config.layers.count, 5);
}

#[test]
fn config_path_comes_from_env_when_no_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[layers]\ncount = 11\n");
    let cli = parse(&[]);

    let config =
        cli::resolve_config_with(&cli, env(&[("ABYSS_CONFIG", path.to_str().unwrap())])).unwrap();
    assert_eq!(config.layers.count, 11);
}

#[test]
fn sound_flag_enables_feedback() {
    let dir = tempfile::tempdir().unwrap();
    let cli = parse(&["--config", dir.path().join("none.toml").to_str().unwrap(), "--sound"]);
    let config = cli::resolve_config_with(&cli, no_env()).unwrap();
    assert!(config.feedback.enabled);
}

#[test]
fn zero_timeout_flag_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cli = parse(&[
        "--config",
        dir.path().join("none.toml").to_str().unwrap(),
        "--timeout-secs",
        "0",
    ]);
    let err = cli::resolve_config_with(&cli, no_env()).unwrap_err();
    assert_eq!(cli::exit_code_for(&err), exit::FAILURE);
}

#[test]
fn invalid_config_file_is_not_replaced_by_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[layers]\ncount = 5\n[methods]\ntimeout_secs = 0\n");
    let cli = parse(&["--config", path.to_str().unwrap()]);
    assert!(cli::resolve_config_with(&cli, no_env()).is_err());
}

// ===========================================================================
// Exit codes
// ===========================================================================

#[test]
fn exit_code_for_maps_errors() {
    let invalid = anyhow::Error::from(Error::invalid_target("abc"));
    assert_eq!(cli::exit_code_for(&invalid), exit::INVALID_INPUT);

    let config = anyhow::Error::from(Error::Config("bad".into()));
    assert_eq!(cli::exit_code_for(&config), exit::FAILURE);

    let other = anyhow::anyhow!("stdin closed");
    assert_eq!(cli::exit_code_for(&other), exit::FAILURE);
}

#[tokio::test]
async fn non_numeric_target_exits_with_invalid_input() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("none.toml");
    for target in ["abc", "0", "-5", "12x"] {
        let cli = Cli::try_parse_from([
            "abyss",
            "--config",
            missing.to_str().unwrap(),
            "--methods-dir",
            dir.path().to_str().unwrap(),
            "--",
            target,
        ])
        .unwrap();
        assert_eq!(cli::run(cli).await, exit::INVALID_INPUT, "target {target:?}");
    }
}

#[tokio::test]
async fn invalid_config_file_exits_with_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[methods]\nextension = \".sh\"\n");
    let cli = parse(&["config", "--config", path.to_str().unwrap()]);
    assert_eq!(cli::run(cli).await, exit::FAILURE);
}

#[tokio::test]
async fn simulation_with_no_methods_exits_exhausted() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("none.toml");
    let cli = parse(&[
        "simulate",
        "--config",
        missing.to_str().unwrap(),
        "--methods-dir",
        dir.path().to_str().unwrap(),
        "--layers",
        "2",
    ]);
    assert_eq!(cli::run(cli).await, exit::METHODS_EXHAUSTED);
}

#[tokio::test]
async fn version_exits_zero() {
    assert_eq!(cli::run(parse(&["version"])).await, 0);
}

#[tokio::test]
async fn list_with_huge_layer_count_returns() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("none.toml");
    let cli = parse(&[
        "list",
        "--config",
        missing.to_str().unwrap(),
        "--methods-dir",
        dir.path().join("absent").to_str().unwrap(),
        "--layers",
        "4294967295",
    ]);
    assert_eq!(cli::run(cli).await, 0);
}
