// tests/config_loading.rs
mod common;
use crate::common::init_tracing;

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tempfile::NamedTempFile;

use fleetrun::apply_cli_overrides;
use fleetrun::cli::CliArgs;
use fleetrun::config::{load_and_validate, load_or_default, ConfigFile, DiscoverySection};
use fleetrun::errors::FleetError;
use fleetrun::types::{parse_duration, RestartMode};

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn empty_file_gives_defaults() {
    init_tracing();

    let file = write_config("");
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg, ConfigFile::default());
    assert_eq!(cfg.supervisor.restart, RestartMode::Never);
    assert_eq!(cfg.supervisor.restart_delay, Duration::from_secs(5));
    assert_eq!(cfg.supervisor.stop_timeout, Duration::from_secs(5));
    assert_eq!(cfg.discovery, DiscoverySection::default());
    assert_eq!(cfg.discovery.launcher, vec!["uv", "run"]);
}

#[test]
fn full_file_is_parsed() {
    init_tracing();

    let file = write_config(
        r#"
[supervisor]
restart = "non-zero"
restart_delay = "250ms"
stop_timeout = "1m"

[discovery]
env_marker = "node_modules"
manifest_marker = "package.json"
entry_file = "index.js"
fallback_entries = ["server.js", "app.js"]
script_extension = "js"
launcher = ["node"]
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.supervisor.restart, RestartMode::NonZero);
    assert_eq!(cfg.supervisor.restart_delay, Duration::from_millis(250));
    assert_eq!(cfg.supervisor.stop_timeout, Duration::from_secs(60));
    assert_eq!(cfg.discovery.env_marker, "node_modules");
    assert_eq!(cfg.discovery.fallback_entries, vec!["server.js", "app.js"]);
    assert_eq!(cfg.discovery.launcher, vec!["node"]);
}

#[test]
fn invalid_duration_returns_config_error() {
    init_tracing();

    let file = write_config(
        r#"
[supervisor]
restart_delay = "5 parsecs"
"#,
    );

    match load_and_validate(file.path()) {
        Err(FleetError::ConfigError(msg)) => {
            assert!(msg.contains("restart_delay"));
        }
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn zero_stop_timeout_is_rejected() {
    init_tracing();

    let file = write_config(
        r#"
[supervisor]
stop_timeout = "0s"
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(FleetError::ConfigError(_))
    ));
}

#[test]
fn entry_names_must_be_plain_file_names() {
    init_tracing();

    let file = write_config(
        r#"
[discovery]
entry_file = "../escape.py"
"#,
    );

    match load_and_validate(file.path()) {
        Err(FleetError::ConfigError(msg)) => assert!(msg.contains("entry_file")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn dotted_extension_is_rejected() {
    init_tracing();

    let file = write_config(
        r#"
[discovery]
script_extension = ".py"
"#,
    );

    match load_and_validate(file.path()) {
        Err(FleetError::ConfigError(msg)) => assert!(msg.contains("script_extension")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn unknown_keys_and_modes_are_toml_errors() {
    init_tracing();

    let unknown_key = write_config(
        r#"
[supervisor]
restart_dealy = "5s"
"#,
    );
    assert!(matches!(
        load_and_validate(unknown_key.path()),
        Err(FleetError::TomlError(_))
    ));

    let unknown_mode = write_config(
        r#"
[supervisor]
restart = "sometimes"
"#,
    );
    assert!(matches!(
        load_and_validate(unknown_mode.path()),
        Err(FleetError::TomlError(_))
    ));
}

#[test]
fn explicit_missing_config_is_an_error() {
    init_tracing();

    let missing = PathBuf::from("/definitely/not/here/Fleetrun.toml");
    assert!(matches!(
        load_or_default(Some(missing.as_path())),
        Err(FleetError::IoError(_))
    ));
}

#[test]
fn cli_flags_override_config_values() {
    init_tracing();

    let mut cfg = ConfigFile::default();
    let args = CliArgs::parse_from([
        "fleetrun",
        "workers",
        "--restart",
        "--restart-delay",
        "2s",
        "--stop-timeout",
        "750ms",
    ]);

    apply_cli_overrides(&mut cfg, &args).unwrap();

    assert_eq!(args.root, PathBuf::from("workers"));
    assert_eq!(cfg.supervisor.restart, RestartMode::AnyExit);
    assert_eq!(cfg.supervisor.restart_delay, Duration::from_secs(2));
    assert_eq!(cfg.supervisor.stop_timeout, Duration::from_millis(750));
}

#[test]
fn explicit_restart_mode_beats_restart_flag() {
    init_tracing();

    let args = CliArgs::parse_from(["fleetrun", "--restart", "--restart-mode", "non-zero"]);
    assert_eq!(args.root, PathBuf::from("agents"));
    assert_eq!(args.requested_restart_mode(), Some(RestartMode::NonZero));

    let args = CliArgs::parse_from(["fleetrun"]);
    assert_eq!(args.requested_restart_mode(), None);
}

#[test]
fn zero_stop_timeout_flag_is_rejected() {
    init_tracing();

    let mut cfg = ConfigFile::default();
    let args = CliArgs::parse_from(["fleetrun", "--stop-timeout", "0ms"]);

    assert!(matches!(
        apply_cli_overrides(&mut cfg, &args),
        Err(FleetError::ConfigError(_))
    ));
}

#[test]
fn oversized_durations_are_errors_not_panics() {
    init_tracing();

    assert!(parse_duration("400000000000000000m")
        .unwrap_err()
        .contains("too large"));
    assert!(parse_duration("18446744073709551615h").is_err());
    assert_eq!(
        parse_duration("18446744073709551615s").unwrap(),
        Duration::from_secs(u64::MAX)
    );

    let file = write_config(
        r#"
[supervisor]
restart_delay = "400000000000000000m"
"#,
    );
    match load_and_validate(file.path()) {
        Err(FleetError::ConfigError(msg)) => assert!(msg.contains("restart_delay")),
        other => panic!("expected ConfigError, got {other:?}"),
    }

    let parsed = CliArgs::try_parse_from(["fleetrun", "--restart-delay", "400000000000000000m"]);
    assert!(parsed.is_err());
}
