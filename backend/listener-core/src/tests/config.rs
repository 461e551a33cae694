// Unit tests for ListenerConfig load/save/validate

use crate::config::{CONFIG_FILE_NAME, ListenerConfig};
use crate::error::ConfigError;
use crate::pump::MAX_CONSECUTIVE_FAILURES_DEFAULT;

use std::fs;
use std::time::Duration;

use log::LevelFilter;
use tempfile::TempDir;

#[test]
fn given_missing_file_when_loaded_then_returns_defaults() {
    // GIVEN: An empty config directory
    let dir = TempDir::new().unwrap();

    // WHEN
    let config = ListenerConfig::load(dir.path()).unwrap();

    // THEN
    assert_eq!(config, ListenerConfig::default());
    assert_eq!(config.server.name, "VIMSERVER");
    assert_eq!(
        config.pump.max_consecutive_failures,
        MAX_CONSECUTIVE_FAILURES_DEFAULT
    );
    assert_eq!(config.client.connect_timeout, Duration::from_secs(2));
}

/// **VALUE**: Verifies a saved config loads back identically, including the
/// humantime duration.
///
/// **BUG THIS CATCHES**: Would catch the duration being written as a struct
/// (`secs`/`nanos`) that the loader cannot parse.
#[test]
fn given_saved_config_when_loaded_then_equal() {
    // GIVEN
    let dir = TempDir::new().unwrap();
    let mut config = ListenerConfig::default();
    config.server.name = "GVIM".to_string();
    config.client.connect_timeout = Duration::from_millis(1500);
    config.logging.level = "debug".to_string();

    // WHEN
    config.save(dir.path()).unwrap();
    let loaded = ListenerConfig::load(dir.path()).unwrap();

    // THEN
    assert_eq!(loaded, config);
    let written = fs::read_to_string(dir.path().join(CONFIG_FILE_NAME)).unwrap();
    assert!(written.contains("connect_timeout = \"1s 500ms\""));
}

#[test]
fn given_partial_file_when_loaded_then_missing_fields_defaulted() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "[server]\nname = \"GVIM2\"\n\n[client]\nconnect_timeout = \"250ms\"\n",
    )
    .unwrap();

    let config = ListenerConfig::load(dir.path()).unwrap();

    assert_eq!(config.server.name, "GVIM2");
    assert_eq!(config.client.connect_timeout, Duration::from_millis(250));
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.identity().unwrap().as_str(), "GVIM2");
}

#[test]
fn given_corrupt_file_when_loaded_then_parse_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(CONFIG_FILE_NAME), "[server\nname = ").unwrap();

    let result = ListenerConfig::load(dir.path());

    assert!(matches!(result, Err(ConfigError::Parse { .. })));
}

#[test]
fn given_config_path_is_directory_when_loaded_then_read_error_names_path() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join(CONFIG_FILE_NAME)).unwrap();

    let result = ListenerConfig::load(dir.path());

    match result {
        Err(ConfigError::Read { path, .. }) => {
            assert_eq!(path, dir.path().join(CONFIG_FILE_NAME));
        }
        other => panic!("expected Read error, got {other:?}"),
    }
}

#[test]
fn given_unparseable_duration_when_loaded_then_parse_error() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "[client]\nconnect_timeout = \"soon\"\n",
    )
    .unwrap();

    assert!(matches!(
        ListenerConfig::load(dir.path()),
        Err(ConfigError::Parse { .. })
    ));
}

/// **VALUE**: Verifies each range check rejects its out-of-range value.
///
/// **WHY THIS MATTERS**: A zero failure limit would end the pump on its first
/// transient error; an invalid name would only fail later, on the pump thread.
#[test]
fn given_invalid_values_when_validated_then_validation_error() {
    let cases: [fn(&mut ListenerConfig); 7] = [
        |c| c.version = 0,
        |c| c.version = 99,
        |c| c.server.name = "../etc".to_string(),
        |c| c.pump.max_consecutive_failures = 0,
        |c| c.client.connect_timeout = Duration::ZERO,
        |c| c.client.connect_timeout = Duration::from_secs(3600),
        |c| c.logging.level = "loud".to_string(),
    ];

    for (index, mutate) in cases.iter().enumerate() {
        let mut config = ListenerConfig::default();
        mutate(&mut config);
        assert!(
            matches!(config.validate(), Err(ConfigError::Validation { .. })),
            "case {index} should fail validation"
        );
    }
}

#[test]
fn given_invalid_config_when_saved_then_nothing_written() {
    let dir = TempDir::new().unwrap();
    let mut config = ListenerConfig::default();
    config.pump.max_consecutive_failures = 0;

    assert!(config.save(dir.path()).is_err());
    assert!(!dir.path().join(CONFIG_FILE_NAME).exists());
}

#[test]
fn given_level_string_when_log_level_read_then_parsed() {
    let mut config = ListenerConfig::default();
    config.logging.level = "TRACE".to_string();

    assert_eq!(config.log_level(), LevelFilter::Trace);
    assert_eq!(config.pump_settings().max_consecutive_failures, 64);
}
