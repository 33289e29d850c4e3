//! Config Validation Tests
//!
//! Loading `report5.toml` files from disk and the collected range checks,
//! exercised independently of the HTTP layer.

use report5::config::{ConfigError, ReportConfig, StoreBackend};

fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report5.toml");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

fn validation_errors(config: &ReportConfig) -> Vec<String> {
    match config.validate() {
        Err(ConfigError::Validation(errors)) => errors,
        other => panic!("expected validation errors, got {other:?}"),
    }
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn full_deployment_file_loads() {
    let (_dir, path) = write_config(
        r#"
        [server]
        addr = "127.0.0.1:9090"

        [store]
        backend = "sled"
        path = "/var/lib/report5"

        [fleet]
        tanks = ["191", "401"]

        [navigation]
        transition_delay_ms = 0

        [deltas]
        gap_days = 7
        max_jump = 800.0

        [fuel]
        full_tank_liters = 1200.0

        [staleness]
        record_max_days = 3

        [[staleness.indicators]]
        name = "ammo"
        max = 60.0

        [[staleness.indicators.terms]]
        field = "חלולים"
        cap = 40.0

        [[staleness.indicators.terms]]
        field = "חצב"
        weight = 0.5
        "#,
    );

    let config = ReportConfig::load_from_file(&path).unwrap();
    assert_eq!(config.server.addr, "127.0.0.1:9090");
    assert_eq!(config.store.backend, StoreBackend::Sled);
    assert_eq!(config.fleet.tanks, vec!["191", "401"]);
    assert_eq!(config.navigation.transition_delay_ms, 0);
    assert_eq!(config.deltas.gap_days, 7);
    assert_eq!(config.deltas.max_jump, 800.0);
    // Untouched keys keep their defaults.
    assert_eq!(config.deltas.km_field, "ק\"מ");
    assert_eq!(config.fuel.fuel_field, "סולר");
    assert_eq!(config.fuel.full_tank_liters, 1200.0);
    assert_eq!(config.staleness.issue_max_days, 28);

    // An explicit indicator list replaces the built-in one.
    let indicators = &config.staleness.indicators;
    assert_eq!(indicators.len(), 1);
    assert_eq!(indicators[0].min, 0.0);
    assert_eq!(indicators[0].terms[0].cap, Some(40.0));
    assert_eq!(indicators[0].terms[0].weight, 1.0);
    assert_eq!(indicators[0].terms[1].weight, 0.5);
}

#[test]
fn empty_file_is_all_defaults() {
    let (_dir, path) = write_config("");
    let config = ReportConfig::load_from_file(&path).unwrap();
    assert_eq!(config, ReportConfig::default());
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = ReportConfig::load_from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Io(ref p, _) if p == &path));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn unknown_backend_is_parse_error() {
    let (_dir, path) = write_config("[store]\nbackend = \"postgres\"\n");
    let err = ReportConfig::load_from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(..)), "{err}");
}

#[test]
fn invalid_values_in_file_fail_validation() {
    let (_dir, path) = write_config("[deltas]\ngap_days = 0\n");
    let err = ReportConfig::load_from_file(&path).unwrap_err();
    match err {
        ConfigError::Validation(errors) => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].contains("gap_days"));
        }
        other => panic!("expected validation error, got {other}"),
    }
}

// ============================================================================
// Range validation
// ============================================================================

#[test]
fn fleet_must_not_be_empty() {
    let mut config = ReportConfig::default();
    config.fleet.tanks.clear();
    let errors = validation_errors(&config);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("fleet.tanks"));
}

#[test]
fn blank_tank_ids_are_rejected() {
    let mut config = ReportConfig::default();
    config.fleet.tanks.push("  ".into());
    let errors = validation_errors(&config);
    assert!(errors.iter().any(|e| e.contains("empty id")), "{errors:?}");
}

#[test]
fn non_positive_max_jump_is_rejected() {
    let mut config = ReportConfig::default();
    config.deltas.max_jump = 0.0;
    let errors = validation_errors(&config);
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].contains("max_jump"));
}

#[test]
fn legacy_correction_floor_key_is_ignored() {
    let (_dir, path) = write_config("[deltas]\ncorrection_floor = -20.0\n");
    let config = ReportConfig::load_from_file(&path).unwrap();
    assert_eq!(config.deltas, report5::config::DeltaConfig::default());
}

#[test]
fn same_field_for_km_and_engine_hours_is_rejected() {
    let mut config = ReportConfig::default();
    config.deltas.engine_hours_field = config.deltas.km_field.clone();
    let errors = validation_errors(&config);
    assert!(errors[0].contains("must differ"));
}

#[test]
fn degenerate_indicators_are_rejected() {
    let mut config = ReportConfig::default();
    let mut broken = config.staleness.indicators[0].clone();
    broken.max = broken.min;
    broken.terms.clear();
    config.staleness.indicators.push(broken);

    let errors = validation_errors(&config);
    // Duplicate name, empty range, no terms.
    assert_eq!(errors.len(), 3, "{errors:?}");
}

#[test]
fn memory_backend_ignores_store_path() {
    let mut config = ReportConfig::default();
    config.store.backend = StoreBackend::Memory;
    config.store.path = std::path::PathBuf::new();
    config.validate().unwrap();

    config.store.backend = StoreBackend::Sled;
    let errors = validation_errors(&config);
    assert!(errors[0].contains("store.path"));
}

#[test]
fn validation_message_lists_every_error() {
    let mut config = ReportConfig::default();
    config.fuel.full_tank_liters = 0.0;
    config.consumption.field_prefix.clear();
    let message = config.validate().unwrap_err().to_string();
    assert!(message.contains("fuel.full_tank_liters"));
    assert!(message.contains("consumption.field_prefix"));
}
