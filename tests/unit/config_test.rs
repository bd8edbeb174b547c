//! Tests for configuration validation

use prometheus_process_pool::config::SchedulerConfig;
use prometheus_process_pool::core::StdRouting;
use std::time::Duration;

fn valid() -> SchedulerConfig {
    SchedulerConfig {
        max_concurrent_processes: 4,
        process_timeout_ms: Some(1_000),
        schedule_timeout_ms: Some(60_000),
        poll_interval_ms: 1,
        std_out_routing: StdRouting::ToParent,
        std_err_routing: StdRouting::None,
    }
}

#[test]
fn test_scheduler_config_validation() {
    assert!(valid().validate().is_ok());
}

#[test]
fn test_default_config_is_valid() {
    let config = SchedulerConfig::default();
    assert!(config.validate().is_ok());
    assert!(config.max_concurrent_processes >= 1);
    assert_eq!(config.poll_interval(), Duration::from_millis(1));
    assert_eq!(config.process_timeout(), None);
    assert_eq!(config.schedule_timeout(), None);
}

#[test]
fn test_scheduler_config_invalid_slots() {
    let invalid = SchedulerConfig {
        max_concurrent_processes: 0,
        ..valid()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_timeouts() {
    let invalid = SchedulerConfig {
        process_timeout_ms: Some(0),
        ..valid()
    };
    assert!(invalid.validate().is_err());

    let invalid = SchedulerConfig {
        schedule_timeout_ms: Some(0),
        ..valid()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_zero_poll_interval_is_allowed() {
    let config = SchedulerConfig {
        poll_interval_ms: 0,
        ..valid()
    };
    assert!(config.validate().is_ok());
    assert!(config.poll_interval().is_zero());
}

#[test]
fn test_scheduler_config_from_json() {
    let json = r#"{
        "max_concurrent_processes": 8,
        "process_timeout_ms": 5000,
        "std_err_routing": "none"
    }"#;

    let config = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(config.max_concurrent_processes, 8);
    assert_eq!(config.process_timeout(), Some(Duration::from_secs(5)));
    assert_eq!(config.schedule_timeout_ms, None);
    assert_eq!(config.std_out_routing, StdRouting::ToParent);
    assert_eq!(config.std_err_routing, StdRouting::None);
}

#[test]
fn test_scheduler_config_from_json_rejects_invalid() {
    assert!(SchedulerConfig::from_json_str(r#"{"max_concurrent_processes": 0}"#).is_err());
    assert!(SchedulerConfig::from_json_str("not json").is_err());
}

#[test]
fn test_scheduler_config_json_roundtrip() {
    let config = valid();
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(SchedulerConfig::from_json_str(&json).unwrap(), config);
}
