//! Loading pool configuration from JSON
#![cfg(feature = "serde")]

use pretty_assertions::assert_eq;
use tidepool_memory::{Pool, PoolConfig, PoolStats};

#[test]
fn partial_config_fills_defaults() {
    let config: PoolConfig =
        serde_json::from_str(r#"{ "chunk_size": 8192, "small_threshold": 512 }"#).unwrap();

    let expected = PoolConfig {
        chunk_size: 8192,
        small_threshold: 512,
        ..PoolConfig::default()
    };
    assert_eq!(config, expected);
    assert!(Pool::with_config(config).is_ok());
}

#[test]
fn invalid_values_fail_validation_not_parsing() {
    let config: PoolConfig = serde_json::from_str(r#"{ "chunk_size": 0 }"#).unwrap();
    assert!(Pool::with_config(config).is_err());
}

#[test]
fn patterns_and_checks_load() {
    let json = r#"{
        "alloc_pattern": 170,
        "dealloc_pattern": null,
        "validate_headers": true
    }"#;
    let config: PoolConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.alloc_pattern, Some(0xAA));
    assert_eq!(config.dealloc_pattern, None);
    assert!(config.validate_headers);
}

#[test]
fn stats_serialize_as_flat_object() {
    let pool = Pool::create(1024, 64).unwrap();
    pool.allocate(16).unwrap();

    let value = serde_json::to_value(pool.stats()).unwrap();
    assert_eq!(value["chunk_count"], 1);
    assert_eq!(value["live_small"], 1);

    let back: PoolStats = serde_json::from_value(value).unwrap();
    assert_eq!(back, pool.stats());
}
