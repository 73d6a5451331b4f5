//! # Configuration Tests
//!
//! JSON loading, defaults for absent fields, and error reporting.

use std::io::Write;

use pretty_assertions::assert_eq;
use x86sim_core::common::ConfigError;
use x86sim_core::config::Config;

#[test]
fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.cpu.stack_top, 0x7fff_0000);
    assert_eq!(config.cpu.history_capacity, 100);
    assert_eq!(config.executor.symbol_placeholder, 0x0800_0000);
    assert_eq!(config.executor.rip_stride, 8);
    assert_eq!(config.syscalls.max_string_len, 1000);
    assert_eq!(config.syscalls.heap_base, 0x0800_1000);
    assert!(config.syscalls.seed_sample_data);
    assert_eq!(config.controller.trace_capacity, 1000);
    assert_eq!(config.controller.batch_size, 100);
}

#[test]
fn test_empty_object_is_default() {
    let config = Config::from_json("{}").unwrap();
    assert_eq!(config.cpu.stack_top, Config::default().cpu.stack_top);
    assert_eq!(config.controller.batch_size, 100);
}

#[test]
fn test_partial_sections() {
    let json = r#"{
        "executor": { "rip_stride": 16 },
        "syscalls": { "seed_sample_data": false, "max_string_len": 32 }
    }"#;
    let config = Config::from_json(json).unwrap();

    assert_eq!(config.executor.rip_stride, 16);
    assert_eq!(config.executor.symbol_placeholder, 0x0800_0000);
    assert!(!config.syscalls.seed_sample_data);
    assert_eq!(config.syscalls.max_string_len, 32);
    assert_eq!(config.syscalls.heap_base, 0x0800_1000);
    assert_eq!(config.cpu.history_capacity, 100);
}

#[test]
fn test_invalid_json() {
    let err = Config::from_json("{ \"cpu\": ").unwrap_err();
    assert!(matches!(err, ConfigError::Json(_)));
    assert!(err.to_string().starts_with("invalid config JSON"));

    let wrong_type = Config::from_json(r#"{ "cpu": { "stack_top": "high" } }"#);
    assert!(matches!(wrong_type, Err(ConfigError::Json(_))));
}

#[test]
fn test_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "controller": {{ "trace_capacity": 5 }} }}"#).unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.controller.trace_capacity, 5);
    assert_eq!(config.controller.batch_size, 100);
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");

    match Config::from_file(&path) {
        Err(ConfigError::Io { path: reported, .. }) => {
            assert!(reported.ends_with("absent.json"));
        }
        other => panic!("expected an I/O error, got {other:?}"),
    }
}
