use mygis_config::logging::{self, normalize_level};
use mygis_config::{Config, LogFormat, LogOverrides, LogSettings};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::PathBuf;

fn config(value: Value) -> Config {
    match value {
        Value::Object(map) => Config::from_map(map),
        _ => panic!("not an object"),
    }
}

fn env_with(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
    move |name: &str| {
        pairs
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| (*v).to_string())
    }
}

// ── Resolution ──────────────────────────────────────────────────

#[test]
fn defaults_when_nothing_set() {
    let settings =
        LogSettings::resolve_with_env(&LogOverrides::default(), &Config::default(), |_| None);
    assert_eq!(settings, LogSettings::default());
}

#[test]
fn flag_beats_config_beats_env() {
    let cfg = config(json!({"log_level": "WARNING", "log_format": "json"}));
    let env = env_with(&[("MYGIS_LOG_LEVEL", "ERROR"), ("MYGIS_LOG_FILE", "/tmp/mygis.log")]);

    let from_config = LogSettings::resolve_with_env(&LogOverrides::default(), &cfg, &env);
    assert_eq!(from_config.level, "warn");
    assert_eq!(from_config.format, LogFormat::Json);
    assert_eq!(from_config.file, Some(PathBuf::from("/tmp/mygis.log")));

    let flags = LogOverrides {
        level: Some("debug".to_string()),
        format: Some(LogFormat::Plain),
        file: None,
    };
    let from_flags = LogSettings::resolve_with_env(&flags, &cfg, &env);
    assert_eq!(from_flags.level, "debug");
    assert_eq!(from_flags.format, LogFormat::Plain);
}

#[test]
fn env_used_when_config_silent() {
    let env = env_with(&[("MYGIS_LOG_LEVEL", "10"), ("MYGIS_LOG_FORMAT", "JSON")]);
    let settings = LogSettings::resolve_with_env(&LogOverrides::default(), &Config::default(), env);
    assert_eq!(settings.level, "debug");
    assert_eq!(settings.format, LogFormat::Json);
}

#[test]
fn unknown_level_falls_back_to_info() {
    let cfg = config(json!({"log_level": "chatty"}));
    let settings = LogSettings::resolve_with_env(&LogOverrides::default(), &cfg, |_| None);
    assert_eq!(settings.level, "info");
    assert_eq!(normalize_level("chatty"), None);
}

// ── init ────────────────────────────────────────────────────────

#[test]
fn init_runs_once() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("events.log");
    let first = logging::init(LogSettings {
        level: "debug".to_string(),
        format: LogFormat::Json,
        file: Some(file),
    });
    let second = logging::init(LogSettings::default());

    assert!(std::ptr::eq(first, second));
    assert_eq!(second.settings.level, "debug");
    assert!(second.verbose());
    assert!(logging::current().is_some());
}
