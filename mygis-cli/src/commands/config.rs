//! `config show` and `log test`.

use mygis_config::{Config, LogContext};
use serde_json::Value;
use std::io::Write;
use tracing::{debug, error, info, warn};

const MASK: &str = "***";

/// Prints the effective configuration as JSON, masking secrets.
pub fn show(config: &Config, pretty: bool, out: &mut dyn Write) -> anyhow::Result<()> {
    let value = redact(config.as_json());
    let text = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    writeln!(out, "{text}")?;
    Ok(())
}

fn is_secret_key(key: &str) -> bool {
    let key = key.to_lowercase();
    key.ends_with("password") || key.ends_with("api_key") || key.ends_with("token")
}

/// Replaces values of password, API key and token keys at any depth.
pub fn redact(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    if is_secret_key(&k) && !v.is_null() {
                        (k, Value::String(MASK.to_string()))
                    } else {
                        (k, redact(v))
                    }
                })
                .collect(),
        ),
        other => other,
    }
}

/// One event per level, tagged `example = true`.
pub fn log_test(context: &LogContext) {
    debug!(example = true, level = %context.settings.level, "debug message");
    info!(example = true, "info message");
    warn!(example = true, "warning message");
    error!(example = true, "error message");
}
