//! Feature-service URL helpers.

use crate::error::{PortalError, PortalResult};
use regex_lite::Regex;
use std::sync::OnceLock;

fn feature_server_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(.*?/FeatureServer)(?:/\d+)?/?$").expect("valid FeatureServer pattern")
    })
}

/// Returns the FeatureServer root URL, stripping a trailing layer index
/// (`…/FeatureServer/0` → `…/FeatureServer`).
pub fn feature_server_root(url: &str) -> PortalResult<String> {
    let trimmed = url.trim();
    feature_server_pattern()
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            PortalError::InvalidUrl(format!(
                "{trimmed}: URL must point to a FeatureServer (service or layer)"
            ))
        })
}

/// Joins a base URL and a relative path with exactly one slash.
pub fn join(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
