//! Per-invocation state: effective config and logging.

use crate::cli::GlobalArgs;
use anyhow::Context;
use mygis_config::logging::{self, LogContext};
use mygis_config::{
    load_config_with_outcome, Config, ConnectionArgs, ConnectionResolver, LoadOptions,
    LogOverrides, LogSettings, ProfileStore,
};
use mygis_portal::RestPortal;
use thiserror::Error;
use tracing::{debug, warn};

/// A command line that parsed but cannot be acted on.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct UsageError(pub String);

pub struct App {
    pub config: Config,
    pub env_override: bool,
    pub log: &'static LogContext,
}

impl App {
    /// Loads config and installs logging from the global flags.
    pub fn start(global: &GlobalArgs) -> Self {
        let options = LoadOptions {
            paths: global.config.clone().map(|p| vec![p]),
            env_override: !global.no_env_override,
            ..Default::default()
        };
        let (config, outcome) = load_config_with_outcome(&options);

        let overrides = LogOverrides {
            level: global.log_level.clone(),
            format: global.log_format,
            file: global.log_file.clone(),
        };
        let log = logging::init(LogSettings::resolve(&overrides, &config));
        outcome.log();

        if let Some(path) = &global.config {
            if !path.is_file() {
                warn!(path = %path.display(), "Config file not found; using defaults and environment");
            }
        }
        debug!(keys = config.len(), source = ?config.source(), "Configuration loaded");

        Self {
            config,
            env_override: options.env_override,
            log,
        }
    }

    /// An app around an existing config, for tests and embedding.
    pub fn with_config(config: Config, env_override: bool) -> Self {
        Self {
            config,
            env_override,
            log: logging::init(LogSettings::default()),
        }
    }

    fn resolver<'a>(&'a self, profiles: Option<&'a ProfileStore>) -> ConnectionResolver<'a> {
        if self.env_override {
            ConnectionResolver::new(&self.config, profiles)
        } else {
            ConnectionResolver::without_env(&self.config, profiles)
        }
    }

    /// Opens the REST portal for `prefix` (`host`, `guest`, or none).
    pub fn connect(&self, prefix: Option<&str>, args: &ConnectionArgs) -> anyhow::Result<RestPortal> {
        let label = prefix.unwrap_or("portal");
        let spec = self
            .resolver(None)
            .resolve(prefix, args)
            .with_context(|| format!("resolving {label} connection"))?;
        debug!(connection = label, source = ?spec.source, portal = %spec.config.portal_url, "Connecting");
        RestPortal::new(spec.config).with_context(|| format!("creating {label} client"))
    }

    pub fn profiles(&self) -> anyhow::Result<ProfileStore> {
        ProfileStore::open_default().context("opening profile store")
    }
}
