//! Connection resolution.
//!
//! Each setting is looked up, first hit wins, in:
//!
//! 1. the explicit [`ConnectionArgs`] (command-line flags)
//! 2. `MYGIS_{PREFIX}_{KEY}` environment variables (`MYGIS_{KEY}` without
//!    a prefix)
//! 3. config keys `{prefix}_{key}` (`{key}` without a prefix)
//!
//! The first usable method then wins: a saved profile, a portal URL with
//! username and password, an API key, or anonymous access.

use crate::config::Config;
use crate::error::ConfigResult;
use crate::profiles::ProfileStore;
use mygis_portal::{Credentials, RestPortalConfig, DEFAULT_PORTAL_URL};
use tracing::{debug, warn};

/// Connection settings given explicitly.
#[derive(Debug, Clone, Default)]
pub struct ConnectionArgs {
    pub profile: Option<String>,
    pub portal: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
}

/// How a connection was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSource {
    Profile(String),
    UserPassword,
    ApiKey,
    Anonymous,
}

/// A resolved connection.
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    pub source: ConnectionSource,
    pub config: RestPortalConfig,
}

/// Resolves connections against the loaded config and saved profiles.
pub struct ConnectionResolver<'a> {
    config: &'a Config,
    profiles: Option<&'a ProfileStore>,
    env: Box<dyn Fn(&str) -> Option<String> + 'a>,
}

impl<'a> ConnectionResolver<'a> {
    /// Reads process environment variables.
    pub fn new(config: &'a Config, profiles: Option<&'a ProfileStore>) -> Self {
        Self::with_env(config, profiles, |name| std::env::var(name).ok())
    }

    /// Ignores the environment (for `--no-env-override`).
    pub fn without_env(config: &'a Config, profiles: Option<&'a ProfileStore>) -> Self {
        Self::with_env(config, profiles, |_| None)
    }

    pub fn with_env(
        config: &'a Config,
        profiles: Option<&'a ProfileStore>,
        env: impl Fn(&str) -> Option<String> + 'a,
    ) -> Self {
        Self {
            config,
            profiles,
            env: Box::new(env),
        }
    }

    /// Resolves the connection for `prefix` (`host`, `guest`) or the
    /// unprefixed one.
    pub fn resolve(
        &self,
        prefix: Option<&str>,
        args: &ConnectionArgs,
    ) -> ConfigResult<ConnectionSpec> {
        let label = prefix.unwrap_or("default");

        let profile = args
            .profile
            .clone()
            .or_else(|| self.lookup(prefix, &["profile", "arcgis_profile", "agol_profile"]));
        if let Some(name) = profile {
            let default_store;
            let store = match self.profiles {
                Some(store) => store,
                None => {
                    default_store = ProfileStore::open_default()?;
                    &default_store
                }
            };
            let config = store.portal_config(&name)?;
            debug!(
                connection = label,
                profile = %name,
                portal = %config.portal_url,
                "Using saved profile"
            );
            return Ok(ConnectionSpec {
                source: ConnectionSource::Profile(name),
                config,
            });
        }

        let portal_url = args
            .portal
            .clone()
            .or_else(|| self.lookup(prefix, &["portal_url", "portal"]));
        let username = args.username.clone().or_else(|| self.lookup(prefix, &["username"]));
        let password = args.password.clone().or_else(|| self.lookup(prefix, &["password"]));
        let api_key = args.api_key.clone().or_else(|| self.lookup(prefix, &["api_key"]));
        let verify_cert = self
            .lookup(prefix, &["verify_cert"])
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);

        let mut config = RestPortalConfig {
            portal_url: portal_url.clone().unwrap_or_else(|| DEFAULT_PORTAL_URL.to_string()),
            verify_cert,
            ..RestPortalConfig::default()
        };

        if let (Some(_), Some(username), Some(password)) = (&portal_url, &username, &password) {
            config.credentials = Credentials::UserPassword {
                username: username.clone(),
                password: password.clone(),
            };
            debug!(
                connection = label,
                portal = %config.portal_url,
                username = %username,
                "Using username and password"
            );
            return Ok(ConnectionSpec {
                source: ConnectionSource::UserPassword,
                config,
            });
        }

        if let Some(key) = api_key {
            config.credentials = Credentials::ApiKey { key };
            debug!(connection = label, portal = %config.portal_url, "Using API key");
            return Ok(ConnectionSpec {
                source: ConnectionSource::ApiKey,
                config,
            });
        }

        if username.is_some() {
            warn!(
                connection = label,
                "Username given without a portal URL and password; connecting anonymously"
            );
        }
        debug!(connection = label, portal = %config.portal_url, "Using anonymous access");
        Ok(ConnectionSpec {
            source: ConnectionSource::Anonymous,
            config,
        })
    }

    /// First non-empty value for any of `keys`, trying the environment
    /// before the config for each key.
    fn lookup(&self, prefix: Option<&str>, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| {
            let config_key = match prefix {
                Some(p) => format!("{p}_{key}"),
                None => (*key).to_string(),
            };
            let env_name = format!("MYGIS_{}", config_key.to_uppercase());
            (self.env)(&env_name)
                .or_else(|| self.config.get_str(&config_key))
                .filter(|v| !v.trim().is_empty())
        })
    }
}
