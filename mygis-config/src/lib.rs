//! Configuration, logging and connection setup for mygis.
//!
//! - [`config`]: layered settings from a config file, defaults and `MYGIS_*`
//!   environment variables
//! - [`logging`]: one-time `tracing` subscriber installation
//! - [`connection`]: turns flags, environment and config into a
//!   [`RestPortalConfig`](mygis_portal::RestPortalConfig)
//! - [`profiles`]: saved portal profiles with secrets in the OS keyring

pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod profiles;

pub use config::{
    load_config, load_config_with_outcome, Config, FileOutcome, LoadOptions, DEFAULT_ENV_PREFIX,
    DEFAULT_SEARCH_ORDER,
};
pub use connection::{ConnectionArgs, ConnectionResolver, ConnectionSource, ConnectionSpec};
pub use error::{ConfigError, ConfigResult};
pub use logging::{LogContext, LogFormat, LogOverrides, LogSettings};
pub use profiles::{
    KeyringSecretStore, MemorySecretStore, NewProfile, Profile, ProfileCheck, ProfileKind,
    ProfileStore, SecretStore,
};
