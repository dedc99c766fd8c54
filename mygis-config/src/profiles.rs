//! Saved portal profiles.
//!
//! A profile is a small TOML file (`<dir>/<name>.toml`) holding the portal
//! URL, username and TLS setting. The password or API key is kept in a
//! [`SecretStore`], by default the OS keyring under service
//! [`KEYRING_SERVICE`] with the profile name as the account.

use crate::error::{ConfigError, ConfigResult};
use keyring::Entry;
use mygis_portal::{Credentials, Portal, RestPortal, RestPortalConfig, DEFAULT_PORTAL_URL};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Overrides the profile directory.
pub const PROFILE_DIR_ENV: &str = "MYGIS_PROFILE_DIR";

/// Keyring service name for profile secrets.
pub const KEYRING_SERVICE: &str = "mygis-profile";

const PROFILE_EXTENSION: &str = "toml";

/// Storage for profile secrets, keyed by profile name.
pub trait SecretStore: Send + Sync {
    fn get(&self, name: &str) -> ConfigResult<Option<String>>;
    fn set(&self, name: &str, secret: &str) -> ConfigResult<()>;
    /// Deleting a missing secret is not an error.
    fn delete(&self, name: &str) -> ConfigResult<()>;
}

/// Secrets in the OS keyring (Keychain, Secret Service, Credential Manager).
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringSecretStore;

impl KeyringSecretStore {
    fn entry(name: &str) -> ConfigResult<Entry> {
        Entry::new(KEYRING_SERVICE, name)
            .map_err(|e| ConfigError::Secret(format!("failed to access keyring: {e}")))
    }
}

impl SecretStore for KeyringSecretStore {
    fn get(&self, name: &str) -> ConfigResult<Option<String>> {
        match Self::entry(name)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(ConfigError::Secret(format!("failed to read secret: {e}"))),
        }
    }

    fn set(&self, name: &str, secret: &str) -> ConfigResult<()> {
        Self::entry(name)?
            .set_password(secret)
            .map_err(|e| ConfigError::Secret(format!("failed to store secret: {e}")))
    }

    fn delete(&self, name: &str) -> ConfigResult<()> {
        match Self::entry(name)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(ConfigError::Secret(format!("failed to delete secret: {e}"))),
        }
    }
}

/// Secrets held in memory, for tests and one-off runs.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ConfigResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.secrets
            .lock()
            .map_err(|_| ConfigError::Secret("secret store lock poisoned".to_string()))
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, name: &str) -> ConfigResult<Option<String>> {
        Ok(self.lock()?.get(name).cloned())
    }

    fn set(&self, name: &str, secret: &str) -> ConfigResult<()> {
        self.lock()?.insert(name.to_string(), secret.to_string());
        Ok(())
    }

    fn delete(&self, name: &str) -> ConfigResult<()> {
        self.lock()?.remove(name);
        Ok(())
    }
}

/// What the stored secret is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    #[default]
    Password,
    ApiKey,
}

/// A saved profile (without its secret).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default = "default_verify_cert")]
    pub verify_cert: bool,
    #[serde(default)]
    pub kind: ProfileKind,
}

fn default_verify_cert() -> bool {
    true
}

/// Input to [`ProfileStore::create`].
#[derive(Debug, Clone, Default)]
pub struct NewProfile {
    pub name: String,
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// When set, username and password are ignored.
    pub api_key: Option<String>,
    pub verify_cert: bool,
}

/// Result of [`ProfileStore::test`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileCheck {
    pub name: String,
    pub portal_url: String,
    pub portal_name: Option<String>,
    pub user: Option<String>,
}

/// Profile files plus their secrets.
pub struct ProfileStore {
    dir: PathBuf,
    secrets: Box<dyn SecretStore>,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>, secrets: Box<dyn SecretStore>) -> Self {
        Self {
            dir: dir.into(),
            secrets,
        }
    }

    /// Profiles under `$MYGIS_PROFILE_DIR` or `<config dir>/mygis/profiles`,
    /// secrets in the OS keyring.
    pub fn open_default() -> ConfigResult<Self> {
        Ok(Self::new(default_dir()?, Box::new(KeyringSecretStore)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{PROFILE_EXTENSION}"))
    }

    pub fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.path_for(name).is_file()
    }

    /// Saves a new profile. An API key makes an API-key profile (URL
    /// defaults to ArcGIS Online); otherwise URL, username and password are
    /// all required.
    pub fn create(&self, new: NewProfile) -> ConfigResult<Profile> {
        validate_name(&new.name)?;
        if self.path_for(&new.name).exists() {
            return Err(ConfigError::ProfileExists(new.name));
        }

        let incomplete = |reason: &str| ConfigError::IncompleteProfile {
            name: new.name.clone(),
            reason: reason.to_string(),
        };

        let (profile, secret) = match new.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => (
                Profile {
                    name: new.name.clone(),
                    url: non_empty(new.url.as_deref()).unwrap_or(DEFAULT_PORTAL_URL).to_string(),
                    username: None,
                    verify_cert: new.verify_cert,
                    kind: ProfileKind::ApiKey,
                },
                key.to_string(),
            ),
            None => {
                let url = non_empty(new.url.as_deref())
                    .ok_or_else(|| incomplete("a portal URL is required"))?;
                let username = non_empty(new.username.as_deref())
                    .ok_or_else(|| incomplete("a username is required"))?;
                let password = non_empty(new.password.as_deref())
                    .ok_or_else(|| incomplete("a password is required"))?;
                (
                    Profile {
                        name: new.name.clone(),
                        url: url.to_string(),
                        username: Some(username.to_string()),
                        verify_cert: new.verify_cert,
                        kind: ProfileKind::Password,
                    },
                    password.to_string(),
                )
            }
        };

        self.write(&profile)?;
        if let Err(e) = self.secrets.set(&profile.name, &secret) {
            let _ = std::fs::remove_file(self.path_for(&profile.name));
            return Err(e);
        }
        info!(profile = %profile.name, url = %profile.url, "Profile created");
        Ok(profile)
    }

    /// All readable profiles, sorted by name. Unparseable files are
    /// skipped with a warning.
    pub fn list(&self) -> ConfigResult<Vec<Profile>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut profiles = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PROFILE_EXTENSION) {
                continue;
            }
            match read_profile(&path) {
                Ok(profile) => profiles.push(profile),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable profile"),
            }
        }
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(profiles)
    }

    pub fn show(&self, name: &str) -> ConfigResult<Profile> {
        validate_name(name)?;
        let path = self.path_for(name);
        if !path.is_file() {
            return Err(ConfigError::ProfileNotFound(name.to_string()));
        }
        let mut profile = read_profile(&path)?;
        // The file name is authoritative.
        profile.name = name.to_string();
        Ok(profile)
    }

    /// Removes the profile file and its secret.
    pub fn delete(&self, name: &str) -> ConfigResult<()> {
        validate_name(name)?;
        let path = self.path_for(name);
        if !path.is_file() {
            return Err(ConfigError::ProfileNotFound(name.to_string()));
        }
        std::fs::remove_file(&path)?;
        self.secrets.delete(name)?;
        info!(profile = name, "Profile deleted");
        Ok(())
    }

    /// Renames a profile, moving its secret.
    pub fn rename(&self, from: &str, to: &str) -> ConfigResult<Profile> {
        validate_name(to)?;
        let mut profile = self.show(from)?;
        if self.path_for(to).exists() {
            return Err(ConfigError::ProfileExists(to.to_string()));
        }

        profile.name = to.to_string();
        if let Some(secret) = self.secrets.get(from)? {
            self.secrets.set(to, &secret)?;
        }
        self.write(&profile)?;
        std::fs::remove_file(self.path_for(from))?;
        self.secrets.delete(from)?;
        info!(from, to, "Profile renamed");
        Ok(profile)
    }

    /// Credentials for a profile, read from the secret store.
    pub fn credentials(&self, profile: &Profile) -> ConfigResult<Credentials> {
        let secret = self.secrets.get(&profile.name)?.ok_or_else(|| {
            ConfigError::IncompleteProfile {
                name: profile.name.clone(),
                reason: "no secret stored".to_string(),
            }
        })?;
        match profile.kind {
            ProfileKind::ApiKey => Ok(Credentials::ApiKey { key: secret }),
            ProfileKind::Password => {
                let username = profile.username.clone().ok_or_else(|| {
                    ConfigError::IncompleteProfile {
                        name: profile.name.clone(),
                        reason: "no username".to_string(),
                    }
                })?;
                Ok(Credentials::UserPassword {
                    username,
                    password: secret,
                })
            }
        }
    }

    /// Connection settings for a saved profile.
    pub fn portal_config(&self, name: &str) -> ConfigResult<RestPortalConfig> {
        let profile = self.show(name)?;
        let credentials = self.credentials(&profile)?;
        Ok(RestPortalConfig {
            portal_url: profile.url,
            credentials,
            verify_cert: profile.verify_cert,
            ..RestPortalConfig::default()
        })
    }

    /// Signs in with a profile and reports who the portal says we are.
    pub async fn test(&self, name: &str, verify_cert: Option<bool>) -> ConfigResult<ProfileCheck> {
        let mut config = self.portal_config(name)?;
        if let Some(verify) = verify_cert {
            config.verify_cert = verify;
        }
        let portal_url = config.portal_url.clone();
        debug!(profile = name, portal = %portal_url, "Testing profile");

        let portal = RestPortal::new(config)?;
        let me = portal.portal_self().await?;
        Ok(ProfileCheck {
            name: name.to_string(),
            portal_url,
            portal_name: me.portal_name,
            user: me.username,
        })
    }

    fn write(&self, profile: &Profile) -> ConfigResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let text = toml::to_string_pretty(profile)?;
        std::fs::write(self.path_for(&profile.name), text)?;
        Ok(())
    }
}

fn read_profile(path: &Path) -> ConfigResult<Profile> {
    let text = std::fs::read_to_string(path)?;
    toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn default_dir() -> ConfigResult<PathBuf> {
    if let Ok(dir) = std::env::var(PROFILE_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join("mygis").join("profiles"))
}

/// Accepts non-empty names made of ASCII letters, digits, `_`, `.` and `-`.
pub fn validate_name(name: &str) -> ConfigResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidProfileName(name.to_string()))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
