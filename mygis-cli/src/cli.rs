//! Command-line definitions.

use clap::{Args, Parser, Subcommand};
use mygis_compare::records::{DEFAULT_CHUNK_SIZE, DEFAULT_WHERE};
use mygis_config::{ConnectionArgs, LogFormat};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mygis")]
#[command(version, about = "Compare collaborated feature services and manage portal connections")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags accepted by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Log level (DEBUG, INFO, WARNING, ERROR)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format (plain or json)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Config file (toml/yaml/json/ini/.env) instead of the default search
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Do not let MYGIS_* environment variables override config values
    #[arg(long, global = true)]
    pub no_env_override: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Configuration helpers
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Logging helpers
    #[command(subcommand)]
    Log(LogCommand),

    /// Compare collaborated items between a host and a guest portal
    #[command(subcommand)]
    Collab(CollabCommand),

    /// Sync replicas of feature services
    #[command(subcommand)]
    Replicas(ReplicasCommand),

    /// Saved portal profiles
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as JSON
    Show {
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum LogCommand {
    /// Emit one event at each level
    Test,
}

#[derive(Subcommand, Debug)]
pub enum CollabCommand {
    /// Compare layer counts and last-edit dates of two items
    Items(ItemsArgs),
    /// Pair the items of two collaboration groups and compare each pair
    Groups(GroupsArgs),
    /// Compare the attribute records of two items
    Records(RecordsArgs),
}

/// Host and guest connection flags.
#[derive(Args, Debug, Clone, Default)]
pub struct PairConnectionArgs {
    /// Host saved profile name
    #[arg(long)]
    pub host_profile: Option<String>,
    /// Host portal URL
    #[arg(long)]
    pub host_portal: Option<String>,
    #[arg(long)]
    pub host_username: Option<String>,
    #[arg(long)]
    pub host_password: Option<String>,
    #[arg(long)]
    pub host_api_key: Option<String>,

    /// Guest saved profile name
    #[arg(long)]
    pub guest_profile: Option<String>,
    /// Guest portal URL
    #[arg(long)]
    pub guest_portal: Option<String>,
    #[arg(long)]
    pub guest_username: Option<String>,
    #[arg(long)]
    pub guest_password: Option<String>,
    #[arg(long)]
    pub guest_api_key: Option<String>,
}

impl PairConnectionArgs {
    pub fn host(&self) -> ConnectionArgs {
        ConnectionArgs {
            profile: self.host_profile.clone(),
            portal: self.host_portal.clone(),
            username: self.host_username.clone(),
            password: self.host_password.clone(),
            api_key: self.host_api_key.clone(),
        }
    }

    pub fn guest(&self) -> ConnectionArgs {
        ConnectionArgs {
            profile: self.guest_profile.clone(),
            portal: self.guest_portal.clone(),
            username: self.guest_username.clone(),
            password: self.guest_password.clone(),
            api_key: self.guest_api_key.clone(),
        }
    }
}

/// Connection flags for single-portal commands.
#[derive(Args, Debug, Clone, Default)]
pub struct PortalConnectionArgs {
    /// Saved profile name
    #[arg(long)]
    pub profile: Option<String>,
    /// Portal URL
    #[arg(long)]
    pub portal: Option<String>,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long)]
    pub api_key: Option<String>,
}

impl From<&PortalConnectionArgs> for ConnectionArgs {
    fn from(args: &PortalConnectionArgs) -> Self {
        ConnectionArgs {
            profile: args.profile.clone(),
            portal: args.portal.clone(),
            username: args.username.clone(),
            password: args.password.clone(),
            api_key: args.api_key.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ItemsArgs {
    /// Host feature service item id
    #[arg(long)]
    pub host_item: String,
    /// Guest feature service item id
    #[arg(long)]
    pub guest_item: String,
    #[command(flatten)]
    pub connections: PairConnectionArgs,
    /// Print the full result as JSON
    #[arg(long)]
    pub json: bool,
    /// Suppress progress logging
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Args, Debug, Clone)]
pub struct GroupsArgs {
    /// Collaboration group id on the host portal
    #[arg(long)]
    pub host_group: String,
    /// Collaboration group id on the guest portal
    #[arg(long)]
    pub guest_group: String,
    /// Pair items of any type, not only feature services
    #[arg(long)]
    pub no_strict_type: bool,
    #[command(flatten)]
    pub connections: PairConnectionArgs,
    #[arg(long)]
    pub json: bool,
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RecordsArgs {
    #[arg(long)]
    pub host_item: String,
    #[arg(long)]
    pub guest_item: String,
    /// Where clause applied on both sides
    #[arg(long = "where", default_value = DEFAULT_WHERE)]
    pub where_clause: String,
    /// Fields to leave out (space or comma separated)
    #[arg(long, num_args = 1..)]
    pub ignore_fields: Vec<String>,
    /// Only compare these layers or tables (names or ids)
    #[arg(long, num_args = 1..)]
    pub layer_keys: Vec<String>,
    /// Rows per query page; 0 fetches everything in one request
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u64,
    #[command(flatten)]
    pub connections: PairConnectionArgs,
    #[arg(long)]
    pub json: bool,
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum ReplicasCommand {
    /// List the replicas of one feature service
    List(ReplicasListArgs),
    /// List replicas of every sync-enabled feature service found by a search
    SyncEnabled(SyncEnabledArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ReplicasListArgs {
    /// FeatureServer URL, layer URL or item id
    pub service: Option<String>,
    /// Alternative to the positional argument
    #[arg(long = "service")]
    pub service_opt: Option<String>,
    #[command(flatten)]
    pub connection: PortalConnectionArgs,
    #[arg(long)]
    pub json: bool,
    /// Print only the replica count
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SyncEnabledArgs {
    /// Search query (defaults to all feature services)
    #[arg(long)]
    pub query: Option<String>,
    /// Owner filter: a username, `me` or `*`
    #[arg(long)]
    pub owner: Option<String>,
    /// Maximum number of services to inspect
    #[arg(long, default_value_t = 1000)]
    pub max_items: usize,
    #[command(flatten)]
    pub connection: PortalConnectionArgs,
    #[arg(long)]
    pub json: bool,
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// List saved profiles
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show a profile
    Show {
        #[arg(long)]
        name: String,
    },
    /// Create a profile (password prompted if omitted)
    Create {
        #[arg(long)]
        name: String,
        /// Portal URL (defaults to ArcGIS Online for API-key profiles)
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
        /// API key; username and password are ignored when given
        #[arg(long)]
        api_key: Option<String>,
        /// Disable TLS certificate verification
        #[arg(long)]
        no_verify: bool,
    },
    /// Sign in with a profile and report the user and portal
    Test {
        #[arg(long)]
        name: String,
        #[arg(long)]
        no_verify: bool,
    },
    /// Delete a profile and its stored secret
    Delete {
        #[arg(long)]
        name: String,
    },
    /// Rename a profile
    Rename {
        #[arg(long)]
        name: String,
        #[arg(long)]
        to: String,
    },
}

/// Splits list arguments on commas and whitespace, dropping empty parts.
pub fn split_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(|c: char| c == ',' || c.is_whitespace()))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn lists_split_on_commas_and_spaces() {
        let raw = vec!["GlobalID,OBJECTID".to_string(), " EditDate ".to_string(), ",".to_string()];
        assert_eq!(split_list(&raw), vec!["GlobalID", "OBJECTID", "EditDate"]);
    }
}
