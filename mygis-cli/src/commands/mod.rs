//! Command handlers.

pub mod collab;
pub mod config;
pub mod profile;
pub mod replicas;

use crate::app::App;
use crate::cli::{
    CollabCommand, Command, ConfigCommand, LogCommand, PairConnectionArgs, ReplicasCommand,
};
use mygis_portal::RestPortal;
use std::io::Write;

/// Runs one command, writing its report to `out`.
pub async fn execute(app: &App, command: Command, out: &mut dyn Write) -> anyhow::Result<()> {
    match command {
        Command::Config(ConfigCommand::Show { pretty }) => config::show(&app.config, pretty, out),
        Command::Log(LogCommand::Test) => {
            config::log_test(app.log);
            Ok(())
        }
        Command::Collab(command) => {
            let connections = match &command {
                CollabCommand::Items(args) => &args.connections,
                CollabCommand::Groups(args) => &args.connections,
                CollabCommand::Records(args) => &args.connections,
            };
            let (host, guest) = connect_pair(app, connections)?;
            match command {
                CollabCommand::Items(args) => collab::items(&host, &guest, &args, out).await,
                CollabCommand::Groups(args) => collab::groups(&host, &guest, &args, out).await,
                CollabCommand::Records(args) => collab::records(&host, &guest, &args, out).await,
            }
        }
        Command::Replicas(command) => match command {
            ReplicasCommand::List(args) => {
                let portal = app.connect(None, &(&args.connection).into())?;
                replicas::list(&portal, &app.config, &args, out).await
            }
            ReplicasCommand::SyncEnabled(args) => {
                let portal = app.connect(None, &(&args.connection).into())?;
                replicas::sync_enabled(&portal, &app.config, &args, out).await
            }
        },
        Command::Profile(command) => {
            let store = app.profiles()?;
            profile::run(&store, command, out).await
        }
    }
}

fn connect_pair(
    app: &App,
    connections: &PairConnectionArgs,
) -> anyhow::Result<(RestPortal, RestPortal)> {
    let host = app.connect(Some("host"), &connections.host())?;
    let guest = app.connect(Some("guest"), &connections.guest())?;
    Ok((host, guest))
}
