//! mygis command-line tool
//!
//! Compares collaborated feature services between a host and a guest
//! portal, lists sync replicas and manages saved portal profiles.
//!
//! Usage:
//!   mygis collab items --host-item <ID> --guest-item <ID>
//!   mygis replicas list <SERVICE-URL-OR-ITEM-ID>
//!   mygis profile create --name work --url https://gis.example.com/portal --username me

use clap::Parser;
use mygis_cli::{exit_code, run, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}
