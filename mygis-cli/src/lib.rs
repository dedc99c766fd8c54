//! The `mygis` command-line tool.
//!
//! [`run`] loads configuration, installs logging and drives one command on
//! a current-thread runtime. Command handlers in [`commands`] take portals
//! and an output sink so they can run against in-memory portals.

pub mod app;
pub mod cli;
pub mod commands;

pub use app::{App, UsageError};
pub use cli::Cli;

/// Runs a parsed command line to completion.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let app = App::start(&cli.global);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let mut stdout = std::io::stdout().lock();
    runtime.block_on(commands::execute(&app, cli.command, &mut stdout))
}

/// Process exit code for a failed command: 2 for usage errors, 1 otherwise.
pub fn exit_code(error: &anyhow::Error) -> u8 {
    if error.downcast_ref::<UsageError>().is_some() {
        2
    } else {
        1
    }
}
