//! `profile list|show|create|test|delete|rename`.

use crate::app::UsageError;
use crate::cli::ProfileCommand;
use anyhow::Context;
use dialoguer::Password;
use mygis_config::{NewProfile, Profile, ProfileKind, ProfileStore};
use std::io::{IsTerminal, Write};
use std::path::Path;

pub async fn run(
    store: &ProfileStore,
    command: ProfileCommand,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match command {
        ProfileCommand::List { json } => {
            let profiles = store.list()?;
            if json {
                writeln!(out, "{}", serde_json::to_string(&profiles)?)?;
            } else if profiles.is_empty() {
                writeln!(out, "(none found)")?;
            } else {
                for profile in &profiles {
                    writeln!(out, "{}", profile.name)?;
                }
            }
        }
        ProfileCommand::Show { name } => {
            let profile = store.show(&name)?;
            write_profile(out, &profile, &store.dir().join(format!("{name}.toml")))?;
        }
        ProfileCommand::Create {
            name,
            url,
            username,
            password,
            api_key,
            no_verify,
        } => {
            let password = match (&api_key, password) {
                (None, None) if username.is_some() => Some(prompt_password()?),
                (_, password) => password,
            };
            let profile = store.create(NewProfile {
                name,
                url,
                username,
                password,
                api_key,
                verify_cert: !no_verify,
            })?;
            writeln!(out, "Created profile '{}' for {}", profile.name, profile.url)?;
        }
        ProfileCommand::Test { name, no_verify } => {
            let verify = no_verify.then_some(false);
            let check = store
                .test(&name, verify)
                .await
                .with_context(|| format!("profile '{name}' failed to sign in"))?;
            writeln!(
                out,
                "OK: profile '{}' works -> user: {} | portal: {}",
                check.name,
                check.user.as_deref().unwrap_or("<anonymous>"),
                check.portal_url
            )?;
        }
        ProfileCommand::Delete { name } => {
            store.delete(&name)?;
            writeln!(out, "Deleted profile '{name}'")?;
        }
        ProfileCommand::Rename { name, to } => {
            let profile = store.rename(&name, &to)?;
            writeln!(out, "Renamed profile '{name}' to '{}'", profile.name)?;
        }
    }
    Ok(())
}

fn write_profile(out: &mut dyn Write, profile: &Profile, path: &Path) -> anyhow::Result<()> {
    let auth = match profile.kind {
        ProfileKind::Password => "password",
        ProfileKind::ApiKey => "api key",
    };
    writeln!(out, "Profile: {}", profile.name)?;
    writeln!(out, "  Portal:   {}", profile.url)?;
    writeln!(out, "  User:     {}", profile.username.as_deref().unwrap_or("<none>"))?;
    writeln!(out, "  Auth:     {auth}")?;
    writeln!(out, "  Verify:   {}", profile.verify_cert)?;
    writeln!(out, "  Location: {}", path.display())?;
    Ok(())
}

fn prompt_password() -> anyhow::Result<String> {
    if !std::io::stdin().is_terminal() {
        let message = "--password is required when not running interactively";
        return Err(UsageError(message.to_string()).into());
    }
    Password::new()
        .with_prompt("Password")
        .interact()
        .context("reading password")
}
