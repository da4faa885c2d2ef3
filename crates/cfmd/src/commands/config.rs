//! `cfmd config` subcommands.

use cfmd_config::{AuthMethod, Config, ConfigError, ProfileConfig};
use clap::{Args, Subcommand};

use super::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

/// Profile management commands.
#[derive(Subcommand)]
pub(crate) enum ConfigCommand {
    /// Add or replace a profile (requires --base-url).
    Set(SetArgs),
    /// List profiles.
    List,
    /// Delete a profile.
    Delete {
        /// Profile name.
        name: String,
    },
}

/// Arguments for config set.
#[derive(Args)]
pub(crate) struct SetArgs {
    /// Profile name.
    name: String,

    /// Login name.
    #[arg(long)]
    username: Option<String>,

    /// Password for basic auth. Supports ${VAR} references.
    #[arg(long, conflicts_with = "token")]
    password: Option<String>,

    /// Personal access token. Supports ${VAR} references.
    #[arg(long)]
    token: Option<String>,

    /// Authentication scheme: basic, bearer or username-token.
    #[arg(long)]
    auth: Option<AuthMethod>,
}

impl ConfigCommand {
    pub(crate) fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let mut config = match Config::load(global.config.as_deref(), None) {
            Err(ConfigError::NotFound(path)) if matches!(self, Self::Set(_)) => Config::empty_at(path),
            result => result?,
        };

        match self {
            Self::Set(args) => {
                let Some(base_url) = global.base_url.clone() else {
                    return Err(CliError::Validation(
                        "--base-url is required for config set".to_owned(),
                    ));
                };
                let profile = ProfileConfig {
                    base_url,
                    username: args.username,
                    password: args.password,
                    token: args.token,
                    auth: args.auth,
                };
                config.set_profile(&args.name, profile);

                match config.require_profile(&args.name) {
                    Ok(_) => {}
                    Err(ConfigError::EnvVar { field, message }) => {
                        output.warning(&format!("{field}: {message} (expanded when used)"));
                    }
                    Err(e) => return Err(e.into()),
                }

                let path = config.save()?;
                output.success(&format!("Profile '{}' saved to {}", args.name, path.display()));
            }
            Self::List => {
                if config.profiles.is_empty() {
                    output.warning("No profiles configured. Run `cfmd config set <NAME> --base-url <URL> ...`.");
                }
                for (name, profile) in &config.profiles {
                    let marker = if *name == global.profile { "*" } else { " " };
                    let auth = profile.auth.map_or("auto", auth_label);
                    output.data(&format!("{marker} {name:<16} {} ({auth})", profile.base_url));
                }
            }
            Self::Delete { name } => {
                if !config.remove_profile(&name) {
                    return Err(ConfigError::ProfileNotFound(name).into());
                }
                config.save()?;
                output.success(&format!("Profile '{name}' deleted"));
            }
        }
        Ok(())
    }
}

fn auth_label(method: AuthMethod) -> &'static str {
    match method {
        AuthMethod::Basic => "basic",
        AuthMethod::Bearer => "bearer",
        AuthMethod::UsernameToken => "username-token",
    }
}
