//! CLI command implementations.

mod config;
mod listing;
mod page;
mod search;

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use cfmd_config::{CliSettings, Config, DEFAULT_PROFILE};
use cfmd_confluence::{ConfluenceClient, Workspace};
use clap::Args;

use crate::error::CliError;

pub(crate) use config::ConfigCommand;
pub(crate) use listing::{PagesArgs, list_spaces};
pub(crate) use page::{AppendArgs, CreateArgs, EditArgs, ReadArgs};
pub(crate) use search::{RecentArgs, SearchArgs, whoami};

/// Options shared by every command.
#[derive(Args)]
pub(crate) struct GlobalArgs {
    /// Connection profile to use.
    #[arg(long, global = true, env = "CFMD_PROFILE", default_value = DEFAULT_PROFILE)]
    pub profile: String,

    /// Path to configuration file (default: platform config dir or $CFMD_CONFIG).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server base URL (overrides the profile).
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Items requested per listing page (overrides config).
    #[arg(long, global = true)]
    pub page_size: Option<u32>,

    /// Per-request timeout in seconds (overrides config).
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// Load configuration with these overrides applied.
    pub(crate) fn load_config(&self, editor: Option<String>) -> Result<Config, CliError> {
        let cli_settings = CliSettings {
            base_url: self.base_url.clone(),
            page_size: self.page_size,
            timeout_secs: self.timeout,
            editor,
        };
        Ok(Config::load(self.config.as_deref(), Some(&cli_settings))?)
    }

    /// Connect to the selected profile.
    pub(crate) fn workspace(&self) -> Result<Workspace, CliError> {
        let config = self.load_config(None)?;
        self.workspace_for(&config)
    }

    pub(crate) fn workspace_for(&self, config: &Config) -> Result<Workspace, CliError> {
        let profile = config.require_profile(&self.profile)?;
        let page_size = usize::try_from(config.settings.page_size)
            .map_err(|_| CliError::Validation("page size out of range".to_owned()))?;
        let client = ConfluenceClient::from_profile(
            &profile,
            Duration::from_secs(config.settings.timeout_secs),
        );
        Ok(Workspace::new(client, page_size))
    }
}

/// Page content given inline or read from a file.
#[derive(Args)]
#[group(required = true, multiple = false)]
pub(crate) struct ContentSource {
    /// Content to upload.
    #[arg(long)]
    content: Option<String>,

    /// Read content from a file ("-" for stdin).
    #[arg(long)]
    file: Option<PathBuf>,
}

impl ContentSource {
    pub(crate) fn read(&self) -> Result<String, CliError> {
        match (&self.content, &self.file) {
            (Some(content), _) => Ok(content.clone()),
            (None, Some(path)) if path.as_os_str() == "-" => {
                let mut content = String::new();
                std::io::stdin().read_to_string(&mut content)?;
                Ok(content)
            }
            (None, Some(path)) => Ok(std::fs::read_to_string(path)?),
            (None, None) => Err(CliError::Validation(
                "either --content or --file is required".to_owned(),
            )),
        }
    }
}
