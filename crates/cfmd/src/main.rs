//! cfmd CLI - edit Confluence pages as Markdown.
//!
//! Provides commands for:
//! - `spaces` / `pages`: list everything the profile can see
//! - `read`, `create`, `append`, `edit`: work with single pages
//! - `search`, `recent`, `viewed`: find pages with CQL
//! - `whoami`: verify credentials
//! - `config`: manage connection profiles

mod commands;
mod error;
mod output;

use std::error::Error as _;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{
    AppendArgs, ConfigCommand, CreateArgs, EditArgs, GlobalArgs, PagesArgs, ReadArgs, RecentArgs,
    SearchArgs,
};
use error::CliError;
use output::Output;

/// cfmd - Edit Confluence pages as Markdown.
#[derive(Parser)]
#[command(name = "cfmd", version, about)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all spaces.
    Spaces,
    /// List all pages, optionally within one space.
    Pages(PagesArgs),
    /// Download a page as Markdown.
    Read(ReadArgs),
    /// Create a page.
    Create(CreateArgs),
    /// Add content to the start or end of a page.
    Append(AppendArgs),
    /// Edit a page in your editor.
    Edit(EditArgs),
    /// Search pages by text or CQL.
    Search(SearchArgs),
    /// Pages you modified recently.
    Recent(RecentArgs),
    /// Pages you viewed recently.
    Viewed(RecentArgs),
    /// Verify credentials.
    Whoami,
    /// Manage connection profiles.
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.global.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let global = &cli.global;
    let result = match cli.command {
        Commands::Spaces => commands::list_spaces(global),
        Commands::Pages(args) => args.execute(global),
        Commands::Read(args) => args.execute(global),
        Commands::Create(args) => args.execute(global),
        Commands::Append(args) => args.execute(global),
        Commands::Edit(args) => args.execute(global),
        Commands::Search(args) => args.execute(global),
        Commands::Recent(args) => args.execute_recent(global),
        Commands::Viewed(args) => args.execute_viewed(global),
        Commands::Whoami => commands::whoami(global),
        Commands::Config(cmd) => cmd.execute(global),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&output, &err);
            ExitCode::FAILURE
        }
    }
}

/// Print an error and the causes its message does not already include.
fn report(output: &Output, err: &CliError) {
    let mut message = format!("Error: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str("\n  caused by: ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    output.error(&message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["cfmd", "spaces", "--profile", "work", "--page-size", "50"])
            .unwrap();
        assert_eq!(cli.global.profile, "work");
        assert_eq!(cli.global.page_size, Some(50));
        assert!(matches!(cli.command, Commands::Spaces));
    }

    #[test]
    fn test_create_requires_content_source() {
        let result =
            Cli::try_parse_from(["cfmd", "create", "--space", "DOCS", "--title", "Intro"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_content_and_file_conflict() {
        let result = Cli::try_parse_from([
            "cfmd", "append", "123", "--content", "x", "--file", "notes.md",
        ]);
        assert!(result.is_err());
    }
}
