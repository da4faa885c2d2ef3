//! `cfmd spaces` and `cfmd pages`.

use cfmd_confluence::{ConfluenceError, Listing, ListingKind, SyncError};
use clap::Args;

use super::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the pages command.
#[derive(Args)]
pub(crate) struct PagesArgs {
    /// Only list pages in this space.
    #[arg(long)]
    space: Option<String>,
}

impl PagesArgs {
    pub(crate) fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        list(global, ListingKind::Pages, self.space.as_deref())
    }
}

/// Execute the spaces command.
pub(crate) fn list_spaces(global: &GlobalArgs) -> Result<(), CliError> {
    list(global, ListingKind::Spaces, None)
}

fn list(global: &GlobalArgs, kind: ListingKind, space: Option<&str>) -> Result<(), CliError> {
    let output = Output::new();
    let workspace = global.workspace()?;

    let listing = match workspace.list_all(kind, space) {
        Ok(listing) => listing,
        Err(SyncError {
            source: ConfluenceError::EmptyResult { .. },
            ..
        }) => {
            output.warning("No results.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    match &listing {
        Listing::Spaces(spaces) => {
            for space in spaces {
                output.data(&format!("{:<16} {}", space.key, space.name));
            }
            output.info(&format!("\n{} spaces", spaces.len()));
        }
        Listing::Pages(pages) => {
            for page in pages {
                let space = page.space.as_ref().map_or("", |s| s.key.as_str());
                output.data(&format!("{:<12} {:<16} {}", page.id, space, page.title));
            }
            output.info(&format!("\n{} pages", pages.len()));
        }
    }
    Ok(())
}
