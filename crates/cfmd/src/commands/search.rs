//! `cfmd search`, `cfmd recent`, `cfmd viewed` and `cfmd whoami`.

use cfmd_confluence::types::SearchResult;
use cfmd_confluence::{HttpTransport, Workspace, text_search_cql};
use clap::Args;

use super::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the search command.
#[derive(Args)]
pub(crate) struct SearchArgs {
    /// Text to search for.
    #[arg(required_unless_present = "cql", conflicts_with = "cql")]
    text: Option<String>,

    /// Raw CQL query.
    #[arg(long)]
    cql: Option<String>,

    /// Maximum number of results.
    #[arg(long, default_value_t = 25)]
    limit: usize,
}

impl SearchArgs {
    pub(crate) fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let cql = match (self.cql, self.text) {
            (Some(cql), _) => cql,
            (None, Some(text)) => text_search_cql(&text),
            (None, None) => {
                return Err(CliError::Validation(
                    "either TEXT or --cql is required".to_owned(),
                ));
            }
        };
        let workspace = global.workspace()?;
        let results = workspace.search(&cql, self.limit)?;
        print_results(&workspace, &results);
        Ok(())
    }
}

/// Arguments for the recent and viewed commands.
#[derive(Args)]
pub(crate) struct RecentArgs {
    /// Maximum number of results.
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

impl RecentArgs {
    pub(crate) fn execute_recent(self, global: &GlobalArgs) -> Result<(), CliError> {
        let workspace = global.workspace()?;
        let results = workspace.recent(self.limit)?;
        print_results(&workspace, &results);
        Ok(())
    }

    pub(crate) fn execute_viewed(self, global: &GlobalArgs) -> Result<(), CliError> {
        let workspace = global.workspace()?;
        let results = workspace.recently_viewed(self.limit)?;
        print_results(&workspace, &results);
        Ok(())
    }
}

fn print_results(workspace: &Workspace<HttpTransport>, results: &[SearchResult]) {
    let output = Output::new();
    if results.is_empty() {
        output.warning("No results.");
        return;
    }

    for page in results.iter().filter_map(SearchResult::page) {
        let space = page.space.as_ref().map_or("", |s| s.key.as_str());
        let modified = page
            .version
            .as_ref()
            .and_then(|v| v.when.as_deref())
            .unwrap_or("unknown");
        output.highlight(&page.title);
        output.detail(&format!(
            "  {} | space {space} | modified {modified} | {}",
            page.id,
            workspace.page_url(&page.id)
        ));
    }
}

/// Execute the whoami command.
pub(crate) fn whoami(global: &GlobalArgs) -> Result<(), CliError> {
    let output = Output::new();
    let workspace = global.workspace()?;
    let user = workspace.current_user()?;

    output.success(&format!("Authenticated as {}", user.label()));
    if let Some(username) = &user.username {
        output.info(&format!("Username: {username}"));
    }
    output.info(&format!("Server: {}", workspace.client().base_url()));
    Ok(())
}
