//! Single-page commands: `read`, `create`, `append`, `edit`.

use std::path::PathBuf;

use cfmd_confluence::{
    AbandonReason, CommandEditor, ConfluenceError, EditOutcome, Position, SyncError, parse_page_ref,
};
use cfmd_convert::ContentFormat;
use clap::Args;

use super::{ContentSource, GlobalArgs};
use crate::error::CliError;
use crate::output::Output;

fn content_format(html: bool) -> ContentFormat {
    if html {
        ContentFormat::Html
    } else {
        ContentFormat::Markdown
    }
}

/// Arguments for the read command.
#[derive(Args)]
pub(crate) struct ReadArgs {
    /// Page ID or page URL.
    page: String,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl ReadArgs {
    pub(crate) fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let page_id = parse_page_ref(&self.page)?;
        let markdown = global.workspace()?.read_markdown(&page_id)?;

        match &self.output {
            Some(path) => {
                std::fs::write(path, &markdown)?;
                output.success(&format!("Content saved to: {}", path.display()));
            }
            None => output.data(&markdown),
        }
        Ok(())
    }
}

/// Arguments for the create command.
#[derive(Args)]
pub(crate) struct CreateArgs {
    /// Space key.
    #[arg(long)]
    space: String,

    /// Page title.
    #[arg(long)]
    title: String,

    #[command(flatten)]
    source: ContentSource,

    /// Content is storage-format HTML, not Markdown.
    #[arg(long)]
    html: bool,

    /// Parent page ID or URL.
    #[arg(long)]
    parent_id: Option<String>,
}

impl CreateArgs {
    pub(crate) fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let content = self.source.read()?;
        let parent = self.parent_id.as_deref().map(parse_page_ref).transpose()?;
        let workspace = global.workspace()?;

        let page = workspace.create_page(
            &self.space,
            &self.title,
            &content,
            content_format(self.html),
            parent.as_deref(),
        )?;

        output.success("Page created successfully!");
        output.info(&format!("ID: {}", page.id));
        output.info(&format!("Title: {}", page.title));
        output.info(&format!("Version: {}", page.version.number));
        output.info(&format!("URL: {}", workspace.page_url(&page.id)));
        Ok(())
    }
}

/// Arguments for the append command.
#[derive(Args)]
pub(crate) struct AppendArgs {
    /// Page ID or page URL.
    page: String,

    #[command(flatten)]
    source: ContentSource,

    /// Add the content before the existing body.
    #[arg(long)]
    prepend: bool,

    /// Content is storage-format HTML, not Markdown.
    #[arg(long)]
    html: bool,
}

impl AppendArgs {
    pub(crate) fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let page_id = parse_page_ref(&self.page)?;
        let content = self.source.read()?;
        let position = if self.prepend {
            Position::Prepend
        } else {
            Position::Append
        };
        let workspace = global.workspace()?;

        let page = workspace
            .append(&page_id, &content, content_format(self.html), position)
            .inspect_err(|e| conflict_hint(&output, e))?;

        output.success("Page updated successfully!");
        output.info(&format!("Version: {}", page.version.number));
        output.info(&format!("URL: {}", workspace.page_url(&page.id)));
        Ok(())
    }
}

/// Arguments for the edit command.
#[derive(Args)]
pub(crate) struct EditArgs {
    /// Page ID or page URL.
    page: String,

    /// Editor command (overrides config, $VISUAL and $EDITOR).
    #[arg(long)]
    editor: Option<String>,

    /// Upload changes even if the editor exits with an error.
    #[arg(long)]
    ignore_exit_status: bool,
}

impl EditArgs {
    pub(crate) fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let page_id = parse_page_ref(&self.page)?;
        let config = global.load_config(self.editor)?;
        let editor = CommandEditor::resolve(config.settings.editor.as_deref())?;
        let workspace = global.workspace_for(&config)?;

        output.info(&format!("Opening page {page_id} in {}...", editor.program));
        let outcome = workspace
            .edit_interactively(&page_id, &editor, self.ignore_exit_status)
            .inspect_err(|e| conflict_hint(&output, e))?;

        match outcome {
            EditOutcome::Uploaded {
                page,
                previous_version,
            } => {
                output.success("Page updated successfully!");
                output.info(&format!("Title: {}", page.title));
                output.info(&format!(
                    "Version: {previous_version} -> {}",
                    page.version.number
                ));
                output.info(&format!("URL: {}", workspace.page_url(&page.id)));
            }
            EditOutcome::Abandoned(AbandonReason::Unmodified) => {
                output.warning("No changes made. Page not updated.");
            }
            EditOutcome::Abandoned(AbandonReason::EditorFailed(code)) => {
                let status = code.map_or_else(|| "a signal".to_owned(), |c| format!("status {c}"));
                output.warning(&format!(
                    "Editor exited with {status}. Changes discarded (use --ignore-exit-status to upload anyway)."
                ));
            }
        }
        Ok(())
    }
}

fn conflict_hint(output: &Output, error: &SyncError) {
    if matches!(error.source, ConfluenceError::VersionConflict { .. }) {
        output.warning("The page was changed on the server. Run the command again to start from the latest version.");
    }
}
