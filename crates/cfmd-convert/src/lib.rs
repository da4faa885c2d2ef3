//! Markdown and Confluence storage format conversion.
//!
//! [`to_html`] renders Markdown to storage-format XHTML with `pulldown-cmark`.
//! [`to_markdown`] parses storage format with `quick-xml` and writes
//! Markdown back. Both directions are lossy for a known set of constructs:
//!
//! - Local image references have no upload path and pass through as
//!   broken links.
//! - Task list checkboxes degrade to plain list items.
//! - Definition lists, footnotes and math are not recognized.
//! - Strikethrough is not rendered to storage format.
//!
//! Script and style content never reaches Markdown output.
//!
//! # Example
//!
//! ```
//! use cfmd_convert::{to_html, to_markdown};
//!
//! let html = to_html("# Title\n\n- a\n- b");
//! assert_eq!(html, "<h1>Title</h1><ul><li>a</li><li>b</li></ul>");
//! assert_eq!(to_markdown(&html).unwrap(), "# Title\n\n- a\n- b");
//! ```

mod entities;
mod error;
mod macros;
mod markdown;
mod parser;
mod serializer;
mod state;
mod storage;
mod tree;

pub use error::ConvertError;
pub use macros::{
    MACRO_BLOCK_END, MACRO_BLOCK_START, MacroMap, embed_macro_block, extract_macro_block,
    restore_macros, to_markdown_preserving_macros,
};

use storage::StorageRenderer;

/// Representation of page content supplied by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentFormat {
    /// Markdown, converted before upload.
    #[default]
    Markdown,
    /// Storage-format XHTML, uploaded as is.
    Html,
}

impl ContentFormat {
    /// Convert content in this format to storage format.
    #[must_use]
    pub fn to_storage(self, content: &str) -> String {
        match self {
            Self::Markdown => to_html(content),
            Self::Html => content.to_owned(),
        }
    }
}

/// Convert Markdown to storage-format XHTML.
#[must_use]
pub fn to_html(markdown: &str) -> String {
    StorageRenderer::render_markdown(markdown)
}

/// Convert storage-format XHTML to Markdown.
///
/// # Errors
///
/// Returns [`ConvertError`] if the markup is broken beyond the HTML
/// leniencies the parser accepts.
pub fn to_markdown(html: &str) -> Result<String, ConvertError> {
    let tree = parser::parse_fragment(html)?;
    Ok(markdown::render_markdown(&tree))
}
