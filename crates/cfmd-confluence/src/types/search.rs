//! CQL search result types.

use serde::{Deserialize, Serialize};

use super::page::PageSummary;

/// One `/rest/api/search` hit.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchResult {
    /// Matched content, absent for non-content hits (users, spaces).
    #[serde(default)]
    pub content: Option<PageSummary>,
    /// Display title.
    #[serde(default)]
    pub title: Option<String>,
    /// Relative web URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Last modification timestamp.
    #[serde(rename = "lastModified", default)]
    pub last_modified: Option<String>,
}

impl SearchResult {
    /// Matched page, if this hit is one.
    pub fn page(&self) -> Option<&PageSummary> {
        self.content
            .as_ref()
            .filter(|c| c.content_type.as_deref().is_none_or(|t| t == "page"))
    }
}
