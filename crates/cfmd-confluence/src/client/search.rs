//! CQL search operations for Confluence API.

use tracing::{info, warn};

use super::ConfluenceClient;
use crate::error::ConfluenceError;
use crate::transport::{Request, Transport};
use crate::types::{ListingResponse, SearchResult};

/// Pages recently edited by the current user, most specific first.
pub const RECENT_CQL_VARIANTS: &[&str] = &[
    "type=page AND lastModifiedBy=currentUser() order by lastmodified desc",
    "type=page AND contributor=currentUser() order by lastmodified desc",
    "type=page AND creator=currentUser() order by lastmodified desc",
    "type=page order by lastmodified desc",
];

/// Pages recently viewed by the current user, most specific first.
pub const VIEWED_CQL_VARIANTS: &[&str] = &[
    "type=page AND lastViewed is not EMPTY order by lastViewed desc",
    "type=page AND lastviewed is not EMPTY order by lastviewed desc",
    "type=page order by lastmodified desc",
];

/// Server messages meaning a CQL variant is unsupported.
const UNSUPPORTED_CQL_MESSAGES: &[&str] = &["No field exists", "Could not parse cql"];

/// Free-text page search.
pub fn text_search_cql(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("type=page AND text~\"{escaped}\" order by lastmodified desc")
}

/// Restrict a query to pages unless it already is.
fn ensure_page_cql(cql: &str) -> String {
    if cql.to_lowercase().contains("type=page") {
        cql.to_owned()
    } else {
        format!("type=page AND ({cql})")
    }
}

impl<T: Transport> ConfluenceClient<T> {
    /// Run a CQL query and return up to `limit` page hits.
    pub(crate) fn search(&self, cql: &str, limit: usize) -> Result<Vec<SearchResult>, ConfluenceError> {
        let cql = ensure_page_cql(cql);
        info!("Searching pages: {}", cql);

        let request = Request::get(Self::api_path("/search"))
            .query("cql", &cql)
            .query("limit", limit)
            .query("expand", "content.space,content.version");
        let listing: ListingResponse<SearchResult> = self.send_json(&request)?;

        let results: Vec<SearchResult> = listing
            .results
            .into_iter()
            .filter(|r| r.page().is_some())
            .collect();
        info!("Found {} pages", results.len());
        Ok(results)
    }

    /// Try CQL variants in order until the server accepts one.
    ///
    /// A variant rejected with 400 and an unsupported-field message falls
    /// through to the next; any other failure is returned immediately.
    pub(crate) fn search_first_supported(
        &self,
        variants: &[&str],
        limit: usize,
    ) -> Result<Vec<SearchResult>, ConfluenceError> {
        let mut last_error = None;
        for cql in variants {
            match self.search(cql, limit) {
                Ok(results) => return Ok(results),
                Err(e)
                    if UNSUPPORTED_CQL_MESSAGES
                        .iter()
                        .any(|message| e.is_http_with(400, message)) =>
                {
                    warn!("Server rejected CQL variant, trying next: {}", cql);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| ConfluenceError::EmptyResult {
            endpoint: Self::api_path("/search"),
        }))
    }
}
