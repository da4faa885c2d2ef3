//! Optimistic-concurrency page store.
//!
//! The server is the only authority on page versions. Writes send the
//! whole body with `expected + 1`; a rejection is reported as
//! [`ConfluenceError::VersionConflict`] and never retried.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::client::ConfluenceClient;
use crate::client::PAGE_EXPAND;
use crate::error::ConfluenceError;
use crate::transport::Transport;
use crate::types::Page;

/// Current version as reported in a 409 message.
static CURRENT_VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)current version is:?\s*(\d+)").expect("invalid version regex")
});

/// Reads, writes and creates pages with version checks.
pub struct VersionedPageStore<'a, T> {
    client: &'a ConfluenceClient<T>,
}

impl<'a, T: Transport> VersionedPageStore<'a, T> {
    pub fn new(client: &'a ConfluenceClient<T>) -> Self {
        Self { client }
    }

    /// Fetch a page with body, space, version and ancestors.
    ///
    /// # Errors
    ///
    /// [`ConfluenceError::NotFound`] for a missing or hidden page,
    /// [`ConfluenceError::AuthFailed`] if credentials are rejected.
    pub fn read(&self, page_id: &str) -> Result<Page, ConfluenceError> {
        self.client.get_page(page_id, PAGE_EXPAND)
    }

    /// Replace a page's body, based on `expected_version`.
    ///
    /// `expected_version` must come from the latest [`read`](Self::read) of
    /// this page in the same operation.
    ///
    /// # Errors
    ///
    /// [`ConfluenceError::VersionConflict`] if the server's version is no
    /// longer `expected_version`. The page is left untouched.
    pub fn write(
        &self,
        page_id: &str,
        new_body: &str,
        expected_version: u32,
        title: &str,
    ) -> Result<Page, ConfluenceError> {
        match self
            .client
            .update_page(page_id, title, new_body, expected_version)
        {
            Err(ConfluenceError::HttpResponse { status: 409, body }) => {
                let actual = reported_version(&body).or_else(|| self.current_version(page_id));
                warn!(
                    "Version conflict on page {}: expected {}, server has {:?}",
                    page_id, expected_version, actual
                );
                Err(ConfluenceError::VersionConflict {
                    page_id: page_id.to_owned(),
                    expected: expected_version,
                    actual,
                })
            }
            result => result,
        }
    }

    /// Create a page at version 1.
    ///
    /// # Errors
    ///
    /// Returns the mapped server error if the page cannot be created.
    pub fn create(
        &self,
        space_key: &str,
        title: &str,
        body: &str,
        parent_id: Option<&str>,
    ) -> Result<Page, ConfluenceError> {
        self.client.create_page(space_key, title, body, parent_id)
    }

    fn current_version(&self, page_id: &str) -> Option<u32> {
        self.client
            .get_page(page_id, &["version"])
            .ok()
            .map(|page| page.version.number)
    }
}

fn reported_version(body: &str) -> Option<u32> {
    CURRENT_VERSION_PATTERN
        .captures(body)
        .and_then(|c| c[1].parse().ok())
}
