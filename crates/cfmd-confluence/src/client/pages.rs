//! Page operations for Confluence API.

use serde_json::json;
use tracing::info;

use super::ConfluenceClient;
use crate::error::ConfluenceError;
use crate::transport::{Request, Transport};
use crate::types::Page;

/// Expansions needed to edit a page.
pub(crate) const PAGE_EXPAND: &[&str] = &["body.storage", "space", "version", "ancestors"];

impl<T: Transport> ConfluenceClient<T> {
    /// Get page by ID with optional field expansion.
    pub(crate) fn get_page(&self, page_id: &str, expand: &[&str]) -> Result<Page, ConfluenceError> {
        let mut request = Request::get(Self::api_path(&format!("/content/{page_id}")));
        if !expand.is_empty() {
            request = request.query("expand", expand.join(","));
        }

        info!("Getting page {}", page_id);

        self.send_json(&request).map_err(|e| match e {
            ConfluenceError::NotFound { .. } => ConfluenceError::NotFound {
                resource: format!("page {page_id}"),
            },
            other => other,
        })
    }

    /// Create a page in a space, optionally under a parent.
    pub(crate) fn create_page(
        &self,
        space_key: &str,
        title: &str,
        body: &str,
        parent_id: Option<&str>,
    ) -> Result<Page, ConfluenceError> {
        let mut payload = json!({
            "type": "page",
            "title": title,
            "space": {"key": space_key},
            "body": {
                "storage": {
                    "value": body,
                    "representation": "storage"
                }
            }
        });

        if let Some(parent) = parent_id {
            payload["ancestors"] = json!([{"id": parent}]);
        }

        info!("Creating page '{}' in space {}", title, space_key);

        let page: Page = self.send_json(&Request::post(Self::api_path("/content"), payload))?;
        info!("Created page {} at version {}", page.id, page.version.number);
        Ok(page)
    }

    /// Update existing page, sending the next version number.
    pub(crate) fn update_page(
        &self,
        page_id: &str,
        title: &str,
        body: &str,
        version: u32,
    ) -> Result<Page, ConfluenceError> {
        let next = version
            .checked_add(1)
            .ok_or_else(|| ConfluenceError::VersionExhausted {
                page_id: page_id.to_owned(),
                version,
            })?;
        let payload = json!({
            "type": "page",
            "title": title,
            "body": {
                "storage": {
                    "value": body,
                    "representation": "storage"
                }
            },
            "version": {"number": next}
        });

        info!(
            "Updating page {} from version {} to {}",
            page_id, version, next
        );

        let request = Request::put(Self::api_path(&format!("/content/{page_id}")), payload);
        let page: Page = self.send_json(&request)?;
        info!(
            "Updated page {} to version {}",
            page_id, page.version.number
        );
        Ok(page)
    }
}
