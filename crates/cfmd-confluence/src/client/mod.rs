//! Confluence REST API client.
//!
//! Sync client for Confluence Server/Data Center and Cloud REST APIs,
//! generic over the [`Transport`] that carries requests.

mod pages;
mod search;
mod user;

use std::time::Duration;

use cfmd_config::ResolvedProfile;
use serde::de::DeserializeOwned;

use crate::auth::Auth;
use crate::error::ConfluenceError;
use crate::transport::{HttpTransport, Request, Response, Transport};

pub(crate) use pages::PAGE_EXPAND;
pub use search::{RECENT_CQL_VARIANTS, VIEWED_CQL_VARIANTS, text_search_cql};

/// API path prefix.
pub(crate) const API_PREFIX: &str = "/rest/api";

/// Confluence REST API client.
pub struct ConfluenceClient<T = HttpTransport> {
    transport: T,
    base_url: String,
}

impl ConfluenceClient<HttpTransport> {
    /// Create an HTTP client for a resolved profile.
    #[must_use]
    pub fn from_profile(profile: &ResolvedProfile, timeout: Duration) -> Self {
        let auth = Auth::from(profile.credentials.clone());
        tracing::debug!(profile = %profile.name, scheme = auth.scheme(), "Creating client");
        Self::new(
            HttpTransport::new(&profile.base_url, auth, timeout),
            &profile.base_url,
        )
    }
}

impl<T: Transport> ConfluenceClient<T> {
    /// Create a client over any transport.
    pub fn new(transport: T, base_url: &str) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Server base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Web URL for a page.
    pub fn page_url(&self, page_id: &str) -> String {
        format!("{}/pages/viewpage.action?pageId={page_id}", self.base_url)
    }

    /// Execute a request and map error statuses.
    ///
    /// 401/403 become [`ConfluenceError::AuthFailed`], 404 becomes
    /// [`ConfluenceError::NotFound`], any other status of 400 or above
    /// becomes [`ConfluenceError::HttpResponse`].
    pub(crate) fn send(&self, request: &Request) -> Result<Response, ConfluenceError> {
        let response = self.transport.execute(request)?;
        match response.status {
            status if status < 400 => Ok(response),
            status @ (401 | 403) => Err(ConfluenceError::AuthFailed { status }),
            404 => Err(ConfluenceError::NotFound {
                resource: request.path.clone(),
            }),
            status => Err(ConfluenceError::HttpResponse {
                status,
                body: response.text(),
            }),
        }
    }

    /// Execute a request and deserialize the JSON body.
    pub(crate) fn send_json<D: DeserializeOwned>(
        &self,
        request: &Request,
    ) -> Result<D, ConfluenceError> {
        Ok(self.send(request)?.json()?)
    }

    /// Build an API path.
    pub(crate) fn api_path(path: &str) -> String {
        format!("{API_PREFIX}{path}")
    }
}
