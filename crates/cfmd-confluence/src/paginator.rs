//! Deterministic listing pagination.
//!
//! [`Paginator::fetch_all`] is a single-shot aggregation over a synchronous
//! request loop: it requests `start = 0, n, 2n, ...` until a page comes back
//! with fewer items than the page size in effect. Any failure discards what
//! was accumulated; callers retry the whole fetch.

use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::client::ConfluenceClient;
use crate::error::ConfluenceError;
use crate::transport::{Request, Transport};
use crate::types::ListingResponse;

/// Fetches every item of a listing endpoint.
pub struct Paginator<'a, T> {
    client: &'a ConfluenceClient<T>,
    page_size: usize,
}

impl<'a, T: Transport> Paginator<'a, T> {
    /// Create a paginator requesting `page_size` items per request.
    ///
    /// A page size of zero is treated as one.
    pub fn new(client: &'a ConfluenceClient<T>, page_size: usize) -> Self {
        Self {
            client,
            page_size: page_size.max(1),
        }
    }

    /// Fetch all items of `endpoint` in server order.
    ///
    /// `endpoint` carries the listing path and filters; `start` and `limit`
    /// are added per request. A page exactly as large as the page size
    /// always triggers one more request. When the server reports a smaller
    /// applied `limit`, that becomes the page size.
    ///
    /// # Errors
    ///
    /// - [`ConfluenceError::AuthFailed`] if credentials are rejected.
    /// - [`ConfluenceError::FetchFailed`] with the failing offset for any
    ///   other failure.
    /// - [`ConfluenceError::EmptyResult`] if the listing has no items.
    pub fn fetch_all<D: DeserializeOwned>(&self, endpoint: &Request) -> Result<Vec<D>, ConfluenceError> {
        let mut items = Vec::new();
        let mut start = 0;
        let mut limit = self.page_size;

        loop {
            let request = endpoint.clone().query("start", start).query("limit", limit);
            info!("Listing {} from offset {} (limit {})", endpoint.path, start, limit);

            let response = match self.client.send(&request) {
                Ok(response) => response,
                Err(e @ ConfluenceError::AuthFailed { .. }) => return Err(e),
                Err(e) => {
                    return Err(ConfluenceError::FetchFailed {
                        offset: start,
                        source: Box::new(e),
                    });
                }
            };

            let page: ListingResponse<D> = match response.json() {
                Ok(page) => page,
                Err(e) => {
                    warn!("Unparsable listing body at offset {}, stopping: {}", start, e);
                    break;
                }
            };

            if let Some(applied) = page.limit.filter(|&applied| applied > 0 && applied < limit) {
                info!("Server capped page size at {}", applied);
                limit = applied;
            }

            let received = page.results.len();
            items.extend(page.results);

            if received < limit {
                break;
            }
            start += received;
        }

        if items.is_empty() {
            return Err(ConfluenceError::EmptyResult {
                endpoint: endpoint.path.clone(),
            });
        }

        info!("Listed {} items from {}", items.len(), endpoint.path);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockServer;
    use crate::types::{PageSummary, Space};
    use pretty_assertions::assert_eq;

    fn offsets(server: &MockServer) -> Vec<String> {
        server
            .requests()
            .iter()
            .filter_map(|r| r.query_param("start").map(str::to_owned))
            .collect()
    }

    fn spaces_endpoint() -> Request {
        Request::get("/rest/api/space")
    }

    #[test]
    fn test_250_items_in_three_requests() {
        let server = MockServer::new().with_spaces(250);
        let client = ConfluenceClient::new(&server, "https://wiki");

        let spaces: Vec<Space> = Paginator::new(&client, 100).fetch_all(&spaces_endpoint()).unwrap();

        assert_eq!(spaces.len(), 250);
        assert_eq!(offsets(&server), ["0", "100", "200"]);
        let keys: Vec<String> = spaces.iter().map(|s| s.key.clone()).collect();
        let expected: Vec<String> = (0..250).map(|i| format!("S{i}")).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_exact_multiple_requests_trailing_empty_page() {
        let server = MockServer::new().with_spaces(200);
        let client = ConfluenceClient::new(&server, "https://wiki");

        let spaces: Vec<Space> = Paginator::new(&client, 100).fetch_all(&spaces_endpoint()).unwrap();

        assert_eq!(spaces.len(), 200);
        assert_eq!(offsets(&server), ["0", "100", "200"]);
    }

    #[test]
    fn test_completeness_for_various_sizes() {
        for (count, page_size) in [(1, 1), (7, 3), (9, 3), (10, 1), (5, 50)] {
            let server = MockServer::new().with_spaces(count);
            let client = ConfluenceClient::new(&server, "https://wiki");

            let spaces: Vec<Space> = Paginator::new(&client, page_size)
                .fetch_all(&spaces_endpoint())
                .unwrap();

            assert_eq!(spaces.len(), count, "count={count} page_size={page_size}");
            assert_eq!(server.requests().len(), count / page_size + 1);
        }
    }

    #[test]
    fn test_empty_listing_is_empty_result() {
        let server = MockServer::new();
        let client = ConfluenceClient::new(&server, "https://wiki");

        let result: Result<Vec<Space>, _> = Paginator::new(&client, 100).fetch_all(&spaces_endpoint());

        assert!(matches!(
            result,
            Err(ConfluenceError::EmptyResult { endpoint }) if endpoint == "/rest/api/space"
        ));
        assert_eq!(server.requests().len(), 1);
    }

    #[test]
    fn test_server_cap_does_not_truncate() {
        let server = MockServer::new().with_spaces(60).with_page_cap(25);
        let client = ConfluenceClient::new(&server, "https://wiki");

        let spaces: Vec<Space> = Paginator::new(&client, 100).fetch_all(&spaces_endpoint()).unwrap();

        assert_eq!(spaces.len(), 60);
        assert_eq!(offsets(&server), ["0", "25", "50"]);
    }

    #[test]
    fn test_failure_reports_offset_and_discards_progress() {
        let server = MockServer::new().with_spaces(250);
        server.fail_at_offset(100);
        let client = ConfluenceClient::new(&server, "https://wiki");

        let result: Result<Vec<Space>, _> = Paginator::new(&client, 100).fetch_all(&spaces_endpoint());

        assert!(matches!(
            result,
            Err(ConfluenceError::FetchFailed { offset: 100, .. })
        ));
    }

    #[test]
    fn test_unparsable_page_ends_listing_with_items_so_far() {
        let server = MockServer::new().with_spaces(250);
        server.malformed_body_at_offset(100);
        let client = ConfluenceClient::new(&server, "https://wiki");

        let spaces: Vec<Space> = Paginator::new(&client, 100).fetch_all(&spaces_endpoint()).unwrap();

        assert_eq!(spaces.len(), 100);
        assert_eq!(spaces.last().map(|s| s.key.as_str()), Some("S99"));
        assert_eq!(offsets(&server), ["0", "100"]);
    }

    #[test]
    fn test_unparsable_first_page_is_empty_result() {
        let server = MockServer::new().with_spaces(5);
        server.malformed_body_at_offset(0);
        let client = ConfluenceClient::new(&server, "https://wiki");

        let result: Result<Vec<Space>, _> = Paginator::new(&client, 100).fetch_all(&spaces_endpoint());

        assert!(matches!(result, Err(ConfluenceError::EmptyResult { .. })));
        assert_eq!(server.requests().len(), 1);
    }

    #[test]
    fn test_auth_failure_propagates_unchanged() {
        let server = MockServer::new().with_spaces(3);
        server.reject_credentials();
        let client = ConfluenceClient::new(&server, "https://wiki");

        let result: Result<Vec<Space>, _> = Paginator::new(&client, 100).fetch_all(&spaces_endpoint());

        assert!(matches!(result, Err(ConfluenceError::AuthFailed { status: 401 })));
    }

    #[test]
    fn test_endpoint_filters_are_kept() {
        let server = MockServer::new()
            .with_space("A", "A")
            .with_space("B", "B")
            .with_pages("A", 3)
            .with_pages("B", 2);
        let client = ConfluenceClient::new(&server, "https://wiki");
        let endpoint = Request::get("/rest/api/content")
            .query("type", "page")
            .query("spaceKey", "B");

        let pages: Vec<PageSummary> = Paginator::new(&client, 10).fetch_all(&endpoint).unwrap();

        assert_eq!(pages.len(), 2);
        assert!(pages.iter().all(|p| p.space.as_ref().is_some_and(|s| s.key == "B")));
    }
}
