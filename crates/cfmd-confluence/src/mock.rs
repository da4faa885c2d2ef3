//! Mock Confluence server for testing.
//!
//! Provides [`MockServer`], an in-memory [`Transport`] that models spaces,
//! versioned pages, listing endpoints with a server-side page-size cap,
//! CQL search and the current-user endpoint. Every request is recorded.

use std::sync::{LazyLock, RwLock};

use regex::Regex;
use serde_json::{Value, json};

use crate::error::TransportError;
use crate::transport::{Method, Request, Response, Transport};

/// Default `limit` applied when a listing request has none.
const DEFAULT_LIMIT: usize = 25;

static SPACE_CQL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"space\s*=\s*([A-Za-z0-9_~]+)").expect("invalid space regex"));

static TEXT_CQL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"text\s*~\s*"([^"]*)""#).expect("invalid text regex"));

/// Page held by the mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockPage {
    pub id: String,
    pub title: String,
    pub space_key: String,
    pub body: String,
    pub version: u32,
    pub parent_id: Option<String>,
}

#[derive(Debug)]
struct MockState {
    spaces: Vec<(String, String)>,
    pages: Vec<MockPage>,
    next_id: u64,
    page_cap: Option<usize>,
    reject_credentials: bool,
    fail_at_offset: Option<usize>,
    malformed_at_offset: Option<usize>,
    cql_rejections: Vec<(String, String)>,
    conflict_reports_version: bool,
    requests: Vec<Request>,
}

/// Mock Confluence server.
///
/// # Example
///
/// ```ignore
/// use cfmd_confluence::{ConfluenceClient, MockServer};
///
/// let server = MockServer::new()
///     .with_space("DOCS", "Documentation")
///     .with_pages("DOCS", 250)
///     .with_page_cap(100);
/// let client = ConfluenceClient::new(&server, "https://wiki.example.com");
/// ```
#[derive(Debug)]
pub struct MockServer {
    state: RwLock<MockState>,
}

impl Default for MockServer {
    fn default() -> Self {
        Self {
            state: RwLock::new(MockState {
                spaces: Vec::new(),
                pages: Vec::new(),
                next_id: 1000,
                page_cap: None,
                reject_credentials: false,
                fail_at_offset: None,
                malformed_at_offset: None,
                cql_rejections: Vec::new(),
                conflict_reports_version: true,
                requests: Vec::new(),
            }),
        }
    }
}

impl MockServer {
    /// Create an empty server.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a space.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_space(self, key: &str, name: &str) -> Self {
        self.state
            .write()
            .unwrap()
            .spaces
            .push((key.to_owned(), name.to_owned()));
        self
    }

    /// Add `count` spaces named `S0`, `S1`, ...
    #[must_use]
    pub fn with_spaces(self, count: usize) -> Self {
        (0..count).fold(self, |server, i| {
            server.with_space(&format!("S{i}"), &format!("Space {i}"))
        })
    }

    /// Add a page at version 1.
    #[must_use]
    pub fn with_page(self, space_key: &str, title: &str, body: &str) -> Self {
        self.insert_page(space_key, title, body, None);
        self
    }

    /// Add `count` pages titled `Page 0`, `Page 1`, ...
    #[must_use]
    pub fn with_pages(self, space_key: &str, count: usize) -> Self {
        for i in 0..count {
            self.insert_page(space_key, &format!("Page {i}"), &format!("<p>Body {i}</p>"), None);
        }
        self
    }

    /// Cap every listing page at `cap` items regardless of the requested
    /// limit, reporting the applied limit in the response.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_page_cap(self, cap: usize) -> Self {
        self.state.write().unwrap().page_cap = Some(cap);
        self
    }

    /// Answer every request with 401.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn reject_credentials(&self) {
        self.state.write().unwrap().reject_credentials = true;
    }

    /// Fail listing requests at `start = offset` with a connection error.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn fail_at_offset(&self, offset: usize) {
        self.state.write().unwrap().fail_at_offset = Some(offset);
    }

    /// Answer listing requests at `start = offset` with a 200 whose body is
    /// not JSON.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn malformed_body_at_offset(&self, offset: usize) {
        self.state.write().unwrap().malformed_at_offset = Some(offset);
    }

    /// Answer searches whose CQL contains `needle` with 400 and `message`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn reject_cql_containing(&self, needle: &str, message: &str) {
        self.state
            .write()
            .unwrap()
            .cql_rejections
            .push((needle.to_owned(), message.to_owned()));
    }

    /// Omit the current version from 409 conflict messages.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn terse_conflicts(&self) {
        self.state.write().unwrap().conflict_reports_version = false;
    }

    /// Insert a page and return its ID.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn insert_page(
        &self,
        space_key: &str,
        title: &str,
        body: &str,
        parent_id: Option<&str>,
    ) -> String {
        let mut state = self.state.write().unwrap();
        let id = state.next_id.to_string();
        state.next_id += 1;
        state.pages.push(MockPage {
            id: id.clone(),
            title: title.to_owned(),
            space_key: space_key.to_owned(),
            body: body.to_owned(),
            version: 1,
            parent_id: parent_id.map(str::to_owned),
        });
        id
    }

    /// Set a page's version, as if someone else edited it.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn set_version(&self, page_id: &str, version: u32) {
        let mut state = self.state.write().unwrap();
        if let Some(page) = state.pages.iter_mut().find(|p| p.id == page_id) {
            page.version = version;
        }
    }

    /// Snapshot of a page.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn page(&self, page_id: &str) -> Option<MockPage> {
        self.state
            .read()
            .unwrap()
            .pages
            .iter()
            .find(|p| p.id == page_id)
            .cloned()
    }

    /// All requests received, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn requests(&self) -> Vec<Request> {
        self.state.read().unwrap().requests.clone()
    }

    /// Requests with the given method.
    pub fn requests_with(&self, method: Method) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }
}

impl Transport for MockServer {
    fn execute(&self, request: &Request) -> Result<Response, TransportError> {
        let mut state = self.state.write().unwrap();
        state.requests.push(request.clone());

        if state.reject_credentials {
            return Ok(json_response(401, &json!({"message": "Unauthorized"})));
        }
        if let Some(offset) = state.fail_at_offset
            && request.query_param("start") == Some(offset.to_string().as_str())
        {
            return Err(TransportError::Connection("connection reset by peer".to_owned()));
        }
        if let Some(offset) = state.malformed_at_offset
            && request.query_param("start") == Some(offset.to_string().as_str())
        {
            return Ok(Response {
                status: 200,
                body: b"<html><body>Service temporarily unavailable</body></html>".to_vec(),
            });
        }

        let Some(path) = request.path.strip_prefix("/rest/api") else {
            return Ok(not_found());
        };
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        Ok(match (request.method, segments.as_slice()) {
            (Method::Get, ["space"]) => state.list_spaces(request),
            (Method::Get, ["content"]) => state.list_pages(request),
            (Method::Post, ["content"]) => state.create_page(request),
            (Method::Get, ["content", id]) => state
                .pages
                .iter()
                .find(|p| p.id == *id)
                .map_or_else(not_found, |page| json_response(200, &page_json(page))),
            (Method::Put, ["content", id]) => state.update_page(id, request),
            (Method::Get, ["search"]) => state.search(request),
            (Method::Get, ["user", "current"]) => json_response(
                200,
                &json!({"username": "tester", "displayName": "Test User"}),
            ),
            _ => not_found(),
        })
    }
}

impl MockState {
    fn listing(&self, items: Vec<Value>, request: &Request) -> Response {
        let start = usize_param(request, "start").unwrap_or(0);
        let requested = usize_param(request, "limit").unwrap_or(DEFAULT_LIMIT);
        let limit = self.page_cap.map_or(requested, |cap| requested.min(cap));
        let results: Vec<Value> = items.into_iter().skip(start).take(limit).collect();
        json_response(
            200,
            &json!({
                "results": results,
                "start": start,
                "limit": limit,
                "size": results.len(),
            }),
        )
    }

    fn list_spaces(&self, request: &Request) -> Response {
        let items = self
            .spaces
            .iter()
            .map(|(key, name)| json!({"key": key, "name": name, "type": "global"}))
            .collect();
        self.listing(items, request)
    }

    fn list_pages(&self, request: &Request) -> Response {
        let space = request.query_param("spaceKey");
        let items = self
            .pages
            .iter()
            .filter(|p| space.is_none_or(|key| p.space_key == key))
            .map(summary_json)
            .collect();
        self.listing(items, request)
    }

    fn search(&self, request: &Request) -> Response {
        let cql = request.query_param("cql").unwrap_or_default();
        if let Some((_, message)) = self
            .cql_rejections
            .iter()
            .find(|(needle, _)| cql.contains(needle.as_str()))
        {
            return json_response(400, &json!({"statusCode": 400, "message": message}));
        }

        let space = SPACE_CQL_PATTERN.captures(cql).map(|c| c[1].to_owned());
        let text = TEXT_CQL_PATTERN.captures(cql).map(|c| c[1].to_lowercase());
        let items = self
            .pages
            .iter()
            .filter(|p| space.as_ref().is_none_or(|key| &p.space_key == key))
            .filter(|p| {
                text.as_ref().is_none_or(|t| {
                    p.title.to_lowercase().contains(t) || p.body.to_lowercase().contains(t)
                })
            })
            .map(|p| {
                json!({
                    "content": summary_json(p),
                    "title": p.title,
                    "url": format!("/pages/viewpage.action?pageId={}", p.id),
                    "lastModified": "2026-01-01T00:00:00.000Z",
                })
            })
            .collect();
        self.listing(items, request)
    }

    fn create_page(&mut self, request: &Request) -> Response {
        let body = request.body.clone().unwrap_or(Value::Null);
        let space_key = body["space"]["key"].as_str().unwrap_or_default().to_owned();
        if !self.spaces.iter().any(|(key, _)| *key == space_key) {
            return json_response(
                400,
                &json!({"message": format!("No space with key : {space_key}")}),
            );
        }

        let id = self.next_id.to_string();
        self.next_id += 1;
        let page = MockPage {
            id,
            title: body["title"].as_str().unwrap_or_default().to_owned(),
            space_key,
            body: body["body"]["storage"]["value"]
                .as_str()
                .unwrap_or_default()
                .to_owned(),
            version: 1,
            parent_id: body["ancestors"][0]["id"].as_str().map(str::to_owned),
        };
        let response = json_response(200, &page_json(&page));
        self.pages.push(page);
        response
    }

    fn update_page(&mut self, page_id: &str, request: &Request) -> Response {
        let reports_version = self.conflict_reports_version;
        let Some(page) = self.pages.iter_mut().find(|p| p.id == page_id) else {
            return not_found();
        };
        let body = request.body.clone().unwrap_or(Value::Null);
        let sent = body["version"]["number"].as_u64();

        if sent != Some(u64::from(page.version) + 1) {
            let message = if reports_version {
                format!(
                    "Version must be incremented on update. Current version is: {}",
                    page.version
                )
            } else {
                "Conflict".to_owned()
            };
            return json_response(409, &json!({"statusCode": 409, "message": message}));
        }

        page.version += 1;
        if let Some(title) = body["title"].as_str() {
            title.clone_into(&mut page.title);
        }
        if let Some(value) = body["body"]["storage"]["value"].as_str() {
            value.clone_into(&mut page.body);
        }
        json_response(200, &page_json(page))
    }
}

fn usize_param(request: &Request, key: &str) -> Option<usize> {
    request.query_param(key).and_then(|v| v.parse().ok())
}

fn summary_json(page: &MockPage) -> Value {
    json!({
        "id": page.id,
        "type": "page",
        "title": page.title,
        "space": {"key": page.space_key},
        "version": {"number": page.version},
    })
}

fn page_json(page: &MockPage) -> Value {
    let ancestors: Vec<Value> = page
        .parent_id
        .iter()
        .map(|id| json!({"id": id}))
        .collect();
    json!({
        "id": page.id,
        "type": "page",
        "title": page.title,
        "space": {"key": page.space_key, "name": format!("{} space", page.space_key)},
        "version": {"number": page.version},
        "body": {"storage": {"value": page.body, "representation": "storage"}},
        "ancestors": ancestors,
        "_links": {"webui": format!("/pages/viewpage.action?pageId={}", page.id)},
    })
}

fn json_response(status: u16, value: &Value) -> Response {
    Response {
        status,
        body: value.to_string().into_bytes(),
    }
}

fn not_found() -> Response {
    json_response(404, &json!({"statusCode": 404, "message": "Not found"}))
}
