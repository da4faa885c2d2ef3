//! Operations exposed to the command line.
//!
//! [`Workspace`] ties the client, paginator, page store and edit session
//! together. Every operation returns a [`SyncError`] naming the step that
//! failed.

use std::fmt::Write;

use cfmd_convert::{ContentFormat, to_markdown};
use tracing::info;

use crate::client::{API_PREFIX, ConfluenceClient, RECENT_CQL_VARIANTS, VIEWED_CQL_VARIANTS};
use crate::error::{ConfluenceError, StepContext, SyncError, SyncStep};
use crate::paginator::Paginator;
use crate::session::{EditOutcome, EditSession, Editor};
use crate::store::VersionedPageStore;
use crate::transport::{HttpTransport, Request, Transport};
use crate::types::{Page, PageSummary, SearchResult, Space, User};

/// What [`Workspace::list_all`] lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    Spaces,
    Pages,
}

/// Complete listing in server order.
#[derive(Debug, Clone)]
pub enum Listing {
    Spaces(Vec<Space>),
    Pages(Vec<PageSummary>),
}

impl Listing {
    pub fn len(&self) -> usize {
        match self {
            Self::Spaces(spaces) => spaces.len(),
            Self::Pages(pages) => pages.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where [`Workspace::append`] puts new content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Position {
    #[default]
    Append,
    Prepend,
}

/// Confluence operations for one profile.
pub struct Workspace<T = HttpTransport> {
    client: ConfluenceClient<T>,
    page_size: usize,
}

impl<T: Transport> Workspace<T> {
    /// Create a workspace listing `page_size` items per request.
    pub fn new(client: ConfluenceClient<T>, page_size: usize) -> Self {
        Self { client, page_size }
    }

    pub fn client(&self) -> &ConfluenceClient<T> {
        &self.client
    }

    /// Web URL for a page.
    pub fn page_url(&self, page_id: &str) -> String {
        self.client.page_url(page_id)
    }

    /// List every space, or every page (optionally within one space).
    ///
    /// `space` is ignored for [`ListingKind::Spaces`].
    pub fn list_all(&self, kind: ListingKind, space: Option<&str>) -> Result<Listing, SyncError> {
        let paginator = Paginator::new(&self.client, self.page_size);
        match kind {
            ListingKind::Spaces => {
                let endpoint = Request::get(format!("{API_PREFIX}/space"));
                paginator
                    .fetch_all(&endpoint)
                    .map(Listing::Spaces)
                    .step(SyncStep::ListingSpaces)
            }
            ListingKind::Pages => {
                let mut endpoint =
                    Request::get(format!("{API_PREFIX}/content")).query("type", "page");
                if let Some(key) = space {
                    endpoint = endpoint.query("spaceKey", key);
                }
                paginator
                    .fetch_all(&endpoint.query("expand", "space,version"))
                    .map(Listing::Pages)
                    .step(SyncStep::ListingPages)
            }
        }
    }

    /// Create a page from Markdown or storage-format content.
    pub fn create_page(
        &self,
        space_key: &str,
        title: &str,
        content: &str,
        format: ContentFormat,
        parent_id: Option<&str>,
    ) -> Result<Page, SyncError> {
        let body = format.to_storage(content);
        VersionedPageStore::new(&self.client)
            .create(space_key, title, &body, parent_id)
            .step(SyncStep::CreatingPage)
    }

    /// Run an interactive edit session on a page.
    pub fn edit_interactively(
        &self,
        page_id: &str,
        editor: &dyn Editor,
        ignore_exit_status: bool,
    ) -> Result<EditOutcome, SyncError> {
        EditSession::new(VersionedPageStore::new(&self.client), editor)
            .ignore_exit_status(ignore_exit_status)
            .run(page_id)
    }

    /// Download a page as Markdown with a metadata header.
    pub fn read_markdown(&self, page_id: &str) -> Result<String, SyncError> {
        let page = VersionedPageStore::new(&self.client)
            .read(page_id)
            .step(SyncStep::ReadingPage)?;
        let markdown = to_markdown(page.storage_value()).step(SyncStep::ConvertingContent)?;

        let space = page
            .space
            .as_ref()
            .map_or("", |s| s.name.as_deref().unwrap_or(&s.key));
        let mut out = String::new();
        writeln!(out, "# {}\n", escape_heading(&page.title)).unwrap();
        writeln!(out, "**Space:** {space}").unwrap();
        writeln!(out, "**Page ID:** {}", page.id).unwrap();
        writeln!(out, "**Version:** {}", page.version.number).unwrap();
        writeln!(out, "**URL:** {}\n", self.page_url(&page.id)).unwrap();
        writeln!(out, "---\n").unwrap();
        out.push_str(&markdown);
        Ok(out)
    }

    /// Add content before or after a page's existing body.
    ///
    /// The write is based on the version just read; a concurrent edit in
    /// between surfaces as a version conflict.
    pub fn append(
        &self,
        page_id: &str,
        content: &str,
        format: ContentFormat,
        position: Position,
    ) -> Result<Page, SyncError> {
        let store = VersionedPageStore::new(&self.client);
        let page = store.read(page_id).step(SyncStep::ReadingPage)?;

        let addition = format.to_storage(content);
        let current = page.storage_value();
        let body = match position {
            Position::Append => format!("{current}\n{addition}"),
            Position::Prepend => format!("{addition}\n{current}"),
        };
        info!("Adding {} bytes to page {}", addition.len(), page_id);

        store
            .write(page_id, &body, page.version.number, &page.title)
            .step(SyncStep::WritingPage)
    }

    /// Pages matching a CQL query.
    pub fn search(&self, cql: &str, limit: usize) -> Result<Vec<SearchResult>, SyncError> {
        self.client.search(cql, limit).step(SyncStep::Searching)
    }

    /// Recently modified pages.
    pub fn recent(&self, limit: usize) -> Result<Vec<SearchResult>, SyncError> {
        self.client
            .search_first_supported(RECENT_CQL_VARIANTS, limit)
            .step(SyncStep::Searching)
    }

    /// Pages recently viewed or touched by the current user.
    pub fn recently_viewed(&self, limit: usize) -> Result<Vec<SearchResult>, SyncError> {
        self.client
            .search_first_supported(VIEWED_CQL_VARIANTS, limit)
            .step(SyncStep::Searching)
    }

    /// Verify credentials by fetching the current user.
    pub fn current_user(&self) -> Result<User, ConfluenceError> {
        self.client.current_user()
    }
}

/// Keep a title on one heading line and stop it reading as more markup.
fn escape_heading(title: &str) -> String {
    title
        .replace(['\r', '\n'], " ")
        .replace('\\', "\\\\")
        .replace('#', "\\#")
}
