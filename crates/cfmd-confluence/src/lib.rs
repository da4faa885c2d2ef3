//! Confluence synchronization engine for cfmd.
//!
//! This crate moves page content between Markdown on disk and Confluence
//! storage format on the server:
//!
//! - **Transport**: [`Transport`] trait with [`HttpTransport`] over `ureq`
//!   and the [`Auth`] schemes
//! - **Pagination**: [`Paginator`] aggregates listing endpoints into one
//!   ordered collection
//! - **Optimistic concurrency**: [`VersionedPageStore`] writes `version + 1`
//!   and reports [`ConfluenceError::VersionConflict`] on rejection
//! - **Interactive editing**: [`EditSession`] drives fetch, external edit,
//!   dirty check and upload with a scoped [`ScratchFile`]
//! - [`Workspace`] exposes the operations used by the command line
//! - [`MockServer`] for testing (behind `mock` feature flag)
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use cfmd_confluence::{ConfluenceClient, ListingKind, Workspace};
//!
//! let client = ConfluenceClient::from_profile(&profile, Duration::from_secs(30));
//! let workspace = Workspace::new(client, 100);
//! let listing = workspace.list_all(ListingKind::Spaces, None)?;
//! ```

mod auth;
mod client;
mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod page_ref;
mod paginator;
mod session;
mod store;
mod transport;
pub mod types;
mod workspace;

pub use auth::Auth;
pub use client::{ConfluenceClient, RECENT_CQL_VARIANTS, VIEWED_CQL_VARIANTS, text_search_cql};
pub use error::{ConfluenceError, ResourceCleanupFailed, SyncError, SyncStep, TransportError};
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockPage, MockServer};
pub use page_ref::parse_page_ref;
pub use paginator::Paginator;
pub use session::{
    AbandonReason, CommandEditor, EditOutcome, EditSession, EditSessionState, Editor, EditorExit,
    ModificationMarker, ScratchFile,
};
pub use store::VersionedPageStore;
pub use transport::{HttpTransport, Method, Request, Response, Transport};
pub use workspace::{Listing, ListingKind, Position, Workspace};
