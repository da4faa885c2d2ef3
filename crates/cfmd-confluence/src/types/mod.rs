//! Confluence REST API types.
//!
//! Only fields that are actually used are modeled; serde ignores the rest.

mod listing;
mod page;
mod search;
mod space;
mod user;

pub use listing::ListingResponse;
pub use page::{Ancestor, Body, Links, Page, PageSummary, SpaceRef, Storage, Version};
pub use search::SearchResult;
pub use space::Space;
pub use user::User;
