//! Paginated listing envelope.

use serde::{Deserialize, Serialize};

/// One page of a listing endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListingResponse<T> {
    /// Items on this page.
    pub results: Vec<T>,
    /// Offset of the first item.
    #[serde(default)]
    pub start: Option<usize>,
    /// Page size the server actually applied.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Number of items on this page.
    #[serde(default)]
    pub size: Option<usize>,
}
