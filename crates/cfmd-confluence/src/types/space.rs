//! Confluence space types.

use serde::{Deserialize, Serialize};

/// Confluence space.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Space {
    /// Space key, unique on the server.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Space type (`global`, `personal`).
    #[serde(rename = "type", default)]
    pub space_type: String,
}
