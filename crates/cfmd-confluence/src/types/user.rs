//! Confluence user types.

use serde::{Deserialize, Serialize};

/// Authenticated user.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    /// Login name (Server/Data Center).
    #[serde(default)]
    pub username: Option<String>,
    /// Display name.
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    /// Account ID (Cloud).
    #[serde(rename = "accountId", default)]
    pub account_id: Option<String>,
}

impl User {
    /// Best available name for display.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.username.as_deref())
            .or(self.account_id.as_deref())
            .unwrap_or("unknown")
    }
}
