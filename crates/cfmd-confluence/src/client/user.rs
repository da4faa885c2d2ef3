//! User operations for Confluence API.

use tracing::info;

use super::ConfluenceClient;
use crate::error::ConfluenceError;
use crate::transport::{Request, Transport};
use crate::types::User;

impl<T: Transport> ConfluenceClient<T> {
    /// Get the authenticated user, verifying credentials.
    pub(crate) fn current_user(&self) -> Result<User, ConfluenceError> {
        info!("Getting current user");
        let user: User = self.send_json(&Request::get(Self::api_path("/user/current")))?;
        info!("Authenticated as {}", user.label());
        Ok(user)
    }
}
