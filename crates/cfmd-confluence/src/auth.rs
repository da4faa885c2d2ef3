//! Authentication schemes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cfmd_config::Credentials;

/// Authorization scheme applied to every request.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// Username and password.
    Basic { username: String, password: String },
    /// Personal access token as a bearer token.
    Bearer { token: String },
    /// Personal access token sent as the Basic auth password.
    UsernameWithToken { username: String, token: String },
}

impl Auth {
    /// `Authorization` header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        match self {
            Self::Basic { username, password } => basic(username, password),
            Self::UsernameWithToken { username, token } => basic(username, token),
            Self::Bearer { token } => format!("Bearer {token}"),
        }
    }

    /// Scheme name for logs.
    #[must_use]
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Basic { .. } => "basic",
            Self::Bearer { .. } => "bearer",
            Self::UsernameWithToken { .. } => "username-token",
        }
    }
}

fn basic(username: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{secret}")))
}

impl From<Credentials> for Auth {
    fn from(credentials: Credentials) -> Self {
        match credentials {
            Credentials::Basic { username, password } => Self::Basic { username, password },
            Credentials::Bearer { token } => Self::Bearer { token },
            Credentials::UsernameWithToken { username, token } => {
                Self::UsernameWithToken { username, token }
            }
        }
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Auth({}, <redacted>)", self.scheme())
    }
}
