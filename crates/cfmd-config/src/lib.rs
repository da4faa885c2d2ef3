//! Profile and settings management for cfmd.
//!
//! Reads `config.toml` from the user configuration directory
//! (`~/.config/cfmd/config.toml` on Linux), or from the path given by
//! `--config` / the `CFMD_CONFIG` environment variable.
//!
//! ```toml
//! [settings]
//! page_size = 100
//! timeout_secs = 30
//!
//! [profiles.default]
//! base_url = "https://wiki.example.com"
//! username = "alice"
//! token = "${WIKI_TOKEN}"
//! ```
//!
//! ## Environment Variable Expansion
//!
//! Profile strings support `${VAR}` and `${VAR:-default}`. Expansion happens
//! when a profile is resolved, never when the file is saved, so secrets
//! pulled from the environment are not written back to disk.
//!
//! ## Permissions
//!
//! The file holds secrets. [`Config::save`] creates the directory with mode
//! `0700` and the file with mode `0600` on Unix.

mod expand;

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Directory name under the user configuration directory.
const CONFIG_DIR_NAME: &str = "cfmd";

/// Configuration filename.
const CONFIG_FILENAME: &str = "config.toml";

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV_VAR: &str = "CFMD_CONFIG";

/// Name of the profile used when none is given.
pub const DEFAULT_PROFILE: &str = "default";

/// Upper bound for the listing page size.
const MAX_PAGE_SIZE: u32 = 1000;

/// CLI settings that override configuration file values.
///
/// Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the profile's base URL.
    pub base_url: Option<String>,
    /// Override the listing page size.
    pub page_size: Option<u32>,
    /// Override the request timeout.
    pub timeout_secs: Option<u64>,
    /// Override the editor command.
    pub editor: Option<String>,
}

/// Application configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Global settings.
    pub settings: Settings,
    /// Named connection profiles.
    pub profiles: BTreeMap<String, ProfileConfig>,

    /// Base URL override applied when resolving any profile.
    #[serde(skip)]
    base_url_override: Option<String>,
    /// Path the config was loaded from (or will be saved to).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Global settings shared by all profiles.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Items requested per listing page.
    pub page_size: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Editor command for interactive edits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: 100,
            timeout_secs: 30,
            editor: None,
        }
    }
}

/// Connection profile as written in the file (unexpanded).
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProfileConfig {
    /// Server base URL.
    pub base_url: String,
    /// Username for Basic auth or PAT-as-password auth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Password for Basic auth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Personal access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Explicit authentication scheme (derived from the fields when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthMethod>,
}

/// Authentication scheme selector.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    /// Username and password.
    Basic,
    /// Token sent as `Authorization: Bearer`.
    Bearer,
    /// Token sent as the password of Basic auth.
    UsernameToken,
}

impl std::str::FromStr for AuthMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "bearer" => Ok(Self::Bearer),
            "username-token" => Ok(Self::UsernameToken),
            other => Err(ConfigError::Validation(format!(
                "unknown auth method '{other}' (expected basic, bearer or username-token)"
            ))),
        }
    }
}

/// Expanded credentials for one of the supported schemes.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Username and password.
    Basic {
        /// Login name.
        username: String,
        /// Password.
        password: String,
    },
    /// Bearer token.
    Bearer {
        /// Personal access token.
        token: String,
    },
    /// Personal access token used as the Basic auth password.
    UsernameWithToken {
        /// Login name.
        username: String,
        /// Personal access token.
        token: String,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic { username, .. } => write!(f, "Basic({username}, <redacted>)"),
            Self::Bearer { .. } => f.write_str("Bearer(<redacted>)"),
            Self::UsernameWithToken { username, .. } => {
                write!(f, "UsernameWithToken({username}, <redacted>)")
            }
        }
    }
}

/// Profile ready for use by a client: expanded, validated, with overrides.
#[derive(Debug, Clone)]
pub struct ResolvedProfile {
    /// Profile name.
    pub name: String,
    /// Server base URL without trailing slash.
    pub base_url: String,
    /// Credentials for the selected scheme.
    pub credentials: Credentials,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// No user configuration directory on this platform.
    #[error("Cannot determine the user configuration directory")]
    NoConfigDir,
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// TOML serialization error.
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// Named profile does not exist.
    #[error("Profile '{0}' not found (run `cfmd config set {0} ...` first)")]
    ProfileNotFound(String),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`profiles.default.token`").
        field: String,
        /// Error message (e.g., "${`WIKI_TOKEN`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration with optional CLI settings.
    ///
    /// An explicit `config_path` must exist. Otherwise the default location
    /// is used, and a missing file yields an empty configuration.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else {
            let path = Self::default_path()?;
            if path.exists() {
                Self::load_from_file(&path)?
            } else {
                debug!("No config at {}, using defaults", path.display());
                Self::empty_at(path)
            }
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }
        config.validate()?;

        Ok(config)
    }

    /// Empty configuration that will be saved to `path`.
    #[must_use]
    pub fn empty_at(path: PathBuf) -> Self {
        Self {
            config_path: Some(path),
            ..Self::default()
        }
    }

    /// Default config file location.
    ///
    /// `CFMD_CONFIG` wins over the platform configuration directory.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Ok(PathBuf::from(path));
        }
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILENAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.config_path = Some(path.to_path_buf());
        debug!(
            "Loaded config from {} ({} profiles)",
            path.display(),
            config.profiles.len()
        );
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(base_url) = &settings.base_url {
            self.base_url_override = Some(base_url.clone());
        }
        if let Some(page_size) = settings.page_size {
            self.settings.page_size = page_size;
        }
        if let Some(timeout) = settings.timeout_secs {
            self.settings.timeout_secs = timeout;
        }
        if let Some(editor) = &settings.editor {
            self.settings.editor = Some(editor.clone());
        }
    }

    /// Validate global settings.
    ///
    /// Profiles are validated individually when resolved, so a broken
    /// profile does not prevent using another one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let page_size = self.settings.page_size;
        if page_size == 0 {
            return Err(ConfigError::Validation(
                "settings.page_size must be greater than 0".to_owned(),
            ));
        }
        if page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Validation(format!(
                "settings.page_size cannot exceed {MAX_PAGE_SIZE}"
            )));
        }
        if self.settings.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "settings.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    /// Resolve a named profile: expand variables, apply overrides, pick the
    /// authentication scheme and validate.
    pub fn require_profile(&self, name: &str) -> Result<ResolvedProfile, ConfigError> {
        let profile = self
            .profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound(name.to_owned()))?;

        let field = |suffix: &str| format!("profiles.{name}.{suffix}");

        let base_url = match &self.base_url_override {
            Some(url) => url.clone(),
            None => expand::expand_field(&profile.base_url, &field("base_url"))?,
        };
        require_non_empty(&base_url, &field("base_url"))?;
        require_http_url(&base_url, &field("base_url"))?;

        let username = expand::expand_optional(profile.username.as_ref(), &field("username"))?;
        let password = expand::expand_optional(profile.password.as_ref(), &field("password"))?;
        let token = expand::expand_optional(profile.token.as_ref(), &field("token"))?;

        let credentials = select_credentials(profile.auth, username, password, token)
            .map_err(|msg| ConfigError::Validation(format!("profiles.{name}: {msg}")))?;

        Ok(ResolvedProfile {
            name: name.to_owned(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            credentials,
        })
    }

    /// Insert or replace a profile.
    pub fn set_profile(&mut self, name: &str, profile: ProfileConfig) {
        self.profiles.insert(name.to_owned(), profile);
    }

    /// Remove a profile. Returns whether it existed.
    pub fn remove_profile(&mut self, name: &str) -> bool {
        self.profiles.remove(name).is_some()
    }

    /// Profile names in sorted order.
    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Write the configuration back to its file with owner-only permissions.
    ///
    /// Returns the path written.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = match &self.config_path {
            Some(path) => path.clone(),
            None => Self::default_path()?,
        };

        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
            restrict_permissions(dir, 0o700)?;
        }

        let content = toml::to_string_pretty(self)?;
        let mut file = open_private(&path)?;
        file.write_all(content.as_bytes())?;
        restrict_permissions(&path, 0o600)?;

        debug!("Saved config to {}", path.display());
        Ok(path)
    }
}

/// Pick the authentication scheme from explicit choice or available fields.
fn select_credentials(
    method: Option<AuthMethod>,
    username: Option<String>,
    password: Option<String>,
    token: Option<String>,
) -> Result<Credentials, String> {
    let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
    let (username, password, token) = (non_empty(username), non_empty(password), non_empty(token));

    let method = match method {
        Some(method) => method,
        None => match (&username, &password, &token) {
            (Some(_), _, Some(_)) => AuthMethod::UsernameToken,
            (None, _, Some(_)) => AuthMethod::Bearer,
            (Some(_), Some(_), None) => AuthMethod::Basic,
            _ => return Err("set either token, or username with password/token".to_owned()),
        },
    };

    match method {
        AuthMethod::Basic => match (username, password) {
            (Some(username), Some(password)) => Ok(Credentials::Basic { username, password }),
            _ => Err("basic auth requires username and password".to_owned()),
        },
        AuthMethod::Bearer => token
            .map(|token| Credentials::Bearer { token })
            .ok_or_else(|| "bearer auth requires token".to_owned()),
        AuthMethod::UsernameToken => match (username, token) {
            (Some(username), Some(token)) => {
                Ok(Credentials::UsernameWithToken { username, token })
            }
            _ => Err("username-token auth requires username and token".to_owned()),
        },
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn profile(base_url: &str) -> ProfileConfig {
        ProfileConfig {
            base_url: base_url.to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_settings() {
        let config = Config::default();
        assert_eq!(config.settings.page_size, 100);
        assert_eq!(config.settings.timeout_secs, 30);
        assert!(config.settings.editor.is_none());
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.settings.page_size, 100);
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn test_parse_profiles() {
        let toml = r#"
[settings]
page_size = 50
editor = "nano"

[profiles.default]
base_url = "https://wiki.example.com"
username = "alice"
token = "pat"

[profiles.legacy]
base_url = "http://old.example.com"
username = "bob"
password = "hunter2"
auth = "basic"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.settings.page_size, 50);
        assert_eq!(config.settings.editor.as_deref(), Some("nano"));
        assert_eq!(config.profile_names().collect::<Vec<_>>(), ["default", "legacy"]);
        assert_eq!(config.profiles["legacy"].auth, Some(AuthMethod::Basic));
    }

    #[test]
    fn test_require_profile_username_with_token() {
        let mut config = Config::default();
        config.set_profile(
            "default",
            ProfileConfig {
                username: Some("alice".to_owned()),
                token: Some("pat".to_owned()),
                ..profile("https://wiki.example.com/")
            },
        );

        let resolved = config.require_profile("default").unwrap();
        assert_eq!(resolved.base_url, "https://wiki.example.com");
        assert_eq!(
            resolved.credentials,
            Credentials::UsernameWithToken {
                username: "alice".to_owned(),
                token: "pat".to_owned()
            }
        );
    }

    #[test]
    fn test_require_profile_token_only_is_bearer() {
        let mut config = Config::default();
        config.set_profile(
            "ci",
            ProfileConfig {
                token: Some("pat".to_owned()),
                ..profile("https://wiki.example.com")
            },
        );

        let resolved = config.require_profile("ci").unwrap();
        assert_eq!(
            resolved.credentials,
            Credentials::Bearer {
                token: "pat".to_owned()
            }
        );
    }

    #[test]
    fn test_require_profile_password_is_basic() {
        let mut config = Config::default();
        config.set_profile(
            "default",
            ProfileConfig {
                username: Some("bob".to_owned()),
                password: Some("hunter2".to_owned()),
                ..profile("https://wiki.example.com")
            },
        );

        let resolved = config.require_profile("default").unwrap();
        assert!(matches!(resolved.credentials, Credentials::Basic { .. }));
    }

    #[test]
    fn test_explicit_bearer_ignores_username() {
        let mut config = Config::default();
        config.set_profile(
            "default",
            ProfileConfig {
                username: Some("alice".to_owned()),
                token: Some("pat".to_owned()),
                auth: Some(AuthMethod::Bearer),
                ..profile("https://wiki.example.com")
            },
        );

        let resolved = config.require_profile("default").unwrap();
        assert!(matches!(resolved.credentials, Credentials::Bearer { .. }));
    }

    #[test]
    fn test_require_profile_without_credentials_fails() {
        let mut config = Config::default();
        config.set_profile("default", profile("https://wiki.example.com"));

        let err = config.require_profile("default").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("profiles.default"));
    }

    #[test]
    fn test_require_profile_missing() {
        let config = Config::default();
        let err = config.require_profile("work").unwrap_err();
        assert!(matches!(err, ConfigError::ProfileNotFound(ref name) if name == "work"));
    }

    #[test]
    fn test_require_profile_invalid_url() {
        let mut config = Config::default();
        config.set_profile(
            "default",
            ProfileConfig {
                token: Some("pat".to_owned()),
                ..profile("wiki.example.com")
            },
        );

        let err = config.require_profile("default").unwrap_err();
        assert!(err.to_string().contains("http:// or https://"));
    }

    #[test]
    fn test_base_url_override_applies_to_profile() {
        let mut config = Config::default();
        config.set_profile(
            "default",
            ProfileConfig {
                token: Some("pat".to_owned()),
                ..profile("https://wiki.example.com")
            },
        );
        config.apply_cli_settings(&CliSettings {
            base_url: Some("https://staging.example.com".to_owned()),
            ..Default::default()
        });

        let resolved = config.require_profile("default").unwrap();
        assert_eq!(resolved.base_url, "https://staging.example.com");
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default();
        config.apply_cli_settings(&CliSettings {
            page_size: Some(25),
            timeout_secs: Some(5),
            editor: Some("code --wait".to_owned()),
            ..Default::default()
        });

        assert_eq!(config.settings.page_size, 25);
        assert_eq!(config.settings.timeout_secs, 5);
        assert_eq!(config.settings.editor.as_deref(), Some("code --wait"));
    }

    #[test]
    fn test_validate_page_size_bounds() {
        let mut config = Config::default();
        config.settings.page_size = 0;
        assert!(config.validate().is_err());

        config.settings.page_size = MAX_PAGE_SIZE + 1;
        assert!(config.validate().is_err());

        config.settings.page_size = 250;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_timeout_zero() {
        let mut config = Config::default();
        config.settings.timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_token_expanded_on_resolve() {
        // SAFETY: variable name is unique to this test
        unsafe {
            std::env::set_var("CFMD_TEST_RESOLVE_TOKEN", "from-env");
        }
        let mut config = Config::default();
        config.set_profile(
            "default",
            ProfileConfig {
                token: Some("${CFMD_TEST_RESOLVE_TOKEN}".to_owned()),
                ..profile("https://wiki.example.com")
            },
        );

        let resolved = config.require_profile("default").unwrap();
        assert_eq!(
            resolved.credentials,
            Credentials::Bearer {
                token: "from-env".to_owned()
            }
        );
        // Stored profile keeps the reference
        assert_eq!(
            config.profiles["default"].token.as_deref(),
            Some("${CFMD_TEST_RESOLVE_TOKEN}")
        );
        unsafe {
            std::env::remove_var("CFMD_TEST_RESOLVE_TOKEN");
        }
    }

    #[test]
    fn test_credentials_debug_redacts_secrets() {
        let creds = Credentials::Basic {
            username: "bob".to_owned(),
            password: "hunter2".to_owned(),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("bob"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_auth_method_from_str() {
        assert_eq!("bearer".parse::<AuthMethod>().unwrap(), AuthMethod::Bearer);
        assert_eq!(
            "username-token".parse::<AuthMethod>().unwrap(),
            AuthMethod::UsernameToken
        );
        assert!("oauth".parse::<AuthMethod>().is_err());
    }

    #[test]
    fn test_load_explicit_missing_path() {
        let err = Config::load(Some(Path::new("/nonexistent/cfmd.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config {
            config_path: Some(path.clone()),
            ..Default::default()
        };
        config.set_profile(
            "default",
            ProfileConfig {
                username: Some("alice".to_owned()),
                token: Some("${WIKI_TOKEN}".to_owned()),
                ..profile("https://wiki.example.com")
            },
        );
        let written = config.save().unwrap();
        assert_eq!(written, path);

        let reloaded = Config::load(Some(path.as_path()), None).unwrap();
        assert_eq!(reloaded.profiles, config.profiles);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_uses_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let conf_dir = dir.path().join("cfmd");
        let path = conf_dir.join("config.toml");
        let config = Config {
            config_path: Some(path.clone()),
            ..Default::default()
        };
        config.save().unwrap();

        let file_mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        let dir_mode = std::fs::metadata(&conf_dir).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn test_remove_profile() {
        let mut config = Config::default();
        config.set_profile("default", profile("https://wiki.example.com"));
        assert!(config.remove_profile("default"));
        assert!(!config.remove_profile("default"));
    }
}
