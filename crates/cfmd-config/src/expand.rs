//! `${VAR}` expansion for credential fields.
//!
//! Only the braced forms are recognized:
//! - `${VAR}` - value of VAR, error if unset
//! - `${VAR:-default}` - value of VAR, or `default` when unset
//!
//! A bare `$` is left alone so that passwords containing dollar signs
//! survive unchanged.

use crate::ConfigError;

/// Expand environment references in `value`, naming `field` in errors.
pub(crate) fn expand_field(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    let lookup = |name: &str| -> Result<Option<String>, UnsetVar> {
        std::env::var(name).map(Some).map_err(|_| UnsetVar(name.to_owned()))
    };

    shellexpand::env_with_context(value, lookup)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{}}} not set", e.cause.0),
        })
}

/// Name of a referenced variable that is not set.
struct UnsetVar(String);

/// Expand an optional field in place.
pub(crate) fn expand_optional(
    value: Option<&String>,
    field: &str,
) -> Result<Option<String>, ConfigError> {
    value.map(|v| expand_field(v, field)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_value_unchanged() {
        assert_eq!(
            expand_field("plain-secret", "profiles.default.token").unwrap(),
            "plain-secret"
        );
    }

    #[test]
    fn test_dollar_in_password_unchanged() {
        assert_eq!(
            expand_field("pa$$word", "profiles.default.password").unwrap(),
            "pa$$word"
        );
    }

    #[test]
    fn test_expands_set_variable() {
        // SAFETY: variable name is unique to this test
        unsafe {
            std::env::set_var("CFMD_EXPAND_TOKEN_SET", "abc123");
        }
        let result = expand_field("${CFMD_EXPAND_TOKEN_SET}", "profiles.default.token").unwrap();
        assert_eq!(result, "abc123");
        unsafe {
            std::env::remove_var("CFMD_EXPAND_TOKEN_SET");
        }
    }

    #[test]
    fn test_default_used_when_unset() {
        // SAFETY: variable name is unique to this test
        unsafe {
            std::env::remove_var("CFMD_EXPAND_HOST_UNSET");
        }
        let result = expand_field(
            "https://${CFMD_EXPAND_HOST_UNSET:-wiki.local}/",
            "profiles.default.base_url",
        )
        .unwrap();
        assert_eq!(result, "https://wiki.local/");
    }

    #[test]
    fn test_missing_variable_names_field() {
        // SAFETY: variable name is unique to this test
        unsafe {
            std::env::remove_var("CFMD_EXPAND_MISSING");
        }
        let err = expand_field("${CFMD_EXPAND_MISSING}", "profiles.work.token").unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
        let message = err.to_string();
        assert!(message.contains("CFMD_EXPAND_MISSING"));
        assert!(message.contains("profiles.work.token"));
    }

    #[test]
    fn test_optional_none_stays_none() {
        assert_eq!(expand_optional(None, "profiles.default.username").unwrap(), None);
    }
}
