use crate::error::ConfigError;

/// Read an env var, treating unset and empty as `None`.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Parse an env var with `FromStr`, reporting `expected` on failure.
pub(crate) fn parse_env<T>(key: &str, expected: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)?
        .map(|s| s.parse())
        .transpose()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be {expected}: {e}"),
        })
}

/// Parse a boolean flag: true/false, 1/0, yes/no, on/off.
pub(crate) fn parse_bool_env(key: &str) -> Result<Option<bool>, ConfigError> {
    optional_env(key)?
        .map(|s| match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("must be true or false, got '{other}'"),
            }),
        })
        .transpose()
}

/// Reject values that are not absolute http(s) URLs.
pub(crate) fn validate_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let url = url::Url::parse(value).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("must be a valid URL: {e}"),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("unsupported URL scheme '{other}'"),
        }),
    }
}
