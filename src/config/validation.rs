use super::{AppConfig, BackendConfig, ConfigError};

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_backend(&config.backend)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_backend(backend: &BackendConfig) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(&backend.stream_url())
        .map_err(|err| validation_err(format!("backend.base_url is not a valid URL: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err(
            "backend.base_url must start with http:// or https://",
        ));
    }
    if http::Method::from_bytes(backend.method.to_uppercase().as_bytes()).is_err() {
        return Err(validation_err(format!(
            "backend.method '{}' is not a valid HTTP method",
            backend.method
        )));
    }
    if backend.timeout == 0 {
        return Err(validation_err("backend.timeout must be greater than 0"));
    }
    if backend.connect_timeout == 0 {
        return Err(validation_err(
            "backend.connect_timeout must be greater than 0",
        ));
    }
    if let Some(key) = backend.api_key.as_deref() {
        if key.trim().is_empty() {
            return Err(validation_err("backend.api_key cannot be empty when set"));
        }
    }
    for (name, value) in &backend.headers {
        if http::HeaderName::from_bytes(name.as_bytes()).is_err() {
            return Err(validation_err(format!(
                "backend.headers: '{name}' is not a valid header name"
            )));
        }
        if http::HeaderValue::from_str(value).is_err() {
            return Err(validation_err(format!(
                "backend.headers: value for '{name}' is not a valid header value"
            )));
        }
    }
    validate_proxy_url(backend.proxy.as_deref())?;
    Ok(())
}

fn validate_proxy_url(proxy: Option<&str>) -> Result<(), ConfigError> {
    let Some(proxy) = proxy.map(str::trim) else {
        return Ok(());
    };
    if proxy.is_empty() {
        return Err(validation_err("backend.proxy cannot be empty when set"));
    }
    let parsed = url::Url::parse(proxy)
        .map_err(|err| validation_err(format!("backend.proxy is not a valid URL: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err("backend.proxy must use http:// or https://"));
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let valid_levels = [
        "TRACE", "DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED",
    ];
    if !valid_levels.contains(&config.features.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {valid_levels:?}"
        )));
    }
    Ok(())
}
