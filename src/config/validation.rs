use crate::config::types::{
    BackendConfig, BackendKind, Config, ExtractionConfig, OutputConfig, RetryConfig,
    SessionConfig, TargetConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_target_config(&config.target)?;
    validate_backend_config(&config.backend)?;
    validate_retry_config(&config.retry)?;
    validate_extraction_config(&config.extraction, config.backend.kind)?;
    if let Some(session) = &config.session {
        validate_session_config(session)?;
    }
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_target_config(config: &TargetConfig) -> Result<(), ConfigError> {
    validate_http_url("base_url", &config.base_url)?;

    if config.scope_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "scope_name cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_backend_config(config: &BackendConfig) -> Result<(), ConfigError> {
    if config.kind == BackendKind::Webdriver {
        validate_http_url("webdriver_url", &config.webdriver_url)?;

        if config.browser.is_empty() {
            return Err(ConfigError::Validation(
                "browser cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 20 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 20, got {}",
            config.max_attempts
        )));
    }

    if config.landmark_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "landmark_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_extraction_config(
    config: &ExtractionConfig,
    kind: BackendKind,
) -> Result<(), ConfigError> {
    if config.location_attribute.trim().is_empty() {
        return Err(ConfigError::Validation(
            "location_attribute cannot be empty".to_string(),
        ));
    }

    for (name, selector) in [
        ("landmark", &config.landmark),
        ("containers", &config.containers),
        ("leaves", &config.leaves),
    ] {
        if selector.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{} selector cannot be empty",
                name
            )));
        }
    }

    // The static backend compares the landmark text itself
    if kind == BackendKind::Webdriver && !config.landmark.contains("{title}") {
        return Err(ConfigError::Validation(format!(
            "landmark must contain the {{title}} placeholder, got '{}'",
            config.landmark
        )));
    }

    Ok(())
}

fn validate_session_config(config: &SessionConfig) -> Result<(), ConfigError> {
    for (name, selector) in [
        ("username_field", &config.username_field),
        ("password_field", &config.password_field),
        ("submit_button", &config.submit_button),
        ("ready_landmark", &config.ready_landmark),
    ] {
        if selector.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "session {} cannot be empty",
                name
            )));
        }
    }

    if config.user_menu.is_some() != config.sign_out.is_some() {
        return Err(ConfigError::Validation(
            "session user_menu and sign_out must be set together".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            name, value
        )));
    }

    Ok(())
}
