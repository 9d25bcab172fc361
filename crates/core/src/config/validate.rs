use super::{types::Config, ConfigError};
use crate::selection::MediaMode;

/// Validate the fields every mode needs.
///
/// Runs before the site is contacted so a broken config never reaches the
/// search phase.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut missing = Vec::new();

    if config.site.login_username.trim().is_empty() {
        missing.push("site.login_username");
    }
    if config.site.login_password.is_empty() {
        missing.push("site.login_password");
    }
    if config.notification.enabled && config.notification.notification_api_key.trim().is_empty()
    {
        missing.push("notification.notification_api_key");
    }
    if config.database.db_path.as_os_str().is_empty() {
        missing.push("database.db_path");
    }

    if !missing.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }

    if config.site.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "site.timeout_secs cannot be 0".to_string(),
        ));
    }
    if config.run.item_timeout_secs == 0 || config.run.run_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "run timeouts cannot be 0".to_string(),
        ));
    }

    Ok(())
}

/// Validate the site entry points for one mode.
pub fn validate_for_mode(config: &Config, mode: MediaMode) -> Result<(), ConfigError> {
    let (login_field, login_url, search_field, search_url) = match mode {
        MediaMode::Movie => (
            "site.movie_login_url",
            &config.site.movie_login_url,
            "site.movie_search_url",
            &config.site.movie_search_url,
        ),
        MediaMode::Tv => (
            "site.tv_login_url",
            &config.site.tv_login_url,
            "site.tv_search_url",
            &config.site.tv_search_url,
        ),
    };

    for (field, value) in [(login_field, login_url), (search_field, search_url)] {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!("{} is required", field)));
        }
        if reqwest::Url::parse(value).is_err() {
            return Err(ConfigError::ValidationError(format!(
                "{} is not a valid URL: {}",
                field, value
            )));
        }
    }

    Ok(())
}
