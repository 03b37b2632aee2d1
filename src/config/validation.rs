use crate::config::types::{
    Config, CrawlerConfig, LogSink, LoggingConfig, SiteConfig, StorageConfig, UserAgentConfig,
    YEAR_PLACEHOLDER,
};
use crate::ConfigError;
use chrono::{Datelike, Utc};
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_crawler_config(&config.crawler, Utc::now().year())?;
    validate_user_agent_config(&config.user_agent)?;
    validate_storage_config(&config.storage)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

/// Validates the site layout configuration
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_http_url("index_url", &config.index_url)?;

    if !config.year_link_pattern.contains(YEAR_PLACEHOLDER) {
        return Err(ConfigError::Validation(format!(
            "year_link_pattern must contain {}, got '{}'",
            YEAR_PLACEHOLDER, config.year_link_pattern
        )));
    }

    if !config.year_page_template.contains(YEAR_PLACEHOLDER) {
        return Err(ConfigError::Validation(format!(
            "year_page_template must contain {}, got '{}'",
            YEAR_PLACEHOLDER, config.year_page_template
        )));
    }

    // The template must still be a URL once a year is substituted
    validate_http_url("year_page_template", &config.fallback_year_url(2001))?;

    Ok(())
}

/// Validates crawler limits against the current calendar year
fn validate_crawler_config(config: &CrawlerConfig, current_year: i32) -> Result<(), ConfigError> {
    if config.epoch_year < 1900 || config.epoch_year > current_year {
        return Err(ConfigError::Validation(format!(
            "epoch_year must be between 1900 and {}, got {}",
            current_year, config.epoch_year
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1".to_string(),
        ));
    }

    if config.commit_every_pages < 1 {
        return Err(ConfigError::Validation(
            "commit_every_pages must be >= 1".to_string(),
        ));
    }

    if config.reclaim_every_documents < 1 {
        return Err(ConfigError::Validation(
            "reclaim_every_documents must be >= 1".to_string(),
        ));
    }

    if config.time_budget_secs < 1 {
        return Err(ConfigError::Validation(
            "time_budget_secs must be >= 1".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 || config.download_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeouts must be >= 1s, got request={}s download={}s",
            config.request_timeout_secs, config.download_timeout_secs
        )));
    }

    if config.chunk_size < 512 {
        return Err(ConfigError::Validation(format!(
            "chunk_size must be >= 512 bytes, got {}",
            config.chunk_size
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if let Some(contact_url) = &config.contact_url {
        Url::parse(contact_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if let Some(backup) = &config.backup_path {
        if backup.is_empty() {
            return Err(ConfigError::Validation(
                "backup_path cannot be empty when set".to_string(),
            ));
        }
        if backup == &config.database_path {
            return Err(ConfigError::Validation(
                "backup_path must differ from database_path".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_logging_config(config: &LoggingConfig) -> Result<(), ConfigError> {
    if config.sink == LogSink::File && config.file.as_deref().map_or(true, str::is_empty) {
        return Err(ConfigError::Validation(
            "logging.file is required when sink = \"file\"".to_string(),
        ));
    }
    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use HTTP or HTTPS",
            field, value
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_site_is_valid() {
        assert!(validate_site_config(&SiteConfig::default()).is_ok());
    }

    #[test]
    fn test_site_patterns_need_year_placeholder() {
        let mut site = SiteConfig::default();
        site.year_link_pattern = "matters_2024".to_string();
        assert!(validate_site_config(&site).is_err());

        let mut site = SiteConfig::default();
        site.year_page_template = "https://example.com/matters.html".to_string();
        assert!(validate_site_config(&site).is_err());
    }

    #[test]
    fn test_site_rejects_non_http_index() {
        let mut site = SiteConfig::default();
        site.index_url = "ftp://example.com/index.html".to_string();
        assert!(matches!(
            validate_site_config(&site),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_epoch_bounds() {
        let mut crawler = CrawlerConfig::default();
        assert!(validate_crawler_config(&crawler, 2026).is_ok());

        crawler.epoch_year = 2027;
        assert!(validate_crawler_config(&crawler, 2026).is_err());

        crawler.epoch_year = 2026;
        assert!(validate_crawler_config(&crawler, 2026).is_ok());
    }

    #[test]
    fn test_zero_caps_rejected() {
        let mut crawler = CrawlerConfig::default();
        crawler.max_pages = 0;
        assert!(validate_crawler_config(&crawler, 2026).is_err());

        let mut crawler = CrawlerConfig::default();
        crawler.commit_every_pages = 0;
        assert!(validate_crawler_config(&crawler, 2026).is_err());
    }

    #[test]
    fn test_file_sink_requires_path() {
        let logging = LoggingConfig {
            sink: LogSink::File,
            file: None,
        };
        assert!(validate_logging_config(&logging).is_err());

        let logging = LoggingConfig {
            sink: LogSink::File,
            file: Some("harvest.log".to_string()),
        };
        assert!(validate_logging_config(&logging).is_ok());
    }

    #[test]
    fn test_backup_must_differ_from_database() {
        let storage = StorageConfig {
            database_path: "profiles.db".to_string(),
            backup_path: Some("profiles.db".to_string()),
        };
        assert!(validate_storage_config(&storage).is_err());
    }
}
