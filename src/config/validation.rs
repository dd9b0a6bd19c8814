use crate::config::types::{Config, CrawlerConfig, ServerConfig, StorageConfig};
use crate::ConfigError;
use std::net::SocketAddr;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_storage_config(&config.storage)?;
    validate_server_config(&config.server)?;
    Ok(())
}

/// Validates scheduler pacing configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be >= 1, got {}",
            config.batch_size
        )));
    }

    if config.idle_interval_secs < 1 {
        return Err(ConfigError::Validation(
            "idle_interval_secs must be >= 1".to_string(),
        ));
    }

    if config.rescan_interval_secs < 1 {
        return Err(ConfigError::Validation(
            "rescan_interval_secs must be >= 1".to_string(),
        ));
    }

    if config.navigation_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "navigation_timeout_secs must be >= 1".to_string(),
        ));
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

    Ok(())
}

/// Validates control API configuration
fn validate_server_config(config: &ServerConfig) -> Result<(), ConfigError> {
    config
        .listen_addr
        .parse::<SocketAddr>()
        .map_err(|e| {
            ConfigError::Validation(format!(
                "listen_addr '{}' is not a valid socket address: {}",
                config.listen_addr, e
            ))
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::BrowserSettings;

    fn valid_config() -> Config {
        Config {
            crawler: CrawlerConfig::default(),
            browser: BrowserSettings::default(),
            storage: StorageConfig {
                database_path: "./modelcache.db".to_string(),
            },
            server: ServerConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = valid_config();
        config.crawler.batch_size = 0;

        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let mut config = valid_config();
        config.crawler.idle_interval_secs = 0;
        assert!(validate(&config).is_err());

        let mut config = valid_config();
        config.crawler.rescan_interval_secs = 0;
        assert!(validate(&config).is_err());

        let mut config = valid_config();
        config.crawler.navigation_timeout_secs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_database_path_rejected() {
        let mut config = valid_config();
        config.storage.database_path = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_listen_addr_rejected() {
        let mut config = valid_config();
        config.server.listen_addr = "not-an-address".to_string();

        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_port_only_listen_addr_rejected() {
        let mut config = valid_config();
        config.server.listen_addr = ":3000".to_string();
        assert!(validate(&config).is_err());
    }
}
