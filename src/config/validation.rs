use crate::config::types::{Config, CrawlerConfig, StoreConfig, WorkerConfig};
use crate::worker::OUTPUT_PLACEHOLDER;
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_store_config(&config.store)?;
    validate_worker_config(&config.worker)?;
    validate_crawler_config(&config.crawler)?;
    Ok(())
}

/// Validates store configuration
fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates worker configuration
fn validate_worker_config(config: &WorkerConfig) -> Result<(), ConfigError> {
    if let Some(identity) = &config.identity {
        if identity.trim().is_empty() {
            return Err(ConfigError::Validation(
                "identity cannot be empty when set; omit it to use the host name".to_string(),
            ));
        }
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be >= 1, got {}",
            config.batch_size
        )));
    }

    if config.poll_interval_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "poll_interval_ms must be >= 100ms, got {}ms",
            config.poll_interval_ms
        )));
    }

    if config.output_root.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output_root cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.program.trim().is_empty() {
        return Err(ConfigError::Validation(
            "crawler program cannot be empty".to_string(),
        ));
    }

    if !config
        .args
        .iter()
        .any(|arg| arg.contains(OUTPUT_PLACEHOLDER))
    {
        return Err(ConfigError::Validation(format!(
            "crawler args must pass the output directory via '{}'",
            OUTPUT_PLACEHOLDER
        )));
    }

    Ok(())
}
