use crate::config::types::{
    Config, CrawlerConfig, FamilyConfig, IdentityConfig, OutputConfig, RetryConfig, SourceConfig,
    UserAgentConfig,
};
use crate::sites::KNOWN_SOURCE_TYPES;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_identity_config(&config.identity)?;
    validate_family_config(&config.family)?;
    validate_output_config(&config.output)?;
    validate_sources(&config.sources, &config.crawler)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.window_size < 1 {
        return Err(ConfigError::Validation(format!(
            "window_size must be >= 1, got {}",
            config.window_size
        )));
    }

    if config.max_pages < config.window_size {
        return Err(ConfigError::Validation(format!(
            "max_pages ({}) must be >= window_size ({})",
            config.max_pages, config.window_size
        )));
    }

    if !(5..=10).contains(&config.max_next_pages) {
        return Err(ConfigError::Validation(format!(
            "max_next_pages must be between 5 and 10, got {}",
            config.max_next_pages
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "retry max_attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.base_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "retry base_delay_ms ({}) must not exceed max_delay_ms ({})",
            config.base_delay_ms, config.max_delay_ms
        )));
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.identities.is_empty() {
        return Err(ConfigError::Validation(
            "at least one user-agent identity is required".to_string(),
        ));
    }

    if let Some(blank) = config.identities.iter().find(|i| i.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "user-agent identities cannot be blank, got '{}'",
            blank
        )));
    }

    Ok(())
}

fn validate_identity_config(config: &IdentityConfig) -> Result<(), ConfigError> {
    if config.cache_capacity == 0 {
        return Err(ConfigError::Validation(
            "identity cache_capacity must be >= 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_family_config(config: &FamilyConfig) -> Result<(), ConfigError> {
    if !(config.similarity_threshold > 0.0 && config.similarity_threshold <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "similarity_threshold must be in (0, 1], got {}",
            config.similarity_threshold
        )));
    }

    if config.centroid_sample_size < 1 {
        return Err(ConfigError::Validation(
            "centroid_sample_size must be >= 1".to_string(),
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

fn validate_sources(sources: &[SourceConfig], crawler: &CrawlerConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for source in sources {
        if source.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source name cannot be empty".to_string(),
            ));
        }

        if !names.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name '{}'",
                source.name
            )));
        }

        if !KNOWN_SOURCE_TYPES.contains(&source.source_type.as_str()) {
            return Err(ConfigError::Validation(format!(
                "source '{}' has unknown source-type '{}' (expected one of: {})",
                source.name,
                source.source_type,
                KNOWN_SOURCE_TYPES.join(", ")
            )));
        }

        let seed = Url::parse(&source.seed_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", source.seed_url, e))
        })?;

        if seed.scheme() != "http" && seed.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use http or https",
                source.seed_url
            )));
        }

        let window = source.window_size(crawler);
        let max_pages = source.max_pages(crawler);
        if window < 1 || max_pages < window {
            return Err(ConfigError::Validation(format!(
                "source '{}': max_pages ({}) must be >= window_size ({}) >= 1",
                source.name, max_pages, window
            )));
        }
    }

    Ok(())
}
