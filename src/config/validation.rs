use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("jpeg_quality must be between 1 and 100, got {0}")]
    InvalidJpegQuality(u8),

    #[error("max_dimension must be positive")]
    InvalidMaxDimension,

    #[error("rate_limit must be positive")]
    InvalidRateLimit,

    #[error("rate_window_secs must be positive")]
    InvalidRateWindow,

    #[error("workers must be positive")]
    InvalidWorkerCount,

    #[error("channel_size must be positive")]
    InvalidChannelSize,

    #[error("cache ttl_secs must be positive")]
    InvalidCacheTtl,

    #[error("model timeout_secs must be positive")]
    InvalidModelTimeout,

    #[error("model endpoint must be an http/https URL, got '{0}'")]
    InvalidModelEndpoint(String),

    #[error("allowed_extensions must not be empty")]
    NoAllowedExtensions,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    if config.image.jpeg_quality == 0 || config.image.jpeg_quality > 100 {
        return Err(ValidationError::InvalidJpegQuality(config.image.jpeg_quality));
    }

    if config.image.max_dimension == 0 {
        return Err(ValidationError::InvalidMaxDimension);
    }

    if config.limits.rate_limit == 0 {
        return Err(ValidationError::InvalidRateLimit);
    }

    if config.limits.rate_window_secs == 0 {
        return Err(ValidationError::InvalidRateWindow);
    }

    if config.limits.workers == 0 {
        return Err(ValidationError::InvalidWorkerCount);
    }

    if config.limits.channel_size == 0 {
        return Err(ValidationError::InvalidChannelSize);
    }

    if config.cache.ttl_secs == 0 {
        return Err(ValidationError::InvalidCacheTtl);
    }

    if config.model.timeout_secs == 0 {
        return Err(ValidationError::InvalidModelTimeout);
    }

    if !config.model.endpoint.starts_with("http://")
        && !config.model.endpoint.starts_with("https://")
    {
        return Err(ValidationError::InvalidModelEndpoint(
            config.model.endpoint.clone(),
        ));
    }

    if config.server.allowed_extensions.is_empty() {
        return Err(ValidationError::NoAllowedExtensions);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_defaults() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_jpeg_quality() {
        let mut config = Config::default();
        config.image.jpeg_quality = 0;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidJpegQuality(0))
        ));

        config.image.jpeg_quality = 101;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidJpegQuality(101))
        ));
    }

    #[test]
    fn test_zero_workers() {
        let mut config = Config::default();
        config.limits.workers = 0;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidWorkerCount)
        ));
    }

    #[test]
    fn test_zero_rate_limit() {
        let mut config = Config::default();
        config.limits.rate_limit = 0;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidRateLimit)
        ));
    }

    #[test]
    fn test_bad_model_endpoint() {
        let mut config = Config::default();
        config.model.endpoint = "ftp://example.com".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidModelEndpoint(_))
        ));
    }

    #[test]
    fn test_empty_extensions() {
        let mut config = Config::default();
        config.server.allowed_extensions.clear();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::NoAllowedExtensions)
        ));
    }
}
