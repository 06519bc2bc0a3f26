use super::*;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &ServerConfig) -> ConfigResult<()> {
        Self::validate_server_settings(config)?;
        Self::validate_upstream(&config.upstream)?;
        Self::validate_limits(&config.limits, config.max_payload_size)?;
        Self::validate_rate_limit(&config.rate_limit)?;
        config.tags.validate()?;
        Ok(())
    }

    fn validate_server_settings(config: &ServerConfig) -> ConfigResult<()> {
        if config.host.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "host".to_string(),
            });
        }

        if config.max_payload_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_payload_size".to_string(),
                value: config.max_payload_size.to_string(),
                reason: "Must be > 0".to_string(),
            });
        }

        if let Some(level) = &config.log_level {
            if level.parse::<tracing::Level>().is_err() {
                return Err(ConfigError::InvalidValue {
                    field: "log_level".to_string(),
                    value: level.clone(),
                    reason: "Must be one of trace, debug, info, warn, error".to_string(),
                });
            }
        }

        Ok(())
    }

    fn validate_upstream(upstream: &UpstreamConfig) -> ConfigResult<()> {
        if !upstream.base_url.starts_with("http://") && !upstream.base_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue {
                field: "upstream.base_url".to_string(),
                value: upstream.base_url.clone(),
                reason: "URL must start with http:// or https://".to_string(),
            });
        }

        if upstream.model.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "upstream.model".to_string(),
            });
        }

        if upstream.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "upstream.max_tokens".to_string(),
                value: "0".to_string(),
                reason: "Must be > 0".to_string(),
            });
        }

        if upstream.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "upstream.request_timeout_secs".to_string(),
                value: "0".to_string(),
                reason: "Must be > 0".to_string(),
            });
        }

        if let Some(prompt) = &upstream.system_prompt {
            if prompt.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "upstream.system_prompt".to_string(),
                    value: String::new(),
                    reason: "Must not be blank".to_string(),
                });
            }
        }

        Ok(())
    }

    fn validate_limits(limits: &LimitsConfig, max_payload_size: usize) -> ConfigResult<()> {
        if limits.max_text_chars == 0 {
            return Err(ConfigError::InvalidValue {
                field: "limits.max_text_chars".to_string(),
                value: "0".to_string(),
                reason: "Must be > 0".to_string(),
            });
        }

        if limits.max_image_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "limits.max_image_bytes".to_string(),
                value: "0".to_string(),
                reason: "Must be > 0".to_string(),
            });
        }

        if limits.max_image_bytes > max_payload_size {
            return Err(ConfigError::IncompatibleConfig {
                reason: format!(
                    "limits.max_image_bytes ({}) exceeds max_payload_size ({})",
                    limits.max_image_bytes, max_payload_size
                ),
            });
        }

        Ok(())
    }

    fn validate_rate_limit(rate_limit: &RateLimitConfig) -> ConfigResult<()> {
        if rate_limit.window_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rate_limit.window_secs".to_string(),
                value: "0".to_string(),
                reason: "Must be > 0".to_string(),
            });
        }

        if rate_limit.max_requests == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rate_limit.max_requests".to_string(),
                value: "0".to_string(),
                reason: "Must be > 0".to_string(),
            });
        }

        Ok(())
    }
}
