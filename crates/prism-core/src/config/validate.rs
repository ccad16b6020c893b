//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

/// Largest size limit whose byte count still fits in a `u64`.
const MAX_OBJECT_SIZE_MB: u64 = u64::MAX / (1024 * 1024);

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.workers == 0 {
            return Err(ConfigError::ValidationError(
                "pool.workers must be > 0".into(),
            ));
        }
        if self.pool.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "pool.queue_capacity must be > 0".into(),
            ));
        }
        if self.transport.max_tries == 0 {
            return Err(ConfigError::ValidationError(
                "transport.max_tries must be > 0".into(),
            ));
        }
        if self.transport.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "transport.request_timeout_ms must be > 0".into(),
            ));
        }
        if let Some(code) = self
            .transport
            .retryable_status_codes
            .iter()
            .find(|code| !(100..=599).contains(*code))
        {
            return Err(ConfigError::ValidationError(format!(
                "transport.retryable_status_codes contains invalid status {code}"
            )));
        }
        if self.storage.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.endpoint must not be empty".into(),
            ));
        }
        if self.convert.program.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "convert.program must not be empty".into(),
            ));
        }
        if self.limits.max_object_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_object_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_object_size_mb > MAX_OBJECT_SIZE_MB {
            return Err(ConfigError::ValidationError(format!(
                "limits.max_object_size_mb must be <= {MAX_OBJECT_SIZE_MB}"
            )));
        }
        for (name, value) in [
            ("limits.fetch_timeout_ms", self.limits.fetch_timeout_ms),
            ("limits.convert_timeout_ms", self.limits.convert_timeout_ms),
            ("limits.upload_timeout_ms", self.limits.upload_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }
}
