//! Configuration validation rules.
//!
//! Validation runs once when the engine is constructed; the options are
//! immutable afterwards.

use crate::config::CacheOptions;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl CacheOptions {
    /// Validate configuration values before the engine starts using them.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - any byte or entry bound is 0
    /// - `heuristic_percentage` is not within (0, 1]
    /// - `max_heuristic_duration_secs` or `max_stale_age_secs` is negative
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_memory_bytes == 0 {
            return Err(invalid("max_memory_bytes", "must be greater than 0"));
        }
        if self.max_memory_entries == 0 {
            return Err(invalid("max_memory_entries", "must be greater than 0"));
        }
        if self.max_disk_bytes == 0 {
            return Err(invalid("max_disk_bytes", "must be greater than 0"));
        }
        if self.max_disk_entries == 0 {
            return Err(invalid("max_disk_entries", "must be greater than 0"));
        }

        if !(self.heuristic_percentage > 0.0 && self.heuristic_percentage <= 1.0) {
            return Err(invalid("heuristic_percentage", "must be within (0, 1]"));
        }
        if self.max_heuristic_duration_secs < 0 {
            return Err(invalid("max_heuristic_duration_secs", "must not be negative"));
        }
        if self.max_stale_age_secs < 0 {
            return Err(invalid("max_stale_age_secs", "must not be negative"));
        }

        if self.max_memory_bytes > self.max_disk_bytes {
            tracing::warn!(
                max_memory_bytes = self.max_memory_bytes,
                max_disk_bytes = self.max_disk_bytes,
                "volatile tier is larger than the durable tier; promotions will rarely be rejected"
            );
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}
