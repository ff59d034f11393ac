//! Coalescer configuration.

use crate::error::{CoalesceError, Result};
use std::time::Duration;

/// Default coalescing window.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10);

/// Default flush threshold (64 KiB).
pub const DEFAULT_MAX_SIZE: usize = 64 * 1024;

/// Configuration shared by both coalescer variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoalescerConfig {
    /// Maximum time buffered bytes wait for more writes before being flushed.
    pub timeout: Duration,
    /// Buffer size at which a flush happens without waiting out `timeout`.
    pub max_size: usize,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}

impl CoalescerConfig {
    /// Creates a new configuration with custom settings.
    pub fn new(timeout: Duration, max_size: usize) -> Self {
        Self { timeout, max_size }
    }

    /// Validates the configuration.
    ///
    /// A zero timeout is allowed and disables the coalescing window.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(CoalesceError::InvalidConfig(
                "max_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CoalescerConfig::default();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.max_size, DEFAULT_MAX_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_zero_max_size() {
        let config = CoalescerConfig::new(Duration::from_millis(5), 0);
        assert!(matches!(
            config.validate(),
            Err(CoalesceError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_allows_zero_timeout() {
        let config = CoalescerConfig::new(Duration::ZERO, 1);
        assert!(config.validate().is_ok());
    }
}
