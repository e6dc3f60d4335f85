use std::time::Duration;

use crate::error::{ErrorCode, FlagKitError, Result};
use crate::types::DecideOptions;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_MAX_CACHE_SIZE: usize = 1000;
pub const DEFAULT_EVENT_BATCH_SIZE: usize = 10;
pub const DEFAULT_EVENT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_EVENT_QUEUE_SIZE: usize = 1000;

/// Client-wide settings.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub cache_enabled: bool,
    pub max_cache_size: usize,
    pub cache_ttl: Duration,
    pub events_enabled: bool,
    pub event_batch_size: usize,
    pub event_flush_interval: Duration,
    pub max_event_queue_size: usize,
    /// Fraction of events kept, in `[0.0, 1.0]`.
    pub event_sample_rate: f64,
    /// Merged into the options of every decide call.
    pub default_decide_options: DecideOptions,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            cache_ttl: DEFAULT_CACHE_TTL,
            events_enabled: true,
            event_batch_size: DEFAULT_EVENT_BATCH_SIZE,
            event_flush_interval: DEFAULT_EVENT_FLUSH_INTERVAL,
            max_event_queue_size: DEFAULT_MAX_EVENT_QUEUE_SIZE,
            event_sample_rate: 1.0,
            default_decide_options: DecideOptions::empty(),
        }
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ClientOptionsBuilder {
        ClientOptionsBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_enabled && self.max_cache_size == 0 {
            return Err(FlagKitError::config_error(
                ErrorCode::ConfigInvalidOption,
                "Cache size must be positive when caching is enabled",
            ));
        }

        if self.cache_enabled && self.cache_ttl.is_zero() {
            return Err(FlagKitError::config_error(
                ErrorCode::ConfigInvalidOption,
                "Cache TTL must be positive",
            ));
        }

        if self.event_batch_size == 0 {
            return Err(FlagKitError::config_error(
                ErrorCode::ConfigInvalidOption,
                "Event batch size must be positive",
            ));
        }

        if self.max_event_queue_size == 0 {
            return Err(FlagKitError::config_error(
                ErrorCode::ConfigInvalidOption,
                "Event queue size must be positive",
            ));
        }

        if self.event_flush_interval.is_zero() {
            return Err(FlagKitError::config_error(
                ErrorCode::ConfigInvalidOption,
                "Event flush interval must be positive",
            ));
        }

        if !(0.0..=1.0).contains(&self.event_sample_rate) {
            return Err(FlagKitError::config_error(
                ErrorCode::ConfigInvalidOption,
                format!("Event sample rate {} is outside [0, 1]", self.event_sample_rate),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ClientOptionsBuilder {
    options: ClientOptions,
}

impl ClientOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.options.cache_enabled = enabled;
        self
    }

    pub fn max_cache_size(mut self, size: usize) -> Self {
        self.options.max_cache_size = size;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.options.cache_ttl = ttl;
        self
    }

    pub fn events_enabled(mut self, enabled: bool) -> Self {
        self.options.events_enabled = enabled;
        self
    }

    pub fn event_batch_size(mut self, size: usize) -> Self {
        self.options.event_batch_size = size;
        self
    }

    pub fn event_flush_interval(mut self, interval: Duration) -> Self {
        self.options.event_flush_interval = interval;
        self
    }

    pub fn max_event_queue_size(mut self, size: usize) -> Self {
        self.options.max_event_queue_size = size;
        self
    }

    pub fn event_sample_rate(mut self, rate: f64) -> Self {
        self.options.event_sample_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn default_decide_options(mut self, options: impl Into<DecideOptions>) -> Self {
        self.options.default_decide_options = options.into();
        self
    }

    pub fn build(self) -> ClientOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DecideOption;

    #[test]
    fn test_defaults() {
        let options = ClientOptions::default();
        assert!(options.cache_enabled);
        assert_eq!(options.max_cache_size, 1000);
        assert_eq!(options.cache_ttl, Duration::from_secs(300));
        assert!(options.events_enabled);
        assert_eq!(options.event_batch_size, 10);
        assert_eq!(options.event_flush_interval, Duration::from_secs(30));
        assert_eq!(options.max_event_queue_size, 1000);
        assert!(options.default_decide_options.is_empty());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let options = ClientOptions::builder()
            .cache_enabled(false)
            .max_cache_size(50)
            .event_batch_size(25)
            .event_sample_rate(1.7)
            .default_decide_options(DecideOption::IncludeReasons)
            .build();

        assert!(!options.cache_enabled);
        assert_eq!(options.max_cache_size, 50);
        assert_eq!(options.event_batch_size, 25);
        assert_eq!(options.event_sample_rate, 1.0);
        assert!(options
            .default_decide_options
            .contains(DecideOption::IncludeReasons));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let error = ClientOptions::builder().max_cache_size(0).build().validate().unwrap_err();
        assert_eq!(error.code, ErrorCode::ConfigInvalidOption);

        assert!(ClientOptions::builder().cache_ttl(Duration::ZERO).build().validate().is_err());
        assert!(ClientOptions::builder().event_batch_size(0).build().validate().is_err());
        assert!(ClientOptions::builder().max_event_queue_size(0).build().validate().is_err());

        // A zero cache size is fine when caching is off.
        assert!(ClientOptions::builder()
            .cache_enabled(false)
            .max_cache_size(0)
            .build()
            .validate()
            .is_ok());
    }
}
