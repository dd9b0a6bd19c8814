//! Crawler module - scheduling and fetch dispatch
//!
//! This module contains the core crawling logic, including:
//! - Politeness mode presets and their concurrency/interval budgets
//! - The dispatch gate (rate limiting and global backoff)
//! - The scheduler poll loop and status transitions
//! - The fetch executor contract

mod executor;
mod gate;
mod scheduler;

pub use executor::{ExtractedFields, FetchError, FetchExecutor};
pub use gate::DispatchGate;
pub use scheduler::{Scheduler, SchedulerTiming};

use crate::ModelCacheError;
use std::time::Duration;

/// Recognized politeness modes
///
/// Each mode is a preset pairing a concurrency limit with a minimum interval
/// between dispatches. `gentle` issues at most one fetch every 25 seconds;
/// `full` runs up to five fetches with one dispatch per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlMode {
    Gentle,
    Full,
}

impl CrawlMode {
    /// Parses a mode string from the control surface
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlMode)` - A recognized mode
    /// * `Err(ModelCacheError::InvalidMode)` - Anything else
    pub fn parse(s: &str) -> Result<Self, ModelCacheError> {
        match s {
            "gentle" => Ok(Self::Gentle),
            "full" => Ok(Self::Full),
            other => Err(ModelCacheError::InvalidMode(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gentle => "gentle",
            Self::Full => "full",
        }
    }

    /// Returns the concurrency/interval budget for this mode
    pub fn settings(&self) -> CrawlSettings {
        match self {
            Self::Gentle => CrawlSettings {
                concurrency_limit: 1,
                min_dispatch_interval: Duration::from_secs(25),
            },
            Self::Full => CrawlSettings {
                concurrency_limit: 5,
                min_dispatch_interval: Duration::from_secs(1),
            },
        }
    }
}

impl std::fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The concurrency and pacing budget the scheduler runs under
#[derive(Debug, Clone, Copy)]
pub struct CrawlSettings {
    /// Maximum number of items in flight (dispatched or in progress)
    pub concurrency_limit: usize,

    /// Minimum time between two dispatches, regardless of free slots
    pub min_dispatch_interval: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_modes() {
        assert_eq!(CrawlMode::parse("gentle").unwrap(), CrawlMode::Gentle);
        assert_eq!(CrawlMode::parse("full").unwrap(), CrawlMode::Full);
    }

    #[test]
    fn test_parse_unknown_mode() {
        for bad in ["turbo", "GENTLE", "", "Full"] {
            let err = CrawlMode::parse(bad).unwrap_err();
            assert!(matches!(err, ModelCacheError::InvalidMode(_)));
        }
    }

    #[test]
    fn test_gentle_preset() {
        let settings = CrawlMode::Gentle.settings();
        assert_eq!(settings.concurrency_limit, 1);
        assert_eq!(settings.min_dispatch_interval, Duration::from_secs(25));
    }

    #[test]
    fn test_full_preset() {
        let settings = CrawlMode::Full.settings();
        assert_eq!(settings.concurrency_limit, 5);
        assert_eq!(settings.min_dispatch_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(CrawlMode::Gentle.to_string(), "gentle");
        assert_eq!(CrawlMode::Full.to_string(), "full");
    }
}
