//! Timeout validation utilities for browser operations

use std::time::Duration;

use crate::utils::errors::CatalogueError;

/// Maximum timeout for browser navigation operations (5 minutes)
/// Covers slow-loading pages, the RSS tab and downloads
pub const MAX_NAVIGATION_TIMEOUT_MS: u64 = 300_000; // 5 minutes

/// Maximum timeout for element interaction operations (30 seconds)
pub const MAX_INTERACTION_TIMEOUT_MS: u64 = 30_000; // 30 seconds

/// Validate timeout for navigation-class waits (goto, new tab, download)
///
/// # Returns
/// * `Ok(Duration)` - Validated Duration object
/// * `Err(CatalogueError::Config)` - If timeout is zero or exceeds MAX_NAVIGATION_TIMEOUT_MS
pub fn validate_navigation_timeout(ms: u64) -> Result<Duration, CatalogueError> {
    if ms == 0 || ms > MAX_NAVIGATION_TIMEOUT_MS {
        return Err(CatalogueError::Config(format!(
            "Timeout must be between 1ms and {}ms ({} minutes). Received: {}ms ({:.1} minutes)",
            MAX_NAVIGATION_TIMEOUT_MS,
            MAX_NAVIGATION_TIMEOUT_MS / 60_000,
            ms,
            ms as f64 / 60_000.0
        )));
    }

    Ok(Duration::from_millis(ms))
}

/// Validate timeout for element interaction operations (selector waits)
pub fn validate_interaction_timeout(ms: u64) -> Result<Duration, CatalogueError> {
    if ms == 0 || ms > MAX_INTERACTION_TIMEOUT_MS {
        return Err(CatalogueError::Config(format!(
            "Timeout must be between 1ms and {}ms ({} seconds). Received: {}ms ({} seconds)",
            MAX_INTERACTION_TIMEOUT_MS,
            MAX_INTERACTION_TIMEOUT_MS / 1000,
            ms,
            ms / 1000
        )));
    }

    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_timeout_accepts_the_ceiling() {
        let timeout = validate_navigation_timeout(MAX_NAVIGATION_TIMEOUT_MS).unwrap();
        assert_eq!(timeout, Duration::from_secs(300));
    }

    #[test]
    fn navigation_timeout_rejects_zero_and_overflow() {
        assert!(validate_navigation_timeout(0).is_err());
        assert!(validate_navigation_timeout(MAX_NAVIGATION_TIMEOUT_MS + 1).is_err());
    }

    #[test]
    fn interaction_timeout_is_capped_at_thirty_seconds() {
        assert!(validate_interaction_timeout(10_000).is_ok());
        let err = validate_interaction_timeout(45_000).unwrap_err();
        assert!(matches!(err, CatalogueError::Config(_)));
    }
}
