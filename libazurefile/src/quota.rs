//! Share quota bounds.

use crate::error::QuotaError;

/// Smallest quota, in GiB, a standard file share accepts.
pub const DEFAULT_MIN_QUOTA_GIB: i64 = 1;
/// Largest quota, in GiB, a standard file share accepts.
pub const DEFAULT_MAX_QUOTA_GIB: i64 = 5120;

/// Inclusive `[min, max]` quota range enforced by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    min_gib: i64,
    max_gib: i64,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            min_gib: DEFAULT_MIN_QUOTA_GIB,
            max_gib: DEFAULT_MAX_QUOTA_GIB,
        }
    }
}

impl QuotaPolicy {
    /// Returns `None` when `min > max` or `min < 1`.
    pub fn new(min_gib: i64, max_gib: i64) -> Option<Self> {
        (min_gib >= 1 && min_gib <= max_gib).then_some(Self { min_gib, max_gib })
    }

    pub fn min_gib(&self) -> i64 {
        self.min_gib
    }

    pub fn max_gib(&self) -> i64 {
        self.max_gib
    }

    pub fn validate(&self, requested_gib: i64) -> Result<(), QuotaError> {
        if (self.min_gib..=self.max_gib).contains(&requested_gib) {
            Ok(())
        } else {
            Err(QuotaError::OutOfRange {
                value: requested_gib,
                min: self.min_gib,
                max: self.max_gib,
            })
        }
    }

    /// Shares only ever grow: a request at or below the current size needs no
    /// backend change.
    pub fn needs_growth(&self, current_gib: i64, requested_gib: i64) -> bool {
        current_gib < requested_gib
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bounds() {
        let policy = QuotaPolicy::default();
        assert!(policy.validate(1).is_ok());
        assert!(policy.validate(5120).is_ok());
        for value in [-2, 0, 5121, 6000] {
            assert_eq!(
                policy.validate(value),
                Err(QuotaError::OutOfRange {
                    value,
                    min: 1,
                    max: 5120
                })
            );
        }
    }

    #[test]
    fn configurable_bounds() {
        let policy = QuotaPolicy::new(100, 102_400).unwrap();
        assert!(policy.validate(6000).is_ok());
        assert!(policy.validate(99).is_err());
        assert!(QuotaPolicy::new(10, 5).is_none());
        assert!(QuotaPolicy::new(0, 5).is_none());
    }

    #[test]
    fn shrink_never_needs_growth() {
        let policy = QuotaPolicy::default();
        assert!(!policy.needs_growth(10, 10));
        assert!(!policy.needs_growth(10, 5));
        assert!(!policy.needs_growth(0, -2));
        assert!(policy.needs_growth(10, 11));
    }
}
