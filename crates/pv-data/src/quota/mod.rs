//! Capacity accounting for the size-limited session store

/// Logical capacity of the browser-local store (8 MiB)
pub const DEFAULT_QUOTA_LIMIT: usize = 8 * 1024 * 1024;

/// Share of the quota above which a write counts as "near quota"
pub const NEAR_QUOTA_RATIO: f64 = 0.8;

/// Projection of the store size after a pending write
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotaCheck {
    /// Bytes currently held by the store
    pub current_size: usize,
    /// Bytes the store would hold after the write
    pub estimated_new_size: usize,
    pub quota_limit: usize,
    pub is_near_quota: bool,
    pub would_exceed_quota: bool,
}

impl QuotaCheck {
    /// Project a write of `incoming` bytes replacing `replaced` bytes
    pub fn project(current_size: usize, replaced: usize, incoming: usize, quota_limit: usize) -> Self {
        let estimated_new_size = current_size.saturating_sub(replaced) + incoming;
        Self {
            current_size,
            estimated_new_size,
            quota_limit,
            is_near_quota: estimated_new_size as f64 > quota_limit as f64 * NEAR_QUOTA_RATIO,
            would_exceed_quota: estimated_new_size > quota_limit,
        }
    }
}

/// Current usage of the store
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageInfo {
    pub current_size: usize,
    pub quota_limit: usize,
    pub usage_percent: f64,
    pub is_near_quota: bool,
    /// Bytes left before the quota; zero when already over it
    pub remaining: usize,
}

impl StorageInfo {
    pub fn new(current_size: usize, quota_limit: usize) -> Self {
        let usage_percent = if quota_limit == 0 {
            100.0
        } else {
            current_size as f64 / quota_limit as f64 * 100.0
        };
        Self {
            current_size,
            quota_limit,
            usage_percent,
            is_near_quota: usage_percent > NEAR_QUOTA_RATIO * 100.0,
            remaining: quota_limit.saturating_sub(current_size),
        }
    }
}

/// Bytes a key/value pair occupies in the store
pub fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_thresholds() {
        let check = QuotaCheck::project(0, 0, 79, 100);
        assert!(!check.is_near_quota);
        assert!(!check.would_exceed_quota);

        let check = QuotaCheck::project(50, 0, 31, 100);
        assert!(check.is_near_quota);
        assert!(!check.would_exceed_quota);

        let check = QuotaCheck::project(50, 0, 51, 100);
        assert!(check.would_exceed_quota);
    }

    #[test]
    fn test_projection_discounts_replaced_bytes() {
        let check = QuotaCheck::project(90, 60, 60, 100);
        assert_eq!(check.estimated_new_size, 90);
        assert!(!check.would_exceed_quota);
    }

    #[test]
    fn test_storage_info() {
        let info = StorageInfo::new(90, 100);
        assert!(info.is_near_quota);
        assert_eq!(info.remaining, 10);

        let info = StorageInfo::new(120, 100);
        assert_eq!(info.remaining, 0);
    }
}
