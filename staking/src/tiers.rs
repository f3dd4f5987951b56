//! Fixed lock tier table.
//!
//! A tier index selects a lock duration and the APR displayed for it. The
//! table is a process-wide constant; nothing in this crate mutates it.

use serde::Serialize;

use crate::error::{Result, StakingError};

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Calendar month used for projected lock durations.
pub const SECONDS_PER_MONTH: i64 = 30 * SECONDS_PER_DAY;

/// APR denominator (100% = 10_000 basis points).
pub const BASIS_POINTS_DENOMINATOR: u32 = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct LockTier {
    pub duration_months: u32,
    /// Annual percentage rate in basis points.
    pub apr_bps: u32,
}

impl LockTier {
    pub const fn new(duration_months: u32, apr_bps: u32) -> Self {
        Self {
            duration_months,
            apr_bps,
        }
    }

    pub fn duration_seconds(&self) -> i64 {
        i64::from(self.duration_months) * SECONDS_PER_MONTH
    }

    /// "1 Month", "3 Months", ...
    pub fn duration_label(&self) -> String {
        if self.duration_months == 1 {
            "1 Month".to_string()
        } else {
            format!("{} Months", self.duration_months)
        }
    }

    /// APR as a percentage string, e.g. `"6.87%"`.
    pub fn apr_label(&self) -> String {
        format!("{}.{:02}%", self.apr_bps / 100, self.apr_bps % 100)
    }
}

pub const LOCK_TIERS: [LockTier; 6] = [
    LockTier::new(1, 57),
    LockTier::new(3, 172),
    LockTier::new(6, 344),
    LockTier::new(12, 687),
    LockTier::new(24, 1374),
    LockTier::new(48, 2787),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TierTable {
    tiers: &'static [LockTier],
}

impl Default for TierTable {
    fn default() -> Self {
        Self { tiers: &LOCK_TIERS }
    }
}

impl TierTable {
    pub const fn new(tiers: &'static [LockTier]) -> Self {
        Self { tiers }
    }

    pub fn get(&self, index: u64) -> Result<&LockTier> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.tiers.get(i))
            .ok_or(StakingError::UnknownTier(index))
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &LockTier)> {
        self.tiers.iter().enumerate()
    }
}
