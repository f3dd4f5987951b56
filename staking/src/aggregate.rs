//! Derived dashboard state.
//!
//! Pure functions over the last ledger snapshot. Lock status is computed from
//! the `now` passed in on every call and never cached.

use serde::Serialize;

use crate::error::Result;
use crate::format::format_remaining;
use crate::ledger::{Amount, Position, Timestamp};
use crate::tiers::{LockTier, TierTable};

/// Sum of principal over all positions, in a wide accumulator.
pub fn total_staked(positions: &[Position]) -> u128 {
    positions
        .iter()
        .map(|position| u128::from(position.principal))
        .sum()
}

/// The tier table entry for a position.
pub fn tier_display<'a>(position: &Position, tiers: &'a TierTable) -> Result<&'a LockTier> {
    tiers.get(position.tier)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PositionView {
    pub index: u64,
    pub position: Position,
    /// `Err(UnknownTier)` when the ledger reports a tier outside the table.
    pub tier: Result<LockTier>,
    pub unlocked: bool,
    pub remaining: String,
}

pub fn position_views(positions: &[Position], tiers: &TierTable, now: Timestamp) -> Vec<PositionView> {
    positions
        .iter()
        .enumerate()
        .map(|(index, position)| PositionView {
            index: index as u64,
            position: *position,
            tier: tier_display(position, tiers).copied(),
            unlocked: position.is_unlocked(now),
            remaining: format_remaining(position.remaining_seconds(now)),
        })
        .collect()
}

/// Last known ledger state for one owner.
///
/// Each field is `None` when its most recent read failed; callers render a
/// placeholder for it rather than zero.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub balance: Option<Amount>,
    pub allowance: Option<Amount>,
    pub positions: Option<Vec<Position>>,
    pub pending_rewards: Option<Amount>,
}

impl Dashboard {
    /// Snapshot for an absent session.
    pub fn empty() -> Self {
        Self {
            balance: Some(0),
            allowance: Some(0),
            positions: Some(Vec::new()),
            pending_rewards: Some(0),
        }
    }

    pub fn total_staked(&self) -> Option<u128> {
        self.positions.as_deref().map(total_staked)
    }

    pub fn position_views(&self, tiers: &TierTable, now: Timestamp) -> Option<Vec<PositionView>> {
        self.positions
            .as_deref()
            .map(|positions| position_views(positions, tiers, now))
    }

    /// Principal that can be withdrawn at `now`.
    pub fn unlocked_principal(&self, now: Timestamp) -> Option<u128> {
        self.positions.as_deref().map(|positions| {
            positions
                .iter()
                .filter(|position| position.is_unlocked(now))
                .map(|position| u128::from(position.principal))
                .sum()
        })
    }

    pub fn is_complete(&self) -> bool {
        self.balance.is_some()
            && self.allowance.is_some()
            && self.positions.is_some()
            && self.pending_rewards.is_some()
    }
}
