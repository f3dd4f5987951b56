//! Boundary to the external ledger.
//!
//! The ledger owns balances, allowances and stake positions. Everything this
//! crate holds is a refreshable copy; writes are submitted and then polled
//! until the ledger reports a final status.

use std::fmt::{Debug, Display};

use serde::Serialize;

use crate::error::Result;

/// Token amount in the smallest unit.
pub type Amount = u64;

/// Seconds since the unix epoch.
pub type Timestamp = i64;

/// One stake action as recorded by the ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Position {
    pub principal: Amount,
    pub start_time: Timestamp,
    pub lock_duration_seconds: i64,
    pub tier: u64,
    pub last_claim_time: Timestamp,
}

impl Position {
    /// Instant from which the position may be unstaked.
    pub fn unlock_time(&self) -> Timestamp {
        self.start_time.saturating_add(self.lock_duration_seconds)
    }

    pub fn is_unlocked(&self, now: Timestamp) -> bool {
        now >= self.unlock_time()
    }

    /// Seconds until unlock; zero or negative once unlocked.
    pub fn remaining_seconds(&self, now: Timestamp) -> i64 {
        self.unlock_time().saturating_sub(now)
    }
}

/// Final or in-progress state of a submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed(String),
}

/// Read-only token queries plus the allowance-increase write.
pub trait TokenLedger {
    type Address: Clone + Debug + PartialEq;
    type TxId: Clone + Debug + Display + PartialEq;

    fn balance_of(&self, owner: &Self::Address) -> Result<Amount>;

    fn allowance(&self, owner: &Self::Address, spender: &Self::Address) -> Result<Amount>;

    fn submit_approve(
        &self,
        owner: &Self::Address,
        spender: &Self::Address,
        amount: Amount,
    ) -> Result<Self::TxId>;

    fn tx_status(&self, tx: &Self::TxId) -> Result<TxStatus>;
}

/// Staking program queries and writes.
pub trait StakingLedger: TokenLedger {
    /// The address allowed to pull staked tokens from the owner.
    fn spender(&self) -> Self::Address;

    fn user_stakes(&self, owner: &Self::Address) -> Result<Vec<Position>>;

    fn total_pending_rewards(&self, owner: &Self::Address) -> Result<Amount>;

    fn submit_stake(&self, owner: &Self::Address, amount: Amount, tier: u64)
        -> Result<Self::TxId>;

    fn submit_unstake(&self, owner: &Self::Address, index: u64) -> Result<Self::TxId>;

    fn submit_claim_rewards(&self, owner: &Self::Address, index: u64) -> Result<Self::TxId>;
}

/// External wallet session. Key material never passes through this crate.
pub trait Session {
    type Address;

    /// `None` while no session is active.
    fn owner(&self) -> Option<Self::Address>;
}

/// Balance read that treats an absent session as a zero balance.
pub fn balance_or_zero<L: TokenLedger>(ledger: &L, owner: Option<&L::Address>) -> Result<Amount> {
    match owner {
        Some(owner) => ledger.balance_of(owner),
        None => Ok(0),
    }
}

/// Allowance read that treats an absent session as a zero allowance.
pub fn allowance_or_zero<L: TokenLedger>(
    ledger: &L,
    owner: Option<&L::Address>,
    spender: &L::Address,
) -> Result<Amount> {
    match owner {
        Some(owner) => ledger.allowance(owner, spender),
        None => Ok(0),
    }
}
