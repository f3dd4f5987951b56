use thiserror::Error;

use crate::ledger::Amount;

pub type Result<T> = std::result::Result<T, StakingError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StakingError {
    /// A read against the ledger failed. Treated as "unknown, retry on next poll".
    #[error("ledger read failed: {0}")]
    LedgerRead(String),

    /// The ledger rejected a submitted transaction, or it failed on-chain.
    #[error("ledger write failed: {0}")]
    LedgerWrite(String),

    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("an approval is already pending")]
    ApprovalInFlight,

    #[error("a staking transaction is already pending")]
    TransactionInFlight,

    #[error("allowance {allowance} is below the requested amount {required}")]
    InsufficientAllowance { allowance: Amount, required: Amount },

    #[error("position {index} is locked for another {remaining_seconds}s")]
    StillLocked { index: u64, remaining_seconds: i64 },

    #[error("lock tier {0} is not in the tier table")]
    UnknownTier(u64),

    #[error("position {index} does not exist ({count} positions)")]
    InvalidPosition { index: u64, count: usize },

    #[error("no wallet session is active")]
    NoSession,
}

impl StakingError {
    /// Whether re-polling the ledger may clear the error without user action.
    pub fn is_transient(&self) -> bool {
        matches!(self, StakingError::LedgerRead(_))
    }
}
