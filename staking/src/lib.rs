//! Staking dashboard core for PageSwap.
//!
//! The ledger (token balances, allowances and stake positions) is external.
//! This crate sequences approval before staking, keeps at most one staking
//! transaction in flight, re-reads ledger state after every confirmed write,
//! and derives the totals and countdowns the dashboard displays.
//!
//! I/O lives behind [`ledger::TokenLedger`] and [`ledger::StakingLedger`];
//! [`aggregate`] and [`format`] are pure.

pub mod aggregate;
pub mod approval;
pub mod error;
pub mod format;
pub mod ledger;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tiers;
pub mod workflow;

pub use aggregate::{position_views, tier_display, total_staked, Dashboard, PositionView};
pub use approval::{ApprovalPoll, ApprovalState, ApprovalWorkflow};
pub use error::{Result, StakingError};
pub use format::{format_amount, format_remaining, parse_amount};
pub use ledger::{Amount, Position, Session, StakingLedger, Timestamp, TokenLedger, TxStatus};
pub use tiers::{LockTier, TierTable, LOCK_TIERS};
pub use workflow::{StakeAction, StakePoll, StakingWorkflow, WorkflowState};
