//! Allowance-increase workflow for one (owner, spender) pair.
//!
//! ```text
//! Idle --approve--> Pending --confirmed--> AwaitingAllowance --fresh read >= amount--> Idle
//!                      \--failed--> Idle (allowance unchanged)
//! ```
//!
//! A confirmed approval only settles once a fresh allowance read reflects the
//! approved amount, so staking never proceeds against a stale allowance.

use tracing::{debug, info, warn};

use crate::error::{Result, StakingError};
use crate::ledger::{allowance_or_zero, Amount, TokenLedger, TxStatus};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApprovalState<T> {
    Idle,
    Pending { tx: T, amount: Amount },
    AwaitingAllowance { amount: Amount },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApprovalPoll {
    /// Nothing outstanding.
    Idle,
    /// Waiting on the ledger (confirmation or a fresh allowance read).
    Pending,
    /// Approval confirmed and visible in the allowance.
    Settled { allowance: Amount },
}

pub struct ApprovalWorkflow<L: TokenLedger> {
    owner: Option<L::Address>,
    spender: L::Address,
    state: ApprovalState<L::TxId>,
    allowance: Option<Amount>,
}

impl<L: TokenLedger> ApprovalWorkflow<L> {
    pub fn new(owner: Option<L::Address>, spender: L::Address) -> Self {
        Self {
            owner,
            spender,
            state: ApprovalState::Idle,
            allowance: None,
        }
    }

    pub fn state(&self) -> &ApprovalState<L::TxId> {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        !matches!(self.state, ApprovalState::Idle)
    }

    /// Last allowance read; `None` until a read has succeeded.
    pub fn allowance(&self) -> Option<Amount> {
        self.allowance
    }

    pub fn spender(&self) -> &L::Address {
        &self.spender
    }

    /// Reads the allowance. Without a session the allowance is zero.
    pub fn refresh_allowance(&mut self, ledger: &L) -> Result<Amount> {
        match allowance_or_zero(ledger, self.owner.as_ref(), &self.spender) {
            Ok(value) => {
                self.allowance = Some(value);
                Ok(value)
            }
            Err(err) => {
                self.allowance = None;
                Err(err)
            }
        }
    }

    /// Submits an approval of `amount` for the spender.
    pub fn approve(&mut self, ledger: &L, amount: Amount) -> Result<L::TxId> {
        if amount == 0 {
            return Err(StakingError::InvalidAmount);
        }
        if self.is_pending() {
            return Err(StakingError::ApprovalInFlight);
        }
        let owner = self.owner.as_ref().ok_or(StakingError::NoSession)?;

        let tx = ledger.submit_approve(owner, &self.spender, amount)?;
        info!(%tx, amount, "approval submitted");
        self.state = ApprovalState::Pending {
            tx: tx.clone(),
            amount,
        };
        Ok(tx)
    }

    /// Advances the state machine by one ledger round trip.
    ///
    /// A failed transaction returns the workflow to idle and surfaces the
    /// failure. Read errors leave the state untouched so the next poll retries.
    pub fn poll(&mut self, ledger: &L) -> Result<ApprovalPoll> {
        match self.state.clone() {
            ApprovalState::Idle => Ok(ApprovalPoll::Idle),
            ApprovalState::Pending { tx, amount } => match ledger.tx_status(&tx)? {
                TxStatus::Pending => Ok(ApprovalPoll::Pending),
                TxStatus::Failed(reason) => {
                    warn!(%tx, %reason, "approval failed");
                    self.state = ApprovalState::Idle;
                    Err(StakingError::LedgerWrite(reason))
                }
                TxStatus::Confirmed => {
                    debug!(%tx, "approval confirmed, waiting for allowance");
                    self.state = ApprovalState::AwaitingAllowance { amount };
                    self.check_allowance(ledger, amount)
                }
            },
            ApprovalState::AwaitingAllowance { amount } => self.check_allowance(ledger, amount),
        }
    }

    fn check_allowance(&mut self, ledger: &L, amount: Amount) -> Result<ApprovalPoll> {
        let allowance = self.refresh_allowance(ledger)?;
        if allowance < amount {
            debug!(allowance, amount, "allowance read is stale");
            return Ok(ApprovalPoll::Pending);
        }
        info!(allowance, "approval settled");
        self.state = ApprovalState::Idle;
        Ok(ApprovalPoll::Settled { allowance })
    }
}
