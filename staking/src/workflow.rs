//! Stake, unstake and reward-claim workflow.
//!
//! Single-flight: while one transaction is outstanding every new request is
//! rejected with [`StakingError::TransactionInFlight`]. A confirmed
//! transaction is only settled after the dashboard has been re-read from the
//! ledger.

use std::fmt;

use tracing::{debug, info, warn};

use crate::aggregate::Dashboard;
use crate::approval::ApprovalWorkflow;
use crate::error::{Result, StakingError};
use crate::ledger::{Amount, Position, StakingLedger, Timestamp, TxStatus};
use crate::tiers::TierTable;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StakeAction {
    Stake { amount: Amount, tier: u64 },
    Unstake { index: u64 },
    ClaimRewards { index: u64 },
}

impl fmt::Display for StakeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StakeAction::Stake { amount, tier } => write!(f, "stake {} (tier {})", amount, tier),
            StakeAction::Unstake { index } => write!(f, "unstake #{}", index),
            StakeAction::ClaimRewards { index } => write!(f, "claim rewards #{}", index),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkflowState<T> {
    Idle,
    Pending { tx: T, action: StakeAction },
    /// Confirmed on the ledger, waiting for a successful re-read.
    Refreshing { action: StakeAction },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StakePoll {
    Idle,
    Pending,
    Settled(StakeAction),
}

pub struct StakingWorkflow<L: StakingLedger> {
    owner: Option<L::Address>,
    tiers: TierTable,
    state: WorkflowState<L::TxId>,
    dashboard: Dashboard,
}

impl<L: StakingLedger> StakingWorkflow<L> {
    pub fn new(owner: Option<L::Address>, tiers: TierTable) -> Self {
        Self {
            owner,
            tiers,
            state: WorkflowState::Idle,
            dashboard: Dashboard::default(),
        }
    }

    pub fn owner(&self) -> Option<&L::Address> {
        self.owner.as_ref()
    }

    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    pub fn state(&self) -> &WorkflowState<L::TxId> {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        !matches!(self.state, WorkflowState::Idle)
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    /// Re-reads balance, allowance, positions and pending rewards.
    ///
    /// Every field is attempted; a failed read leaves that field unknown and
    /// the first failure is returned.
    pub fn refresh(&mut self, ledger: &L) -> Result<()> {
        let Some(owner) = self.owner.as_ref() else {
            self.dashboard = Dashboard::empty();
            return Ok(());
        };

        let spender = ledger.spender();
        let balance = ledger.balance_of(owner);
        let allowance = ledger.allowance(owner, &spender);
        let positions = ledger.user_stakes(owner);
        let pending_rewards = ledger.total_pending_rewards(owner);

        let first_error = [
            balance.as_ref().err(),
            allowance.as_ref().err(),
            positions.as_ref().err(),
            pending_rewards.as_ref().err(),
        ]
        .into_iter()
        .flatten()
        .next()
        .cloned();

        self.dashboard = Dashboard {
            balance: balance.ok(),
            allowance: allowance.ok(),
            positions: positions.ok(),
            pending_rewards: pending_rewards.ok(),
        };

        match first_error {
            Some(err) => {
                warn!(%err, "dashboard refresh incomplete");
                Err(err)
            }
            None => {
                debug!("dashboard refreshed");
                Ok(())
            }
        }
    }

    /// Submits a new stake of `amount` under lock tier `tier`.
    ///
    /// Never approves on its own: if the fresh allowance read is short the
    /// caller has to run the approval workflow first.
    pub fn stake(
        &mut self,
        ledger: &L,
        approval: &ApprovalWorkflow<L>,
        amount: Amount,
        tier: u64,
    ) -> Result<L::TxId> {
        self.ensure_idle()?;
        if amount == 0 {
            return Err(StakingError::InvalidAmount);
        }
        self.tiers.get(tier)?;
        let owner = self.owner.as_ref().ok_or(StakingError::NoSession)?;
        if approval.is_pending() {
            return Err(StakingError::ApprovalInFlight);
        }

        let allowance = ledger.allowance(owner, &ledger.spender())?;
        self.dashboard.allowance = Some(allowance);
        if allowance < amount {
            return Err(StakingError::InsufficientAllowance {
                allowance,
                required: amount,
            });
        }

        let tx = ledger.submit_stake(owner, amount, tier)?;
        self.begin(tx.clone(), StakeAction::Stake { amount, tier });
        Ok(tx)
    }

    /// Submits an unstake of position `index`, which must be unlocked at `now`.
    pub fn unstake(&mut self, ledger: &L, index: u64, now: Timestamp) -> Result<L::TxId> {
        self.ensure_idle()?;
        let position = self.fresh_position(ledger, index)?;
        if !position.is_unlocked(now) {
            return Err(StakingError::StillLocked {
                index,
                remaining_seconds: position.remaining_seconds(now),
            });
        }

        let owner = self.owner.as_ref().ok_or(StakingError::NoSession)?;
        let tx = ledger.submit_unstake(owner, index)?;
        self.begin(tx.clone(), StakeAction::Unstake { index });
        Ok(tx)
    }

    /// Submits a reward claim for position `index`. Allowed while locked.
    pub fn claim_rewards(&mut self, ledger: &L, index: u64) -> Result<L::TxId> {
        self.ensure_idle()?;
        self.fresh_position(ledger, index)?;

        let owner = self.owner.as_ref().ok_or(StakingError::NoSession)?;
        let tx = ledger.submit_claim_rewards(owner, index)?;
        self.begin(tx.clone(), StakeAction::ClaimRewards { index });
        Ok(tx)
    }

    /// Advances the outstanding transaction by one ledger round trip.
    pub fn poll(&mut self, ledger: &L) -> Result<StakePoll> {
        match self.state.clone() {
            WorkflowState::Idle => Ok(StakePoll::Idle),
            WorkflowState::Pending { tx, action } => match ledger.tx_status(&tx)? {
                TxStatus::Pending => Ok(StakePoll::Pending),
                TxStatus::Failed(reason) => {
                    warn!(%tx, %action, %reason, "transaction failed");
                    self.state = WorkflowState::Idle;
                    Err(StakingError::LedgerWrite(reason))
                }
                TxStatus::Confirmed => {
                    debug!(%tx, %action, "transaction confirmed");
                    self.state = WorkflowState::Refreshing { action };
                    self.settle(ledger, action)
                }
            },
            WorkflowState::Refreshing { action } => self.settle(ledger, action),
        }
    }

    fn settle(&mut self, ledger: &L, action: StakeAction) -> Result<StakePoll> {
        self.refresh(ledger)?;
        info!(%action, "transaction settled");
        self.state = WorkflowState::Idle;
        Ok(StakePoll::Settled(action))
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.is_pending() {
            return Err(StakingError::TransactionInFlight);
        }
        Ok(())
    }

    fn fresh_position(&mut self, ledger: &L, index: u64) -> Result<Position> {
        let owner = self.owner.as_ref().ok_or(StakingError::NoSession)?;
        let positions = ledger.user_stakes(owner)?;
        let position = usize::try_from(index)
            .ok()
            .and_then(|i| positions.get(i))
            .copied()
            .ok_or(StakingError::InvalidPosition {
                index,
                count: positions.len(),
            })?;
        self.dashboard.positions = Some(positions);
        Ok(position)
    }

    fn begin(&mut self, tx: L::TxId, action: StakeAction) {
        info!(%tx, %action, "transaction submitted");
        self.state = WorkflowState::Pending { tx, action };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::ApprovalPoll;
    use crate::testing::{MockLedger, Write};
    use crate::tiers::LOCK_TIERS;

    const ALICE: &str = "alice";

    fn setup() -> (MockLedger, ApprovalWorkflow<MockLedger>, StakingWorkflow<MockLedger>) {
        let ledger = MockLedger::default();
        ledger.set_balance(ALICE, 1_000);
        let approval = ApprovalWorkflow::new(Some(ALICE.to_string()), MockLedger::SPENDER.to_string());
        let staking = StakingWorkflow::new(Some(ALICE.to_string()), TierTable::default());
        (ledger, approval, staking)
    }

    #[test]
    fn stake_without_allowance_never_writes() {
        let (ledger, approval, mut staking) = setup();
        ledger.set_allowance(ALICE, 99);
        assert_eq!(
            staking.stake(&ledger, &approval, 100, 0),
            Err(StakingError::InsufficientAllowance {
                allowance: 99,
                required: 100
            })
        );
        assert!(ledger.writes().is_empty());
        assert!(!staking.is_pending());
    }

    #[test]
    fn stake_validates_amount_and_tier() {
        let (ledger, approval, mut staking) = setup();
        ledger.set_allowance(ALICE, 1_000);
        assert_eq!(staking.stake(&ledger, &approval, 0, 0), Err(StakingError::InvalidAmount));
        assert_eq!(
            staking.stake(&ledger, &approval, 10, LOCK_TIERS.len() as u64),
            Err(StakingError::UnknownTier(6))
        );
        assert!(ledger.writes().is_empty());
    }

    #[test]
    fn approve_then_stake_settles_with_new_position() {
        let (ledger, mut approval, mut staking) = setup();
        ledger.set_now(5_000);

        let tx = approval.approve(&ledger, 300).unwrap();
        assert_eq!(
            staking.stake(&ledger, &approval, 300, 1),
            Err(StakingError::ApprovalInFlight)
        );
        ledger.confirm(tx);
        assert_eq!(approval.poll(&ledger), Ok(ApprovalPoll::Settled { allowance: 300 }));

        let tx = staking.stake(&ledger, &approval, 300, 1).unwrap();
        assert_eq!(staking.poll(&ledger), Ok(StakePoll::Pending));
        ledger.confirm(tx);
        assert_eq!(
            staking.poll(&ledger),
            Ok(StakePoll::Settled(StakeAction::Stake { amount: 300, tier: 1 }))
        );

        let dashboard = staking.dashboard();
        assert_eq!(dashboard.total_staked(), Some(300));
        assert_eq!(dashboard.balance, Some(700));
        assert_eq!(dashboard.allowance, Some(0));
        let positions = dashboard.positions.as_ref().unwrap();
        assert_eq!(positions[0].start_time, 5_000);
        assert_eq!(positions[0].last_claim_time, 5_000);
        assert_eq!(positions[0].tier, 1);
    }

    #[test]
    fn any_request_while_pending_is_rejected() {
        let (ledger, approval, mut staking) = setup();
        ledger.set_allowance(ALICE, 1_000);
        ledger.push_position(ALICE, Position::default());
        let tx = staking.stake(&ledger, &approval, 100, 0).unwrap();

        assert_eq!(
            staking.stake(&ledger, &approval, 100, 0),
            Err(StakingError::TransactionInFlight)
        );
        assert_eq!(staking.unstake(&ledger, 0, 0), Err(StakingError::TransactionInFlight));
        assert_eq!(staking.claim_rewards(&ledger, 0), Err(StakingError::TransactionInFlight));
        assert_eq!(ledger.writes().len(), 1);
        assert_eq!(
            staking.state(),
            &WorkflowState::Pending {
                tx,
                action: StakeAction::Stake { amount: 100, tier: 0 }
            }
        );
    }

    #[test]
    fn stake_is_rejected_while_a_claim_is_pending() {
        let (ledger, approval, mut staking) = setup();
        ledger.set_allowance(ALICE, 1_000);
        ledger.push_position(ALICE, Position::default());
        let tx = staking.claim_rewards(&ledger, 0).unwrap();

        assert_eq!(
            staking.stake(&ledger, &approval, 100, 0),
            Err(StakingError::TransactionInFlight)
        );
        assert_eq!(ledger.writes().len(), 1);
        assert_eq!(
            staking.state(),
            &WorkflowState::Pending {
                tx,
                action: StakeAction::ClaimRewards { index: 0 }
            }
        );
    }

    #[test]
    fn stake_is_rejected_while_an_unstake_is_pending() {
        let (ledger, approval, mut staking) = setup();
        ledger.set_allowance(ALICE, 1_000);
        ledger.push_position(ALICE, Position::default());
        let tx = staking.unstake(&ledger, 0, 0).unwrap();

        assert_eq!(
            staking.stake(&ledger, &approval, 100, 0),
            Err(StakingError::TransactionInFlight)
        );
        assert_eq!(
            ledger.writes(),
            vec![Write::Unstake {
                owner: ALICE.to_string(),
                index: 0
            }]
        );

        ledger.confirm(tx);
        assert_eq!(
            staking.poll(&ledger),
            Ok(StakePoll::Settled(StakeAction::Unstake { index: 0 }))
        );
        assert!(staking.stake(&ledger, &approval, 100, 0).is_ok());
    }

    #[test]
    fn unstake_of_locked_position_never_writes() {
        let (ledger, _, mut staking) = setup();
        ledger.push_position(
            ALICE,
            Position {
                principal: 50,
                start_time: 1_000,
                lock_duration_seconds: 500,
                tier: 0,
                last_claim_time: 1_000,
            },
        );
        assert_eq!(
            staking.unstake(&ledger, 0, 1_499),
            Err(StakingError::StillLocked {
                index: 0,
                remaining_seconds: 1
            })
        );
        assert!(ledger.writes().is_empty());
        assert!(staking.unstake(&ledger, 0, 1_500).is_ok());
        assert_eq!(
            ledger.writes(),
            vec![Write::Unstake {
                owner: ALICE.to_string(),
                index: 0
            }]
        );
    }

    #[test]
    fn unstake_returns_principal_after_settlement() {
        let (ledger, _, mut staking) = setup();
        ledger.push_position(
            ALICE,
            Position {
                principal: 50,
                ..Position::default()
            },
        );
        let tx = staking.unstake(&ledger, 0, 10).unwrap();
        ledger.confirm(tx);
        assert_eq!(
            staking.poll(&ledger),
            Ok(StakePoll::Settled(StakeAction::Unstake { index: 0 }))
        );
        assert_eq!(staking.dashboard().total_staked(), Some(0));
        assert_eq!(staking.dashboard().balance, Some(1_050));
    }

    #[test]
    fn invalid_index_is_rejected() {
        let (ledger, _, mut staking) = setup();
        assert_eq!(
            staking.claim_rewards(&ledger, 3),
            Err(StakingError::InvalidPosition { index: 3, count: 0 })
        );
        assert_eq!(
            staking.unstake(&ledger, u64::MAX, 0),
            Err(StakingError::InvalidPosition {
                index: u64::MAX,
                count: 0
            })
        );
    }

    #[test]
    fn claim_is_allowed_while_locked() {
        let (ledger, _, mut staking) = setup();
        ledger.set_now(2_000);
        ledger.push_position(
            ALICE,
            Position {
                principal: 50,
                start_time: 1_000,
                lock_duration_seconds: 1_000_000,
                tier: 3,
                last_claim_time: 1_000,
            },
        );
        ledger.set_pending_rewards(ALICE, 12);
        let tx = staking.claim_rewards(&ledger, 0).unwrap();
        ledger.confirm(tx);
        staking.poll(&ledger).unwrap();

        let dashboard = staking.dashboard();
        assert_eq!(dashboard.pending_rewards, Some(0));
        assert_eq!(dashboard.balance, Some(1_012));
        assert_eq!(dashboard.positions.as_ref().unwrap()[0].last_claim_time, 2_000);
    }

    #[test]
    fn failed_transaction_unblocks_the_workflow() {
        let (ledger, approval, mut staking) = setup();
        ledger.set_allowance(ALICE, 1_000);
        let tx = staking.stake(&ledger, &approval, 100, 0).unwrap();
        ledger.fail(tx, "slippage");
        assert_eq!(
            staking.poll(&ledger),
            Err(StakingError::LedgerWrite("slippage".to_string()))
        );
        assert!(!staking.is_pending());
        assert!(staking.stake(&ledger, &approval, 100, 0).is_ok());
    }

    #[test]
    fn rejected_submission_leaves_workflow_idle() {
        let (ledger, approval, mut staking) = setup();
        ledger.set_allowance(ALICE, 1_000);
        ledger.reject_submissions(Some("node unavailable"));
        assert_eq!(
            staking.stake(&ledger, &approval, 100, 0),
            Err(StakingError::LedgerWrite("node unavailable".to_string()))
        );
        assert!(!staking.is_pending());
    }

    #[test]
    fn settlement_waits_for_a_successful_read() {
        let (ledger, approval, mut staking) = setup();
        ledger.set_allowance(ALICE, 1_000);
        let tx = staking.stake(&ledger, &approval, 100, 0).unwrap();
        ledger.confirm(tx);
        ledger.fail_account_reads(true);

        assert!(staking.poll(&ledger).unwrap_err().is_transient());
        assert_eq!(
            staking.state(),
            &WorkflowState::Refreshing {
                action: StakeAction::Stake { amount: 100, tier: 0 }
            }
        );
        assert_eq!(
            staking.stake(&ledger, &approval, 1, 0),
            Err(StakingError::TransactionInFlight)
        );

        assert!(staking.poll(&ledger).unwrap_err().is_transient());
        assert!(staking.is_pending());

        ledger.fail_account_reads(false);
        assert_eq!(
            staking.poll(&ledger),
            Ok(StakePoll::Settled(StakeAction::Stake { amount: 100, tier: 0 }))
        );
        assert_eq!(staking.dashboard().total_staked(), Some(100));
    }

    #[test]
    fn refresh_marks_failed_reads_unknown() {
        let (ledger, _, mut staking) = setup();
        ledger.fail_reads(true);
        assert!(staking.refresh(&ledger).is_err());
        assert_eq!(staking.dashboard(), &Dashboard::default());
        assert_eq!(staking.dashboard().total_staked(), None);
    }

    #[test]
    fn no_session_reads_as_empty() {
        let ledger = MockLedger::default();
        let mut staking: StakingWorkflow<MockLedger> = StakingWorkflow::new(None, TierTable::default());
        let approval = ApprovalWorkflow::new(None, MockLedger::SPENDER.to_string());
        staking.refresh(&ledger).unwrap();
        assert_eq!(staking.dashboard(), &Dashboard::empty());
        assert_eq!(staking.stake(&ledger, &approval, 1, 0), Err(StakingError::NoSession));
    }
}
