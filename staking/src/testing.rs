//! In-memory ledger for tests.
//!
//! Writes are recorded and held pending until the test confirms or fails
//! them; confirming applies the effect the staking program would.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{Result, StakingError};
use crate::ledger::{Amount, Position, StakingLedger, Timestamp, TokenLedger, TxStatus};
use crate::tiers::TierTable;

pub type Address = String;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Write {
    Approve {
        owner: Address,
        spender: Address,
        amount: Amount,
    },
    Stake {
        owner: Address,
        amount: Amount,
        tier: u64,
    },
    Unstake {
        owner: Address,
        index: u64,
    },
    ClaimRewards {
        owner: Address,
        index: u64,
    },
}

#[derive(Default)]
struct State {
    now: Timestamp,
    balances: HashMap<Address, Amount>,
    allowances: HashMap<Address, Amount>,
    stale_allowances: HashMap<Address, Amount>,
    stale_allowance_reads: u32,
    stakes: HashMap<Address, Vec<Position>>,
    rewards: HashMap<Address, Amount>,
    txs: Vec<(Write, TxStatus)>,
    fail_reads: bool,
    fail_account_reads: bool,
    reject_submissions: Option<String>,
}

#[derive(Default)]
pub struct MockLedger {
    state: RefCell<State>,
}

impl MockLedger {
    pub const SPENDER: &'static str = "staking-authority";

    pub fn set_now(&self, now: Timestamp) {
        self.state.borrow_mut().now = now;
    }

    pub fn set_balance(&self, owner: &str, amount: Amount) {
        self.state.borrow_mut().balances.insert(owner.to_string(), amount);
    }

    pub fn set_allowance(&self, owner: &str, amount: Amount) {
        self.state.borrow_mut().allowances.insert(owner.to_string(), amount);
    }

    pub fn set_pending_rewards(&self, owner: &str, amount: Amount) {
        self.state.borrow_mut().rewards.insert(owner.to_string(), amount);
    }

    pub fn push_position(&self, owner: &str, position: Position) {
        self.state
            .borrow_mut()
            .stakes
            .entry(owner.to_string())
            .or_default()
            .push(position);
    }

    /// Every read fails with a ledger read error while set.
    pub fn fail_reads(&self, fail: bool) {
        self.state.borrow_mut().fail_reads = fail;
    }

    /// Balance, allowance, position and reward reads fail while set.
    /// Transaction status stays readable.
    pub fn fail_account_reads(&self, fail: bool) {
        self.state.borrow_mut().fail_account_reads = fail;
    }

    /// Every submission is rejected with `reason` while set.
    pub fn reject_submissions(&self, reason: Option<&str>) {
        self.state.borrow_mut().reject_submissions = reason.map(str::to_string);
    }

    /// The next `reads` allowance reads return the value from before the last
    /// confirmed approval, like a lagging RPC node.
    pub fn serve_stale_allowance(&self, reads: u32) {
        self.state.borrow_mut().stale_allowance_reads = reads;
    }

    pub fn writes(&self) -> Vec<Write> {
        self.state
            .borrow()
            .txs
            .iter()
            .map(|(write, _)| write.clone())
            .collect()
    }

    pub fn confirm(&self, tx: u64) {
        let mut state = self.state.borrow_mut();
        let index = tx as usize;
        let write = state.txs[index].0.clone();
        state.txs[index].1 = TxStatus::Confirmed;
        let now = state.now;
        match write {
            Write::Approve { owner, amount, .. } => {
                let previous = state.allowances.insert(owner.clone(), amount).unwrap_or(0);
                state.stale_allowances.insert(owner, previous);
            }
            Write::Stake { owner, amount, tier } => {
                let lock_duration_seconds = TierTable::default()
                    .get(tier)
                    .map(|t| t.duration_seconds())
                    .unwrap_or(0);
                let balance = state.balances.entry(owner.clone()).or_default();
                *balance = balance.saturating_sub(amount);
                let allowance = state.allowances.entry(owner.clone()).or_default();
                *allowance = allowance.saturating_sub(amount);
                state.stakes.entry(owner).or_default().push(Position {
                    principal: amount,
                    start_time: now,
                    lock_duration_seconds,
                    tier,
                    last_claim_time: now,
                });
            }
            Write::Unstake { owner, index } => {
                let position = state
                    .stakes
                    .entry(owner.clone())
                    .or_default()
                    .remove(index as usize);
                *state.balances.entry(owner).or_default() += position.principal;
            }
            Write::ClaimRewards { owner, index } => {
                let reward = state.rewards.insert(owner.clone(), 0).unwrap_or(0);
                *state.balances.entry(owner.clone()).or_default() += reward;
                if let Some(position) = state
                    .stakes
                    .entry(owner)
                    .or_default()
                    .get_mut(index as usize)
                {
                    position.last_claim_time = now;
                }
            }
        }
    }

    pub fn fail(&self, tx: u64, reason: &str) {
        self.state.borrow_mut().txs[tx as usize].1 = TxStatus::Failed(reason.to_string());
    }

    fn read<T>(&self, f: impl FnOnce(&State) -> T) -> Result<T> {
        let state = self.state.borrow();
        if state.fail_reads {
            return Err(StakingError::LedgerRead("mock read failure".to_string()));
        }
        Ok(f(&state))
    }

    fn read_account<T>(&self, f: impl FnOnce(&State) -> T) -> Result<T> {
        if self.state.borrow().fail_account_reads {
            return Err(StakingError::LedgerRead("mock account read failure".to_string()));
        }
        self.read(f)
    }

    fn submit(&self, write: Write) -> Result<u64> {
        let mut state = self.state.borrow_mut();
        if let Some(reason) = &state.reject_submissions {
            return Err(StakingError::LedgerWrite(reason.clone()));
        }
        state.txs.push((write, TxStatus::Pending));
        Ok((state.txs.len() - 1) as u64)
    }
}

impl TokenLedger for MockLedger {
    type Address = Address;
    type TxId = u64;

    fn balance_of(&self, owner: &Address) -> Result<Amount> {
        self.read_account(|state| state.balances.get(owner).copied().unwrap_or(0))
    }

    fn allowance(&self, owner: &Address, _spender: &Address) -> Result<Amount> {
        self.read_account(|_| ())?;
        let mut state = self.state.borrow_mut();
        if state.stale_allowance_reads > 0 {
            state.stale_allowance_reads -= 1;
            if let Some(stale) = state.stale_allowances.get(owner) {
                return Ok(*stale);
            }
        }
        Ok(state.allowances.get(owner).copied().unwrap_or(0))
    }

    fn submit_approve(&self, owner: &Address, spender: &Address, amount: Amount) -> Result<u64> {
        self.submit(Write::Approve {
            owner: owner.clone(),
            spender: spender.clone(),
            amount,
        })
    }

    fn tx_status(&self, tx: &u64) -> Result<TxStatus> {
        self.read(|state| {
            state
                .txs
                .get(*tx as usize)
                .map(|(_, status)| status.clone())
                .unwrap_or_else(|| TxStatus::Failed("unknown transaction".to_string()))
        })
    }
}

impl StakingLedger for MockLedger {
    fn spender(&self) -> Address {
        Self::SPENDER.to_string()
    }

    fn user_stakes(&self, owner: &Address) -> Result<Vec<Position>> {
        self.read_account(|state| state.stakes.get(owner).cloned().unwrap_or_default())
    }

    fn total_pending_rewards(&self, owner: &Address) -> Result<Amount> {
        self.read_account(|state| state.rewards.get(owner).copied().unwrap_or(0))
    }

    fn submit_stake(&self, owner: &Address, amount: Amount, tier: u64) -> Result<u64> {
        self.submit(Write::Stake {
            owner: owner.clone(),
            amount,
            tier,
        })
    }

    fn submit_unstake(&self, owner: &Address, index: u64) -> Result<u64> {
        self.submit(Write::Unstake {
            owner: owner.clone(),
            index,
        })
    }

    fn submit_claim_rewards(&self, owner: &Address, index: u64) -> Result<u64> {
        self.submit(Write::ClaimRewards {
            owner: owner.clone(),
            index,
        })
    }
}
