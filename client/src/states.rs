use anchor_lang::prelude::*;
use pageswap_staking::Position;

/// Account name of the staking program's per-owner position list.
pub const USER_STAKES_ACCOUNT: &str = "UserStakes";

/// One stake entry as laid out by the staking program.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StakeEntry {
    pub amount: u64,
    pub start_time: i64,
    pub lock_period: i64,
    pub tier: u64,
    pub last_claim_time: i64,
}

/// Positions of one owner, in staking order.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct UserStakes {
    pub owner: Pubkey,
    pub stakes: Vec<StakeEntry>,
}

impl From<StakeEntry> for Position {
    fn from(entry: StakeEntry) -> Self {
        Position {
            principal: entry.amount,
            start_time: entry.start_time,
            lock_duration_seconds: entry.lock_period,
            tier: entry.tier,
            last_claim_time: entry.last_claim_time,
        }
    }
}

impl UserStakes {
    pub fn positions(&self) -> Vec<Position> {
        self.stakes.iter().copied().map(Position::from).collect()
    }
}
