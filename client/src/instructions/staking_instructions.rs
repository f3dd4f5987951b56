use anyhow::Result;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};

use crate::instructions::utils::{
    anchor_discriminator, get_owner_token_address, get_reward_vault_address,
    get_stake_authority_address, get_stake_vault_address, get_user_stakes_address,
};

/// Addresses shared by every staking program instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StakingAccounts {
    pub program_id: Pubkey,
    pub token_mint: Pubkey,
    pub token_program: Pubkey,
}

impl StakingAccounts {
    pub fn authority(&self) -> Pubkey {
        get_stake_authority_address(&self.program_id)
    }

    pub fn user_stakes(&self, owner: &Pubkey) -> Pubkey {
        get_user_stakes_address(owner, &self.program_id)
    }

    pub fn owner_token(&self, owner: &Pubkey) -> Pubkey {
        get_owner_token_address(owner, &self.token_mint, &self.token_program)
    }
}

fn instruction_data(name: &str, args: &[u64]) -> Vec<u8> {
    let mut data = anchor_discriminator("global", name).to_vec();
    for arg in args {
        data.extend_from_slice(&arg.to_le_bytes());
    }
    data
}

/// Delegates `amount` of the owner's tokens to the staking authority.
pub fn approve_instr(accounts: &StakingAccounts, owner: &Pubkey, amount: u64) -> Result<Instruction> {
    let ix = spl_token_2022::instruction::approve(
        &accounts.token_program,
        &accounts.owner_token(owner),
        &accounts.authority(),
        owner,
        &[],
        amount,
    )?;
    Ok(ix)
}

pub fn stake_instr(accounts: &StakingAccounts, owner: &Pubkey, amount: u64, tier: u64) -> Instruction {
    Instruction {
        program_id: accounts.program_id,
        accounts: vec![
            AccountMeta::new(*owner, true),
            AccountMeta::new(accounts.user_stakes(owner), false),
            AccountMeta::new(accounts.owner_token(owner), false),
            AccountMeta::new(get_stake_vault_address(&accounts.program_id), false),
            AccountMeta::new_readonly(accounts.authority(), false),
            AccountMeta::new_readonly(accounts.token_mint, false),
            AccountMeta::new_readonly(accounts.token_program, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: instruction_data("stake", &[amount, tier]),
    }
}

pub fn unstake_instr(accounts: &StakingAccounts, owner: &Pubkey, index: u64) -> Instruction {
    Instruction {
        program_id: accounts.program_id,
        accounts: vec![
            AccountMeta::new(*owner, true),
            AccountMeta::new(accounts.user_stakes(owner), false),
            AccountMeta::new(accounts.owner_token(owner), false),
            AccountMeta::new(get_stake_vault_address(&accounts.program_id), false),
            AccountMeta::new_readonly(accounts.authority(), false),
            AccountMeta::new_readonly(accounts.token_mint, false),
            AccountMeta::new_readonly(accounts.token_program, false),
        ],
        data: instruction_data("unstake", &[index]),
    }
}

pub fn claim_rewards_instr(accounts: &StakingAccounts, owner: &Pubkey, index: u64) -> Instruction {
    Instruction {
        program_id: accounts.program_id,
        accounts: vec![
            AccountMeta::new(*owner, true),
            AccountMeta::new(accounts.user_stakes(owner), false),
            AccountMeta::new(accounts.owner_token(owner), false),
            AccountMeta::new(get_reward_vault_address(&accounts.program_id), false),
            AccountMeta::new_readonly(accounts.authority(), false),
            AccountMeta::new_readonly(accounts.token_mint, false),
            AccountMeta::new_readonly(accounts.token_program, false),
        ],
        data: instruction_data("claim_rewards", &[index]),
    }
}

/// View instruction; its return data is the owner's total pending reward.
pub fn pending_rewards_instr(accounts: &StakingAccounts, owner: &Pubkey) -> Instruction {
    Instruction {
        program_id: accounts.program_id,
        accounts: vec![
            AccountMeta::new_readonly(accounts.user_stakes(owner), false),
            AccountMeta::new_readonly(*owner, false),
        ],
        data: instruction_data("calculate_total_pending_rewards", &[]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounts() -> StakingAccounts {
        StakingAccounts {
            program_id: Pubkey::new_unique(),
            token_mint: Pubkey::new_unique(),
            token_program: spl_token_2022::id(),
        }
    }

    #[test]
    fn stake_data_is_discriminator_then_le_args() {
        let accounts = accounts();
        let owner = Pubkey::new_unique();
        let ix = stake_instr(&accounts, &owner, 500, 3);
        assert_eq!(ix.data.len(), 8 + 8 + 8);
        assert_eq!(ix.data[..8], anchor_discriminator("global", "stake"));
        assert_eq!(ix.data[8..16], 500u64.to_le_bytes());
        assert_eq!(ix.data[16..], 3u64.to_le_bytes());
        assert!(ix.accounts[0].is_signer);
        assert_eq!(ix.accounts[1].pubkey, accounts.user_stakes(&owner));
    }

    #[test]
    fn index_instructions_carry_the_index() {
        let accounts = accounts();
        let owner = Pubkey::new_unique();
        let unstake = unstake_instr(&accounts, &owner, 2);
        let claim = claim_rewards_instr(&accounts, &owner, 2);
        assert_eq!(unstake.data[8..], 2u64.to_le_bytes());
        assert_eq!(claim.data[8..], 2u64.to_le_bytes());
        assert_ne!(unstake.data[..8], claim.data[..8]);
    }

    #[test]
    fn view_has_no_signer() {
        let accounts = accounts();
        let ix = pending_rewards_instr(&accounts, &Pubkey::new_unique());
        assert_eq!(ix.data.len(), 8);
        assert!(ix.accounts.iter().all(|meta| !meta.is_signer));
    }

    #[test]
    fn approve_delegates_to_the_authority() {
        let accounts = accounts();
        let owner = Pubkey::new_unique();
        let ix = approve_instr(&accounts, &owner, 42).unwrap();
        assert_eq!(ix.program_id, accounts.token_program);
        assert_eq!(ix.accounts[0].pubkey, accounts.owner_token(&owner));
        assert_eq!(ix.accounts[1].pubkey, accounts.authority());
        assert_eq!(ix.accounts[2].pubkey, owner);
    }
}
