use anchor_lang::{solana_program::hash::hash, AnchorDeserialize};
use anyhow::{format_err, Result};
use solana_sdk::{account::Account, pubkey::Pubkey};
use spl_token_2022::{
    extension::StateWithExtensions,
    state::{Account as TokenAccount, Mint},
};

pub const STAKE_AUTHORITY_SEED: &str = "stake_authority";
pub const USER_STAKES_SEED: &str = "user_stakes";
pub const STAKE_VAULT_SEED: &str = "stake_vault";
pub const REWARD_VAULT_SEED: &str = "reward_vault";

/// First 8 bytes of `sha256("<namespace>:<name>")`, the Anchor discriminator.
pub fn anchor_discriminator(namespace: &str, name: &str) -> [u8; 8] {
    let preimage = format!("{}:{}", namespace, name);
    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&hash(preimage.as_bytes()).to_bytes()[..8]);
    discriminator
}

/// Decodes an Anchor account after checking its discriminator.
pub fn deserialize_anchor_account<T: AnchorDeserialize>(data: &[u8], name: &str) -> Result<T> {
    if data.len() < 8 || data[..8] != anchor_discriminator("account", name) {
        return Err(format_err!("account data is not a {}", name));
    }
    let mut body: &[u8] = &data[8..];
    T::deserialize(&mut body).map_err(Into::into)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenAccountInfo {
    pub amount: u64,
    pub delegate: Option<Pubkey>,
    pub delegated_amount: u64,
}

impl TokenAccountInfo {
    /// Tokens the `spender` may move on the owner's behalf.
    pub fn allowance_for(&self, spender: &Pubkey) -> u64 {
        match self.delegate {
            Some(delegate) if delegate == *spender => self.delegated_amount,
            _ => 0,
        }
    }
}

/// Unpacks an SPL token or Token-2022 account.
pub fn unpack_token_account(account: &Account) -> Result<TokenAccountInfo> {
    let state = StateWithExtensions::<TokenAccount>::unpack(&account.data)?;
    Ok(TokenAccountInfo {
        amount: state.base.amount,
        delegate: state.base.delegate.into(),
        delegated_amount: state.base.delegated_amount,
    })
}

pub fn unpack_mint_decimals(account: &Account) -> Result<u8> {
    let state = StateWithExtensions::<Mint>::unpack(&account.data)?;
    Ok(state.base.decimals)
}

pub fn get_stake_authority_address(program_id: &Pubkey) -> Pubkey {
    let (authority, _bump) =
        Pubkey::find_program_address(&[STAKE_AUTHORITY_SEED.as_bytes()], program_id);
    authority
}

pub fn get_user_stakes_address(user: &Pubkey, program_id: &Pubkey) -> Pubkey {
    let (user_stakes, _bump) = Pubkey::find_program_address(
        &[USER_STAKES_SEED.as_bytes(), user.as_ref()],
        program_id,
    );
    user_stakes
}

pub fn get_stake_vault_address(program_id: &Pubkey) -> Pubkey {
    let (stake_vault, _bump) =
        Pubkey::find_program_address(&[STAKE_VAULT_SEED.as_bytes()], program_id);
    stake_vault
}

pub fn get_reward_vault_address(program_id: &Pubkey) -> Pubkey {
    let (reward_vault, _bump) =
        Pubkey::find_program_address(&[REWARD_VAULT_SEED.as_bytes()], program_id);
    reward_vault
}

pub fn get_owner_token_address(owner: &Pubkey, mint: &Pubkey, token_program: &Pubkey) -> Pubkey {
    spl_associated_token_account::get_associated_token_address_with_program_id(
        owner,
        mint,
        token_program,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_lang::prelude::borsh;
    use anchor_lang::AnchorSerialize;

    #[derive(AnchorSerialize, AnchorDeserialize, Debug, PartialEq)]
    struct Sample {
        value: u64,
    }

    #[test]
    fn discriminator_is_stable() {
        assert_eq!(
            anchor_discriminator("global", "stake"),
            anchor_discriminator("global", "stake")
        );
        assert_ne!(
            anchor_discriminator("global", "stake"),
            anchor_discriminator("global", "unstake")
        );
    }

    #[test]
    fn anchor_account_requires_matching_discriminator() {
        let mut data = anchor_discriminator("account", "Sample").to_vec();
        data.extend_from_slice(&7u64.to_le_bytes());
        let sample: Sample = deserialize_anchor_account(&data, "Sample").unwrap();
        assert_eq!(sample, Sample { value: 7 });

        assert!(deserialize_anchor_account::<Sample>(&data, "Other").is_err());
        assert!(deserialize_anchor_account::<Sample>(&data[..4], "Sample").is_err());
    }

    #[test]
    fn allowance_requires_matching_delegate() {
        let spender = Pubkey::new_unique();
        let info = TokenAccountInfo {
            amount: 10,
            delegate: Some(spender),
            delegated_amount: 4,
        };
        assert_eq!(info.allowance_for(&spender), 4);
        assert_eq!(info.allowance_for(&Pubkey::new_unique()), 0);
        let undelegated = TokenAccountInfo {
            delegate: None,
            ..info
        };
        assert_eq!(undelegated.allowance_for(&spender), 0);
    }

    #[test]
    fn pdas_are_per_user() {
        let program = Pubkey::new_unique();
        let a = get_user_stakes_address(&Pubkey::new_unique(), &program);
        let b = get_user_stakes_address(&Pubkey::new_unique(), &program);
        assert_ne!(a, b);
        assert_ne!(get_stake_vault_address(&program), get_reward_vault_address(&program));
    }
}
