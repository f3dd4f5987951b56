//! Ledger binding over Solana JSON-RPC.
//!
//! Allowance is SPL token delegation to the staking program's authority PDA.
//! Positions and pending rewards come from the staking program.

use anyhow::format_err;
use pageswap_staking::{
    Amount, Position, Session, StakingError, StakingLedger, TokenLedger, TxStatus,
};
use solana_client::rpc_client::RpcClient;
use solana_sdk::{
    account::Account,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use tracing::debug;

use crate::instructions::rpc::{send_txn, simulate_return_data};
use crate::instructions::staking_instructions::{
    approve_instr, claim_rewards_instr, pending_rewards_instr, stake_instr, unstake_instr,
    StakingAccounts,
};
use crate::instructions::utils::{
    deserialize_anchor_account, unpack_mint_decimals, unpack_token_account, TokenAccountInfo,
};
use crate::states::{UserStakes, USER_STAKES_ACCOUNT};

type Result<T> = pageswap_staking::Result<T>;

fn read_err(err: impl std::fmt::Display) -> StakingError {
    StakingError::LedgerRead(err.to_string())
}

fn write_err(err: impl std::fmt::Display) -> StakingError {
    StakingError::LedgerWrite(err.to_string())
}

/// Wallet session backed by a keypair file. No keypair means no session.
pub struct KeypairSession {
    keypair: Option<Keypair>,
}

impl KeypairSession {
    pub fn new(keypair: Option<Keypair>) -> Self {
        Self { keypair }
    }
}

impl Session for KeypairSession {
    type Address = Pubkey;

    fn owner(&self) -> Option<Pubkey> {
        self.keypair.as_ref().map(|keypair| keypair.pubkey())
    }
}

pub struct RpcLedger {
    rpc: RpcClient,
    accounts: StakingAccounts,
    decimals: u8,
    session: KeypairSession,
}

impl RpcLedger {
    /// Resolves the mint's token program and decimals, then binds the session.
    pub fn connect(
        rpc: RpcClient,
        program_id: Pubkey,
        token_mint: Pubkey,
        session: KeypairSession,
    ) -> anyhow::Result<Self> {
        let mint = rpc
            .get_account(&token_mint)
            .map_err(|err| format_err!("failed to load mint {}: {}", token_mint, err))?;
        let decimals = unpack_mint_decimals(&mint)?;
        let accounts = StakingAccounts {
            program_id,
            token_mint,
            token_program: mint.owner,
        };
        debug!(%program_id, %token_mint, token_program = %mint.owner, decimals, "ledger connected");
        Ok(Self {
            rpc,
            accounts,
            decimals,
            session,
        })
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    fn get_account(&self, address: &Pubkey) -> Result<Option<Account>> {
        self.rpc
            .get_account_with_commitment(address, self.rpc.commitment())
            .map(|response| response.value)
            .map_err(read_err)
    }

    fn token_account(&self, owner: &Pubkey) -> Result<Option<TokenAccountInfo>> {
        let address = self.accounts.owner_token(owner);
        match self.get_account(&address)? {
            Some(account) => unpack_token_account(&account).map(Some).map_err(read_err),
            None => Ok(None),
        }
    }

    fn signer_for(&self, owner: &Pubkey) -> Result<&Keypair> {
        match &self.session.keypair {
            Some(keypair) if keypair.pubkey() == *owner => Ok(keypair),
            Some(_) => Err(write_err(format!("{} is not the session signer", owner))),
            None => Err(StakingError::NoSession),
        }
    }

    fn submit(&self, owner: &Pubkey, instruction: Instruction) -> Result<Signature> {
        let signer = self.signer_for(owner)?;
        let recent_hash = self.rpc.get_latest_blockhash().map_err(write_err)?;
        let signers = vec![signer];
        let txn = Transaction::new_signed_with_payer(
            &[instruction],
            Some(&signer.pubkey()),
            &signers,
            recent_hash,
        );
        let signature = send_txn(&self.rpc, &txn).map_err(write_err)?;
        debug!(%signature, "transaction sent");
        Ok(signature)
    }
}

impl TokenLedger for RpcLedger {
    type Address = Pubkey;
    type TxId = Signature;

    fn balance_of(&self, owner: &Pubkey) -> Result<Amount> {
        Ok(self.token_account(owner)?.map_or(0, |info| info.amount))
    }

    fn allowance(&self, owner: &Pubkey, spender: &Pubkey) -> Result<Amount> {
        Ok(self
            .token_account(owner)?
            .map_or(0, |info| info.allowance_for(spender)))
    }

    fn submit_approve(&self, owner: &Pubkey, spender: &Pubkey, amount: Amount) -> Result<Signature> {
        if *spender != self.accounts.authority() {
            return Err(write_err(format!("{} is not the staking authority", spender)));
        }
        let ix = approve_instr(&self.accounts, owner, amount).map_err(write_err)?;
        self.submit(owner, ix)
    }

    fn tx_status(&self, tx: &Signature) -> Result<TxStatus> {
        let status = self.rpc.get_signature_status(tx).map_err(read_err)?;
        Ok(match status {
            None => TxStatus::Pending,
            Some(Ok(())) => TxStatus::Confirmed,
            Some(Err(err)) => TxStatus::Failed(err.to_string()),
        })
    }
}

impl StakingLedger for RpcLedger {
    fn spender(&self) -> Pubkey {
        self.accounts.authority()
    }

    fn user_stakes(&self, owner: &Pubkey) -> Result<Vec<Position>> {
        let address = self.accounts.user_stakes(owner);
        match self.get_account(&address)? {
            Some(account) => {
                let stakes: UserStakes =
                    deserialize_anchor_account(&account.data, USER_STAKES_ACCOUNT).map_err(read_err)?;
                Ok(stakes.positions())
            }
            None => Ok(Vec::new()),
        }
    }

    fn total_pending_rewards(&self, owner: &Pubkey) -> Result<Amount> {
        let ix = pending_rewards_instr(&self.accounts, owner);
        let txn = Transaction::new_with_payer(&[ix], Some(owner));
        let data = simulate_return_data(&self.rpc, &txn).map_err(read_err)?;
        decode_amount(&data)
    }

    fn submit_stake(&self, owner: &Pubkey, amount: Amount, tier: u64) -> Result<Signature> {
        self.submit(owner, stake_instr(&self.accounts, owner, amount, tier))
            .map_err(|err| match err {
                StakingError::LedgerWrite(_) => match self.allowance(owner, &self.spender()) {
                    Ok(allowance) => rejected_stake(err, allowance, amount),
                    Err(_) => err,
                },
                other => other,
            })
    }

    fn submit_unstake(&self, owner: &Pubkey, index: u64) -> Result<Signature> {
        self.submit(owner, unstake_instr(&self.accounts, owner, index))
    }

    fn submit_claim_rewards(&self, owner: &Pubkey, index: u64) -> Result<Signature> {
        self.submit(owner, claim_rewards_instr(&self.accounts, owner, index))
    }
}

/// The token program rejects a transfer past the delegated amount with a
/// generic error; a fresh allowance read tells the shortfall apart.
fn rejected_stake(err: StakingError, allowance: Amount, required: Amount) -> StakingError {
    if allowance < required {
        StakingError::InsufficientAllowance {
            allowance,
            required,
        }
    } else {
        err
    }
}

/// Return data of a view call: a little-endian `u64`, empty meaning zero.
fn decode_amount(data: &[u8]) -> Result<Amount> {
    if data.is_empty() {
        return Ok(0);
    }
    let bytes: [u8; 8] = data
        .get(..8)
        .and_then(|head| head.try_into().ok())
        .ok_or_else(|| read_err(format!("unexpected return data length {}", data.len())))?;
    Ok(u64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_data_decodes_le_u64() {
        assert_eq!(decode_amount(&[]), Ok(0));
        assert_eq!(decode_amount(&1234u64.to_le_bytes()), Ok(1234));
        assert!(decode_amount(&[1, 2, 3]).is_err());
    }

    #[test]
    fn stake_rejection_reports_allowance_shortfall() {
        let rejected = || StakingError::LedgerWrite("insufficient funds".to_string());
        assert_eq!(
            rejected_stake(rejected(), 40, 100),
            StakingError::InsufficientAllowance {
                allowance: 40,
                required: 100
            }
        );
        assert_eq!(rejected_stake(rejected(), 100, 100), rejected());
    }

    #[test]
    fn session_owner_is_keypair_pubkey() {
        let keypair = Keypair::new();
        let pubkey = keypair.pubkey();
        let session = KeypairSession::new(Some(keypair));
        assert_eq!(session.owner(), Some(pubkey));
        assert_eq!(KeypairSession::new(None).owner(), None);
    }
}
