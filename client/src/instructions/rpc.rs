use anyhow::{format_err, Result};
use base64::Engine;
use solana_client::{rpc_client::RpcClient, rpc_config::RpcSimulateTransactionConfig};
use solana_sdk::{signature::Signature, transaction::Transaction};

/// Sends a signed transaction after preflight and returns its signature
/// without waiting; confirmation is polled through `get_signature_status`.
pub fn send_txn(client: &RpcClient, txn: &Transaction) -> Result<Signature> {
    Ok(client.send_transaction(txn)?)
}

/// Simulates an unsigned view transaction and returns the program's return data.
pub fn simulate_return_data(client: &RpcClient, txn: &Transaction) -> Result<Vec<u8>> {
    let config = RpcSimulateTransactionConfig {
        sig_verify: false,
        replace_recent_blockhash: true,
        commitment: Some(client.commitment()),
        ..RpcSimulateTransactionConfig::default()
    };
    let result = client.simulate_transaction_with_config(txn, config)?.value;
    if let Some(err) = result.err {
        return Err(format_err!("simulation failed: {:?}", err));
    }
    match result.return_data {
        Some(return_data) => {
            let (encoded, _encoding) = return_data.data;
            Ok(base64::engine::general_purpose::STANDARD.decode(encoded)?)
        }
        None => Ok(Vec::new()),
    }
}
