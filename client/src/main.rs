use anyhow::{bail, format_err, Result};
use clap::Parser;
use colorful::Colorful;
use configparser::ini::Ini;
use pageswap_staking::{
    format_amount, ledger::balance_or_zero, parse_amount, ApprovalPoll, ApprovalWorkflow,
    Dashboard, Session, StakePoll, StakingLedger, StakingWorkflow, TierTable, Timestamp,
};
use solana_client::rpc_client::RpcClient;
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Keypair};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod instructions;
mod ledger;
mod states;
mod widget;

use ledger::{KeypairSession, RpcLedger};
use widget::{parse_tokens, WidgetConfig};

#[derive(Clone, Debug, PartialEq)]
pub struct ConfirmConfig {
    poll_interval: Duration,
    timeout: Duration,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    http_url: String,
    payer_path: Option<String>,
    staking_program: Pubkey,
    token_mint: Pubkey,
    confirm: ConfirmConfig,
    widget: WidgetConfig,
}

fn required(config: &Ini, section: &str, key: &str) -> Result<String> {
    match config.get(section, key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => bail!("{} must not be empty", key),
    }
}

fn optional_uint(config: &Ini, section: &str, key: &str, default: u64) -> Result<u64> {
    let value = config
        .getuint(section, key)
        .map_err(|err| format_err!("{}: {}", key, err))?;
    Ok(value.unwrap_or(default))
}

fn parse_pubkey(key: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value).map_err(|err| format_err!("{} is not a valid address: {}", key, err))
}

fn parse_cfg(config: &Ini) -> Result<ClientConfig> {
    let http_url = required(config, "Global", "http_url")?;
    let home = std::env::var("HOME").ok();
    let payer_path = config
        .get("Global", "payer_path")
        .filter(|path| !path.is_empty())
        .map(|path| expand_home(&path, home.as_deref()));
    let staking_program = parse_pubkey(
        "staking_program",
        &required(config, "Global", "staking_program")?,
    )?;
    let token_mint = parse_pubkey("token_mint", &required(config, "Global", "token_mint")?)?;

    let confirm = ConfirmConfig {
        poll_interval: Duration::from_millis(optional_uint(
            config,
            "Confirm",
            "poll_interval_ms",
            500,
        )?),
        timeout: Duration::from_secs(optional_uint(config, "Confirm", "timeout_secs", 60)?),
    };

    let mut widget = WidgetConfig::default();
    if let Some(tokens) = config.get("Widget", "tokens") {
        widget.tokens = parse_tokens(&tokens);
    }
    if let Some(mode) = config.get("Widget", "mode") {
        widget.theme.mode = mode.parse()?;
    }

    Ok(ClientConfig {
        http_url,
        payer_path,
        staking_program,
        token_mint,
        confirm,
        widget,
    })
}

/// Expands a leading `~/` against `$HOME`; other paths are returned as is.
fn expand_home(path: &str, home: Option<&str>) -> String {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path.to_string(),
    }
}

fn load_cfg(client_config: &str) -> Result<ClientConfig> {
    let mut config = Ini::new();
    config
        .load(client_config)
        .map_err(|err| format_err!("failed to load {}: {}", client_config, err))?;
    parse_cfg(&config)
}

fn read_keypair_file(s: &str) -> Result<Keypair> {
    solana_sdk::signature::read_keypair_file(s)
        .map_err(|_| format_err!("failed to read keypair from {}", s))
}

fn unix_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as Timestamp)
        .unwrap_or(0)
}

#[derive(Debug, Parser)]
pub struct Opts {
    #[arg(long, default_value = "client_config.ini")]
    pub config: String,
    #[clap(subcommand)]
    pub command: StakingCommands,
}

#[derive(Debug, Parser)]
pub enum StakingCommands {
    /// Token balance of the session wallet.
    Balance {},
    /// Amount the staking program may pull from the wallet.
    Allowance {},
    Approve {
        #[arg(long)]
        amount: String,
    },
    Stake {
        #[arg(long)]
        amount: String,
        #[arg(long)]
        tier: u64,
        /// Approve the missing allowance first.
        #[arg(long)]
        approve: bool,
    },
    Unstake {
        #[arg(long)]
        index: u64,
    },
    ClaimRewards {
        #[arg(long)]
        index: u64,
    },
    /// Balances, positions and pending rewards.
    Dashboard {},
    /// Lock tiers and their APR.
    Tiers {},
    /// JSON configuration for the swap widget.
    WidgetConfig {},
}

/// Polls `step` until it yields a value, tolerating transient read errors.
fn wait_until<T>(
    confirm: &ConfirmConfig,
    what: &str,
    mut step: impl FnMut() -> pageswap_staking::Result<Option<T>>,
) -> Result<T> {
    let deadline = Instant::now() + confirm.timeout;
    loop {
        match step() {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(err) if err.is_transient() => warn!(%err, "{} not settled yet", what),
            Err(err) => return Err(err.into()),
        }
        if Instant::now() >= deadline {
            bail!("timed out waiting for {}", what);
        }
        thread::sleep(confirm.poll_interval);
    }
}

fn run_approval(
    ledger: &RpcLedger,
    approval: &mut ApprovalWorkflow<RpcLedger>,
    amount: u64,
    confirm: &ConfirmConfig,
) -> Result<u64> {
    let signature = approval.approve(ledger, amount)?;
    println!("approve: {}", signature);
    wait_until(confirm, "approval", || {
        Ok(match approval.poll(ledger)? {
            ApprovalPoll::Settled { allowance } => Some(allowance),
            ApprovalPoll::Pending => None,
            ApprovalPoll::Idle => Some(approval.allowance().unwrap_or(0)),
        })
    })
}

fn run_settlement(
    ledger: &RpcLedger,
    staking: &mut StakingWorkflow<RpcLedger>,
    confirm: &ConfirmConfig,
) -> Result<()> {
    wait_until(confirm, "transaction", || {
        Ok(match staking.poll(ledger)? {
            StakePoll::Pending => None,
            StakePoll::Idle | StakePoll::Settled(_) => Some(()),
        })
    })
}

fn show_amount(amount: Option<u128>, decimals: u8) -> String {
    match amount {
        Some(amount) => format_amount(amount, decimals),
        None => "unavailable".red().to_string(),
    }
}

fn print_tiers(tiers: &TierTable) {
    for (index, tier) in tiers.iter() {
        println!(
            "{:>2}  {:<10} {:>7} APR",
            index,
            tier.duration_label(),
            tier.apr_label()
        );
    }
}

fn print_dashboard(dashboard: &Dashboard, tiers: &TierTable, decimals: u8, now: Timestamp) {
    println!(
        "Balance:         {}",
        show_amount(dashboard.balance.map(u128::from), decimals)
    );
    println!(
        "Allowance:       {}",
        show_amount(dashboard.allowance.map(u128::from), decimals)
    );
    println!(
        "Total staked:    {}",
        show_amount(dashboard.total_staked(), decimals)
    );
    println!(
        "Unlocked:        {}",
        show_amount(dashboard.unlocked_principal(now), decimals)
    );
    println!(
        "Pending rewards: {}",
        show_amount(dashboard.pending_rewards.map(u128::from), decimals)
    );
    if !dashboard.is_complete() {
        println!("{}", "Some ledger reads failed; values may be stale.".yellow());
    }

    let Some(views) = dashboard.position_views(tiers, now) else {
        println!("Positions:       {}", "unavailable".red());
        return;
    };
    if views.is_empty() {
        println!("No positions");
        return;
    }
    for view in views {
        let tier = match &view.tier {
            Ok(tier) => format!("{} @ {}", tier.duration_label(), tier.apr_label()),
            Err(err) => err.to_string().as_str().red().to_string(),
        };
        let status = if view.unlocked {
            view.remaining.as_str().green().to_string()
        } else {
            view.remaining.as_str().yellow().to_string()
        };
        println!(
            "#{:<3} {:>20}  {}  {}",
            view.index,
            format_amount(u128::from(view.position.principal), decimals),
            tier,
            status
        );
    }
}

fn parse_cli_amount(input: &str, decimals: u8) -> Result<u64> {
    parse_amount(input, decimals).ok_or_else(|| format_err!("invalid amount {:?}", input))
}

fn run(client_config: &ClientConfig, tiers: TierTable, command: StakingCommands) -> Result<()> {
    let payer = match &client_config.payer_path {
        Some(path) => Some(read_keypair_file(path)?),
        None => None,
    };
    let session = KeypairSession::new(payer);
    let owner = session.owner();
    let rpc_client = RpcClient::new_with_commitment(
        client_config.http_url.to_string(),
        CommitmentConfig::confirmed(),
    );
    let ledger = RpcLedger::connect(
        rpc_client,
        client_config.staking_program,
        client_config.token_mint,
        session,
    )?;
    let decimals = ledger.decimals();
    let confirm = &client_config.confirm;

    let mut approval = ApprovalWorkflow::new(owner, ledger.spender());
    let mut staking = StakingWorkflow::new(owner, tiers);

    match command {
        StakingCommands::Balance {} => {
            let balance = balance_or_zero(&ledger, owner.as_ref())?;
            println!("{}", format_amount(u128::from(balance), decimals));
        }
        StakingCommands::Allowance {} => {
            let allowance = approval.refresh_allowance(&ledger)?;
            println!("{}", format_amount(u128::from(allowance), decimals));
        }
        StakingCommands::Approve { amount } => {
            let amount = parse_cli_amount(&amount, decimals)?;
            let allowance = run_approval(&ledger, &mut approval, amount, confirm)?;
            println!("allowance: {}", format_amount(u128::from(allowance), decimals));
        }
        StakingCommands::Stake {
            amount,
            tier,
            approve,
        } => {
            let amount = parse_cli_amount(&amount, decimals)?;
            if approve && approval.refresh_allowance(&ledger)? < amount {
                run_approval(&ledger, &mut approval, amount, confirm)?;
            }
            let signature = staking.stake(&ledger, &approval, amount, tier)?;
            println!("stake: {}", signature);
            run_settlement(&ledger, &mut staking, confirm)?;
            print_dashboard(staking.dashboard(), &tiers, decimals, unix_now());
        }
        StakingCommands::Unstake { index } => {
            let signature = staking.unstake(&ledger, index, unix_now())?;
            println!("unstake: {}", signature);
            run_settlement(&ledger, &mut staking, confirm)?;
            print_dashboard(staking.dashboard(), &tiers, decimals, unix_now());
        }
        StakingCommands::ClaimRewards { index } => {
            let signature = staking.claim_rewards(&ledger, index)?;
            println!("claim rewards: {}", signature);
            run_settlement(&ledger, &mut staking, confirm)?;
            print_dashboard(staking.dashboard(), &tiers, decimals, unix_now());
        }
        StakingCommands::Dashboard {} => {
            if let Err(err) = staking.refresh(&ledger) {
                warn!(%err, "showing partial dashboard");
            }
            print_dashboard(staking.dashboard(), &tiers, decimals, unix_now());
        }
        StakingCommands::Tiers {} | StakingCommands::WidgetConfig {} => {}
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::parse();
    let client_config = load_cfg(&opts.config)?;
    let tiers = TierTable::default();

    match opts.command {
        StakingCommands::Tiers {} => print_tiers(&tiers),
        StakingCommands::WidgetConfig {} => {
            println!("{}", serde_json::to_string_pretty(&client_config.widget)?);
        }
        command => run(&client_config, tiers, command)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pageswap_staking::{testing::MockLedger, StakingError};
    use crate::widget::ThemeMode;

    const PROGRAM: &str = "2mXffWN8gUBsac5YNWaCcKt3Yfhw8DT3yqXJXymQcUnu";
    const MINT: &str = "EBHC7XpycnQhCd3zq8iWmSuhvpGVyM6krjb6pvwgZ4zE";

    fn ini(text: &str) -> Ini {
        let mut config = Ini::new();
        config.read(text.to_string()).unwrap();
        config
    }

    fn confirm() -> ConfirmConfig {
        ConfirmConfig {
            poll_interval: Duration::from_millis(1),
            timeout: Duration::from_millis(50),
        }
    }

    #[test]
    fn parses_full_config() {
        let config = parse_cfg(&ini(&format!(
            "[Global]\nhttp_url = http://localhost:8899\npayer_path = id.json\n\
             staking_program = {}\ntoken_mint = {}\n\
             [Confirm]\npoll_interval_ms = 250\ntimeout_secs = 5\n\
             [Widget]\ntokens = eth, sol\nmode = light\n",
            PROGRAM, MINT
        )))
        .unwrap();
        assert_eq!(config.http_url, "http://localhost:8899");
        assert_eq!(config.payer_path.as_deref(), Some("id.json"));
        assert_eq!(config.staking_program, Pubkey::from_str(PROGRAM).unwrap());
        assert_eq!(config.confirm.poll_interval, Duration::from_millis(250));
        assert_eq!(config.confirm.timeout, Duration::from_secs(5));
        assert_eq!(config.widget.tokens, vec!["ETH", "SOL"]);
        assert_eq!(config.widget.theme.mode, ThemeMode::Light);
    }

    #[test]
    fn missing_payer_means_read_only() {
        let config = parse_cfg(&ini(&format!(
            "[Global]\nhttp_url = http://localhost:8899\nstaking_program = {}\ntoken_mint = {}\n",
            PROGRAM, MINT
        )))
        .unwrap();
        assert_eq!(config.payer_path, None);
        assert_eq!(config.confirm.timeout, Duration::from_secs(60));
        assert_eq!(config.widget, WidgetConfig::default());
    }

    #[test]
    fn empty_or_invalid_keys_are_rejected() {
        let empty_url = format!(
            "[Global]\nhttp_url =\nstaking_program = {}\ntoken_mint = {}\n",
            PROGRAM, MINT
        );
        assert!(parse_cfg(&ini(&empty_url)).is_err());
        let bad_mint = format!(
            "[Global]\nhttp_url = x\nstaking_program = {}\ntoken_mint = nope\n",
            PROGRAM
        );
        assert!(parse_cfg(&ini(&bad_mint)).is_err());
    }

    #[test]
    fn payer_path_expands_home() {
        assert_eq!(
            expand_home("~/.config/solana/id.json", Some("/home/alice/")),
            "/home/alice/.config/solana/id.json"
        );
        assert_eq!(expand_home("~/id.json", None), "~/id.json");
        assert_eq!(expand_home("/keys/id.json", Some("/home/alice")), "/keys/id.json");
    }

    #[test]
    fn wait_until_retries_transient_errors() {
        let mut calls = 0;
        let value = wait_until(&confirm(), "test", || {
            calls += 1;
            match calls {
                1 => Err(StakingError::LedgerRead("lagging".to_string())),
                2 => Ok(None),
                _ => Ok(Some(calls)),
            }
        })
        .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn wait_until_stops_on_write_failure_and_timeout() {
        let failed: Result<()> = wait_until(&confirm(), "test", || {
            Err(StakingError::LedgerWrite("rejected".to_string()))
        });
        assert!(failed.is_err());

        let timed_out: Result<()> = wait_until(&confirm(), "test", || Ok(None));
        assert!(timed_out.unwrap_err().to_string().contains("timed out"));
    }

    #[test]
    fn wait_until_drives_a_workflow_to_settlement() {
        let ledger = MockLedger::default();
        let mut approval = ApprovalWorkflow::new(
            Some("alice".to_string()),
            MockLedger::SPENDER.to_string(),
        );
        let tx = approval.approve(&ledger, 10).unwrap();
        ledger.confirm(tx);
        let allowance = wait_until(&confirm(), "approval", || {
            Ok(match approval.poll(&ledger)? {
                ApprovalPoll::Settled { allowance } => Some(allowance),
                _ => None,
            })
        })
        .unwrap();
        assert_eq!(allowance, 10);
    }
}
