use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use alloy::primitives::Address;

use splitpay::config::Config;
use splitpay::engine::{BatchOutcome, DispatchReceipt, Engine, ReviewGate};
use splitpay::instruction::RawInstruction;
use splitpay::rpc::HttpRpc;
use splitpay::signer::WalletSigner;
use splitpay::table;

#[derive(Parser, Debug)]
#[command(name = "splitpay", version, about = "Dispatch bulk payments through an on-chain splitter")]
struct Cli {
    /// Path to the run configuration.
    #[arg(long, default_value = "splitpay.toml")]
    config: PathBuf,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dispatch a list of individually-amounted payments.
    Pay {
        /// JSON file: [{ "payee", "amount", "asset", "name"? }, ...]
        #[arg(long)]
        payments: PathBuf,
        /// Print tables and calldata, then stop without dispatching.
        #[arg(long)]
        plan_only: bool,
    },
    /// Dispatch one uniform amount to every recipient in a list.
    Distribute {
        /// JSON file: ["0x..", ...] or [{ "address", "name"? }, ...]
        #[arg(long)]
        recipients: PathBuf,
        /// Amount per recipient (decimal or base-unit string).
        #[arg(long)]
        amount: String,
        /// "native" or a token contract address.
        #[arg(long)]
        asset: String,
        #[arg(long)]
        plan_only: bool,
    },
    /// Grant the splitter an allowance from the funding source.
    Approve {
        /// Token contract address.
        #[arg(long)]
        token: String,
        /// Amount to approve; omitted approves the maximum.
        #[arg(long)]
        amount: Option<String>,
    },
}

/// Recipient list entries may be bare addresses or carry a display name.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecipientEntry {
    Plain(String),
    Named { address: String, name: Option<String> },
}

fn read_payments(path: &PathBuf) -> Result<Vec<RawInstruction>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading payments file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("parsing payments file {}", path.display()))
}

fn read_recipients(path: &PathBuf, amount: &str, asset: &str) -> Result<Vec<RawInstruction>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading recipients file {}", path.display()))?;
    let entries: Vec<RecipientEntry> = serde_json::from_str(&content)
        .with_context(|| format!("parsing recipients file {}", path.display()))?;
    Ok(entries
        .into_iter()
        .map(|entry| {
            let (payee, name) = match entry {
                RecipientEntry::Plain(address) => (address, None),
                RecipientEntry::Named { address, name } => (address, name),
            };
            RawInstruction {
                payee,
                amount: amount.to_string(),
                asset: asset.to_string(),
                name,
            }
        })
        .collect())
}

/// Wire ctrl-c into the review gate so the pause is an explicit abort point
/// instead of a hard kill.
fn hook_abort(gate: &ReviewGate) {
    let abort = gate.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("abort requested; stopping before the next submission");
            abort.notify_one();
        }
    });
}

async fn run_payments<R: splitpay::rpc::ChainRpc>(
    engine: &Engine<R>,
    raw: Vec<RawInstruction>,
    plan_only: bool,
    review_delay: Duration,
) -> Result<ExitCode> {
    let prepared = engine.prepare(&raw).await?;

    for plan in &prepared.plans {
        println!("{}", table::render_batch(plan, &prepared.asset));
        // Calldata for audit or offline signing.
        println!(
            "calldata ({} payments {}-{}):\n{}\n",
            plan.call_kind, plan.batch.first, plan.batch.last, plan.calldata
        );
    }

    if plan_only {
        tracing::info!("plan-only run; nothing dispatched");
        return Ok(ExitCode::SUCCESS);
    }

    let gate = ReviewGate::new(review_delay);
    hook_abort(&gate);
    let report = engine.dispatch(&prepared, &gate).await?;

    for outcome in &report.outcomes {
        match outcome {
            BatchOutcome::Dispatched {
                batch_index,
                receipt,
                ..
            } => match receipt {
                DispatchReceipt::Transaction(hash) => {
                    println!("batch {}: transaction {hash}", batch_index + 1)
                }
                DispatchReceipt::Proposal(hash) => {
                    println!("batch {}: proposal {hash}", batch_index + 1)
                }
            },
            BatchOutcome::Aborted { batch_index } => {
                println!("batch {}: aborted before submission", batch_index + 1)
            }
            BatchOutcome::Failed { .. } => {}
        }
    }

    if let Some(failure) = report.failure() {
        eprintln!("error: {failure}");
        return Ok(ExitCode::FAILURE);
    }
    if !report.fully_dispatched() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let rpc = Arc::new(HttpRpc::new(&config.rpc_url, config.rpc_timeout_ms)?);
    let signer = WalletSigner::from_hex(config.wallet_key()?)?;
    let engine = Engine::new(
        rpc,
        signer,
        config.splitter_address()?,
        config.routing_target()?,
        config.chunk_size,
        config.native_symbol.clone(),
    );
    let review_delay = Duration::from_secs(config.review_delay_secs);

    match cli.cmd {
        Commands::Pay {
            payments,
            plan_only,
        } => {
            let raw = read_payments(&payments)?;
            run_payments(&engine, raw, plan_only, review_delay).await
        }
        Commands::Distribute {
            recipients,
            amount,
            asset,
            plan_only,
        } => {
            let raw = read_recipients(&recipients, &amount, &asset)?;
            run_payments(&engine, raw, plan_only, review_delay).await
        }
        Commands::Approve { token, amount } => {
            let token: Address = token
                .trim()
                .parse()
                .with_context(|| format!("invalid token address {token:?}"))?;
            let gate = ReviewGate::new(review_delay);
            hook_abort(&gate);
            match engine.approve(token, amount.as_deref(), &gate).await? {
                Some(DispatchReceipt::Transaction(hash)) => {
                    println!("approval transaction {hash}");
                    Ok(ExitCode::SUCCESS)
                }
                Some(DispatchReceipt::Proposal(hash)) => {
                    println!("approval proposal {hash}");
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    println!("approval aborted before submission");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}
