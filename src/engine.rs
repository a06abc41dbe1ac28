//! The dispatch engine: validate, plan, guard, then route batch by batch.
//!
//! Batches go out strictly sequentially: each depends on the prior nonce
//! and fee state, and proposal ordering matters to multisig reviewers. A
//! failed batch stops the run; batches already sent are irreversible and are
//! reported as such, never rolled back.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::Notify;

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolCall;

use crate::abi::IERC20;
use crate::amount::{self, format_amount};
use crate::config::DEFAULT_RPC_TIMEOUT_MS;
use crate::error::EngineError;
use crate::guard;
use crate::instruction::{self, Asset, AssetContext, DuplicateWarning, RawInstruction};
use crate::multisig::{
    encode_legacy_proposal, propose_to_safe, MultisigKind, RoutingTarget, SafeServiceClient,
};
use crate::plan::{self, CallKind, DispatchPlan};
use crate::rpc::ChainRpc;
use crate::signer::WalletSigner;

/// The human-review pause before a signed submission: a deliberate,
/// cancellable suspension point giving the operator a last window to abort
/// before funds move. A zero delay skips it deterministically.
pub struct ReviewGate {
    delay: Duration,
    abort: Arc<Notify>,
}

impl ReviewGate {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            abort: Arc::new(Notify::new()),
        }
    }

    /// Skip the pause entirely (tests, plan-only flows).
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Handle for out-of-band cancellation; `notify_one` aborts the next
    /// (or current) wait.
    pub fn abort_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.abort)
    }

    /// Returns `false` if the run was aborted during the pause.
    pub async fn wait(&self) -> bool {
        if self.delay.is_zero() {
            return true;
        }
        tracing::info!(
            delay_secs = self.delay.as_secs(),
            "pausing for review before submission (abort now to stop)"
        );
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => true,
            _ = self.abort.notified() => false,
        }
    }
}

/// A planned run: validated, batched, encoded, not yet dispatched.
#[derive(Debug)]
pub struct PreparedRun {
    pub asset: AssetContext,
    pub plans: Vec<DispatchPlan>,
    pub warnings: Vec<DuplicateWarning>,
    pub required_total: U256,
}

/// Receipt for one successfully routed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchReceipt {
    /// Broadcast transaction hash (direct wallet and legacy-multisig
    /// submissions).
    Transaction(B256),
    /// Safe transaction hash accepted by the coordination service.
    Proposal(B256),
}

/// Per-batch result of a dispatch run. Batches after a failure or abort are
/// not attempted.
#[derive(Debug)]
pub enum BatchOutcome {
    Dispatched {
        batch_index: usize,
        call_kind: CallKind,
        receipt: DispatchReceipt,
    },
    Failed {
        batch_index: usize,
        call_kind: CallKind,
        first: usize,
        last: usize,
        reason: String,
    },
    Aborted {
        batch_index: usize,
    },
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<BatchOutcome>,
}

impl RunReport {
    pub fn fully_dispatched(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| matches!(o, BatchOutcome::Dispatched { .. }))
    }

    /// The failed batch as a typed error, if the run stopped on one.
    pub fn failure(&self) -> Option<EngineError> {
        self.outcomes.iter().find_map(|o| match o {
            BatchOutcome::Failed {
                batch_index,
                call_kind,
                first,
                last,
                reason,
            } => Some(EngineError::SubmissionFailed {
                batch_index: *batch_index,
                first: *first,
                last: *last,
                call_kind: *call_kind,
                reason: reason.clone(),
            }),
            _ => None,
        })
    }
}

enum RouteError {
    Aborted,
    Failed(anyhow::Error),
}

impl From<anyhow::Error> for RouteError {
    fn from(e: anyhow::Error) -> Self {
        RouteError::Failed(e)
    }
}

pub struct Engine<R> {
    rpc: Arc<R>,
    signer: WalletSigner,
    splitter: Address,
    target: RoutingTarget,
    chunk_size: usize,
    native_symbol: String,
}

impl<R: ChainRpc> Engine<R> {
    pub fn new(
        rpc: Arc<R>,
        signer: WalletSigner,
        splitter: Address,
        target: RoutingTarget,
        chunk_size: usize,
        native_symbol: impl Into<String>,
    ) -> Self {
        Self {
            rpc,
            signer,
            splitter,
            target,
            chunk_size,
            native_symbol: native_symbol.into(),
        }
    }

    pub fn wallet_address(&self) -> Address {
        self.signer.address()
    }

    /// Validate and plan a run without touching funds: derive the asset
    /// context, run the validator, batch, select methods and encode
    /// calldata. The only network reads are token metadata lookups.
    pub async fn prepare(&self, raw: &[RawInstruction]) -> Result<PreparedRun, EngineError> {
        if raw.is_empty() {
            return Err(EngineError::EmptyInstructionSet);
        }

        let (decimals, symbol) = match Asset::parse(&raw[0].asset) {
            Some(Asset::Native) => (18, self.native_symbol.clone()),
            Some(Asset::Token(token)) => (
                self.rpc.erc20_decimals(token).await?,
                self.rpc.erc20_symbol(token).await?,
            ),
            // Let the validator produce the offender-listing error.
            None => (18, self.native_symbol.clone()),
        };

        let validated = instruction::validate(raw, decimals, &symbol)?;
        for warning in &validated.warnings {
            tracing::warn!(
                payee = %warning.payee,
                count = warning.count,
                "duplicate payee (allowed, flagged)"
            );
        }

        let batches = plan::plan_batches(&validated.instructions, self.chunk_size)?;
        let required_total = amount::sum_amounts(batches.iter().map(|b| &b.total))?;
        tracing::info!(
            batches = batches.len(),
            sizes = ?batches.iter().map(|b| b.instructions.len()).collect::<Vec<_>>(),
            total = %format_amount(required_total, validated.asset.decimals),
            symbol = %validated.asset.symbol,
            "planned run"
        );

        let asset = validated.asset;
        let plans = batches
            .into_iter()
            .map(|b| plan::encode_plan(b, &asset))
            .collect();

        Ok(PreparedRun {
            asset,
            plans,
            warnings: validated.warnings,
            required_total,
        })
    }

    /// Check funding once against the full required total, then route each
    /// planned call in batch order. Stops at the first failure or abort.
    pub async fn dispatch(
        &self,
        prepared: &PreparedRun,
        gate: &ReviewGate,
    ) -> Result<RunReport, EngineError> {
        let source = self.target.funding_source(self.signer.address());
        let snapshot = guard::fetch_snapshot(
            self.rpc.as_ref(),
            source,
            &prepared.asset,
            self.splitter,
            prepared.required_total,
        )
        .await?;
        snapshot.check()?;

        let mut report = RunReport::default();
        for plan in &prepared.plans {
            let batch = &plan.batch;
            tracing::info!(
                batch = batch.index,
                payments = %format!("{}-{}", batch.first, batch.last),
                call = %plan.call_kind,
                total = %format_amount(batch.total, prepared.asset.decimals),
                symbol = %prepared.asset.symbol,
                "dispatching batch"
            );

            match self
                .route_call(self.splitter, plan.value, plan.calldata.clone(), gate)
                .await
            {
                Ok(receipt) => {
                    tracing::info!(batch = batch.index, ?receipt, "batch dispatched");
                    report.outcomes.push(BatchOutcome::Dispatched {
                        batch_index: batch.index,
                        call_kind: plan.call_kind,
                        receipt,
                    });
                }
                Err(RouteError::Aborted) => {
                    tracing::warn!(batch = batch.index, "run aborted during review pause");
                    report.outcomes.push(BatchOutcome::Aborted {
                        batch_index: batch.index,
                    });
                    break;
                }
                Err(RouteError::Failed(e)) => {
                    tracing::error!(batch = batch.index, error = %format!("{e:#}"), "batch failed");
                    report.outcomes.push(BatchOutcome::Failed {
                        batch_index: batch.index,
                        call_kind: plan.call_kind,
                        first: batch.first,
                        last: batch.last,
                        reason: format!("{e:#}"),
                    });
                    break;
                }
            }
        }
        Ok(report)
    }

    /// Grant the splitter an allowance from the funding source. `None`
    /// approves the maximum. Returns `None` if aborted during the pause.
    pub async fn approve(
        &self,
        token: Address,
        raw_amount: Option<&str>,
        gate: &ReviewGate,
    ) -> Result<Option<DispatchReceipt>, EngineError> {
        let decimals = self.rpc.erc20_decimals(token).await?;
        let symbol = self.rpc.erc20_symbol(token).await?;
        let value = match raw_amount {
            Some(raw) => amount::parse_amount(raw, decimals)?,
            None => U256::MAX,
        };

        let source = self.target.funding_source(self.signer.address());
        let current = self.rpc.erc20_allowance(token, source, self.splitter).await?;
        tracing::info!(
            current = %format_amount(current, decimals),
            approving = %format_amount(value, decimals),
            %symbol,
            "updating splitter allowance"
        );

        let calldata: Bytes = IERC20::approveCall {
            spender: self.splitter,
            value,
        }
        .abi_encode()
        .into();

        match self.route_call(token, U256::ZERO, calldata, gate).await {
            Ok(receipt) => Ok(Some(receipt)),
            Err(RouteError::Aborted) => Ok(None),
            Err(RouteError::Failed(e)) => Err(EngineError::Rpc(e)),
        }
    }

    /// Route one call to the configured target: sign and broadcast directly,
    /// or hand it to a multisig as a proposal.
    async fn route_call(
        &self,
        destination: Address,
        value: U256,
        calldata: Bytes,
        gate: &ReviewGate,
    ) -> Result<DispatchReceipt, RouteError> {
        match &self.target {
            RoutingTarget::DirectWallet => self
                .send_signed(destination, value, calldata, gate)
                .await
                .map(DispatchReceipt::Transaction),
            RoutingTarget::Multisig {
                address,
                kind: MultisigKind::Legacy,
                ..
            } => {
                // The proposal references the real destination and value;
                // the submission transaction itself carries none.
                let wrapped = encode_legacy_proposal(destination, value, calldata);
                self.send_signed(*address, U256::ZERO, wrapped, gate)
                    .await
                    .map(DispatchReceipt::Proposal)
            }
            RoutingTarget::Multisig {
                address,
                kind: MultisigKind::SafeStyle,
                service_url,
            } => {
                let url = service_url
                    .as_deref()
                    .ok_or_else(|| anyhow!("safe-style multisig requires a service url"))?;
                let service = SafeServiceClient::new(url, DEFAULT_RPC_TIMEOUT_MS)?;
                let chain_id = self.rpc.chain_id().await?;
                let hash = propose_to_safe(
                    &service,
                    &self.signer,
                    chain_id,
                    *address,
                    destination,
                    value,
                    calldata,
                )
                .await?;
                Ok(DispatchReceipt::Proposal(hash))
            }
        }
    }

    async fn send_signed(
        &self,
        to: Address,
        value: U256,
        calldata: Bytes,
        gate: &ReviewGate,
    ) -> Result<B256, RouteError> {
        let from = self.signer.address();
        let gas = self
            .rpc
            .estimate_gas(from, to, value, calldata.clone())
            .await?;
        let gas_price = self.rpc.gas_price().await?;
        tracing::info!(gas, gas_price, "estimated gas");

        if !gate.wait().await {
            return Err(RouteError::Aborted);
        }

        // Refresh after the pause; fees move.
        let gas_price = self.rpc.gas_price().await?;
        let nonce = self.rpc.transaction_count(from).await?;
        let chain_id = self.rpc.chain_id().await?;
        let raw = self
            .signer
            .sign_legacy(chain_id, nonce, gas_price, gas, to, value, calldata)?;
        Ok(self.rpc.send_raw_transaction(raw).await?)
    }
}
