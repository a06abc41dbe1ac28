//! Pre-flight funding checks.
//!
//! One snapshot of the funding source's balance (and, for tokens, its
//! allowance to the splitter) is taken before any dispatch and checked
//! against the full required total. It is not re-validated between batches;
//! the balance can move under a long multisig-reviewed run and that window
//! is an accepted limitation.

use alloy::primitives::{Address, U256};

use crate::amount::format_amount;
use crate::error::EngineError;
use crate::instruction::AssetContext;
use crate::rpc::ChainRpc;

/// Funding state at the moment of the pre-flight check.
#[derive(Debug, Clone)]
pub struct FundingSnapshot {
    pub required_total: U256,
    pub balance: U256,
    /// Allowance granted to the splitter; `None` for native runs.
    pub allowance: Option<U256>,
    decimals: u8,
}

impl FundingSnapshot {
    /// Fail if the funding source cannot cover the full run.
    pub fn check(&self) -> Result<(), EngineError> {
        if self.required_total > self.balance {
            return Err(EngineError::InsufficientBalance {
                required: format_amount(self.required_total, self.decimals),
                available: format_amount(self.balance, self.decimals),
            });
        }
        if let Some(allowance) = self.allowance {
            if self.required_total > allowance {
                return Err(EngineError::InsufficientAllowance {
                    required: format_amount(self.required_total, self.decimals),
                    available: format_amount(allowance, self.decimals),
                });
            }
        }
        Ok(())
    }
}

/// Read the funding source's balance/allowance for the run's asset.
pub async fn fetch_snapshot<R: ChainRpc + ?Sized>(
    rpc: &R,
    source: Address,
    asset: &AssetContext,
    splitter: Address,
    required_total: U256,
) -> Result<FundingSnapshot, EngineError> {
    let (balance, allowance) = match asset.token {
        None => (rpc.native_balance(source).await?, None),
        Some(token) => (
            rpc.erc20_balance_of(token, source).await?,
            Some(rpc.erc20_allowance(token, source, splitter).await?),
        ),
    };

    tracing::info!(
        source = %source,
        balance = %format_amount(balance, asset.decimals),
        allowance = ?allowance.map(|a| format_amount(a, asset.decimals)),
        required = %format_amount(required_total, asset.decimals),
        symbol = %asset.symbol,
        "funding snapshot"
    );

    Ok(FundingSnapshot {
        required_total,
        balance,
        allowance,
        decimals: asset.decimals,
    })
}
