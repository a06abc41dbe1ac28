//! JSON-RPC access to the chain.
//!
//! The engine consumes the `ChainRpc` capability; `HttpRpc` is the production
//! implementation speaking JSON-RPC 2.0 over HTTP. Calls are single-shot:
//! a failed request surfaces to the caller, retry policy is an operational
//! decision outside this tool.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolCall;

use crate::abi::IERC20;

/// The chain-read/broadcast capability the dispatch engine consumes.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;
    async fn gas_price(&self) -> Result<u128>;
    async fn native_balance(&self, account: Address) -> Result<U256>;
    async fn transaction_count(&self, account: Address) -> Result<u64>;
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;
    async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
        data: Bytes,
    ) -> Result<u64>;
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256>;

    // Typed ERC-20 reads on top of `eth_call`.

    async fn erc20_decimals(&self, token: Address) -> Result<u8> {
        let ret = self
            .call(token, IERC20::decimalsCall {}.abi_encode().into())
            .await?;
        IERC20::decimalsCall::abi_decode_returns(&ret)
            .context("decoding decimals() return")
    }

    async fn erc20_symbol(&self, token: Address) -> Result<String> {
        let ret = self
            .call(token, IERC20::symbolCall {}.abi_encode().into())
            .await?;
        IERC20::symbolCall::abi_decode_returns(&ret).context("decoding symbol() return")
    }

    async fn erc20_balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        let ret = self
            .call(token, IERC20::balanceOfCall { owner }.abi_encode().into())
            .await?;
        IERC20::balanceOfCall::abi_decode_returns(&ret)
            .context("decoding balanceOf() return")
    }

    async fn erc20_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256> {
        let ret = self
            .call(
                token,
                IERC20::allowanceCall { owner, spender }.abi_encode().into(),
            )
            .await?;
        IERC20::allowanceCall::abi_decode_returns(&ret)
            .context("decoding allowance() return")
    }
}

/// JSON-RPC 2.0 client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRpc {
    url: String,
    http: Client,
}

impl HttpRpc {
    pub fn new(url: impl Into<String>, timeout_ms: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .context("building http client")?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        tracing::debug!(method, "rpc request");

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{method}: request failed"))?;

        if !resp.status().is_success() {
            tracing::warn!(method, status = %resp.status(), "rpc endpoint returned error status");
            return Err(anyhow!("{method}: endpoint returned {}", resp.status()));
        }

        let json: Value = resp
            .json()
            .await
            .with_context(|| format!("{method}: malformed response body"))?;

        if let Some(err) = json.get("error") {
            if !err.is_null() {
                tracing::warn!(method, error = %err, "rpc returned error response");
                return Err(anyhow!("{method}: rpc error: {err}"));
            }
        }

        Ok(json.get("result").cloned().unwrap_or(Value::Null))
    }
}

fn quantity(v: U256) -> String {
    format!("0x{v:x}")
}

fn parse_u256(v: &Value) -> Result<U256> {
    let s = v
        .as_str()
        .ok_or_else(|| anyhow!("expected quantity string, got {v}"))?;
    let digits = s.strip_prefix("0x").unwrap_or(s);
    U256::from_str_radix(digits, 16).with_context(|| format!("bad quantity {s:?}"))
}

fn parse_u64(v: &Value) -> Result<u64> {
    u64::try_from(parse_u256(v)?).map_err(|_| anyhow!("quantity exceeds u64: {v}"))
}

fn parse_u128(v: &Value) -> Result<u128> {
    u128::try_from(parse_u256(v)?).map_err(|_| anyhow!("quantity exceeds u128: {v}"))
}

fn parse_bytes(v: &Value) -> Result<Bytes> {
    let s = v
        .as_str()
        .ok_or_else(|| anyhow!("expected hex data, got {v}"))?;
    s.parse::<Bytes>().with_context(|| format!("bad hex data {s:?}"))
}

#[async_trait]
impl ChainRpc for HttpRpc {
    async fn chain_id(&self) -> Result<u64> {
        parse_u64(&self.request("eth_chainId", json!([])).await?)
    }

    async fn gas_price(&self) -> Result<u128> {
        parse_u128(&self.request("eth_gasPrice", json!([])).await?)
    }

    async fn native_balance(&self, account: Address) -> Result<U256> {
        parse_u256(
            &self
                .request("eth_getBalance", json!([account, "latest"]))
                .await?,
        )
    }

    async fn transaction_count(&self, account: Address) -> Result<u64> {
        // "pending" so queued transactions from this wallet are counted.
        parse_u64(
            &self
                .request("eth_getTransactionCount", json!([account, "pending"]))
                .await?,
        )
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        parse_bytes(
            &self
                .request("eth_call", json!([{ "to": to, "data": data }, "latest"]))
                .await?,
        )
    }

    async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
        data: Bytes,
    ) -> Result<u64> {
        parse_u64(
            &self
                .request(
                    "eth_estimateGas",
                    json!([{
                        "from": from,
                        "to": to,
                        "value": quantity(value),
                        "data": data,
                    }]),
                )
                .await?,
        )
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256> {
        let v = self.request("eth_sendRawTransaction", json!([raw])).await?;
        let s = v
            .as_str()
            .ok_or_else(|| anyhow!("expected transaction hash, got {v}"))?;
        s.parse::<B256>()
            .with_context(|| format!("bad transaction hash {s:?}"))
    }
}
