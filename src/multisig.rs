//! Multisig proposal backends.
//!
//! Two interchangeable backends stand behind one `propose(destination,
//! value, bytecode)` operation: the legacy multisig takes proposals as
//! on-chain `submitTransaction` calls; the Safe-style multisig takes them as
//! signed payloads POSTed to an off-chain coordination service. Backend
//! identifiers are validated up front, before any network traffic.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::{json, Value};

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::{eip712_domain, SolCall, SolStruct};

use crate::abi::{ILegacyMultisig, SafeTx};
use crate::error::EngineError;
use crate::signer::WalletSigner;

/// Recognized multisig backend identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultisigKind {
    Legacy,
    SafeStyle,
}

impl MultisigKind {
    pub const LEGACY: &'static str = "legacy-multisig";
    pub const SAFE_STYLE: &'static str = "safe-style-multisig";

    /// Parse a configured backend identifier, rejecting unknown values
    /// before any batch is processed.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        match raw.trim() {
            Self::LEGACY => Ok(MultisigKind::Legacy),
            Self::SAFE_STYLE => Ok(MultisigKind::SafeStyle),
            other => Err(EngineError::UnsupportedMultisigType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MultisigKind::Legacy => Self::LEGACY,
            MultisigKind::SafeStyle => Self::SAFE_STYLE,
        }
    }
}

/// Where each planned call is routed: signed directly from the wallet, or
/// proposed to a multisig for out-of-band approval. Selected once per run.
#[derive(Debug, Clone)]
pub enum RoutingTarget {
    DirectWallet,
    Multisig {
        address: Address,
        kind: MultisigKind,
        /// Coordination service base URL; Safe-style backends only.
        service_url: Option<String>,
    },
}

impl RoutingTarget {
    /// The account whose balance/allowance funds the run.
    pub fn funding_source(&self, wallet: Address) -> Address {
        match self {
            RoutingTarget::DirectWallet => wallet,
            RoutingTarget::Multisig { address, .. } => *address,
        }
    }
}

/// Encode a legacy-multisig proposal: an on-chain `submitTransaction` call
/// wrapping the destination, value and payload. The outer transaction itself
/// carries no value; the multisig supplies the funds on execution.
pub fn encode_legacy_proposal(destination: Address, value: U256, bytecode: Bytes) -> Bytes {
    ILegacyMultisig::submitTransactionCall {
        destination,
        value,
        data: bytecode,
    }
    .abi_encode()
    .into()
}

/// Compute the EIP-712 hash a Safe owner signs for a proposal.
pub fn safe_tx_hash(chain_id: u64, safe: Address, tx: &SafeTx) -> B256 {
    let domain = eip712_domain! {
        chain_id: chain_id,
        verifying_contract: safe,
    };
    tx.eip712_signing_hash(&domain)
}

/// Client for the Safe-style off-chain coordination service.
pub struct SafeServiceClient {
    http: Client,
    base_url: String,
}

impl SafeServiceClient {
    pub fn new(base_url: impl Into<String>, timeout_ms: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .context("building safe service client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        if !resp.status().is_success() {
            return Err(anyhow!("GET {url}: service returned {}", resp.status()));
        }
        resp.json().await.with_context(|| format!("GET {url}: bad body"))
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(anyhow!("POST {url}: service returned {status}: {detail}"));
        }
        Ok(resp.json().await.unwrap_or(Value::Null))
    }

    /// Next unused proposal nonce for the safe.
    pub async fn next_nonce(&self, safe: Address) -> Result<u64> {
        let info = self.get(&format!("/api/v1/safes/{safe}/")).await?;
        info.get("nonce")
            .and_then(Value::as_u64)
            .ok_or_else(|| anyhow!("safe info response missing nonce"))
    }

    /// Service-side gas estimate for a proposal.
    pub async fn estimate_safe_tx_gas(
        &self,
        safe: Address,
        destination: Address,
        value: U256,
        data: &Bytes,
    ) -> Result<U256> {
        let resp = self
            .post(
                &format!("/api/v1/safes/{safe}/multisig-transactions/estimations/"),
                json!({
                    "to": destination,
                    "value": value.to_string(),
                    "data": data,
                    "operation": 0,
                }),
            )
            .await?;
        let gas = resp
            .get("safeTxGas")
            .ok_or_else(|| anyhow!("estimation response missing safeTxGas"))?;
        match gas {
            Value::String(s) => s.parse::<U256>().context("parsing safeTxGas"),
            Value::Number(n) => n
                .as_u64()
                .map(U256::from)
                .ok_or_else(|| anyhow!("non-integer safeTxGas")),
            other => Err(anyhow!("unexpected safeTxGas value: {other}")),
        }
    }

    /// Submit a signed proposal for the safe's owners to confirm.
    pub async fn propose(
        &self,
        safe: Address,
        tx: &SafeTx,
        tx_hash: B256,
        sender: Address,
        signature: &str,
    ) -> Result<()> {
        self.post(
            &format!("/api/v1/safes/{safe}/multisig-transactions/"),
            json!({
                "to": tx.to,
                "value": tx.value.to_string(),
                "data": tx.data,
                "operation": tx.operation,
                "safeTxGas": tx.safeTxGas.to_string(),
                "baseGas": tx.baseGas.to_string(),
                "gasPrice": tx.gasPrice.to_string(),
                "gasToken": tx.gasToken,
                "refundReceiver": tx.refundReceiver,
                "nonce": u64::try_from(tx.nonce).map_err(|_| anyhow!("nonce exceeds u64"))?,
                "contractTransactionHash": tx_hash,
                "sender": sender,
                "signature": signature,
            }),
        )
        .await?;
        Ok(())
    }
}

/// Build, hash, sign and submit one Safe proposal. Returns the safe
/// transaction hash as the proposal receipt.
pub async fn propose_to_safe(
    service: &SafeServiceClient,
    signer: &WalletSigner,
    chain_id: u64,
    safe: Address,
    destination: Address,
    value: U256,
    bytecode: Bytes,
) -> Result<B256> {
    let nonce = service.next_nonce(safe).await?;
    let safe_tx_gas = service
        .estimate_safe_tx_gas(safe, destination, value, &bytecode)
        .await?;

    let tx = SafeTx {
        to: destination,
        value,
        data: bytecode,
        operation: 0,
        safeTxGas: safe_tx_gas,
        baseGas: U256::ZERO,
        gasPrice: U256::ZERO,
        gasToken: Address::ZERO,
        refundReceiver: Address::ZERO,
        nonce: U256::from(nonce),
    };

    let hash = safe_tx_hash(chain_id, safe, &tx);
    let signature = signer.sign_hash(&hash)?;
    let signature_hex = format!("0x{}", hex::encode(signature.as_bytes()));

    service
        .propose(safe, &tx, hash, signer.address(), &signature_hex)
        .await?;
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::keccak256;

    #[test]
    fn recognized_kinds_parse() {
        assert_eq!(
            MultisigKind::parse("legacy-multisig").unwrap(),
            MultisigKind::Legacy
        );
        assert_eq!(
            MultisigKind::parse("safe-style-multisig").unwrap(),
            MultisigKind::SafeStyle
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        match MultisigKind::parse("unknown-type").unwrap_err() {
            EngineError::UnsupportedMultisigType(kind) => assert_eq!(kind, "unknown-type"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn legacy_proposal_wraps_destination_value_and_payload() {
        let destination = Address::repeat_byte(0x53);
        let payload: Bytes = vec![0xde, 0xad].into();
        let encoded = encode_legacy_proposal(destination, U256::from(7u64), payload.clone());

        let expected_selector =
            &keccak256("submitTransaction(address,uint256,bytes)".as_bytes())[..4];
        assert_eq!(&encoded[..4], expected_selector);

        let decoded =
            ILegacyMultisig::submitTransactionCall::abi_decode(&encoded).unwrap();
        assert_eq!(decoded.destination, destination);
        assert_eq!(decoded.value, U256::from(7u64));
        assert_eq!(decoded.data, payload);
    }

    #[test]
    fn safe_tx_hash_binds_chain_safe_and_payload() {
        let tx = SafeTx {
            to: Address::repeat_byte(0x01),
            value: U256::from(1u64),
            data: Bytes::new(),
            operation: 0,
            safeTxGas: U256::ZERO,
            baseGas: U256::ZERO,
            gasPrice: U256::ZERO,
            gasToken: Address::ZERO,
            refundReceiver: Address::ZERO,
            nonce: U256::ZERO,
        };
        let safe = Address::repeat_byte(0x66);

        let h1 = safe_tx_hash(43_114, safe, &tx);
        assert_eq!(h1, safe_tx_hash(43_114, safe, &tx));
        assert_ne!(h1, safe_tx_hash(1, safe, &tx));
        assert_ne!(h1, safe_tx_hash(43_114, Address::repeat_byte(0x67), &tx));

        let mut other = tx;
        other.nonce = U256::from(1u64);
        assert_ne!(h1, safe_tx_hash(43_114, safe, &other));
    }
}
