//! Run-scoped signing.
//!
//! Holds the wallet key for the duration of one run and produces signed
//! legacy transactions and raw-hash signatures (Safe proposals). Nothing here
//! persists the key or shares it beyond the run configuration.

use anyhow::{Context, Result};
use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, Bytes, Signature, TxKind, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;

pub struct WalletSigner {
    inner: PrivateKeySigner,
}

impl WalletSigner {
    pub fn from_hex(key: &str) -> Result<Self> {
        let inner: PrivateKeySigner = key
            .trim()
            .parse()
            .context("parsing wallet key (expected 32-byte hex)")?;
        Ok(Self { inner })
    }

    /// The wallet address derived from the signing key.
    pub fn address(&self) -> Address {
        self.inner.address()
    }

    /// Sign a precomputed 32-byte hash (Safe transaction hashes).
    pub fn sign_hash(&self, hash: &B256) -> Result<Signature> {
        self.inner.sign_hash_sync(hash).context("signing hash")
    }

    /// Build and sign a legacy transaction, returning the raw bytes ready
    /// for `eth_sendRawTransaction`.
    #[allow(clippy::too_many_arguments)]
    pub fn sign_legacy(
        &self,
        chain_id: u64,
        nonce: u64,
        gas_price: u128,
        gas_limit: u64,
        to: Address,
        value: U256,
        input: Bytes,
    ) -> Result<Bytes> {
        let tx = TxLegacy {
            chain_id: Some(chain_id),
            nonce,
            gas_price,
            gas_limit,
            to: TxKind::Call(to),
            value,
            input,
        };
        let signature = self
            .inner
            .sign_hash_sync(&tx.signature_hash())
            .context("signing transaction")?;
        let envelope = TxEnvelope::Legacy(tx.into_signed(signature));
        Ok(envelope.encoded_2718().into())
    }
}

impl std::fmt::Debug for WalletSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.debug_struct("WalletSigner")
            .field("address", &self.address())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The well-known hardhat test key; never funded on a real network.
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDR: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn derives_the_expected_address() {
        let signer = WalletSigner::from_hex(TEST_KEY).unwrap();
        assert_eq!(signer.address(), TEST_ADDR.parse::<Address>().unwrap());
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(WalletSigner::from_hex("0x1234").is_err());
        assert!(WalletSigner::from_hex("not a key").is_err());
    }

    #[test]
    fn signed_legacy_transaction_is_rlp_encoded() {
        let signer = WalletSigner::from_hex(TEST_KEY).unwrap();
        let raw = signer
            .sign_legacy(
                43_114,
                0,
                25_000_000_000,
                21_000,
                Address::repeat_byte(0x11),
                U256::from(1u64),
                Bytes::new(),
            )
            .unwrap();
        // Legacy payloads start with an RLP list prefix, not a type byte.
        assert!(raw[0] >= 0xc0);
    }

    #[test]
    fn debug_output_hides_the_key() {
        let signer = WalletSigner::from_hex(TEST_KEY).unwrap();
        let dbg = format!("{signer:?}");
        assert!(!dbg.contains("ac0974be"));
    }
}
