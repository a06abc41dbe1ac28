//! Run configuration.
//!
//! Everything the engine needs for one run is carried in this struct,
//! credentials included, so nothing lives in process-wide mutable state.
//! Loaded from a TOML file with environment overrides for the values that
//! should not sit on disk.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use alloy::primitives::Address;
use serde::Deserialize;

use crate::error::EngineError;
use crate::multisig::{MultisigKind, RoutingTarget};

pub const DEFAULT_CHUNK_SIZE: usize = 200;
pub const DEFAULT_REVIEW_DELAY_SECS: u64 = 15;
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 8_000;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// JSON-RPC endpoint.
    pub rpc_url: String,
    /// Splitter contract address.
    pub splitter: String,
    /// Signing key, hex. Usually supplied via `SPLITPAY_KEY` instead.
    pub wallet_key: Option<String>,
    /// Maximum payments per batch.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Human-review pause before each direct submission, in seconds.
    #[serde(default = "default_review_delay")]
    pub review_delay_secs: u64,
    /// Display symbol for the chain's native currency.
    #[serde(default = "default_native_symbol")]
    pub native_symbol: String,
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_ms: u64,
    /// Route through a multisig instead of signing directly.
    pub multisig: Option<MultisigConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultisigConfig {
    pub address: String,
    /// `legacy-multisig` or `safe-style-multisig`.
    pub kind: String,
    /// Coordination service base URL; required for the safe-style kind.
    pub service_url: Option<String>,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_review_delay() -> u64 {
    DEFAULT_REVIEW_DELAY_SECS
}
fn default_native_symbol() -> String {
    "AVAX".to_string()
}
fn default_rpc_timeout() -> u64 {
    DEFAULT_RPC_TIMEOUT_MS
}

impl Config {
    /// Load from a TOML file and apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SPLITPAY_RPC_URL") {
            self.rpc_url = url;
        }
        if let Ok(key) = std::env::var("SPLITPAY_KEY") {
            self.wallet_key = Some(key);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(anyhow!("chunk_size must be a positive integer"));
        }
        Ok(())
    }

    pub fn splitter_address(&self) -> Result<Address> {
        self.splitter
            .trim()
            .parse()
            .with_context(|| format!("invalid splitter address {:?}", self.splitter))
    }

    pub fn wallet_key(&self) -> Result<&str> {
        self.wallet_key
            .as_deref()
            .ok_or_else(|| anyhow!("no wallet key: set wallet_key or SPLITPAY_KEY"))
    }

    /// Resolve the routing target. Unknown multisig kinds fail here, before
    /// any network call is made.
    pub fn routing_target(&self) -> Result<RoutingTarget, EngineError> {
        let Some(ms) = &self.multisig else {
            return Ok(RoutingTarget::DirectWallet);
        };
        let kind = MultisigKind::parse(&ms.kind)?;
        let address: Address = ms
            .address
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid multisig address {:?}", ms.address))?;
        if kind == MultisigKind::SafeStyle && ms.service_url.is_none() {
            return Err(
                anyhow!("safe-style-multisig requires multisig.service_url").into(),
            );
        }
        Ok(RoutingTarget::Multisig {
            address,
            kind,
            service_url: ms.service_url.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
rpc_url = "https://api.avax.network/ext/bc/C/rpc"
splitter = "0x53C3d85106e966e81a43cc80657414e88d9f91f4"
"#;

    fn parse(extra: &str) -> Config {
        toml::from_str(&format!("{MINIMAL}{extra}")).unwrap()
    }

    #[test]
    fn defaults_apply() {
        let config = parse("");
        assert_eq!(config.chunk_size, 200);
        assert_eq!(config.review_delay_secs, 15);
        assert_eq!(config.native_symbol, "AVAX");
        assert!(matches!(
            config.routing_target().unwrap(),
            RoutingTarget::DirectWallet
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert!(config.splitter_address().is_ok());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let config = parse("chunk_size = 0");
        assert!(config.validate().is_err());
    }

    #[test]
    fn legacy_multisig_target_parses() {
        let config = parse(
            r#"
[multisig]
address = "0x66c048d27aFB5EE59E4C07101A483654246A4eda"
kind = "legacy-multisig"
"#,
        );
        match config.routing_target().unwrap() {
            RoutingTarget::Multisig { kind, .. } => assert_eq!(kind, MultisigKind::Legacy),
            other => panic!("unexpected target: {other:?}"),
        }
    }

    #[test]
    fn unknown_multisig_kind_fails_before_any_network_call() {
        let config = parse(
            r#"
[multisig]
address = "0x66c048d27aFB5EE59E4C07101A483654246A4eda"
kind = "unknown-type"
"#,
        );
        match config.routing_target().unwrap_err() {
            EngineError::UnsupportedMultisigType(kind) => assert_eq!(kind, "unknown-type"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn safe_style_requires_service_url() {
        let config = parse(
            r#"
[multisig]
address = "0x66c048d27aFB5EE59E4C07101A483654246A4eda"
kind = "safe-style-multisig"
"#,
        );
        assert!(config.routing_target().is_err());
    }
}
