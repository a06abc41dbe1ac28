//! Payment instructions and their pre-flight validation.
//!
//! Validation is purely structural and performs no network I/O: token
//! metadata (decimals, symbol) is resolved by the engine and passed in.
//! Input errors collect every offending entry so an operator can fix the
//! whole file in one pass.

use std::collections::HashMap;

use alloy::primitives::{Address, U256};
use serde::Deserialize;

use crate::amount;
use crate::error::{EngineError, OffendingEntry};

/// Literal marker selecting the chain's native currency instead of a token.
pub const NATIVE_MARKER: &str = "native";

/// One entry of the payments input file, as written by the operator.
#[derive(Debug, Clone, Deserialize)]
pub struct RawInstruction {
    pub payee: String,
    /// Decimal string (contains `.`) or base-unit integer string.
    pub amount: String,
    /// `native` or a token contract address; uniform across the run.
    pub asset: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// The asset a run pays out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asset {
    Native,
    Token(Address),
}

impl Asset {
    /// Parse the asset column: the native marker (case-insensitive) or a
    /// syntactically valid contract address.
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim();
        if s.eq_ignore_ascii_case(NATIVE_MARKER) {
            return Some(Asset::Native);
        }
        s.parse::<Address>().ok().map(Asset::Token)
    }
}

/// Asset metadata derived once per run from the first instruction.
#[derive(Debug, Clone)]
pub struct AssetContext {
    pub is_native: bool,
    pub decimals: u8,
    pub symbol: String,
    pub token: Option<Address>,
}

impl AssetContext {
    pub fn new(asset: Asset, decimals: u8, symbol: impl Into<String>) -> Self {
        match asset {
            Asset::Native => AssetContext {
                is_native: true,
                decimals,
                symbol: symbol.into(),
                token: None,
            },
            Asset::Token(addr) => AssetContext {
                is_native: false,
                decimals,
                symbol: symbol.into(),
                token: Some(addr),
            },
        }
    }
}

/// A validated payment: well-formed payee, positive base-unit amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInstruction {
    pub payee: Address,
    pub amount: U256,
    pub name: Option<String>,
}

/// Non-fatal: the same payee appears more than once. Multiple legitimate
/// payments to one address are allowed but must be flagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateWarning {
    pub payee: Address,
    pub count: usize,
}

#[derive(Debug)]
pub struct Validated {
    pub instructions: Vec<PaymentInstruction>,
    pub asset: AssetContext,
    pub warnings: Vec<DuplicateWarning>,
}

/// Validate a raw instruction list against the run's asset metadata.
///
/// Check order: empty input, asset uniformity, payee well-formedness (all
/// offenders collected), zero amounts (all offenders collected), then a
/// duplicate-payee scan that only warns. Duplicate comparison is
/// case-insensitive by construction: addresses are compared after parsing.
pub fn validate(
    raw: &[RawInstruction],
    decimals: u8,
    symbol: &str,
) -> Result<Validated, EngineError> {
    if raw.is_empty() {
        return Err(EngineError::EmptyInstructionSet);
    }

    let first_asset =
        Asset::parse(&raw[0].asset).ok_or_else(|| invalid_asset_entry(0, &raw[0].asset))?;
    for (index, entry) in raw.iter().enumerate().skip(1) {
        let asset = Asset::parse(&entry.asset)
            .ok_or_else(|| invalid_asset_entry(index, &entry.asset))?;
        if asset != first_asset {
            return Err(EngineError::NonUniformAsset {
                index,
                expected: raw[0].asset.trim().to_string(),
                found: entry.asset.trim().to_string(),
            });
        }
    }

    let mut bad_addresses = Vec::new();
    let mut payees = Vec::with_capacity(raw.len());
    for (index, entry) in raw.iter().enumerate() {
        match entry.payee.trim().parse::<Address>() {
            Ok(addr) => payees.push(addr),
            Err(_) => bad_addresses.push(OffendingEntry {
                index,
                value: entry.payee.clone(),
            }),
        }
    }
    if !bad_addresses.is_empty() {
        return Err(EngineError::InvalidAddress(bad_addresses));
    }

    let mut zero_amounts = Vec::new();
    let mut amounts = Vec::with_capacity(raw.len());
    for (index, entry) in raw.iter().enumerate() {
        let units = amount::parse_amount(&entry.amount, decimals)?;
        if units.is_zero() {
            zero_amounts.push(OffendingEntry {
                index,
                value: entry.amount.clone(),
            });
        }
        amounts.push(units);
    }
    if !zero_amounts.is_empty() {
        return Err(EngineError::ZeroAmountPayment(zero_amounts));
    }

    let mut seen: HashMap<Address, usize> = HashMap::new();
    for payee in &payees {
        *seen.entry(*payee).or_default() += 1;
    }
    let mut warnings: Vec<DuplicateWarning> = seen
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(payee, count)| DuplicateWarning { payee, count })
        .collect();
    warnings.sort_by_key(|w| w.payee);

    let instructions = raw
        .iter()
        .zip(payees)
        .zip(amounts)
        .map(|((entry, payee), amount)| PaymentInstruction {
            payee,
            amount,
            name: entry.name.clone(),
        })
        .collect();

    Ok(Validated {
        instructions,
        asset: AssetContext::new(first_asset, decimals, symbol),
        warnings,
    })
}

fn invalid_asset_entry(index: usize, value: &str) -> EngineError {
    EngineError::InvalidAddress(vec![OffendingEntry {
        index,
        value: format!("asset: {value}"),
    }])
}
