//! Error taxonomy for the dispatch engine.
//!
//! Input and funding errors abort a run before any transaction is issued.
//! Dispatch errors are attributed to the batch that failed; batches already
//! sent are irreversible and are never rolled back.

use thiserror::Error;

use crate::plan::CallKind;

/// A single rejected entry, kept so input errors can report every offender
/// instead of failing on the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffendingEntry {
    /// Zero-based position in the input list.
    pub index: usize,
    /// The raw value as it appeared in the input.
    pub value: String,
}

impl std::fmt::Display for OffendingEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}: {}", self.index, self.value)
    }
}

fn list_entries(entries: &[OffendingEntry]) -> String {
    entries
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("empty instruction set: nothing to dispatch")]
    EmptyInstructionSet,

    #[error("instruction #{index} targets asset {found}, but this run targets {expected}")]
    NonUniformAsset {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("{} invalid payee address(es): {}", .0.len(), list_entries(.0))]
    InvalidAddress(Vec<OffendingEntry>),

    #[error("{} zero-amount payment(s): {}", .0.len(), list_entries(.0))]
    ZeroAmountPayment(Vec<OffendingEntry>),

    #[error("invalid amount {raw:?}: {reason}")]
    InvalidAmount { raw: String, reason: String },

    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: String, available: String },

    #[error("insufficient allowance for splitter: required {required}, granted {available}")]
    InsufficientAllowance { required: String, available: String },

    #[error("unsupported multisig type {0:?} (expected \"legacy-multisig\" or \"safe-style-multisig\")")]
    UnsupportedMultisigType(String),

    #[error("batch {batch_index} (payments {first}-{last}, {call_kind}) failed to dispatch: {reason}")]
    SubmissionFailed {
        batch_index: usize,
        first: usize,
        last: usize,
        call_kind: CallKind,
        reason: String,
    },

    #[error("rpc error: {0}")]
    Rpc(#[from] anyhow::Error),
}
