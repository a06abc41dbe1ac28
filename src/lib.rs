//! splitpay: bulk payment dispatch through an on-chain splitter contract.
//!
//! Validates a payment instruction list, batches it under a configured chunk
//! size, picks the cheapest splitter entry point per batch, checks funding
//! once up front, and routes each batch either to direct wallet signing or
//! to a multisig backend as a proposal.

pub mod abi;
pub mod amount;
pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod instruction;
pub mod multisig;
pub mod plan;
pub mod rpc;
pub mod signer;
pub mod table;
