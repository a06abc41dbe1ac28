//! Batch planning, method selection and call encoding.
//!
//! Pure over the validated instruction list: chunk it preserving order, sum
//! each chunk exactly, pick the cheapest splitter entry point per chunk and
//! encode the calldata. Method selection is a gas optimization only; it never
//! changes payment semantics or totals.

use alloy::primitives::{Bytes, U256};
use alloy::sol_types::SolCall;

use crate::abi::ISplitter;
use crate::amount;
use crate::error::EngineError;
use crate::instruction::{AssetContext, PaymentInstruction};

/// Which splitter entry point a batch is dispatched through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// `distribute(token, amount, payees)`: uniform token amounts.
    DistributeUniform,
    /// `pay(token, payees, amounts)`: general token amounts.
    PayGeneral,
    /// `distributeAVAX(amount, payees)`: uniform native amounts.
    DistributeUniformNative,
    /// `payAVAX(payees, amounts)`: general native amounts.
    PayGeneralNative,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::DistributeUniform => "distribute",
            CallKind::PayGeneral => "pay",
            CallKind::DistributeUniformNative => "distributeAVAX",
            CallKind::PayGeneralNative => "payAVAX",
        }
    }
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered slice of the instruction list, at most `chunk_size` long.
#[derive(Debug, Clone)]
pub struct PaymentBatch {
    /// Zero-based batch number.
    pub index: usize,
    /// One-based position of the first payment, for operator-facing output.
    pub first: usize,
    /// One-based position of the last payment.
    pub last: usize,
    pub instructions: Vec<PaymentInstruction>,
    /// Exact sum of this batch's amounts.
    pub total: U256,
}

/// A batch with its selected entry point and encoded calldata, ready to
/// route. `value` is the batch total for native kinds and zero for tokens.
#[derive(Debug, Clone)]
pub struct DispatchPlan {
    pub batch: PaymentBatch,
    pub call_kind: CallKind,
    pub calldata: Bytes,
    pub value: U256,
}

/// Partition a validated instruction list into order-preserving batches.
///
/// Batch `i` holds instructions `[i*chunk_size, (i+1)*chunk_size)`; the last
/// batch may be shorter. Empty input never reaches this stage.
pub fn plan_batches(
    instructions: &[PaymentInstruction],
    chunk_size: usize,
) -> Result<Vec<PaymentBatch>, EngineError> {
    debug_assert!(chunk_size > 0, "chunk size is config-validated");
    let mut batches = Vec::with_capacity(instructions.len().div_ceil(chunk_size));
    for (index, chunk) in instructions.chunks(chunk_size).enumerate() {
        let total = amount::sum_amounts(chunk.iter().map(|i| &i.amount))?;
        let first = index * chunk_size + 1;
        batches.push(PaymentBatch {
            index,
            first,
            last: first + chunk.len() - 1,
            instructions: chunk.to_vec(),
            total,
        });
    }
    Ok(batches)
}

/// Pick the cheapest matching entry point for a batch: the uniform-amount
/// `distribute` variants when every amount is identical, the general `pay`
/// variants otherwise. Per batch, not per run.
pub fn select_method(batch: &PaymentBatch, is_native: bool) -> CallKind {
    let uniform = batch
        .instructions
        .windows(2)
        .all(|w| w[0].amount == w[1].amount);
    match (uniform, is_native) {
        (true, false) => CallKind::DistributeUniform,
        (false, false) => CallKind::PayGeneral,
        (true, true) => CallKind::DistributeUniformNative,
        (false, true) => CallKind::PayGeneralNative,
    }
}

/// Select the entry point and encode the calldata for one batch.
pub fn encode_plan(batch: PaymentBatch, asset: &AssetContext) -> DispatchPlan {
    let call_kind = select_method(&batch, asset.is_native);
    let payees: Vec<_> = batch.instructions.iter().map(|i| i.payee).collect();
    let amounts: Vec<_> = batch.instructions.iter().map(|i| i.amount).collect();

    let calldata: Bytes = match call_kind {
        CallKind::DistributeUniform => ISplitter::distributeCall {
            token: asset.token.expect("token asset"),
            amount: amounts[0],
            payees,
        }
        .abi_encode()
        .into(),
        CallKind::PayGeneral => ISplitter::payCall {
            token: asset.token.expect("token asset"),
            payees,
            amounts,
        }
        .abi_encode()
        .into(),
        CallKind::DistributeUniformNative => ISplitter::distributeAVAXCall {
            amount: amounts[0],
            payees,
        }
        .abi_encode()
        .into(),
        CallKind::PayGeneralNative => ISplitter::payAVAXCall { payees, amounts }
            .abi_encode()
            .into(),
    };

    let value = if asset.is_native {
        batch.total
    } else {
        U256::ZERO
    };

    DispatchPlan {
        batch,
        call_kind,
        calldata,
        value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Asset;
    use alloy::primitives::Address;

    fn payment(seed: u64, amount: u64) -> PaymentInstruction {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&seed.to_be_bytes());
        PaymentInstruction {
            payee: Address::from(bytes),
            amount: U256::from(amount),
            name: None,
        }
    }

    fn token_ctx() -> AssetContext {
        AssetContext::new(
            Asset::Token(Address::repeat_byte(0xfe)),
            18,
            "PAY",
        )
    }

    #[test]
    fn partitions_450_into_200_200_50() {
        let instructions: Vec<_> = (0..450).map(|i| payment(i, 100)).collect();
        let batches = plan_batches(&instructions, 200).unwrap();

        assert_eq!(
            batches.iter().map(|b| b.instructions.len()).collect::<Vec<_>>(),
            vec![200, 200, 50]
        );
        assert_eq!(
            batches.iter().map(|b| b.total).collect::<Vec<_>>(),
            vec![U256::from(20_000u64), U256::from(20_000u64), U256::from(5_000u64)]
        );
        assert_eq!(
            batches.iter().map(|b| (b.first, b.last)).collect::<Vec<_>>(),
            vec![(1, 200), (201, 400), (401, 450)]
        );
        for batch in &batches {
            assert_eq!(select_method(batch, false), CallKind::DistributeUniform);
        }
    }

    #[test]
    fn partition_preserves_order_and_multiset() {
        let instructions: Vec<_> = (0..47).map(|i| payment(i, i + 1)).collect();
        let batches = plan_batches(&instructions, 10).unwrap();

        let rejoined: Vec<_> = batches
            .iter()
            .flat_map(|b| b.instructions.iter().cloned())
            .collect();
        assert_eq!(rejoined, instructions);
    }

    #[test]
    fn batch_totals_sum_to_instruction_total() {
        let instructions: Vec<_> = (0..321).map(|i| payment(i, 7 * i + 3)).collect();
        let batches = plan_batches(&instructions, 50).unwrap();

        let from_batches =
            amount::sum_amounts(batches.iter().map(|b| &b.total)).unwrap();
        let from_instructions =
            amount::sum_amounts(instructions.iter().map(|i| &i.amount)).unwrap();
        assert_eq!(from_batches, from_instructions);
    }

    #[test]
    fn chunk_size_at_least_len_yields_one_batch() {
        let instructions: Vec<_> = (0..5).map(|i| payment(i, 10)).collect();
        assert_eq!(plan_batches(&instructions, 5).unwrap().len(), 1);
        assert_eq!(plan_batches(&instructions, 200).unwrap().len(), 1);
    }

    #[test]
    fn mixed_amounts_select_general_pay() {
        let instructions = vec![payment(1, 100), payment(2, 150)];
        let batches = plan_batches(&instructions, 200).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].total, U256::from(250u64));
        assert_eq!(select_method(&batches[0], false), CallKind::PayGeneral);
        assert_eq!(select_method(&batches[0], true), CallKind::PayGeneralNative);
    }

    #[test]
    fn selection_is_deterministic() {
        let instructions = vec![payment(1, 100), payment(2, 100), payment(3, 100)];
        let batches = plan_batches(&instructions, 10).unwrap();
        for _ in 0..3 {
            assert_eq!(select_method(&batches[0], false), CallKind::DistributeUniform);
        }
    }

    #[test]
    fn selection_is_per_batch_not_per_run() {
        // First chunk uniform, second not.
        let instructions = vec![
            payment(1, 100),
            payment(2, 100),
            payment(3, 100),
            payment(4, 250),
        ];
        let batches = plan_batches(&instructions, 2).unwrap();
        assert_eq!(select_method(&batches[0], false), CallKind::DistributeUniform);
        assert_eq!(select_method(&batches[1], false), CallKind::PayGeneral);
    }

    #[test]
    fn single_payment_counts_as_uniform() {
        let batches = plan_batches(&[payment(1, 42)], 10).unwrap();
        assert_eq!(select_method(&batches[0], false), CallKind::DistributeUniform);
    }

    #[test]
    fn native_plans_carry_the_batch_total_as_value() {
        let ctx = AssetContext::new(Asset::Native, 18, "AVAX");
        let batches =
            plan_batches(&[payment(1, 100), payment(2, 150)], 10).unwrap();
        let plan = encode_plan(batches[0].clone(), &ctx);
        assert_eq!(plan.call_kind, CallKind::PayGeneralNative);
        assert_eq!(plan.value, U256::from(250u64));
        assert_eq!(
            &plan.calldata[..4],
            ISplitter::payAVAXCall::SELECTOR.as_slice()
        );
    }

    #[test]
    fn token_plans_carry_zero_value() {
        let ctx = token_ctx();
        let batches = plan_batches(&[payment(1, 100), payment(2, 100)], 10).unwrap();
        let plan = encode_plan(batches[0].clone(), &ctx);
        assert_eq!(plan.call_kind, CallKind::DistributeUniform);
        assert_eq!(plan.value, U256::ZERO);
        assert_eq!(
            &plan.calldata[..4],
            ISplitter::distributeCall::SELECTOR.as_slice()
        );
    }
}
