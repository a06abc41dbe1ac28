//! Plain-text batch summaries for operator review.

use crate::amount::format_amount;
use crate::instruction::AssetContext;
use crate::plan::DispatchPlan;

/// Render one batch as an aligned table: payee, name, base units, display
/// amount, symbol. Shown before dispatch so the operator can eyeball what is
/// about to move.
pub fn render_batch(plan: &DispatchPlan, asset: &AssetContext) -> String {
    let batch = &plan.batch;
    let mut rows: Vec<[String; 4]> = Vec::with_capacity(batch.instructions.len());
    for ins in &batch.instructions {
        rows.push([
            ins.payee.to_string(),
            ins.name.clone().unwrap_or_default(),
            ins.amount.to_string(),
            format!("{} {}", format_amount(ins.amount, asset.decimals), asset.symbol),
        ]);
    }

    let headers = ["payee", "name", "base units", "amount"];
    let mut widths = headers.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }

    let mut out = format!(
        "batch {} | payments {}-{} | {} | total {} {}\n",
        batch.index + 1,
        batch.first,
        batch.last,
        plan.call_kind,
        format_amount(batch.total, asset.decimals),
        asset.symbol,
    );
    let fmt_row = |cells: [&str; 4]| {
        let mut line = String::new();
        for (i, (cell, &width)) in cells.iter().zip(widths.iter()).enumerate() {
            if i > 0 {
                line.push_str("  ");
            }
            line.push_str(&format!("{cell:<width$}"));
        }
        line.trim_end().to_string()
    };
    out.push_str(&fmt_row(headers));
    out.push('\n');
    for row in &rows {
        out.push_str(&fmt_row([
            row[0].as_str(),
            row[1].as_str(),
            row[2].as_str(),
            row[3].as_str(),
        ]));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{Asset, PaymentInstruction};
    use crate::plan::{encode_plan, plan_batches};
    use alloy::primitives::{Address, U256};

    #[test]
    fn renders_header_and_one_row_per_payment() {
        let instructions = vec![
            PaymentInstruction {
                payee: Address::repeat_byte(0x11),
                amount: U256::from(1_500_000u64),
                name: Some("Acme".into()),
            },
            PaymentInstruction {
                payee: Address::repeat_byte(0x22),
                amount: U256::from(500_000u64),
                name: None,
            },
        ];
        let asset = AssetContext::new(Asset::Token(Address::repeat_byte(0xfe)), 6, "USDC");
        let batches = plan_batches(&instructions, 200).unwrap();
        let rendered = render_batch(&encode_plan(batches[0].clone(), &asset), &asset);

        assert!(rendered.starts_with("batch 1 | payments 1-2 | pay | total 2 USDC"));
        assert!(rendered.contains("Acme"));
        assert!(rendered.contains("1.5 USDC"));
        assert_eq!(rendered.lines().count(), 4);
    }
}
