use tracing::debug;

use crate::error::InvoiceError;
use crate::model::{InvoiceLineItem, InvoiceTotals, ProfitSetting};
use crate::profit::apply_profit;

/// Sum the lines and lay the profit overlay over the total. Line items keep
/// their pre-margin prices.
pub fn aggregate(
    line_items: Vec<InvoiceLineItem>,
    number_of_sets: u32,
    profit: &ProfitSetting,
) -> InvoiceTotals {
    let base_total: f64 = line_items.iter().map(|i| i.line_total).sum();

    let (final_total, per_set_price) = if number_of_sets > 0 {
        let final_total = apply_profit(base_total, number_of_sets, profit);
        (final_total, Some(final_total / number_of_sets as f64))
    } else {
        (base_total, None)
    };

    debug!(
        lines = line_items.len(),
        base_total,
        final_total,
        number_of_sets,
        "Invoice aggregated"
    );

    InvoiceTotals {
        line_items,
        base_total,
        final_total,
        per_set_price,
    }
}

/// Drop one line and re-total with the sets count captured when the invoice
/// was calculated.
pub fn remove_line(
    totals: &InvoiceTotals,
    index: usize,
    number_of_sets: u32,
    profit: &ProfitSetting,
) -> Result<InvoiceTotals, InvoiceError> {
    let len = totals.line_items.len();
    if index >= len {
        return Err(InvoiceError::LineIndexOutOfRange { index, len });
    }
    let mut remaining = totals.line_items.clone();
    remaining.remove(index);
    Ok(aggregate(remaining, number_of_sets, profit))
}
