use tracing::debug;

use crate::error::InvoiceError;
use crate::model::{ProfitKind, ProfitSetting};

pub fn per_set_base(base_total: f64, number_of_sets: u32) -> Result<f64, InvoiceError> {
    if number_of_sets == 0 {
        return Err(InvoiceError::DivisionByZero);
    }
    Ok(base_total / number_of_sets as f64)
}

pub fn profit_per_set(per_set_base: f64, setting: &ProfitSetting) -> f64 {
    match setting.kind {
        ProfitKind::None => 0.0,
        ProfitKind::Percentage => per_set_base * setting.value / 100.0,
        ProfitKind::Fixed => setting.value,
    }
}

/// Add the margin to every set and multiply back out. With zero sets there
/// is nothing to split, so `base_total` comes back unchanged.
pub fn apply_profit(base_total: f64, number_of_sets: u32, setting: &ProfitSetting) -> f64 {
    if setting.kind == ProfitKind::None {
        return base_total;
    }
    match per_set_base(base_total, number_of_sets) {
        Ok(base) => (base + profit_per_set(base, setting)) * number_of_sets as f64,
        Err(err) => {
            debug!(%err, "Profit not applied");
            base_total
        }
    }
}
