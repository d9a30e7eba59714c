//! Proportional scaling of fabric, brooch and lace quantities from the base
//! width rule.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::InvoiceError;
use crate::model::WidthRule;

/// Quantities needed for a given number of sets at one width.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct ScaledQuantities {
    pub meters: f64,
    pub brooch_qty: u32,
    pub lace_qty: u32,
}

/// Round to one decimal place, halves away from zero.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Parse a sets count typed by the operator.
pub fn parse_sets(input: &str) -> Result<u32, InvoiceError> {
    let trimmed = input.trim();
    let value: i64 = trimmed.parse().map_err(|_| InvoiceError::InvalidSets {
        input: trimmed.to_string(),
        reason: "not a whole number",
    })?;
    if value <= 0 {
        return Err(InvoiceError::InvalidSets {
            input: trimmed.to_string(),
            reason: "must be greater than zero",
        });
    }
    u32::try_from(value).map_err(|_| InvoiceError::InvalidSets {
        input: trimmed.to_string(),
        reason: "too large",
    })
}

/// First usable rule for `width`. The catalog keeps rules unique per width,
/// so "first" only matters for hand-edited files.
pub fn base_rule(width: u32, rules: &[WidthRule]) -> Option<&WidthRule> {
    rules.iter().find(|r| r.width == width && r.sets > 0)
}

pub fn scale(
    width: u32,
    requested_sets: u32,
    rules: &[WidthRule],
) -> Result<ScaledQuantities, InvoiceError> {
    if requested_sets == 0 {
        return Err(InvoiceError::InvalidSets {
            input: requested_sets.to_string(),
            reason: "must be greater than zero",
        });
    }

    let rule = base_rule(width, rules).ok_or(InvoiceError::NoRuleForWidth(width))?;

    let meters_per_set = rule.meters / rule.sets as f64;
    let meters = round1(meters_per_set * requested_sets as f64);

    // round(lace_rolls * sets / base_sets), ties up, in integers
    let too_large = || InvoiceError::InvalidSets {
        input: requested_sets.to_string(),
        reason: "too large",
    };
    let numerator = 2u64
        .checked_mul(u64::from(rule.lace_rolls))
        .and_then(|n| n.checked_mul(u64::from(requested_sets)))
        .and_then(|n| n.checked_add(u64::from(rule.sets)))
        .ok_or_else(too_large)?;
    let lace_qty = u32::try_from(numerator / (2 * u64::from(rule.sets))).map_err(|_| too_large())?;

    debug!(
        width,
        requested_sets,
        base_sets = rule.sets,
        meters,
        lace_qty,
        "Scaled width rule"
    );

    Ok(ScaledQuantities {
        meters,
        brooch_qty: requested_sets,
        lace_qty,
    })
}
