use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::InvoiceError;

// ==========================================
// Catalog Records
// ==========================================

/// Base consumption for one fabric width: `sets` sets use `meters` of
/// fabric and `lace_rolls` rolls of lace.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WidthRule {
    pub id: u32,
    pub width: u32,
    pub sets: u32,
    pub meters: f64,
    #[serde(default)]
    pub lace_rolls: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FabricType {
    pub id: u32,
    pub name: String,
    pub width: u32,
    pub price_per_meter: f64,
}

/// Flat-priced trim category (brooch or lace).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PricedCategory {
    pub id: u32,
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExtraCharge {
    pub id: u32,
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProfitKind {
    #[default]
    None,
    Percentage,
    Fixed,
}

impl fmt::Display for ProfitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProfitKind::None => "none",
            ProfitKind::Percentage => "percentage",
            ProfitKind::Fixed => "fixed",
        };
        f.write_str(s)
    }
}

/// Margin applied per set on top of the itemized price.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct ProfitSetting {
    #[serde(rename = "type")]
    pub kind: ProfitKind,
    pub value: f64,
}

impl ProfitSetting {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn percentage(value: f64) -> Self {
        Self { kind: ProfitKind::Percentage, value }
    }

    pub fn fixed(value: f64) -> Self {
        Self { kind: ProfitKind::Fixed, value }
    }
}

impl fmt::Display for ProfitSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ProfitKind::None => write!(f, "none"),
            ProfitKind::Percentage => write!(f, "{}% per set", self.value),
            ProfitKind::Fixed => write!(f, "{:.2} per set", self.value),
        }
    }
}

// ==========================================
// Sets Policy
// ==========================================

/// Whether set counts must be even. Shops have switched between both rules,
/// so it is read from settings.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SetsPolicy {
    #[default]
    Any,
    Even,
}

impl SetsPolicy {
    pub fn check(self, sets: u32) -> Result<u32, InvoiceError> {
        if sets == 0 {
            return Err(InvoiceError::InvalidSets {
                input: sets.to_string(),
                reason: "must be greater than zero",
            });
        }
        if self == SetsPolicy::Even && sets % 2 != 0 {
            return Err(InvoiceError::InvalidSets {
                input: sets.to_string(),
                reason: "must be an even number",
            });
        }
        Ok(sets)
    }
}

// ==========================================
// Invoice
// ==========================================

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Fabric,
    Brooch,
    Lace,
    Extra,
    Custom,
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LineKind::Fabric => "Fabric",
            LineKind::Brooch => "Brooch",
            LineKind::Lace => "Lace",
            LineKind::Extra => "Extra",
            LineKind::Custom => "Custom",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InvoiceLineItem {
    pub kind: LineKind,
    pub label: String,
    pub unit_price: f64,
    pub quantity: f64,
    pub line_total: f64,
}

impl InvoiceLineItem {
    pub fn new(kind: LineKind, label: impl Into<String>, unit_price: f64, quantity: f64) -> Self {
        Self {
            kind,
            label: label.into(),
            unit_price,
            quantity,
            line_total: unit_price * quantity,
        }
    }
}

/// Line items plus their totals. `per_set_price` is only known when the
/// invoice covers at least one set.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct InvoiceTotals {
    pub line_items: Vec<InvoiceLineItem>,
    pub base_total: f64,
    pub final_total: f64,
    pub per_set_price: Option<f64>,
}

/// Free-form charge entered on the invoice itself.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CustomCharge {
    pub name: String,
    pub price_per_unit: f64,
    pub quantity_per_set: f64,
}

impl CustomCharge {
    /// Price and quantity must be finite and not negative.
    pub fn validate(&self) -> Result<(), InvoiceError> {
        for (field, value) in [("price", self.price_per_unit), ("quantity", self.quantity_per_set)] {
            if !value.is_finite() || value < 0.0 {
                return Err(InvoiceError::InvalidCustomCharge { field, value });
            }
        }
        Ok(())
    }
}

/// Parses `NAME:PRICE:QTY_PER_SET`; the name may itself contain colons.
impl FromStr for CustomCharge {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.rsplitn(3, ':');
        let (Some(qty), Some(price), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(format!("expected NAME:PRICE:QTY, got '{}'", s));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err("custom charge needs a name".to_string());
        }
        let price_per_unit: f64 = price
            .trim()
            .parse()
            .map_err(|_| format!("invalid price '{}'", price))?;
        let quantity_per_set: f64 = qty
            .trim()
            .parse()
            .map_err(|_| format!("invalid quantity '{}'", qty))?;
        let charge = CustomCharge {
            name: name.to_string(),
            price_per_unit,
            quantity_per_set,
        };
        charge.validate().map_err(|e| e.to_string())?;
        Ok(charge)
    }
}

// ==========================================
// Shop & Archive
// ==========================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ShopConfig {
    pub name: String,
    pub address1: String,
    pub address2: String,
    pub phone: String,
    pub email: String,
    pub invoice_prefix: String,
    pub currency: String,
    pub footer: String,
}

/// Archived copy of an exported invoice, written next to the PDF.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InvoiceRecord {
    pub id: String,
    pub customer_name: String,
    pub date: chrono::NaiveDate,
    pub number_of_sets: u32,
    pub base_total: f64,
    pub final_total: f64,
    pub per_set_price: Option<f64>,
    pub profit: ProfitSetting,
    pub line_items: Vec<InvoiceLineItem>,
}

/// One printed row; amounts are already formatted.
#[derive(Serialize)]
pub struct ContextLine {
    pub kind: String,
    pub label: String,
    pub quantity: String,
    pub unit_price: String,
    pub line_total: String,
}

#[derive(Serialize)]
pub struct InvoiceContext {
    pub id: String,
    pub date: String,
    pub shop: ShopConfig,
    pub customer_name: String,
    pub number_of_sets: u32,
    pub items: Vec<ContextLine>,
    pub final_total: String,
    pub per_set_price: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_total_is_price_times_quantity() {
        let item = InvoiceLineItem::new(LineKind::Extra, "Foam", 100.0, 6.0);
        assert_eq!(item.line_total, 600.0);
    }

    #[test]
    fn profit_setting_uses_type_key() {
        let setting: ProfitSetting = toml::from_str("type = \"percentage\"\nvalue = 12.5").unwrap();
        assert_eq!(setting, ProfitSetting::percentage(12.5));
        assert_eq!(ProfitSetting::default(), ProfitSetting::none());
    }

    #[test]
    fn even_policy_rejects_odd_sets() {
        assert!(SetsPolicy::Even.check(3).is_err());
        assert_eq!(SetsPolicy::Even.check(4).unwrap(), 4);
        assert_eq!(SetsPolicy::Any.check(3).unwrap(), 3);
        assert!(SetsPolicy::Any.check(0).is_err());
    }

    #[test]
    fn custom_charge_from_cli_text() {
        let c: CustomCharge = "Gold: thread:5.5:2".parse().unwrap();
        assert_eq!(c.name, "Gold: thread");
        assert_eq!(c.price_per_unit, 5.5);
        assert_eq!(c.quantity_per_set, 2.0);

        assert!("Thread:5".parse::<CustomCharge>().is_err());
        assert!(":5:2".parse::<CustomCharge>().is_err());
        assert!("Thread:x:2".parse::<CustomCharge>().is_err());
    }

    #[test]
    fn custom_charge_rejects_nan_infinite_and_negative() {
        assert!("Thread:NaN:2".parse::<CustomCharge>().is_err());
        assert!("Thread:inf:2".parse::<CustomCharge>().is_err());
        assert!("Thread:5:-inf".parse::<CustomCharge>().is_err());
        assert!("Discount:-500:1".parse::<CustomCharge>().is_err());
        assert!("Thread:5:-1".parse::<CustomCharge>().is_err());

        let charge = CustomCharge { name: "Thread".into(), price_per_unit: f64::NAN, quantity_per_set: 1.0 };
        assert!(matches!(
            charge.validate(),
            Err(InvoiceError::InvalidCustomCharge { field: "price", .. })
        ));
        let charge = CustomCharge { name: "Thread".into(), price_per_unit: 5.0, quantity_per_set: -2.0 };
        assert_eq!(
            charge.validate(),
            Err(InvoiceError::InvalidCustomCharge { field: "quantity", value: -2.0 })
        );
        assert!("Free:0:1".parse::<CustomCharge>().is_ok());
    }
}
