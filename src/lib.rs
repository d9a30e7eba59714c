//! Price lists and invoice composition for a fabric shop.
//!
//! The engine is a handful of pure functions: [`scaler::scale`] derives
//! quantities from a width rule, [`line_items::build_line_items`] prices the
//! selections, [`aggregate::aggregate`] totals them and lays the
//! [`profit::apply_profit`] overlay on top. [`session::InvoiceSession`] wires
//! them to user actions; the remaining modules handle files and terminals.

pub mod aggregate;
pub mod catalog;
pub mod error;
pub mod line_items;
pub mod model;
pub mod profit;
pub mod render;
pub mod scaler;
pub mod session;
pub mod settings;
pub mod summary;
pub mod wizard;

pub use aggregate::{aggregate, remove_line};
pub use catalog::{Catalog, CatalogStore, TrimKind};
pub use error::{CatalogError, InvoiceError};
pub use line_items::{build_line_items, Selections};
pub use model::{
    CustomCharge, ExtraCharge, FabricType, InvoiceLineItem, InvoiceTotals, LineKind, PricedCategory,
    ProfitKind, ProfitSetting, SetsPolicy, WidthRule,
};
pub use profit::apply_profit;
pub use scaler::{parse_sets, scale, ScaledQuantities};
pub use session::{CalculatedInvoice, FabricRequest, InvoiceSession, Status};
