//! Terminal tables: catalog listings, the current invoice and yearly
//! summaries of archived invoices.

use chrono::{Datelike, NaiveDate};
use comfy_table::{Attribute, Cell, CellAlignment, Color, Table};
use std::collections::BTreeMap;

use crate::catalog::{Catalog, TrimKind};
use crate::model::InvoiceRecord;
use crate::render::{format_money, format_quantity};
use crate::session::CalculatedInvoice;

const GREEN: Color = Color::Rgb { r: 4, g: 120, b: 87 };

fn money_cell(currency: &str, amount: f64) -> Cell {
    Cell::new(format_money(currency, amount)).set_alignment(CellAlignment::Right)
}

// ==========================================
// Catalog Tables
// ==========================================

pub fn widths_table(catalog: &Catalog) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Width", "Fabrics", "Rule"]);
    for width in &catalog.widths {
        let fabrics = catalog.fabrics.iter().filter(|f| f.width == *width).count();
        let rule = catalog
            .width_rules
            .iter()
            .find(|r| r.width == *width)
            .map(|r| format!("{} sets → {}m, {} lace", r.sets, r.meters, r.lace_rolls))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![Cell::new(width), Cell::new(fabrics), Cell::new(rule)]);
    }
    table
}

pub fn width_rules_table(catalog: &Catalog) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Width", "Sets", "Meters", "Lace Rolls", "Meters / Set"]);
    for rule in catalog.sorted_width_rules() {
        let per_set = if rule.sets > 0 { rule.meters / rule.sets as f64 } else { 0.0 };
        table.add_row(vec![
            Cell::new(rule.id),
            Cell::new(rule.width),
            Cell::new(rule.sets),
            Cell::new(format!("{:.2}", rule.meters)),
            Cell::new(rule.lace_rolls),
            Cell::new(format!("{:.2}", per_set)),
        ]);
    }
    table
}

pub fn fabrics_table(catalog: &Catalog, currency: &str) -> Table {
    let mut fabrics = catalog.fabrics.clone();
    fabrics.sort_by(|a, b| (a.width, &a.name).cmp(&(b.width, &b.name)));

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Width", "Price / m"]);
    for f in fabrics {
        table.add_row(vec![
            Cell::new(f.id),
            Cell::new(&f.name),
            Cell::new(f.width),
            money_cell(currency, f.price_per_meter),
        ]);
    }
    table
}

pub fn categories_table(catalog: &Catalog, kind: TrimKind, currency: &str) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Price"]);
    for c in catalog.categories(kind) {
        table.add_row(vec![Cell::new(c.id), Cell::new(&c.name), money_cell(currency, c.price)]);
    }
    table
}

pub fn extras_table(catalog: &Catalog, currency: &str) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Price / set"]);
    for e in &catalog.extras {
        table.add_row(vec![Cell::new(e.id), Cell::new(&e.name), money_cell(currency, e.price)]);
    }
    table
}

// ==========================================
// Invoice Table
// ==========================================

pub fn invoice_table(invoice: &CalculatedInvoice, currency: &str) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["#", "Item", "Qty", "Rate", "Amount"]);

    for (idx, item) in invoice.totals.line_items.iter().enumerate() {
        table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(&item.label),
            Cell::new(format_quantity(item.kind, item.quantity)).set_alignment(CellAlignment::Right),
            money_cell(currency, item.unit_price),
            money_cell(currency, item.line_total),
        ]);
    }

    table.add_row(vec![
        Cell::new(""),
        Cell::new("Subtotal"),
        Cell::new(""),
        Cell::new(""),
        money_cell(currency, invoice.totals.base_total),
    ]);
    if let Some(per_set) = invoice.totals.per_set_price {
        table.add_row(vec![
            Cell::new(""),
            Cell::new(format!("Per set ({} sets, profit {})", invoice.number_of_sets, invoice.profit)),
            Cell::new(""),
            Cell::new(""),
            money_cell(currency, per_set),
        ]);
    }
    table.add_row(vec![
        Cell::new(""),
        Cell::new("TOTAL").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        money_cell(currency, invoice.totals.final_total)
            .add_attribute(Attribute::Bold)
            .fg(GREEN),
    ]);
    table
}

// ==========================================
// Yearly Summary
// ==========================================

/// Monthly and per-customer totals for one year.
#[derive(Debug, Default, PartialEq)]
pub struct YearSummary {
    /// (year, month) -> (invoices, final total)
    pub monthly: BTreeMap<(i32, u32), (usize, f64)>,
    /// customer -> (invoices, final total)
    pub customers: BTreeMap<String, (usize, f64)>,
    pub total: f64,
}

pub fn summarize(records: &[InvoiceRecord], year: i32) -> YearSummary {
    let mut summary = YearSummary::default();
    for record in records.iter().filter(|r| r.date.year() == year) {
        let month = summary
            .monthly
            .entry((record.date.year(), record.date.month()))
            .or_insert((0, 0.0));
        month.0 += 1;
        month.1 += record.final_total;

        let customer = summary
            .customers
            .entry(record.customer_name.clone())
            .or_insert((0, 0.0));
        customer.0 += 1;
        customer.1 += record.final_total;

        summary.total += record.final_total;
    }
    summary
}

pub fn summary_tables(summary: &YearSummary, year: i32, currency: &str) -> (Table, Table) {
    let mut monthly = Table::new();
    monthly.set_header(vec!["Month", "Invoices", "Total"]);
    for ((y, m), (count, total)) in summary.monthly.iter().rev() {
        let month_str = NaiveDate::from_ymd_opt(*y, *m, 1)
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_else(|| format!("{}-{:02}", y, m));
        monthly.add_row(vec![Cell::new(month_str), Cell::new(count), money_cell(currency, *total)]);
    }
    let invoice_count: usize = summary.monthly.values().map(|(c, _)| c).sum();
    monthly.add_row(vec![
        Cell::new(format!("Total ({})", year)).add_attribute(Attribute::Bold),
        Cell::new(invoice_count).add_attribute(Attribute::Bold),
        money_cell(currency, summary.total).add_attribute(Attribute::Bold).fg(GREEN),
    ]);

    // Sort customers by total amount descending
    let mut customers: Vec<_> = summary.customers.iter().collect();
    customers.sort_by(|a, b| b.1.1.total_cmp(&a.1.1));

    let mut by_customer = Table::new();
    by_customer.set_header(vec!["Customer", "Invoices", "Total"]);
    for (name, (count, total)) in customers {
        by_customer.add_row(vec![Cell::new(name), Cell::new(count), money_cell(currency, *total)]);
    }

    (monthly, by_customer)
}
