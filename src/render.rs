//! Invoice numbering, typst rendering and the on-disk invoice archive.

use anyhow::{Context as _, anyhow};
use chrono::{Local, NaiveDate};
use regex::Regex;
use slug::slugify;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tera::{Context, Tera, Value};
use tracing::{debug, info, warn};

use crate::model::{ContextLine, InvoiceContext, InvoiceLineItem, InvoiceRecord, LineKind, ShopConfig};
use crate::session::CalculatedInvoice;

// Embed template at compile time to ensure availability
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/invoice.tera");

pub fn format_money(currency: &str, amount: f64) -> String {
    format!("{}{:.2}", currency, amount)
}

pub fn format_quantity(kind: LineKind, quantity: f64) -> String {
    match kind {
        LineKind::Fabric => format!("{:.1}m", quantity),
        _ if quantity.fract() == 0.0 => format!("{:.0}", quantity),
        _ => format!("{:.2}", quantity),
    }
}

/// Escape a value for use inside a typst string literal.
fn typst_str(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    Ok(Value::String(s.replace('\\', "\\\\").replace('"', "\\\"")))
}

// ==========================================
// Invoice IDs
// ==========================================

fn collect_files(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.extension().is_some_and(|e| e == extension) {
                    files.push(path);
                }
            }
        }
    }
    files
}

/// `{prefix}{YYYYMMDD}-{NN}` with `NN` one past the highest index already
/// used for that day under the year's output folder.
pub fn next_invoice_id(output_root: &Path, prefix: &str, date: NaiveDate) -> anyhow::Result<String> {
    let day_prefix = format!("{}{}", prefix, date.format("%Y%m%d"));
    let re = Regex::new(&format!(r"^{}-(\d+)", regex::escape(&day_prefix)))?;

    let year_dir = output_root.join(date.format("%Y").to_string());
    let mut next_idx = 1;
    for path in collect_files(&year_dir, "toml") {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };
        if let Some(caps) = re.captures(&name) {
            if let Ok(idx) = caps[1].parse::<u32>() {
                next_idx = next_idx.max(idx + 1);
            }
        }
    }

    Ok(format!("{}-{:02}", day_prefix, next_idx))
}

// ==========================================
// Rendering
// ==========================================

/// Load `templates/*.tera`, writing the built-in template first if missing.
pub fn load_templates(root: &Path) -> anyhow::Result<Tera> {
    let template_dir = root.join("templates");
    fs::create_dir_all(&template_dir)?;
    let template_path = template_dir.join("invoice.tera");
    if !template_path.exists() {
        println!("✨ Initializing default template...");
        fs::write(&template_path, DEFAULT_TEMPLATE).context("Failed to write default template")?;
    }

    let pattern = template_dir.join("*.tera");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| anyhow!("Template path is not valid UTF-8"))?;
    let mut tera = Tera::new(pattern).context("Template error")?;
    tera.register_filter("typst_str", typst_str);
    Ok(tera)
}

pub fn build_context(id: &str, shop: &ShopConfig, invoice: &CalculatedInvoice) -> InvoiceContext {
    let currency = shop.currency.as_str();
    let items = invoice
        .totals
        .line_items
        .iter()
        .map(|item: &InvoiceLineItem| ContextLine {
            kind: item.kind.to_string(),
            label: item.label.clone(),
            quantity: format_quantity(item.kind, item.quantity),
            unit_price: format_money(currency, item.unit_price),
            line_total: format_money(currency, item.line_total),
        })
        .collect();

    InvoiceContext {
        id: id.to_string(),
        date: invoice.date.format("%d/%m/%Y").to_string(),
        shop: shop.clone(),
        customer_name: invoice.customer_name.clone(),
        number_of_sets: invoice.number_of_sets,
        items,
        final_total: format_money(currency, invoice.totals.final_total),
        per_set_price: invoice.totals.per_set_price.map(|p| format_money(currency, p)),
    }
}

pub fn render_typst(tera: &Tera, context: &InvoiceContext) -> anyhow::Result<String> {
    let context = Context::from_serialize(context)?;
    tera.render("invoice.tera", &context).context("Failed to render invoice template")
}

pub fn to_record(id: &str, invoice: &CalculatedInvoice) -> InvoiceRecord {
    InvoiceRecord {
        id: id.to_string(),
        customer_name: invoice.customer_name.clone(),
        date: invoice.date,
        number_of_sets: invoice.number_of_sets,
        base_total: invoice.totals.base_total,
        final_total: invoice.totals.final_total,
        per_set_price: invoice.totals.per_set_price,
        profit: invoice.profit,
        line_items: invoice.totals.line_items.clone(),
    }
}

#[derive(Debug)]
pub struct ExportedInvoice {
    pub id: String,
    pub typ_path: PathBuf,
    pub record_path: PathBuf,
    pub pdf_path: Option<PathBuf>,
}

/// Write the `.typ` source and the archive record, then compile the PDF if
/// typst is available.
pub fn export_invoice(
    root: &Path,
    shop: &ShopConfig,
    invoice: &CalculatedInvoice,
) -> anyhow::Result<ExportedInvoice> {
    let tera = load_templates(root)?;
    let output_root = root.join("output");
    let id = next_invoice_id(&output_root, &shop.invoice_prefix, invoice.date)?;

    let customer_slug = slugify(&invoice.customer_name);
    let output_dir = output_root
        .join(invoice.date.format("%Y").to_string())
        .join(&customer_slug);
    fs::create_dir_all(&output_dir)?;

    // Filename: SK20251214-01_customer-name
    let filename_base = format!("{}_{}", id, customer_slug);
    let typ_path = output_dir.join(format!("{}.typ", filename_base));
    let pdf_path = output_dir.join(format!("{}.pdf", filename_base));
    let record_path = output_dir.join(format!("{}.toml", filename_base));

    let rendered = render_typst(&tera, &build_context(&id, shop, invoice))?;
    fs::write(&typ_path, rendered).context("Failed to write .typ file")?;

    let record = toml::to_string_pretty(&to_record(&id, invoice))?;
    fs::write(&record_path, record).context("Failed to write invoice record")?;
    info!(id = %id, path = %record_path.display(), "Invoice archived");

    let pdf_path = compile_pdf(&typ_path, &pdf_path).then_some(pdf_path);
    Ok(ExportedInvoice { id, typ_path, record_path, pdf_path })
}

fn compile_pdf(typ_path: &Path, pdf_path: &Path) -> bool {
    if Command::new("typst").arg("--version").output().is_err() {
        warn!("typst is not installed, PDF not compiled");
        println!("❌ Error: 'typst' is not installed. Install it to get PDFs (the .typ source was saved).");
        return false;
    }

    println!("\n🔨 Compiling PDF...");
    match Command::new("typst").arg("compile").arg(typ_path).arg(pdf_path).status() {
        Ok(s) if s.success() => {
            debug!(path = %pdf_path.display(), "PDF compiled");
            true
        }
        Ok(s) => {
            warn!(status = %s, "typst compile failed");
            println!("❌ Compilation failed.");
            false
        }
        Err(e) => {
            warn!(error = %e, "typst could not be started");
            println!("❌ Compilation failed.");
            false
        }
    }
}

/// All archived invoices under `output/`, oldest first.
pub fn load_records(output_root: &Path) -> Vec<InvoiceRecord> {
    let mut records: Vec<InvoiceRecord> = collect_files(output_root, "toml")
        .into_iter()
        .filter_map(|path| {
            let content = fs::read_to_string(&path).ok()?;
            match toml::from_str(&content) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable invoice record");
                    None
                }
            }
        })
        .collect();
    records.sort_by(|a, b| (a.date, &a.id).cmp(&(b.date, &b.id)));
    records
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

// Helper: Open file and reveal in Finder/Explorer
pub fn open_and_reveal(path: &Path) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer").arg(path).spawn().ok();

    #[cfg(target_os = "linux")]
    Command::new("xdg-open").arg(path).spawn().ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InvoiceTotals, ProfitSetting};

    fn shop() -> ShopConfig {
        toml::from_str(include_str!("../shop.toml")).unwrap()
    }

    fn invoice() -> CalculatedInvoice {
        let items = vec![
            InvoiceLineItem::new(LineKind::Fabric, "Cotton (W:44, 6 sets, 9.0m)", 120.0, 9.0),
            InvoiceLineItem::new(LineKind::Custom, "Thread \"gold\"", 5.0, 12.0),
        ];
        CalculatedInvoice {
            customer_name: "Meera Shah".into(),
            date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            number_of_sets: 6,
            profit: ProfitSetting::fixed(10.0),
            totals: InvoiceTotals {
                line_items: items,
                base_total: 1140.0,
                final_total: 1200.0,
                per_set_price: Some(200.0),
            },
        }
    }

    fn tera() -> Tera {
        let mut tera = Tera::default();
        tera.add_raw_template("invoice.tera", DEFAULT_TEMPLATE).unwrap();
        tera.register_filter("typst_str", typst_str);
        tera
    }

    #[test]
    fn quantities_format_by_kind() {
        assert_eq!(format_quantity(LineKind::Fabric, 9.0), "9.0m");
        assert_eq!(format_quantity(LineKind::Brooch, 6.0), "6");
        assert_eq!(format_quantity(LineKind::Custom, 2.5), "2.50");
        assert_eq!(format_money("₹", 1080.0), "₹1080.00");
    }

    #[test]
    fn rendered_typst_has_rows_and_total() {
        let out = render_typst(&tera(), &build_context("SK20250314-01", &shop(), &invoice())).unwrap();
        assert!(out.contains("SK ENTERPRISE"));
        assert!(out.contains("Cotton (W:44, 6 sets, 9.0m)"));
        assert!(out.contains("Thread \\\"gold\\\""));
        assert!(out.contains("₹1200.00"));
        assert!(out.contains("₹200.00"));
        assert!(out.contains("14/03/2025"));
    }

    #[test]
    fn invoice_ids_continue_from_existing_files() {
        let root = std::env::temp_dir().join(format!("fabric-invoice-ids-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(next_invoice_id(&root, "SK", date).unwrap(), "SK20250314-01");

        let dir = root.join("2025").join("meera-shah");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("SK20250314-01_meera-shah.toml"), "").unwrap();
        fs::write(dir.join("SK20250314-04_meera-shah.toml"), "").unwrap();
        fs::write(dir.join("SK20250313-09_meera-shah.toml"), "").unwrap();
        assert_eq!(next_invoice_id(&root, "SK", date).unwrap(), "SK20250314-05");
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn export_writes_source_and_record() {
        let root = std::env::temp_dir().join(format!("fabric-invoice-export-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();

        let exported = export_invoice(&root, &shop(), &invoice()).unwrap();
        assert_eq!(exported.id, "SK20250314-01");
        assert!(exported.typ_path.exists());

        let records = load_records(&root.join("output"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].customer_name, "Meera Shah");
        assert_eq!(records[0].final_total, 1200.0);
        assert_eq!(records[0].line_items.len(), 2);

        let again = export_invoice(&root, &shop(), &invoice()).unwrap();
        assert_eq!(again.id, "SK20250314-02");
        fs::remove_dir_all(&root).ok();
    }
}
