//! Interactive prompts: invoice composition and catalog maintenance.

use anyhow::Context as _;
use chrono::NaiveDate;
use inquire::validator::Validation;
use inquire::{Confirm, CustomType, DateSelect, MultiSelect, Select, Text};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::catalog::{Catalog, CatalogStore, TrimKind};
use crate::model::{CustomCharge, ProfitKind, ProfitSetting, SetsPolicy, ShopConfig};
use crate::render::{export_invoice, format_money, open_and_reveal, today};
use crate::session::{DraftStore, InvoiceSession, Status};
use crate::settings::{load_shop_config, AppSettings};
use crate::summary::{
    categories_table, extras_table, fabrics_table, invoice_table, width_rules_table, widths_table,
};

const NONE_OPT: &str = "— None —";

/// Catalog lists that can be edited from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CatalogKind {
    Width,
    Rule,
    Fabric,
    Brooch,
    Lace,
    Extra,
}

/// Everything a command needs: resolved data root, settings and stores.
pub struct App {
    pub root: PathBuf,
    pub settings: AppSettings,
    pub shop: ShopConfig,
    pub store: CatalogStore,
    pub drafts: DraftStore,
}

impl App {
    pub fn open(settings: AppSettings) -> anyhow::Result<Self> {
        let root = settings.root();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create data directory {}", root.display()))?;
        let shop = load_shop_config(&root)?;
        Ok(Self {
            store: CatalogStore::new(&root),
            drafts: DraftStore::new(&root),
            root,
            settings,
            shop,
        })
    }

    pub fn currency(&self) -> &str {
        &self.shop.currency
    }
}

fn show_status(session: &mut InvoiceSession) {
    if let Some(status) = session.take_status() {
        println!("{}", status);
    }
}

fn optional_pick<T>(prompt: &str, options: Vec<String>, current: Option<usize>, ids: &[T]) -> anyhow::Result<Option<T>>
where
    T: Copy,
{
    let mut labels = vec![NONE_OPT.to_string()];
    labels.extend(options);
    let start = current.map(|i| i + 1).unwrap_or(0);
    let choice = Select::new(prompt, labels).with_starting_cursor(start).raw_prompt()?;
    Ok(choice.index.checked_sub(1).map(|i| ids[i]))
}

/// Prices, quantities and margins: finite and not negative.
fn price_prompt(prompt: &str, default: Option<f64>) -> anyhow::Result<f64> {
    let mut p = CustomType::<f64>::new(prompt)
        .with_error_message("Please type a valid number")
        .with_validator(|v: &f64| {
            if v.is_finite() && *v >= 0.0 {
                Ok(Validation::Valid)
            } else {
                Ok(Validation::Invalid("Must be zero or more".into()))
            }
        });
    if let Some(d) = default {
        p = p.with_default(d);
    }
    Ok(p.prompt()?)
}

fn u32_prompt(prompt: &str, default: Option<u32>) -> anyhow::Result<u32> {
    let mut p = CustomType::<u32>::new(prompt).with_error_message("Please type a whole number");
    if let Some(d) = default {
        p = p.with_default(d);
    }
    Ok(p.prompt()?)
}

// ==========================================
// 1. Invoice Composition
// ==========================================

pub fn compose_invoice(app: &App) -> anyhow::Result<()> {
    let catalog = app.store.load()?;
    let currency = app.currency().to_string();

    let mut session = match app.drafts.load()? {
        Some(draft) if Confirm::new("Resume saved draft?").with_default(true).prompt()? => draft,
        _ => InvoiceSession::new(),
    };

    fill_selections(&mut session, &catalog, app.settings.sets_policy, &currency)?;

    let date = DateSelect::new("Invoice Date:")
        .with_default(session.invoice.as_ref().map(|i| i.date).unwrap_or_else(today))
        .prompt()?;

    if session.on_calculate_invoice(&catalog, app.settings.sets_policy, date).is_err() {
        show_status(&mut session);
        app.drafts.save(&session)?;
        return Ok(());
    }
    show_status(&mut session);
    app.drafts.save(&session)?;

    invoice_actions(app, &mut session, &currency)
}

fn fill_selections(
    session: &mut InvoiceSession,
    catalog: &Catalog,
    policy: SetsPolicy,
    currency: &str,
) -> anyhow::Result<()> {
    let customer = Text::new("Customer Name:")
        .with_default(&session.selections.customer_name)
        .prompt()?;
    session.on_customer_entered(&customer);

    // Width, then the fabrics cut at that width
    let width_labels: Vec<String> = catalog.widths.iter().map(|w| format!("{}\"", w)).collect();
    let start = session
        .selections
        .width
        .and_then(|w| catalog.widths.iter().position(|x| *x == w))
        .unwrap_or(0);
    let width_choice = Select::new("Fabric Width:", width_labels)
        .with_starting_cursor(start)
        .raw_prompt()?;
    let width = catalog.widths[width_choice.index];
    let previous_fabric = session.selections.fabric_id;

    if let Some(request) = session.on_width_selected(Some(width)) {
        session.on_fabric_response::<String>(request, Ok(catalog.fabrics_for_width(width)));
    }
    show_status(session);
    if session.fabric_choices.is_empty() {
        return Ok(());
    }

    let fabric_labels: Vec<String> = session
        .fabric_choices
        .iter()
        .map(|f| format!("{} - {}/m", f.name, format_money(currency, f.price_per_meter)))
        .collect();
    let start = previous_fabric
        .and_then(|id| session.fabric_choices.iter().position(|f| f.id == id))
        .unwrap_or(0);
    let fabric_choice = Select::new("Fabric Type:", fabric_labels)
        .with_starting_cursor(start)
        .raw_prompt()?;
    let fabric_id = session.fabric_choices[fabric_choice.index].id;
    session.on_fabric_selected(Some(fabric_id));

    loop {
        let default = if session.selections.sets > 0 { session.selections.sets.to_string() } else { String::new() };
        let input = Text::new("Number of Sets:").with_default(&default).prompt()?;
        match session.on_sets_entered(&input, &catalog.width_rules, policy) {
            Ok(q) => {
                println!("📏 {:.1}m fabric, {} brooch, {} lace", q.meters, q.brooch_qty, q.lace_qty);
                break;
            }
            Err(_) => show_status(session),
        }
    }

    let brooch_ids: Vec<u32> = catalog.brooch_categories.iter().map(|c| c.id).collect();
    let brooch_labels = trim_labels(catalog, TrimKind::Brooch, currency);
    let current = session.selections.brooch_id.and_then(|id| brooch_ids.iter().position(|x| *x == id));
    let brooch_id = optional_pick("Brooch Category:", brooch_labels, current, &brooch_ids)?;

    let lace_ids: Vec<u32> = catalog.lace_categories.iter().map(|c| c.id).collect();
    let lace_labels = trim_labels(catalog, TrimKind::Lace, currency);
    let current = session.selections.lace_id.and_then(|id| lace_ids.iter().position(|x| *x == id));
    let lace_id = optional_pick("Lace Category:", lace_labels, current, &lace_ids)?;
    session.on_trims_selected(brooch_id, lace_id);

    if !catalog.extras.is_empty() {
        let labels: Vec<String> = catalog
            .extras
            .iter()
            .map(|e| format!("{} - {}/set", e.name, format_money(currency, e.price)))
            .collect();
        let defaults: Vec<usize> = catalog
            .extras
            .iter()
            .enumerate()
            .filter(|(_, e)| session.selections.extra_ids.contains(&e.id))
            .map(|(i, _)| i)
            .collect();
        let picked = MultiSelect::new("Extra Charges:", labels)
            .with_default(&defaults)
            .raw_prompt()?;
        session.on_extras_selected(picked.iter().map(|o| catalog.extras[o.index].id).collect());
    }

    let wants_custom = Confirm::new("Add a custom charge?")
        .with_default(session.selections.custom.is_some())
        .prompt()?;
    let custom = if wants_custom {
        let previous = session.selections.custom.clone();
        let name = Text::new("Item Name:")
            .with_default(previous.as_ref().map(|c| c.name.as_str()).unwrap_or(""))
            .prompt()?;
        let price_per_unit = price_prompt("Price / Unit:", previous.as_ref().map(|c| c.price_per_unit))?;
        let quantity_per_set = price_prompt("Quantity / Set:", previous.as_ref().map(|c| c.quantity_per_set).or(Some(1.0)))?;
        let charge = CustomCharge { name, price_per_unit, quantity_per_set };
        charge.validate()?;
        Some(charge)
    } else {
        None
    };
    session.on_custom_charge(custom);
    Ok(())
}

fn trim_labels(catalog: &Catalog, kind: TrimKind, currency: &str) -> Vec<String> {
    catalog
        .categories(kind)
        .iter()
        .map(|c| format!("{} - {}", c.name, format_money(currency, c.price)))
        .collect()
}

fn invoice_actions(app: &App, session: &mut InvoiceSession, currency: &str) -> anyhow::Result<()> {
    const EXPORT: &str = "📄 Export PDF";
    const REMOVE: &str = "➖ Remove a line";
    const SAVE: &str = "💾 Save draft and quit";
    const CLEAR: &str = "🗑  Clear invoice";

    loop {
        let Some(invoice) = session.invoice.as_ref() else {
            return Ok(());
        };
        println!("\n--- Invoice for {} ---", invoice.customer_name);
        println!("{}", invoice_table(invoice, currency));

        let choice = Select::new("Next:", vec![EXPORT, REMOVE, SAVE, CLEAR]).prompt()?;
        match choice {
            EXPORT => {
                let exported = export_invoice(&app.root, &app.shop, invoice)?;
                app.drafts.clear()?;
                println!("✅ Invoice {} saved: {:?}", exported.id, exported.record_path);
                if let Some(pdf) = exported.pdf_path {
                    println!("✅ PDF Generated: {:?}", pdf);
                    open_and_reveal(&pdf);
                }
                return Ok(());
            }
            REMOVE => {
                let labels: Vec<String> = invoice
                    .totals
                    .line_items
                    .iter()
                    .map(|i| format!("{} ({})", i.label, format_money(currency, i.line_total)))
                    .collect();
                if labels.is_empty() {
                    println!("❌ No lines to remove.");
                    continue;
                }
                let picked = Select::new("Remove which line?", labels).raw_prompt()?;
                let removed = session.on_remove_line(picked.index).map(|_| ());
                match removed {
                    Ok(()) => {
                        show_status(session);
                        app.drafts.save(session)?;
                    }
                    Err(err) => {
                        debug!(%err, "Line not removed");
                        show_status(session);
                    }
                }
            }
            SAVE => {
                app.drafts.save(session)?;
                println!("💾 Draft saved.");
                return Ok(());
            }
            _ => {
                session.on_clear();
                app.drafts.clear()?;
                println!("{}", Status::Success("Invoice cleared".to_string()));
                return Ok(());
            }
        }
    }
}

// ==========================================
// 2. Catalog Maintenance
// ==========================================

pub fn print_catalog(app: &App, kind: Option<CatalogKind>) -> anyhow::Result<()> {
    let catalog = app.store.load()?;
    let currency = app.currency();
    let kinds = match kind {
        Some(k) => vec![k],
        None => vec![
            CatalogKind::Width,
            CatalogKind::Rule,
            CatalogKind::Fabric,
            CatalogKind::Brooch,
            CatalogKind::Lace,
            CatalogKind::Extra,
        ],
    };
    for kind in kinds {
        let (title, table) = match kind {
            CatalogKind::Width => ("Widths", widths_table(&catalog)),
            CatalogKind::Rule => ("Width Rules", width_rules_table(&catalog)),
            CatalogKind::Fabric => ("Fabric Types", fabrics_table(&catalog, currency)),
            CatalogKind::Brooch => ("Brooch Categories", categories_table(&catalog, TrimKind::Brooch, currency)),
            CatalogKind::Lace => ("Lace Categories", categories_table(&catalog, TrimKind::Lace, currency)),
            CatalogKind::Extra => ("Extra Charges", extras_table(&catalog, currency)),
        };
        println!("\n--- {} ---", title);
        println!("{table}");
    }
    if kind.is_none() {
        println!("\nProfit: {}", catalog.profit());
    }
    Ok(())
}

pub fn manage_catalog(app: &App, kind: CatalogKind) -> anyhow::Result<()> {
    const ADD: &str = "➕ Add";
    const EDIT: &str = "✏️  Edit";
    const DELETE: &str = "➖ Delete";

    let mut catalog = app.store.load()?;
    print_catalog(app, Some(kind))?;

    let actions = if kind == CatalogKind::Width { vec![ADD, DELETE] } else { vec![ADD, EDIT, DELETE] };
    let action = Select::new("Action:", actions).prompt()?;
    let policy = app.settings.sets_policy;

    let message = match (kind, action) {
        (CatalogKind::Width, ADD) => {
            let width = u32_prompt("Width:", None)?;
            catalog.add_width(width)?;
            format!("Width {} added", width)
        }
        (CatalogKind::Width, _) => {
            let picked = Select::new("Delete width:", catalog.widths.clone()).prompt()?;
            catalog.delete_width(picked)?;
            format!("Width {} deleted", picked)
        }
        (CatalogKind::Rule, ADD) => {
            let width = Select::new("Width:", catalog.widths.clone()).prompt()?;
            let sets = u32_prompt("Sets:", None)?;
            let meters = price_prompt("Meters:", None)?;
            let lace_rolls = u32_prompt("Lace Rolls:", Some(0))?;
            let id = catalog.add_width_rule(width, sets, meters, lace_rolls, policy)?;
            format!("Width rule #{} added", id)
        }
        (CatalogKind::Rule, EDIT) => {
            let rules = catalog.sorted_width_rules();
            let labels: Vec<String> = rules
                .iter()
                .map(|r| format!("#{} | Width {} | {} sets → {}m, {} lace", r.id, r.width, r.sets, r.meters, r.lace_rolls))
                .collect();
            let picked = Select::new("Edit rule:", labels).raw_prompt()?;
            let mut rule = rules[picked.index].clone();
            rule.sets = u32_prompt("Sets:", Some(rule.sets))?;
            rule.meters = price_prompt("Meters:", Some(rule.meters))?;
            rule.lace_rolls = u32_prompt("Lace Rolls:", Some(rule.lace_rolls))?;
            let id = rule.id;
            catalog.update_width_rule(rule, policy)?;
            format!("Width rule #{} updated", id)
        }
        (CatalogKind::Rule, _) => {
            let rules = catalog.sorted_width_rules();
            let labels: Vec<String> = rules.iter().map(|r| format!("#{} | Width {}", r.id, r.width)).collect();
            let picked = Select::new("Delete rule:", labels).raw_prompt()?;
            let removed = catalog.delete_width_rule(rules[picked.index].id)?;
            format!("Width rule for {} deleted", removed.width)
        }
        (CatalogKind::Fabric, ADD) => {
            let name = Text::new("Fabric Name:").prompt()?;
            let width = Select::new("Width:", catalog.widths.clone()).prompt()?;
            let price = price_prompt("Price / Meter:", None)?;
            let id = catalog.add_fabric(&name, width, price)?;
            format!("Fabric #{} added", id)
        }
        (CatalogKind::Fabric, EDIT) => {
            let labels: Vec<String> = catalog.fabrics.iter().map(|f| format!("#{} {} ({}\")", f.id, f.name, f.width)).collect();
            let picked = Select::new("Edit fabric:", labels).raw_prompt()?;
            let mut fabric = catalog.fabrics[picked.index].clone();
            fabric.name = Text::new("Fabric Name:").with_default(&fabric.name).prompt()?;
            let start = catalog.widths.iter().position(|w| *w == fabric.width).unwrap_or(0);
            fabric.width = Select::new("Width:", catalog.widths.clone()).with_starting_cursor(start).prompt()?;
            fabric.price_per_meter = price_prompt("Price / Meter:", Some(fabric.price_per_meter))?;
            let id = fabric.id;
            catalog.update_fabric(fabric)?;
            format!("Fabric #{} updated", id)
        }
        (CatalogKind::Fabric, _) => {
            let labels: Vec<String> = catalog.fabrics.iter().map(|f| format!("#{} {} ({}\")", f.id, f.name, f.width)).collect();
            let picked = Select::new("Delete fabric:", labels).raw_prompt()?;
            let id = catalog.fabrics[picked.index].id;
            let removed = catalog.delete_fabric(id)?;
            format!("Fabric {} deleted", removed.name)
        }
        (CatalogKind::Brooch | CatalogKind::Lace, _) => {
            let trim = if kind == CatalogKind::Brooch { TrimKind::Brooch } else { TrimKind::Lace };
            edit_category(&mut catalog, trim, action == ADD, action == EDIT)?
        }
        (CatalogKind::Extra, ADD) => {
            let name = Text::new("Charge Name:").prompt()?;
            let price = price_prompt("Price / Set:", None)?;
            let id = catalog.add_extra(&name, price)?;
            format!("Extra charge #{} added", id)
        }
        (CatalogKind::Extra, EDIT) => {
            let labels: Vec<String> = catalog.extras.iter().map(|e| format!("#{} {}", e.id, e.name)).collect();
            let picked = Select::new("Edit charge:", labels).raw_prompt()?;
            let mut extra = catalog.extras[picked.index].clone();
            extra.name = Text::new("Charge Name:").with_default(&extra.name).prompt()?;
            extra.price = price_prompt("Price / Set:", Some(extra.price))?;
            let id = extra.id;
            catalog.update_extra(extra)?;
            format!("Extra charge #{} updated", id)
        }
        (CatalogKind::Extra, _) => {
            let labels: Vec<String> = catalog.extras.iter().map(|e| format!("#{} {}", e.id, e.name)).collect();
            let picked = Select::new("Delete charge:", labels).raw_prompt()?;
            let id = catalog.extras[picked.index].id;
            let removed = catalog.delete_extra(id)?;
            format!("Extra charge {} deleted", removed.name)
        }
    };

    app.store.save(&catalog)?;
    info!(?kind, action, "Catalog updated");
    println!("✅ {}", message);
    Ok(())
}

fn edit_category(catalog: &mut Catalog, kind: TrimKind, add: bool, edit: bool) -> anyhow::Result<String> {
    if add {
        let name = Text::new("Category Name:").prompt()?;
        let price = price_prompt("Price:", None)?;
        let id = catalog.add_category(kind, &name, price)?;
        return Ok(format!("Added {} #{}", kind.label(), id));
    }

    let list = catalog.categories(kind).to_vec();
    let labels: Vec<String> = list.iter().map(|c| format!("#{} {}", c.id, c.name)).collect();
    let picked = Select::new("Category:", labels).raw_prompt()?;
    let mut category = list[picked.index].clone();

    if edit {
        category.name = Text::new("Category Name:").with_default(&category.name).prompt()?;
        category.price = price_prompt("Price:", Some(category.price))?;
        let id = category.id;
        catalog.update_category(kind, category)?;
        Ok(format!("Updated {} #{}", kind.label(), id))
    } else {
        let removed = catalog.delete_category(kind, category.id)?;
        Ok(format!("Deleted {} {}", kind.label(), removed.name))
    }
}

// ==========================================
// 3. Profit
// ==========================================

pub fn profit_wizard(app: &App) -> anyhow::Result<()> {
    let mut catalog = app.store.load()?;
    let current = catalog.profit();
    println!("Current profit setting: {}", current);

    let kinds = vec![ProfitKind::None, ProfitKind::Percentage, ProfitKind::Fixed];
    let start = kinds.iter().position(|k| *k == current.kind).unwrap_or(0);
    let kind = Select::new("Profit Type:", kinds).with_starting_cursor(start).prompt()?;

    let setting = match kind {
        ProfitKind::None => ProfitSetting::none(),
        ProfitKind::Percentage => ProfitSetting::percentage(price_prompt("Percent per set:", Some(current.value))?),
        ProfitKind::Fixed => ProfitSetting::fixed(price_prompt("Amount per set:", Some(current.value))?),
    };

    catalog.set_profit(setting)?;
    app.store.save(&catalog)?;
    debug!(%setting, "Profit setting stored");
    println!("✅ Profit settings updated: {}", setting);
    Ok(())
}

pub fn parse_date(input: Option<&str>) -> anyhow::Result<NaiveDate> {
    match input {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s)),
        None => Ok(today()),
    }
}
