use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{Catalog, TrimKind};
use crate::error::InvoiceError;
use crate::model::{CustomCharge, InvoiceLineItem, LineKind, SetsPolicy};
use crate::scaler::scale;

/// What the operator picked on the invoice form.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Selections {
    pub customer_name: String,
    pub width: Option<u32>,
    pub sets: u32,
    pub fabric_id: Option<u32>,
    pub brooch_id: Option<u32>,
    pub lace_id: Option<u32>,
    #[serde(default)]
    pub extra_ids: Vec<u32>,
    pub custom: Option<CustomCharge>,
}

fn push_priced(items: &mut Vec<InvoiceLineItem>, item: InvoiceLineItem) {
    if item.line_total != 0.0 {
        items.push(item);
    } else {
        debug!(label = %item.label, "Skipping zero-value line");
    }
}

/// Price every selection against the catalog. Lines come out in form order:
/// fabric, brooch, lace, extras, custom.
pub fn build_line_items(
    selections: &Selections,
    catalog: &Catalog,
    policy: SetsPolicy,
) -> Result<Vec<InvoiceLineItem>, InvoiceError> {
    if selections.customer_name.trim().is_empty() {
        return Err(InvoiceError::MissingRequiredSelection("customer name"));
    }
    let width = selections
        .width
        .ok_or(InvoiceError::MissingRequiredSelection("width"))?;
    let fabric_id = selections
        .fabric_id
        .ok_or(InvoiceError::MissingRequiredSelection("fabric"))?;
    let sets = policy.check(selections.sets)?;

    let fabric = catalog.fabric(fabric_id)?;
    if fabric.width != width {
        return Err(InvoiceError::FabricWidthMismatch {
            name: fabric.name.clone(),
            fabric_width: fabric.width,
            selected_width: width,
        });
    }

    let quantities = scale(width, sets, &catalog.width_rules)?;
    let mut items = Vec::new();

    push_priced(
        &mut items,
        InvoiceLineItem::new(
            LineKind::Fabric,
            format!("{} (W:{}, {} sets, {:.1}m)", fabric.name, width, sets, quantities.meters),
            fabric.price_per_meter,
            quantities.meters,
        ),
    );

    if let Some(id) = selections.brooch_id {
        let brooch = catalog.category(TrimKind::Brooch, id)?;
        push_priced(
            &mut items,
            InvoiceLineItem::new(
                LineKind::Brooch,
                format!("Brooch: {}", brooch.name),
                brooch.price,
                quantities.brooch_qty as f64,
            ),
        );
    }

    if let Some(id) = selections.lace_id {
        let lace = catalog.category(TrimKind::Lace, id)?;
        push_priced(
            &mut items,
            InvoiceLineItem::new(
                LineKind::Lace,
                format!("Lace: {}", lace.name),
                lace.price,
                quantities.lace_qty as f64,
            ),
        );
    }

    let mut seen = Vec::with_capacity(selections.extra_ids.len());
    for id in &selections.extra_ids {
        if seen.contains(id) {
            continue;
        }
        seen.push(*id);
        let extra = catalog.extra(*id)?;
        // Extras are charged once per set
        push_priced(
            &mut items,
            InvoiceLineItem::new(LineKind::Extra, extra.name.clone(), extra.price, sets as f64),
        );
    }

    if let Some(custom) = selections.custom.as_ref().filter(|c| !c.name.trim().is_empty()) {
        custom.validate()?;
        let quantity = custom.quantity_per_set * sets as f64;
        push_priced(
            &mut items,
            InvoiceLineItem {
                kind: LineKind::Custom,
                label: custom.name.trim().to_string(),
                unit_price: custom.price_per_unit,
                quantity,
                line_total: custom.price_per_unit * custom.quantity_per_set * sets as f64,
            },
        );
    }

    debug!(lines = items.len(), width, sets, "Built line items");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DEFAULT_CATALOG;

    fn catalog() -> Catalog {
        toml::from_str(DEFAULT_CATALOG).unwrap()
    }

    fn selections() -> Selections {
        Selections {
            customer_name: "Asha Textiles".into(),
            width: Some(44),
            sets: 6,
            fabric_id: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn fabric_only_invoice() {
        let items = build_line_items(&selections(), &catalog(), SetsPolicy::Any).unwrap();
        assert_eq!(items.len(), 1);
        let fabric = &items[0];
        assert_eq!(fabric.kind, LineKind::Fabric);
        assert_eq!(fabric.label, "Cotton (W:44, 6 sets, 9.0m)");
        assert_eq!(fabric.unit_price, 120.0);
        assert_eq!(fabric.quantity, 9.0);
        assert_eq!(fabric.line_total, 1080.0);
    }

    #[test]
    fn all_selections_in_form_order() {
        let sel = Selections {
            brooch_id: Some(1),
            lace_id: Some(3),
            extra_ids: vec![1, 3],
            custom: Some(CustomCharge {
                name: "Thread".into(),
                price_per_unit: 5.0,
                quantity_per_set: 2.0,
            }),
            ..selections()
        };
        let items = build_line_items(&sel, &catalog(), SetsPolicy::Any).unwrap();
        let kinds: Vec<LineKind> = items.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LineKind::Fabric,
                LineKind::Brooch,
                LineKind::Lace,
                LineKind::Extra,
                LineKind::Extra,
                LineKind::Custom
            ]
        );

        // Heavy brooch, one per set
        assert_eq!(items[1].quantity, 6.0);
        assert_eq!(items[1].line_total, 360.0);
        // Light lace, 2 rolls per 3 sets
        assert_eq!(items[2].quantity, 4.0);
        assert_eq!(items[2].line_total, 360.0);
        // Foam, Making Charge scale with sets
        assert_eq!(items[3].line_total, 600.0);
        assert_eq!(items[4].line_total, 3000.0);
        // 5 * 2 per set * 6 sets
        assert_eq!(items[5].quantity, 12.0);
        assert_eq!(items[5].line_total, 60.0);
    }

    #[test]
    fn missing_customer_or_fabric() {
        let sel = Selections { customer_name: "  ".into(), ..selections() };
        assert_eq!(
            build_line_items(&sel, &catalog(), SetsPolicy::Any),
            Err(InvoiceError::MissingRequiredSelection("customer name"))
        );

        let sel = Selections { fabric_id: None, ..selections() };
        assert_eq!(
            build_line_items(&sel, &catalog(), SetsPolicy::Any),
            Err(InvoiceError::MissingRequiredSelection("fabric"))
        );
    }

    #[test]
    fn no_rule_means_no_items() {
        let mut catalog = catalog();
        catalog.widths.push(80);
        catalog.add_fabric("Velvet", 80, 300.0).unwrap();
        let id = catalog.fabrics_for_width(80)[0].id;
        let sel = Selections { width: Some(80), fabric_id: Some(id), ..selections() };
        assert_eq!(
            build_line_items(&sel, &catalog, SetsPolicy::Any),
            Err(InvoiceError::NoRuleForWidth(80))
        );
    }

    #[test]
    fn fabric_must_match_width() {
        let sel = Selections { fabric_id: Some(2), ..selections() };
        assert!(matches!(
            build_line_items(&sel, &catalog(), SetsPolicy::Any),
            Err(InvoiceError::FabricWidthMismatch { fabric_width: 60, selected_width: 44, .. })
        ));
    }

    #[test]
    fn zero_value_lines_are_dropped() {
        let mut catalog = catalog();
        catalog.width_rules[0].lace_rolls = 0;
        catalog.extras[0].price = 0.0;
        let sel = Selections {
            lace_id: Some(1),
            extra_ids: vec![1],
            custom: Some(CustomCharge {
                name: "Nothing".into(),
                price_per_unit: 0.0,
                quantity_per_set: 1.0,
            }),
            ..selections()
        };
        let items = build_line_items(&sel, &catalog, SetsPolicy::Any).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, LineKind::Fabric);
    }

    #[test]
    fn invalid_custom_charge_is_an_error() {
        for (price, qty) in [(f64::NAN, 2.0), (f64::INFINITY, 1.0), (-500.0, 1.0), (5.0, -1.0)] {
            let sel = Selections {
                custom: Some(CustomCharge {
                    name: "Thread".into(),
                    price_per_unit: price,
                    quantity_per_set: qty,
                }),
                ..selections()
            };
            assert!(matches!(
                build_line_items(&sel, &catalog(), SetsPolicy::Any),
                Err(InvoiceError::InvalidCustomCharge { .. })
            ));
        }
    }

    #[test]
    fn hand_edited_zero_priced_fabric_emits_no_line() {
        // the store refuses this price; only a hand-edited file gets here
        let mut catalog = catalog();
        catalog.fabrics[0].price_per_meter = 0.0;
        let sel = Selections { extra_ids: vec![1], ..selections() };
        let items = build_line_items(&sel, &catalog, SetsPolicy::Any).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, LineKind::Extra);
    }

    #[test]
    fn unknown_extra_is_reported() {
        let sel = Selections { extra_ids: vec![42], ..selections() };
        assert_eq!(
            build_line_items(&sel, &catalog(), SetsPolicy::Any),
            Err(InvoiceError::UnknownEntry { kind: "extra charge", id: 42 })
        );
    }

    #[test]
    fn even_policy_rejects_odd_sets() {
        let sel = Selections { sets: 3, ..selections() };
        assert!(matches!(
            build_line_items(&sel, &catalog(), SetsPolicy::Even),
            Err(InvoiceError::InvalidSets { .. })
        ));
    }
}
