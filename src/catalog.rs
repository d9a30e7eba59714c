//! Price lists and width rules, kept in `catalog.toml` under the data root.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{CatalogError, InvoiceError};
use crate::model::{ExtraCharge, FabricType, PricedCategory, ProfitSetting, SetsPolicy, WidthRule};

// Seeded on first use
pub const DEFAULT_CATALOG: &str = include_str!("../catalog.toml");

/// Which trim list a category belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimKind {
    Brooch,
    Lace,
}

impl TrimKind {
    pub fn label(self) -> &'static str {
        match self {
            TrimKind::Brooch => "brooch category",
            TrimKind::Lace => "lace category",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Catalog {
    #[serde(default)]
    pub widths: Vec<u32>,
    #[serde(default)]
    pub width_rules: Vec<WidthRule>,
    #[serde(default)]
    pub fabrics: Vec<FabricType>,
    #[serde(default)]
    pub brooch_categories: Vec<PricedCategory>,
    #[serde(default)]
    pub lace_categories: Vec<PricedCategory>,
    #[serde(default)]
    pub extras: Vec<ExtraCharge>,
    pub profit: Option<ProfitSetting>,
}

fn next_id(ids: impl Iterator<Item = u32>) -> u32 {
    ids.max().unwrap_or(0) + 1
}

fn check_name(name: &str) -> Result<String, CatalogError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::BlankName);
    }
    Ok(trimmed.to_string())
}

fn check_price(price: f64) -> Result<f64, CatalogError> {
    if !price.is_finite() || price < 0.0 {
        return Err(CatalogError::InvalidPrice(price));
    }
    Ok(price)
}

fn check_fabric_price(price: f64) -> Result<f64, CatalogError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(CatalogError::InvalidFabricPrice(price));
    }
    Ok(price)
}

impl Catalog {
    // ==========================================
    // Lookups
    // ==========================================

    pub fn fabric(&self, id: u32) -> Result<&FabricType, InvoiceError> {
        self.fabrics
            .iter()
            .find(|f| f.id == id)
            .ok_or(InvoiceError::UnknownEntry { kind: "fabric", id })
    }

    pub fn category(&self, kind: TrimKind, id: u32) -> Result<&PricedCategory, InvoiceError> {
        self.categories(kind)
            .iter()
            .find(|c| c.id == id)
            .ok_or(InvoiceError::UnknownEntry { kind: kind.label(), id })
    }

    pub fn extra(&self, id: u32) -> Result<&ExtraCharge, InvoiceError> {
        self.extras
            .iter()
            .find(|e| e.id == id)
            .ok_or(InvoiceError::UnknownEntry { kind: "extra charge", id })
    }

    pub fn categories(&self, kind: TrimKind) -> &[PricedCategory] {
        match kind {
            TrimKind::Brooch => &self.brooch_categories,
            TrimKind::Lace => &self.lace_categories,
        }
    }

    fn categories_mut(&mut self, kind: TrimKind) -> &mut Vec<PricedCategory> {
        match kind {
            TrimKind::Brooch => &mut self.brooch_categories,
            TrimKind::Lace => &mut self.lace_categories,
        }
    }

    /// Fabrics cut at `width`, sorted by name.
    pub fn fabrics_for_width(&self, width: u32) -> Vec<FabricType> {
        let mut fabrics: Vec<FabricType> =
            self.fabrics.iter().filter(|f| f.width == width).cloned().collect();
        fabrics.sort_by(|a, b| a.name.cmp(&b.name));
        fabrics
    }

    /// Rules sorted by width, then sets.
    pub fn sorted_width_rules(&self) -> Vec<WidthRule> {
        let mut rules = self.width_rules.clone();
        rules.sort_by_key(|r| (r.width, r.sets));
        rules
    }

    pub fn profit(&self) -> ProfitSetting {
        self.profit.unwrap_or_default()
    }

    // ==========================================
    // Widths
    // ==========================================

    pub fn add_width(&mut self, width: u32) -> Result<(), CatalogError> {
        if width == 0 {
            return Err(CatalogError::UnknownWidth(width));
        }
        if self.widths.contains(&width) {
            return Err(CatalogError::DuplicateWidth(width));
        }
        self.widths.push(width);
        self.widths.sort_unstable();
        Ok(())
    }

    pub fn delete_width(&mut self, width: u32) -> Result<(), CatalogError> {
        if !self.widths.contains(&width) {
            return Err(CatalogError::UnknownWidth(width));
        }
        let in_use = self.fabrics.iter().any(|f| f.width == width)
            || self.width_rules.iter().any(|r| r.width == width);
        if in_use {
            return Err(CatalogError::WidthInUse(width));
        }
        self.widths.retain(|w| *w != width);
        Ok(())
    }

    fn check_width(&self, width: u32) -> Result<u32, CatalogError> {
        if self.widths.contains(&width) {
            Ok(width)
        } else {
            Err(CatalogError::UnknownWidth(width))
        }
    }

    // ==========================================
    // Width Rules
    // ==========================================

    fn validate_rule(
        &self,
        id: Option<u32>,
        width: u32,
        sets: u32,
        meters: f64,
        policy: SetsPolicy,
    ) -> Result<(), CatalogError> {
        self.check_width(width)?;
        policy.check(sets)?;
        if !meters.is_finite() || meters <= 0.0 {
            return Err(CatalogError::InvalidMeters(meters));
        }
        if self.width_rules.iter().any(|r| r.width == width && Some(r.id) != id) {
            return Err(CatalogError::DuplicateWidthRule(width));
        }
        Ok(())
    }

    pub fn add_width_rule(
        &mut self,
        width: u32,
        sets: u32,
        meters: f64,
        lace_rolls: u32,
        policy: SetsPolicy,
    ) -> Result<u32, CatalogError> {
        self.validate_rule(None, width, sets, meters, policy)?;
        let id = next_id(self.width_rules.iter().map(|r| r.id));
        self.width_rules.push(WidthRule { id, width, sets, meters, lace_rolls });
        Ok(id)
    }

    pub fn update_width_rule(&mut self, rule: WidthRule, policy: SetsPolicy) -> Result<(), CatalogError> {
        self.validate_rule(Some(rule.id), rule.width, rule.sets, rule.meters, policy)?;
        let slot = self
            .width_rules
            .iter_mut()
            .find(|r| r.id == rule.id)
            .ok_or(CatalogError::NotFound { kind: "Width rule", id: rule.id })?;
        *slot = rule;
        Ok(())
    }

    pub fn delete_width_rule(&mut self, id: u32) -> Result<WidthRule, CatalogError> {
        let pos = self
            .width_rules
            .iter()
            .position(|r| r.id == id)
            .ok_or(CatalogError::NotFound { kind: "Width rule", id })?;
        Ok(self.width_rules.remove(pos))
    }

    // ==========================================
    // Fabrics
    // ==========================================

    pub fn add_fabric(&mut self, name: &str, width: u32, price_per_meter: f64) -> Result<u32, CatalogError> {
        let name = check_name(name)?;
        self.check_width(width)?;
        let price_per_meter = check_fabric_price(price_per_meter)?;
        let id = next_id(self.fabrics.iter().map(|f| f.id));
        self.fabrics.push(FabricType { id, name, width, price_per_meter });
        Ok(id)
    }

    pub fn update_fabric(&mut self, fabric: FabricType) -> Result<(), CatalogError> {
        let name = check_name(&fabric.name)?;
        self.check_width(fabric.width)?;
        let price_per_meter = check_fabric_price(fabric.price_per_meter)?;
        let slot = self
            .fabrics
            .iter_mut()
            .find(|f| f.id == fabric.id)
            .ok_or(CatalogError::NotFound { kind: "Fabric", id: fabric.id })?;
        *slot = FabricType { name, price_per_meter, ..fabric };
        Ok(())
    }

    pub fn delete_fabric(&mut self, id: u32) -> Result<FabricType, CatalogError> {
        let pos = self
            .fabrics
            .iter()
            .position(|f| f.id == id)
            .ok_or(CatalogError::NotFound { kind: "Fabric", id })?;
        Ok(self.fabrics.remove(pos))
    }

    // ==========================================
    // Trim Categories
    // ==========================================

    pub fn add_category(&mut self, kind: TrimKind, name: &str, price: f64) -> Result<u32, CatalogError> {
        let name = check_name(name)?;
        let price = check_price(price)?;
        let list = self.categories_mut(kind);
        let id = next_id(list.iter().map(|c| c.id));
        list.push(PricedCategory { id, name, price });
        Ok(id)
    }

    pub fn update_category(&mut self, kind: TrimKind, category: PricedCategory) -> Result<(), CatalogError> {
        let name = check_name(&category.name)?;
        let price = check_price(category.price)?;
        let slot = self
            .categories_mut(kind)
            .iter_mut()
            .find(|c| c.id == category.id)
            .ok_or(CatalogError::NotFound { kind: kind.label(), id: category.id })?;
        *slot = PricedCategory { id: category.id, name, price };
        Ok(())
    }

    pub fn delete_category(&mut self, kind: TrimKind, id: u32) -> Result<PricedCategory, CatalogError> {
        let list = self.categories_mut(kind);
        let pos = list
            .iter()
            .position(|c| c.id == id)
            .ok_or(CatalogError::NotFound { kind: kind.label(), id })?;
        Ok(list.remove(pos))
    }

    // ==========================================
    // Extra Charges
    // ==========================================

    pub fn add_extra(&mut self, name: &str, price: f64) -> Result<u32, CatalogError> {
        let name = check_name(name)?;
        let price = check_price(price)?;
        let id = next_id(self.extras.iter().map(|e| e.id));
        self.extras.push(ExtraCharge { id, name, price });
        Ok(id)
    }

    pub fn update_extra(&mut self, extra: ExtraCharge) -> Result<(), CatalogError> {
        let name = check_name(&extra.name)?;
        let price = check_price(extra.price)?;
        let slot = self
            .extras
            .iter_mut()
            .find(|e| e.id == extra.id)
            .ok_or(CatalogError::NotFound { kind: "Extra charge", id: extra.id })?;
        *slot = ExtraCharge { id: extra.id, name, price };
        Ok(())
    }

    pub fn delete_extra(&mut self, id: u32) -> Result<ExtraCharge, CatalogError> {
        let pos = self
            .extras
            .iter()
            .position(|e| e.id == id)
            .ok_or(CatalogError::NotFound { kind: "Extra charge", id })?;
        Ok(self.extras.remove(pos))
    }

    // ==========================================
    // Profit
    // ==========================================

    pub fn set_profit(&mut self, setting: ProfitSetting) -> Result<(), CatalogError> {
        check_price(setting.value)?;
        self.profit = Some(setting);
        Ok(())
    }
}

// ==========================================
// Store
// ==========================================

/// TOML-backed catalog file.
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(root: &Path) -> Self {
        Self { path: root.join("catalog.toml") }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the catalog, seeding the default file when missing and filling
    /// in the profit setting when the file has none.
    pub fn load(&self) -> Result<Catalog, CatalogError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "Initializing default catalog");
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&self.path, DEFAULT_CATALOG)?;
        }

        let content = fs::read_to_string(&self.path)?;
        let mut catalog: Catalog = toml::from_str(&content)?;

        if catalog.profit.is_none() {
            warn!("No profit setting found, storing default");
            catalog.profit = Some(ProfitSetting::default());
            self.save(&catalog)?;
        }

        debug!(
            fabrics = catalog.fabrics.len(),
            rules = catalog.width_rules.len(),
            extras = catalog.extras.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    pub fn save(&self, catalog: &Catalog) -> Result<(), CatalogError> {
        let toml_str = toml::to_string_pretty(catalog)?;
        fs::write(&self.path, toml_str)?;
        debug!(path = %self.path.display(), "Catalog saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Catalog {
        toml::from_str(DEFAULT_CATALOG).unwrap()
    }

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fabric-invoice-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn default_catalog_parses() {
        let catalog = seeded();
        assert_eq!(catalog.widths, vec![44, 60]);
        assert_eq!(catalog.width_rules.len(), 2);
        assert_eq!(catalog.extras.len(), 3);
        assert_eq!(catalog.profit(), ProfitSetting::none());
    }

    #[test]
    fn duplicate_width_rule_is_refused() {
        let mut catalog = seeded();
        let err = catalog.add_width_rule(44, 4, 6.0, 2, SetsPolicy::Any).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateWidthRule(44)));
    }

    #[test]
    fn updating_a_rule_keeps_its_own_width() {
        let mut catalog = seeded();
        let mut rule = catalog.width_rules[0].clone();
        rule.meters = 5.0;
        catalog.update_width_rule(rule, SetsPolicy::Any).unwrap();
        assert_eq!(catalog.width_rules[0].meters, 5.0);

        let mut moved = catalog.width_rules[0].clone();
        moved.width = 60;
        assert!(matches!(
            catalog.update_width_rule(moved, SetsPolicy::Any),
            Err(CatalogError::DuplicateWidthRule(60))
        ));
    }

    #[test]
    fn even_policy_applies_to_rules() {
        let mut catalog = seeded();
        catalog.add_width(36).unwrap();
        assert!(matches!(
            catalog.add_width_rule(36, 3, 4.0, 1, SetsPolicy::Even),
            Err(CatalogError::Invoice(InvoiceError::InvalidSets { .. }))
        ));
        let id = catalog.add_width_rule(36, 4, 4.0, 1, SetsPolicy::Even).unwrap();
        assert_eq!(id, 3);
    }

    #[test]
    fn fabric_needs_known_width_and_valid_price() {
        let mut catalog = seeded();
        assert!(matches!(catalog.add_fabric("Linen", 80, 10.0), Err(CatalogError::UnknownWidth(80))));
        assert!(matches!(catalog.add_fabric("Linen", 44, -1.0), Err(CatalogError::InvalidFabricPrice(_))));
        assert!(matches!(catalog.add_fabric("Linen", 44, 0.0), Err(CatalogError::InvalidFabricPrice(_))));
        assert!(matches!(catalog.add_fabric("Linen", 44, f64::NAN), Err(CatalogError::InvalidFabricPrice(_))));
        assert!(matches!(catalog.add_fabric("  ", 44, 10.0), Err(CatalogError::BlankName)));
        let id = catalog.add_fabric(" Linen ", 44, 10.0).unwrap();
        assert_eq!(catalog.fabric(id).unwrap().name, "Linen");

        let mut linen = catalog.fabric(id).unwrap().clone();
        linen.price_per_meter = 0.0;
        assert!(matches!(catalog.update_fabric(linen), Err(CatalogError::InvalidFabricPrice(_))));
        assert_eq!(catalog.fabric(id).unwrap().price_per_meter, 10.0);
    }

    #[test]
    fn fabrics_filter_by_width() {
        let catalog = seeded();
        let fabrics = catalog.fabrics_for_width(60);
        assert_eq!(fabrics.len(), 1);
        assert_eq!(fabrics[0].name, "Silk");
        assert!(catalog.fabrics_for_width(80).is_empty());
    }

    #[test]
    fn width_in_use_cannot_be_deleted() {
        let mut catalog = seeded();
        assert!(matches!(catalog.delete_width(44), Err(CatalogError::WidthInUse(44))));
        catalog.add_width(36).unwrap();
        catalog.delete_width(36).unwrap();
        assert!(!catalog.widths.contains(&36));
    }

    #[test]
    fn categories_are_kept_per_kind() {
        let mut catalog = seeded();
        let id = catalog.add_category(TrimKind::Lace, "Net", 75.0).unwrap();
        assert_eq!(catalog.category(TrimKind::Lace, id).unwrap().price, 75.0);
        assert!(catalog.category(TrimKind::Brooch, id).is_err());
        catalog.delete_category(TrimKind::Lace, id).unwrap();
        assert!(catalog.category(TrimKind::Lace, id).is_err());
    }

    #[test]
    fn store_seeds_and_round_trips() {
        let root = temp_root("store");
        let store = CatalogStore::new(&root);
        let mut catalog = store.load().unwrap();
        assert!(store.path().exists());

        catalog.add_extra("Thread", 15.0).unwrap();
        catalog.set_profit(ProfitSetting::fixed(20.0)).unwrap();
        store.save(&catalog).unwrap();

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded, catalog);
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn missing_profit_is_created_lazily() {
        let root = temp_root("profit");
        fs::write(root.join("catalog.toml"), "widths = [44]\n").unwrap();
        let store = CatalogStore::new(&root);
        let catalog = store.load().unwrap();
        assert_eq!(catalog.profit, Some(ProfitSetting::none()));
        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("none"));
        fs::remove_dir_all(&root).ok();
    }
}
