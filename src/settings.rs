use anyhow::Context as _;
use directories::{BaseDirs, ProjectDirs};
use inquire::{Select, Text};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::model::{SetsPolicy, ShopConfig};

const DEFAULT_SHOP: &str = include_str!("../shop.toml");
const DEFAULT_DATA_ROOT: &str = "~/Documents/FabricInvoice";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppSettings {
    pub data_root: String,
    #[serde(default)]
    pub sets_policy: SetsPolicy,
}

impl AppSettings {
    /// Data root with `~` expanded.
    pub fn root(&self) -> PathBuf {
        PathBuf::from(expand_home_dir(&self.data_root))
    }
}

pub fn get_config_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "fabric-invoice", "app") {
        let config_dir = proj_dirs.config_dir();
        if !config_dir.exists() {
            fs::create_dir_all(config_dir).ok();
        }
        return config_dir.join("settings.toml");
    }
    PathBuf::from("settings.toml")
}

pub fn load_settings() -> Option<AppSettings> {
    let path = get_config_path();
    if !path.exists() {
        return None;
    }
    let content = fs::read_to_string(&path).ok()?;
    match toml::from_str(&content) {
        Ok(settings) => Some(settings),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable settings");
            None
        }
    }
}

pub fn save_settings(settings: &AppSettings) -> anyhow::Result<()> {
    let path = get_config_path();
    let toml_str = toml::to_string_pretty(settings)?;
    fs::write(&path, toml_str).with_context(|| format!("Failed to save {}", path.display()))?;
    info!(path = %path.display(), "Settings saved");
    Ok(())
}

/// Shop profile printed on every invoice. Seeded from the built-in default.
pub fn load_shop_config(root: &Path) -> anyhow::Result<ShopConfig> {
    let path = root.join("shop.toml");
    if path.exists() {
        let content = fs::read_to_string(&path).context("Failed to read shop.toml")?;
        toml::from_str(&content).context("Failed to parse shop.toml")
    } else {
        println!("✨ Initializing default shop profile...");
        let default_shop: ShopConfig = toml::from_str(DEFAULT_SHOP).context("Built-in shop.toml is invalid")?;
        fs::write(&path, DEFAULT_SHOP).context("Failed to write shop.toml")?;
        Ok(default_shop)
    }
}

pub fn setup_config_wizard() -> anyhow::Result<AppSettings> {
    println!("\n⚙️  --- Configuration Setup ---");
    let current = load_settings();
    let default_root = current
        .as_ref()
        .map(|s| s.data_root.clone())
        .unwrap_or_else(|| DEFAULT_DATA_ROOT.to_string());

    println!("📂 Opening folder picker...");
    let picked_path = rfd::FileDialog::new()
        .set_title("Select Data Directory")
        .pick_folder();

    let data_root = if let Some(path) = picked_path {
        path.to_string_lossy().to_string()
    } else {
        println!("❌ No folder selected. Falling back to manual input.");
        Text::new("Enter Data Directory:").with_default(&default_root).prompt()?
    };

    let policies = vec!["Any positive number", "Even numbers only"];
    let start = match current.map(|s| s.sets_policy) {
        Some(SetsPolicy::Even) => 1,
        _ => 0,
    };
    let choice = Select::new("Allowed set counts:", policies)
        .with_starting_cursor(start)
        .prompt()?;
    let sets_policy = if choice.starts_with("Even") { SetsPolicy::Even } else { SetsPolicy::Any };

    let settings = AppSettings { data_root, sets_policy };
    save_settings(&settings)?;
    println!("✅ Settings saved.");
    Ok(settings)
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_shop_parses() {
        let shop: ShopConfig = toml::from_str(DEFAULT_SHOP).unwrap();
        assert_eq!(shop.invoice_prefix, "SK");
        assert_eq!(shop.currency, "₹");
    }

    #[test]
    fn sets_policy_defaults_to_any() {
        let settings: AppSettings = toml::from_str("data_root = \"/tmp/shop\"").unwrap();
        assert_eq!(settings.sets_policy, SetsPolicy::Any);
        let settings: AppSettings =
            toml::from_str("data_root = \"/tmp/shop\"\nsets_policy = \"even\"").unwrap();
        assert_eq!(settings.sets_policy, SetsPolicy::Even);
    }

    #[test]
    fn plain_paths_are_not_expanded() {
        assert_eq!(expand_home_dir("/srv/shop"), "/srv/shop");
        assert!(!expand_home_dir("~/shop").starts_with('~') || BaseDirs::new().is_none());
    }
}
