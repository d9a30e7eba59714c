//! Invoice form state and the command handlers that drive it.

use anyhow::Context as _;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, remove_line};
use crate::catalog::Catalog;
use crate::error::InvoiceError;
use crate::line_items::{build_line_items, Selections};
use crate::model::{CustomCharge, FabricType, InvoiceTotals, ProfitSetting, SetsPolicy, WidthRule};
use crate::scaler::{parse_sets, scale, ScaledQuantities};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Success(String),
    Error(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success(msg) => write!(f, "✅ {}", msg),
            Status::Error(msg) => write!(f, "❌ {}", msg),
        }
    }
}

/// Ticket for one fabric-list fetch. Only the ticket of the latest width
/// selection is honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FabricRequest {
    pub seq: u64,
    pub width: u32,
}

/// Result of the last successful calculate. `number_of_sets` and `profit`
/// are frozen here so later edits re-total the same way.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CalculatedInvoice {
    pub customer_name: String,
    pub date: NaiveDate,
    pub number_of_sets: u32,
    pub profit: ProfitSetting,
    pub totals: InvoiceTotals,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct InvoiceSession {
    pub selections: Selections,
    #[serde(default)]
    pub fabric_choices: Vec<FabricType>,
    pub invoice: Option<CalculatedInvoice>,
    #[serde(skip)]
    request_seq: u64,
    #[serde(skip)]
    status: Option<Status>,
}

impl InvoiceSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    pub fn take_status(&mut self) -> Option<Status> {
        self.status.take()
    }

    fn fail(&mut self, err: &InvoiceError) {
        warn!(%err, "Invoice action failed");
        self.status = Some(Status::Error(err.to_string()));
    }

    pub fn on_customer_entered(&mut self, name: &str) {
        self.selections.customer_name = name.trim().to_string();
    }

    /// A new width invalidates the fabric choice and any fetch still in
    /// flight for the previous width.
    pub fn on_width_selected(&mut self, width: Option<u32>) -> Option<FabricRequest> {
        self.request_seq += 1;
        self.selections.width = width;
        self.selections.fabric_id = None;
        self.fabric_choices.clear();
        let width = width?;
        debug!(width, seq = self.request_seq, "Requesting fabrics for width");
        Some(FabricRequest { seq: self.request_seq, width })
    }

    /// Apply a fabric list fetched for `request`. Returns `false` when the
    /// response is stale or the fetch failed.
    pub fn on_fabric_response<E: fmt::Display>(
        &mut self,
        request: FabricRequest,
        response: Result<Vec<FabricType>, E>,
    ) -> bool {
        if request.seq != self.request_seq || self.selections.width != Some(request.width) {
            warn!(
                width = request.width,
                seq = request.seq,
                current = self.request_seq,
                "Discarding stale fabric response"
            );
            return false;
        }
        match response {
            Ok(fabrics) => {
                if fabrics.is_empty() {
                    self.status = Some(Status::Error(format!("No fabrics for width {}", request.width)));
                }
                self.fabric_choices = fabrics;
                true
            }
            Err(e) => {
                warn!(error = %e, "Fabric fetch failed");
                self.status = Some(Status::Error("Error loading fabric types".to_string()));
                false
            }
        }
    }

    pub fn on_fabric_selected(&mut self, fabric_id: Option<u32>) {
        self.selections.fabric_id = fabric_id;
    }

    /// Store the typed sets count and preview the scaled quantities. A count
    /// the policy refuses is rejected here, before the remaining prompts.
    pub fn on_sets_entered(
        &mut self,
        input: &str,
        rules: &[WidthRule],
        policy: SetsPolicy,
    ) -> Result<ScaledQuantities, InvoiceError> {
        let result = parse_sets(input).and_then(|sets| policy.check(sets)).and_then(|sets| {
            let width = self
                .selections
                .width
                .ok_or(InvoiceError::MissingRequiredSelection("width"))?;
            let scaled = scale(width, sets, rules)?;
            self.selections.sets = sets;
            Ok(scaled)
        });
        if let Err(err) = &result {
            self.fail(err);
        }
        result
    }

    pub fn on_trims_selected(&mut self, brooch_id: Option<u32>, lace_id: Option<u32>) {
        self.selections.brooch_id = brooch_id;
        self.selections.lace_id = lace_id;
    }

    pub fn on_extras_selected(&mut self, extra_ids: Vec<u32>) {
        self.selections.extra_ids = extra_ids;
    }

    pub fn on_custom_charge(&mut self, custom: Option<CustomCharge>) {
        self.selections.custom = custom;
    }

    /// Rebuild the invoice from the current selections. On failure the
    /// previous invoice stays as it was.
    pub fn on_calculate_invoice(
        &mut self,
        catalog: &Catalog,
        policy: SetsPolicy,
        date: NaiveDate,
    ) -> Result<&CalculatedInvoice, InvoiceError> {
        let items = match build_line_items(&self.selections, catalog, policy) {
            Ok(items) => items,
            Err(err) => {
                self.fail(&err);
                return Err(err);
            }
        };

        let profit = catalog.profit();
        let number_of_sets = self.selections.sets;
        let totals = aggregate(items, number_of_sets, &profit);
        info!(
            customer = %self.selections.customer_name,
            number_of_sets,
            final_total = totals.final_total,
            "Invoice calculated"
        );

        self.status = Some(Status::Success("Invoice calculated".to_string()));
        Ok(&*self.invoice.insert(CalculatedInvoice {
            customer_name: self.selections.customer_name.clone(),
            date,
            number_of_sets,
            profit,
            totals,
        }))
    }

    pub fn on_remove_line(&mut self, index: usize) -> Result<&CalculatedInvoice, InvoiceError> {
        let no_invoice = InvoiceError::LineIndexOutOfRange { index, len: 0 };
        let outcome = match &self.invoice {
            Some(invoice) => remove_line(&invoice.totals, index, invoice.number_of_sets, &invoice.profit),
            None => Err(no_invoice.clone()),
        };
        let totals = match outcome {
            Ok(totals) => totals,
            Err(err) => {
                self.fail(&err);
                return Err(err);
            }
        };

        self.status = Some(Status::Success("Line removed".to_string()));
        let invoice = self.invoice.as_mut().ok_or(no_invoice)?;
        invoice.totals = totals;
        Ok(&*invoice)
    }

    pub fn on_clear(&mut self) {
        debug!("Clearing invoice session");
        *self = Self {
            request_seq: self.request_seq + 1,
            ..Self::default()
        };
    }
}

// ==========================================
// Draft Persistence
// ==========================================

/// The in-progress session, kept as JSON so a run can be resumed.
pub struct DraftStore {
    path: PathBuf,
}

impl DraftStore {
    pub fn new(root: &Path) -> Self {
        Self { path: root.join("draft.json") }
    }

    pub fn load(&self) -> anyhow::Result<Option<InvoiceSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let session = serde_json::from_str(&content).context("Draft is not valid JSON")?;
        Ok(Some(session))
    }

    pub fn save(&self, session: &InvoiceSession) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, json).with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DEFAULT_CATALOG;

    fn catalog() -> Catalog {
        toml::from_str(DEFAULT_CATALOG).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    fn ready_session(catalog: &Catalog) -> InvoiceSession {
        let mut session = InvoiceSession::new();
        session.on_customer_entered("Meera");
        let req = session.on_width_selected(Some(44)).unwrap();
        assert!(session.on_fabric_response::<String>(req, Ok(catalog.fabrics_for_width(44))));
        session.on_fabric_selected(Some(1));
        session.on_sets_entered("6", &catalog.width_rules, SetsPolicy::Any).unwrap();
        session
    }

    #[test]
    fn stale_fabric_response_is_discarded() {
        let catalog = catalog();
        let mut session = InvoiceSession::new();
        let old = session.on_width_selected(Some(44)).unwrap();
        let new = session.on_width_selected(Some(60)).unwrap();

        assert!(session.on_fabric_response::<String>(new, Ok(catalog.fabrics_for_width(60))));
        assert!(!session.on_fabric_response::<String>(old, Ok(catalog.fabrics_for_width(44))));
        assert_eq!(session.fabric_choices.len(), 1);
        assert_eq!(session.fabric_choices[0].width, 60);
    }

    #[test]
    fn failed_fetch_keeps_choices() {
        let catalog = catalog();
        let mut session = InvoiceSession::new();
        let req = session.on_width_selected(Some(44)).unwrap();
        session.on_fabric_response::<String>(req, Ok(catalog.fabrics_for_width(44)));
        let choices = session.fabric_choices.clone();

        assert!(!session.on_fabric_response(req, Err("connection reset")));
        assert_eq!(session.fabric_choices, choices);
        assert!(matches!(session.status(), Some(Status::Error(_))));
    }

    #[test]
    fn clearing_width_drops_fabric() {
        let catalog = catalog();
        let mut session = ready_session(&catalog);
        assert!(session.on_width_selected(None).is_none());
        assert_eq!(session.selections.fabric_id, None);
        assert!(session.fabric_choices.is_empty());
    }

    #[test]
    fn sets_preview_scales_quantities() {
        let catalog = catalog();
        let mut session = InvoiceSession::new();
        session.on_width_selected(Some(44));
        let q = session.on_sets_entered("6", &catalog.width_rules, SetsPolicy::Any).unwrap();
        assert_eq!((q.meters, q.brooch_qty, q.lace_qty), (9.0, 6, 4));

        assert!(session.on_sets_entered("abc", &catalog.width_rules, SetsPolicy::Any).is_err());
        assert_eq!(session.selections.sets, 6);
    }

    #[test]
    fn even_policy_rejects_odd_sets_on_entry() {
        let catalog = catalog();
        let mut session = InvoiceSession::new();
        session.on_width_selected(Some(44));
        session.on_sets_entered("4", &catalog.width_rules, SetsPolicy::Even).unwrap();

        let err = session.on_sets_entered("5", &catalog.width_rules, SetsPolicy::Even).unwrap_err();
        assert!(matches!(err, InvoiceError::InvalidSets { reason: "must be an even number", .. }));
        assert_eq!(session.selections.sets, 4);
        assert!(matches!(session.status(), Some(Status::Error(_))));
    }

    #[test]
    fn remove_line_without_invoice_fails() {
        let mut session = InvoiceSession::new();
        assert_eq!(
            session.on_remove_line(0).unwrap_err(),
            InvoiceError::LineIndexOutOfRange { index: 0, len: 0 }
        );
        assert!(matches!(session.status(), Some(Status::Error(_))));
    }

    #[test]
    fn calculate_then_remove_line() {
        let mut catalog = catalog();
        catalog.set_profit(ProfitSetting::fixed(20.0)).unwrap();
        let mut session = ready_session(&catalog);
        session.on_trims_selected(Some(1), None);
        session.on_extras_selected(vec![1]);

        let invoice = session.on_calculate_invoice(&catalog, SetsPolicy::Any, date()).unwrap();
        // 1080 + 360 + 600
        assert_eq!(invoice.totals.base_total, 2040.0);
        assert_eq!(invoice.totals.final_total, 2160.0);
        assert_eq!(invoice.number_of_sets, 6);

        // the form changes, the calculated invoice does not
        session.on_sets_entered("4", &catalog.width_rules, SetsPolicy::Any).unwrap();
        let invoice = session.on_remove_line(1).unwrap();
        assert_eq!(invoice.totals.base_total, 1680.0);
        // (1680 / 6 + 20) * 6
        assert_eq!(invoice.totals.final_total, 1800.0);
    }

    #[test]
    fn failed_calculate_keeps_previous_invoice() {
        let catalog = catalog();
        let mut session = ready_session(&catalog);
        let before = session.on_calculate_invoice(&catalog, SetsPolicy::Any, date()).unwrap().clone();

        session.on_customer_entered("");
        let err = session.on_calculate_invoice(&catalog, SetsPolicy::Any, date()).unwrap_err();
        assert_eq!(err, InvoiceError::MissingRequiredSelection("customer name"));
        assert_eq!(session.invoice.as_ref(), Some(&before));
        assert!(matches!(session.status(), Some(Status::Error(_))));
    }

    #[test]
    fn clear_resets_everything() {
        let catalog = catalog();
        let mut session = ready_session(&catalog);
        let stale = FabricRequest { seq: 1, width: 44 };
        session.on_calculate_invoice(&catalog, SetsPolicy::Any, date()).unwrap();
        session.on_clear();
        assert!(session.invoice.is_none());
        assert_eq!(session.selections, Selections::default());
        assert!(!session.on_fabric_response::<String>(stale, Ok(Vec::new())));
    }

    #[test]
    fn draft_round_trips() {
        let dir = std::env::temp_dir().join(format!("fabric-invoice-draft-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let store = DraftStore::new(&dir);
        assert!(store.load().unwrap().is_none());

        let catalog = catalog();
        let mut session = ready_session(&catalog);
        session.on_calculate_invoice(&catalog, SetsPolicy::Any, date()).unwrap();
        store.save(&session).unwrap();

        let restored = store.load().unwrap().unwrap();
        assert_eq!(restored.selections, session.selections);
        assert_eq!(restored.invoice, session.invoice);

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        fs::remove_dir_all(&dir).ok();
    }
}
