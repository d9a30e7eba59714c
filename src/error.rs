use thiserror::Error;

/// Failures of the invoice composition engine. Every variant aborts only the
/// action that raised it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvoiceError {
    #[error("No width rule for width {0}")]
    NoRuleForWidth(u32),

    #[error("Invalid number of sets '{input}': {reason}")]
    InvalidSets { input: String, reason: &'static str },

    #[error("Missing required selection: {0}")]
    MissingRequiredSelection(&'static str),

    #[error("Cannot split a total across zero sets")]
    DivisionByZero,

    #[error("Fabric '{name}' is for width {fabric_width}, not {selected_width}")]
    FabricWidthMismatch {
        name: String,
        fabric_width: u32,
        selected_width: u32,
    },

    #[error("Unknown {kind} with id {id}")]
    UnknownEntry { kind: &'static str, id: u32 },

    #[error("Line {index} does not exist (invoice has {len} lines)")]
    LineIndexOutOfRange { index: usize, len: usize },

    #[error("Custom charge {field} must be a non-negative number, got {value}")]
    InvalidCustomCharge { field: &'static str, value: f64 },
}

/// Failures of the catalog store: file access and price-list validation.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error. cause: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog parse error. cause: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Catalog write error. cause: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("A width rule for width {0} already exists")]
    DuplicateWidthRule(u32),

    #[error("Width {0} is not in the width list")]
    UnknownWidth(u32),

    #[error("Width {0} already exists")]
    DuplicateWidth(u32),

    #[error("Width {0} is still used by fabrics or width rules")]
    WidthInUse(u32),

    #[error("Price must be a non-negative number, got {0}")]
    InvalidPrice(f64),

    #[error("Fabric price per meter must be greater than zero, got {0}")]
    InvalidFabricPrice(f64),

    #[error("Meters must be greater than zero, got {0}")]
    InvalidMeters(f64),

    #[error("Name is required")]
    BlankName,

    #[error("{kind} with id {id} not found")]
    NotFound { kind: &'static str, id: u32 },

    #[error(transparent)]
    Invoice(#[from] InvoiceError),
}
