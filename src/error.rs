//! Error taxonomy for the billing core and its store.

use thiserror::Error;

/// Result type alias for billing operations
pub type Result<T> = std::result::Result<T, BillingError>;

/// Errors raised while validating, storing or encoding billing data.
#[derive(Error, Debug)]
pub enum BillingError {
    /// Service code outside its whitelist
    #[error("invalid {field} '{value}'")]
    InvalidCode { field: &'static str, value: String },

    /// Units billed for a kind of service the recipient has no code for
    #[error("recipient {recipient_id} has no {kind} service code")]
    MissingServiceCode { recipient_id: i64, kind: &'static str },

    #[error("invalid Medicaid ID '{0}': expected 12 digits")]
    InvalidMedicaidId(String),

    #[error("{field} is required")]
    InvalidName { field: &'static str },

    /// Billing entry whose date or units cannot be turned into a record
    #[error("malformed billing entry dated '{date}': {reason}")]
    MalformedEntry { date: String, reason: String },

    /// Billing entry pointing at a recipient that no longer exists
    #[error("billing entry references missing recipient {recipient_id}")]
    DanglingReference { recipient_id: i64 },

    #[error("{units} units do not fit the 4-column units field")]
    UnitsOutOfRange { units: u32 },

    /// A column value wider or narrower than its layout field
    #[error("{field} is {actual} characters wide, layout expects {expected}")]
    FieldWidth {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl BillingError {
    /// True for errors caused by the caller's input rather than the system
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BillingError::InvalidCode { .. }
                | BillingError::MissingServiceCode { .. }
                | BillingError::InvalidMedicaidId(_)
                | BillingError::InvalidName { .. }
                | BillingError::MalformedEntry { .. }
                | BillingError::UnitsOutOfRange { .. }
        )
    }
}
