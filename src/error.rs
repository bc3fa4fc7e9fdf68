use thiserror::Error;

#[derive(Error, Debug)]
pub enum FwError {
    /// The firewall policy service could not be created or reached.
    #[error("{0}")]
    Connection(String),

    /// A collection or field retrieval failed at the service level.
    #[error("Rule lookup failed: {0}")]
    Lookup(String),

    #[allow(dead_code)]
    #[error("Failed to write {field} on rule '{rule}': {reason}")]
    Write {
        rule: String,
        field: &'static str,
        reason: String,
    },

    #[allow(dead_code)]
    #[error("Elevation request was declined: {0}")]
    ElevationDeclined(String),

    #[error("Elevation failed: {0}")]
    Elevation(String),

    #[error("Invalid {kind} '{value}'")]
    InvalidValue { kind: &'static str, value: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FwError>;
