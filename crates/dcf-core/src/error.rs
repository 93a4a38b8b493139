use thiserror::Error;

#[derive(Debug, Error)]
pub enum DcfError {
    #[error("Invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("Cancelled: simulation stopped after {completed} of {requested} samples")]
    Cancelled { completed: u32, requested: u32 },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DcfError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        DcfError::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Field name for `InvalidParameter`, `None` for the other variants.
    pub fn field(&self) -> Option<&str> {
        match self {
            DcfError::InvalidParameter { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DcfError {
    fn from(e: serde_json::Error) -> Self {
        DcfError::Serialization(e.to_string())
    }
}
