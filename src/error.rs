use std::collections::HashMap;

use thiserror::Error;

use crate::models::validation::ValidationFailure;

pub const DEAD_LETTER_ERROR_KEY: &str = "Error";
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Every way a message can end up in the dead-letter queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("{0}")]
    Decode(String),

    #[error("{0}")]
    Validation(String),

    #[error("{reason}")]
    Delivery { attempts: u32, reason: String },
}

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Decode(_) => "decode",
            DispatchError::Validation(_) => "validation",
            DispatchError::Delivery { .. } => "delivery",
        }
    }

    /// Never empty, so every dead-letter carries a readable diagnostic.
    pub fn reason(&self) -> String {
        let reason = self.to_string();
        if reason.trim().is_empty() {
            UNKNOWN_ERROR.to_string()
        } else {
            reason
        }
    }

    pub fn dead_letter_properties(&self) -> HashMap<String, String> {
        HashMap::from([(DEAD_LETTER_ERROR_KEY.to_string(), self.reason())])
    }
}

impl From<ValidationFailure> for DispatchError {
    fn from(failure: ValidationFailure) -> Self {
        match failure {
            ValidationFailure::Decode { reason } => DispatchError::Decode(reason),
            invalid @ ValidationFailure::Invalid { .. } => {
                DispatchError::Validation(invalid.reason())
            }
        }
    }
}
