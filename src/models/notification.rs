use std::collections::HashMap;

use serde::Deserialize;
use validator::{Validate, ValidationError};

/// Error code for a string that is present but holds only whitespace.
pub const BLANK_CODE: &str = "blank";

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(BLANK_CODE));
    }
    Ok(())
}

/// Wire shape of a notification request as it sits on the queue.
///
/// Every field is optional here so that a missing or `null` field is reported
/// as a field violation by the validator instead of failing the decode.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct NotificationPayload {
    #[serde(default)]
    #[validate(required, custom(function = "not_blank"), length(max = 256), email)]
    pub recipient_email: Option<String>,
    #[serde(default)]
    #[validate(required, custom(function = "not_blank"), length(max = 200))]
    pub recipient_name: Option<String>,
    #[serde(default)]
    #[validate(required, custom(function = "not_blank"), length(max = 100))]
    pub template_id: Option<String>,
    #[serde(default)]
    #[validate(required, custom(function = "not_blank"), length(max = 200))]
    pub subject: Option<String>,
    #[serde(default)]
    #[validate(required)]
    pub template_data: Option<HashMap<String, String>>,
}

/// A notification that passed validation. Only the validator builds these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    recipient_email: String,
    recipient_name: String,
    template_id: String,
    subject: String,
    template_data: HashMap<String, String>,
}

impl NotificationRequest {
    pub(crate) fn new(
        recipient_email: String,
        recipient_name: String,
        template_id: String,
        subject: String,
        template_data: HashMap<String, String>,
    ) -> Self {
        Self {
            recipient_email,
            recipient_name,
            template_id,
            subject,
            template_data,
        }
    }

    pub fn recipient_email(&self) -> &str {
        &self.recipient_email
    }

    pub fn recipient_name(&self) -> &str {
        &self.recipient_name
    }

    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn template_data(&self) -> &HashMap<String, String> {
        &self.template_data
    }
}
