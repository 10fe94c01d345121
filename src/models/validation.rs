use thiserror::Error;
use validator::{Validate, ValidateEmail, ValidationError};

use crate::models::notification::{BLANK_CODE, NotificationPayload, NotificationRequest};

pub const NULL_PAYLOAD_REASON: &str = "Deserialized message is null";

/// Struct field and wire name, in the order violations are reported.
const FIELDS: [(&str, &str); 5] = [
    ("recipient_email", "RecipientEmail"),
    ("recipient_name", "RecipientName"),
    ("template_id", "TemplateId"),
    ("subject", "Subject"),
    ("template_data", "TemplateData"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRule {
    Required,
    MaxLength(usize),
    EmailFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: &'static str,
    pub rule: ValidationRule,
}

impl Violation {
    fn new(field: &'static str, rule: ValidationRule) -> Self {
        Self { field, rule }
    }

    pub fn message(&self) -> String {
        match self.rule {
            ValidationRule::Required => format!("The {} field is required.", self.field),
            ValidationRule::MaxLength(max) => format!(
                "The field {} must be a string with a maximum length of {}.",
                self.field, max
            ),
            ValidationRule::EmailFormat => {
                format!("The {} field is not a valid e-mail address.", self.field)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    /// The payload could not be read as a notification at all.
    #[error("{reason}")]
    Decode { reason: String },

    #[error("{}", join_violations(.violations))]
    Invalid { violations: Vec<Violation> },
}

impl ValidationFailure {
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::message)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn is_valid_email(address: &str) -> bool {
    address.validate_email()
}

pub fn decode(raw: &[u8]) -> Result<NotificationPayload, ValidationFailure> {
    match serde_json::from_slice::<Option<NotificationPayload>>(raw) {
        Ok(Some(payload)) => Ok(payload),
        Ok(None) => Err(ValidationFailure::Decode {
            reason: NULL_PAYLOAD_REASON.to_string(),
        }),
        Err(e) => Err(ValidationFailure::Decode {
            reason: e.to_string(),
        }),
    }
}

/// Checks every rule and returns all violations in field order.
pub fn check_fields(payload: &NotificationPayload) -> Vec<Violation> {
    let errors = match payload.validate() {
        Ok(()) => return Vec::new(),
        Err(errors) => errors,
    };
    let field_errors = errors.field_errors();

    FIELDS
        .into_iter()
        .filter_map(|(key, field)| {
            field_errors
                .get(key)
                .map(|errors| field_violations(field, errors))
        })
        .flatten()
        .collect()
}

// A missing or blank value hides the length and format errors for that field.
fn field_violations(field: &'static str, errors: &[ValidationError]) -> Vec<Violation> {
    if errors
        .iter()
        .any(|e| e.code == "required" || e.code == BLANK_CODE)
    {
        return vec![Violation::new(field, ValidationRule::Required)];
    }

    let max_length = errors
        .iter()
        .find(|e| e.code == "length")
        .map(|e| ValidationRule::MaxLength(max_param(e)));
    let format = errors
        .iter()
        .any(|e| e.code == "email")
        .then_some(ValidationRule::EmailFormat);

    max_length
        .into_iter()
        .chain(format)
        .map(|rule| Violation::new(field, rule))
        .collect()
}

fn max_param(error: &ValidationError) -> usize {
    error
        .params
        .get("max")
        .and_then(|max| max.as_u64())
        .unwrap_or_default() as usize
}

pub fn validate(raw: &[u8]) -> Result<NotificationRequest, ValidationFailure> {
    let payload = decode(raw)?;

    let violations = check_fields(&payload);
    if !violations.is_empty() {
        return Err(ValidationFailure::Invalid { violations });
    }

    // All fields are present once no violation was found.
    Ok(NotificationRequest::new(
        payload.recipient_email.unwrap_or_default(),
        payload.recipient_name.unwrap_or_default(),
        payload.template_id.unwrap_or_default(),
        payload.subject.unwrap_or_default(),
        payload.template_data.unwrap_or_default(),
    ))
}
