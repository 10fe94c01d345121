use std::fmt::{Display, Formatter, Result};

/// Terminal decision for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Acknowledged,
    DeadLettered { reason: String },
}

impl DeliveryOutcome {
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, DeliveryOutcome::Acknowledged)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            DeliveryOutcome::Acknowledged => None,
            DeliveryOutcome::DeadLettered { reason } => Some(reason),
        }
    }
}

impl Display for DeliveryOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            DeliveryOutcome::Acknowledged => write!(f, "acknowledged"),
            DeliveryOutcome::DeadLettered { .. } => write!(f, "dead_lettered"),
        }
    }
}
