pub mod health;
pub mod message;
pub mod notification;
pub mod outcome;
pub mod retry;
pub mod validation;
