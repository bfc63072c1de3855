//! Confirmation workflow services

pub mod confirmation;
pub mod credits;
pub mod escalation;
pub mod notifier;

pub use confirmation::{ConfirmationService, RefundStatus, SweepOutcome};
