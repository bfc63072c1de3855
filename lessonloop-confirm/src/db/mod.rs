//! Lesson store queries for the confirmation workflow
//!
//! Every transition out of `pending` is a single conditional UPDATE so that
//! a racing teacher action and escalation sweep can never both win.

pub mod lessons;
pub mod refunds;
