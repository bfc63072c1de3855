//! Lesson data model shared across LessonLoop services

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lesson lifecycle status, owned by the booking flow.
///
/// The confirmation workflow only ever moves `Booked` lessons; a decline
/// sets `Cancelled` alongside the confirmation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    Booked,
    Cancelled,
    Completed,
}

impl LessonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LessonStatus::Booked => "booked",
            LessonStatus::Cancelled => "cancelled",
            LessonStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "booked" => Some(LessonStatus::Booked),
            "cancelled" => Some(LessonStatus::Cancelled),
            "completed" => Some(LessonStatus::Completed),
            _ => None,
        }
    }
}

/// Confirmation workflow state.
///
/// `Pending` is the only non-terminal state; every transition out of it is
/// enforced as an atomic conditional update in the lesson store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    Pending,
    Acknowledged,
    Declined,
    AutoAcknowledged,
}

impl ConfirmationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationStatus::Pending => "pending",
            ConfirmationStatus::Acknowledged => "acknowledged",
            ConfirmationStatus::Declined => "declined",
            ConfirmationStatus::AutoAcknowledged => "auto_acknowledged",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ConfirmationStatus::Pending),
            "acknowledged" => Some(ConfirmationStatus::Acknowledged),
            "declined" => Some(ConfirmationStatus::Declined),
            "auto_acknowledged" => Some(ConfirmationStatus::AutoAcknowledged),
            _ => None,
        }
    }
}

/// A booked lesson under confirmation
///
/// Created externally when a booking is paid for; mutated only by the
/// confirmation service and the auto-escalation sweep, never deleted here.
#[derive(Debug, Clone, Serialize)]
pub struct Lesson {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub teacher_name: String,
    pub learner_id: Uuid,
    pub learner_name: String,
    /// Account credited when the teacher declines
    pub payer_id: Uuid,
    pub subject: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: LessonStatus,
    pub confirmation_status: ConfirmationStatus,
    /// When the acknowledgment clock started (set at booking time)
    pub confirmation_requested_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
    pub teacher_message: Option<String>,
    pub decline_reason: Option<String>,
    pub suggested_times: Option<Vec<DateTime<Utc>>>,
    /// True when the sweep resolved the lesson rather than the teacher
    pub auto_acknowledged: bool,
}

/// A compensation intent recorded when a lesson is declined
///
/// One row per declined lesson. `settled = false` rows are the
/// reconciliation queue for refunds whose ledger call failed.
#[derive(Debug, Clone, Serialize)]
pub struct RefundIntent {
    pub lesson_id: Uuid,
    pub payer_id: Uuid,
    pub credits: i64,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub settled: bool,
    pub new_balance: Option<i64>,
    pub last_error: Option<String>,
}
