//! Workflow tunables stored in the settings table
//!
//! Defaults are seeded on first run; operators change values with plain SQL
//! and services pick them up on restart.

use crate::Result;
use sqlx::{Row, SqlitePool};

/// Hours a lesson may sit pending before the sweep auto-acknowledges it
pub const DEFAULT_ACKNOWLEDGMENT_TIMEOUT_HOURS: i64 = 24;

/// Minutes between internal escalation sweeps
pub const DEFAULT_SWEEP_INTERVAL_MINUTES: i64 = 60;

/// Credits returned to the payer when a lesson is declined
///
/// Kept configurable rather than hardcoded: one credit is the canonical
/// cost of a single booking today, but hourly-priced bookings may change
/// what a decline owes back.
pub const DEFAULT_REFUND_CREDITS: i64 = 1;

/// Hours before the scheduled start that the virtual room opens
pub const DEFAULT_ROOM_OPEN_LEAD_HOURS: i64 = 1;

/// Confirmation workflow settings loaded at service startup
#[derive(Debug, Clone)]
pub struct Settings {
    pub acknowledgment_timeout_hours: i64,
    pub sweep_interval_minutes: i64,
    pub refund_credits: i64,
    pub room_open_lead_hours: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            acknowledgment_timeout_hours: DEFAULT_ACKNOWLEDGMENT_TIMEOUT_HOURS,
            sweep_interval_minutes: DEFAULT_SWEEP_INTERVAL_MINUTES,
            refund_credits: DEFAULT_REFUND_CREDITS,
            room_open_lead_hours: DEFAULT_ROOM_OPEN_LEAD_HOURS,
        }
    }
}

impl Settings {
    /// Load settings from the database, falling back to defaults for any
    /// missing or unparseable value
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        Ok(Settings {
            acknowledgment_timeout_hours: get_i64(
                pool,
                "acknowledgment_timeout_hours",
                DEFAULT_ACKNOWLEDGMENT_TIMEOUT_HOURS,
            )
            .await?,
            sweep_interval_minutes: get_i64(
                pool,
                "sweep_interval_minutes",
                DEFAULT_SWEEP_INTERVAL_MINUTES,
            )
            .await?,
            refund_credits: get_i64(pool, "refund_credits", DEFAULT_REFUND_CREDITS).await?,
            room_open_lead_hours: get_i64(
                pool,
                "room_open_lead_hours",
                DEFAULT_ROOM_OPEN_LEAD_HOURS,
            )
            .await?,
        })
    }
}

/// Seed default settings (INSERT OR IGNORE, safe to call on every startup)
pub async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    let defaults = [
        (
            "acknowledgment_timeout_hours",
            DEFAULT_ACKNOWLEDGMENT_TIMEOUT_HOURS,
        ),
        ("sweep_interval_minutes", DEFAULT_SWEEP_INTERVAL_MINUTES),
        ("refund_credits", DEFAULT_REFUND_CREDITS),
        ("room_open_lead_hours", DEFAULT_ROOM_OPEN_LEAD_HOURS),
    ];

    for (key, value) in defaults {
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value.to_string())
            .execute(pool)
            .await?;
    }

    Ok(())
}

/// Read an integer setting, returning `default` when absent or malformed
async fn get_i64(pool: &SqlitePool, key: &str, default: i64) -> Result<i64> {
    let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(row
        .and_then(|r| r.get::<String, _>("value").parse::<i64>().ok())
        .unwrap_or(default))
}
