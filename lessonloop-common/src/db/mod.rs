//! Database access for LessonLoop
//!
//! Schema creation is idempotent; every service opens the same SQLite
//! database and may race on startup.

pub mod init;
pub mod settings;

pub use init::{create_schema, init_database};
pub use settings::Settings;
