//! Shared library for LessonLoop microservices
//!
//! Provides the error taxonomy, configuration resolution, database
//! initialization, and the lesson data model used by the confirmation
//! workflow service.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use error::{Error, Result};
