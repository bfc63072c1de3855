//! HTTP API handlers for lessonloop-confirm

pub mod handlers;
