//! # Fault Normalizer Library
//!
//! Turns every failure raised while serving an HTTP request into one JSON
//! error record, with demo controllers that exercise each failure class.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod server;
pub mod telemetry;
pub mod validation;
