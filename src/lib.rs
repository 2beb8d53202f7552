#![forbid(unsafe_code)]

//! Presence and attendance lifecycle engine for supervised facilities.
//!
//! Tracks room sessions ([`models::active_group::ActiveGroup`]), student
//! visits, staff supervision, combined groups and scheduled checkouts,
//! and serves them over HTTP.

pub mod api;
pub mod config;
pub mod engine;
pub mod errors;
pub mod models;
pub mod persistence;

pub use config::GlobalConfig;
pub use errors::{AppError, ErrorKind, Result};
