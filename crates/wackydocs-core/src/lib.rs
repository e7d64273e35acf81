//! WackyDocs Core Library
//!
//! This crate provides shared types, errors, and configuration for the
//! WackyDocs offline worker host.

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{WackyError, WackyResult};
