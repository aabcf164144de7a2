//! Shared types for Tonesmith services
//!
//! Provides the common error type, configuration loading, and the
//! per-foundry event channel used for live UI streaming.

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
