//! Typed error definitions for Switchyard.
//!
//! All errors are serializable (surfaced to UI layers as JSON), displayable
//! for logging, and matchable for the router's decision logic.

mod account;
mod config;
mod router;

pub use account::AccountError;
pub use config::ConfigError;
pub use router::{format_wait, CorrectiveAction, RouterError};
