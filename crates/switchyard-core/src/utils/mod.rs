//! Utility modules.

pub mod cancel;
pub mod http;
