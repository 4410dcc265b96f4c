//! Collaborator seams, persistence, and process-wide setup.

pub mod accounts;
pub mod config;
pub mod credentials;
pub mod logger;
pub mod oauth;
pub mod settings;
pub mod store;
