//! Core domain models for Switchyard.
//!
//! Records stored in the shared key-value store, account and credential
//! models owned by external collaborators, and configuration.

mod account;
mod activity;
mod config;
mod election;
mod quota;
mod token;

pub use account::{Account, AccountStatus};
pub use activity::{ActivityKind, ActivityRecord};
pub use config::{ActivityConfig, AppConfig, ElectionConfig, OAuthClient, RoutingConfig};
pub use election::{LeaderRecord, LeadershipRole, LeadershipStatus};
pub use quota::QuotaCooldown;
pub use token::{Credential, RefreshedToken};
