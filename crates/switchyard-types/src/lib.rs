//! # Switchyard Types
//!
//! Shared records, models, and error definitions for Switchyard.
//!
//! - **`error`** - Typed errors for credential resolution, routing, and configuration
//! - **`models`** - Shared-store records (leader, activity), accounts, credentials,
//!   quota cooldown snapshots, and configuration
//!
//! ## Architecture Role
//!
//! `switchyard-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!   switchyard-types (this crate)
//!            │
//!            ▼
//!   switchyard-core (election, activity gating, account routing)
//! ```
//!
//! Everything that crosses a process boundary through the shared store is
//! defined here and is serde-serializable.

pub mod error;
pub mod models;

pub use error::{AccountError, ConfigError, RouterError};

pub use models::{
    Account, AccountStatus, ActivityConfig, ActivityKind, ActivityRecord, AppConfig, Credential,
    ElectionConfig, LeaderRecord, LeadershipRole, LeadershipStatus, OAuthClient, QuotaCooldown,
    RefreshedToken, RoutingConfig,
};
