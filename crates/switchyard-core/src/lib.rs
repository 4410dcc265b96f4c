//! # Switchyard Core
//!
//! Coordination and routing for several cooperating instances of one
//! deployment.
//!
//! ```text
//! switchyard-core/src/
//! ├── coordination/   # leader election, activity tracking, periodic batch
//! ├── routing/        # account selection, quota cooldowns, failover router
//! ├── modules/        # store, credentials, accounts, settings, OAuth, config, logger
//! ├── telemetry.rs    # metrics counters and leadership gauge
//! └── utils/          # cancellable sleeps, HTTP client
//! ```

#![allow(
    clippy::significant_drop_tightening,
    reason = "Lock guards in async code require careful lifetime management"
)]
#![allow(clippy::map_err_ignore, reason = "Error context is provided in the replacement message")]
#![allow(clippy::needless_continue, reason = "Explicit continue improves loop readability")]
// Test-only lints: allow panic!, println!, etc. in test code
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::float_cmp,
        clippy::assertions_on_result_states
    )
)]

pub mod coordination;
pub mod error;
pub mod modules;
pub mod routing;
pub mod telemetry;
pub mod utils;

// Re-export commonly used types
pub use coordination::{ActivityTracker, Coordinator, LeaderElector, PeriodicTask};
pub use error::{AppError, AppResult};
pub use routing::{QuotaStateManager, RequestRouter, RouterDeps};
pub use switchyard_types::{Account, AppConfig, RouterError};
