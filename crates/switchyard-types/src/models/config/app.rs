//! Application-level configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::coordination::{ActivityConfig, ElectionConfig};
use super::routing::RoutingConfig;

/// Full application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct AppConfig {
    /// Leader election timing
    #[serde(default)]
    #[validate(nested)]
    pub election: ElectionConfig,
    /// User activity gating
    #[serde(default)]
    #[validate(nested)]
    pub activity: ActivityConfig,
    /// Account routing, cooldown, and retry tuning
    #[serde(default)]
    #[validate(nested)]
    pub routing: RoutingConfig,
}

impl AppConfig {
    /// Create default configuration.
    pub fn new() -> Self {
        Self::default()
    }
}
