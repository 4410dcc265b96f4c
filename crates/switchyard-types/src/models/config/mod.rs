//! Application configuration models.

mod app;
mod coordination;
mod routing;

pub use app::AppConfig;
pub use coordination::{ActivityConfig, ElectionConfig};
pub use routing::{OAuthClient, RoutingConfig};
