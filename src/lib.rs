//! otp-admin - an admin console for TOTP multi-factor devices
//!
//! Built on Axum and Tokio. The crate lists TOTP devices, hides or shows
//! their secrets according to a setting, and serves provisioning views: an
//! HTML config page and an SVG QR code for authenticator apps.
//!
//! # Features
//!
//! - **Admin site**: model registry, url reversal and routing
//! - **Device admin**: changelist with search and filters, add/change forms,
//!   config page and QR code
//! - **Storage**: in-memory store, SeaORM store behind `database`
//! - **QR codes**: SVG rendering behind `qr` (default)
//! - **Testing**: Alba-style HTTP testing utilities
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use otp_admin::{AdminServer, ConfigBuilder};
//! use otp_admin::admin::totp::{self, TotpDeviceAdmin};
//! use otp_admin::device::InMemoryDeviceStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigBuilder::new().from_env().build()?;
//!     otp_admin::init_tracing_with_config(&config);
//!
//!     let server = AdminServer::new(config);
//!     let store = Arc::new(InMemoryDeviceStore::new());
//!     totp::register(server.site(), TotpDeviceAdmin::new(store)?);
//!
//!     server.serve().await?;
//!     Ok(())
//! }
//! ```

pub mod admin;
mod config;
mod core;
pub mod device;
mod error;
mod middleware;
pub mod qr;
pub mod templates;
pub mod testing;
pub mod utils;

pub use config::{AdminConfig, Config, ConfigBuilder, LoggingConfig, ServerConfig};
pub use crate::core::AdminServer;
pub use error::{AdminError, ErrorResponse, Result};
pub use middleware::MakeRequestUuid;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with sensible defaults.
///
/// # Environment Variables
///
/// - `RUST_LOG`: log filter (e.g. "info", "otp_admin=debug")
/// - `OTP_LOG_JSON`: set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = utils::get_env_with_prefix("LOG_JSON")
        .and_then(|v| utils::parse_bool_flag(&v))
        .unwrap_or(false);

    init_subscriber(env_filter, json_logs);
}

/// Initialize tracing from [`LoggingConfig`].
pub fn init_tracing_with_config(config: &Config) {
    init_subscriber(EnvFilter::new(&config.logging.level), config.logging.json);
}

fn init_subscriber(env_filter: EnvFilter, json: bool) {
    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }
}
