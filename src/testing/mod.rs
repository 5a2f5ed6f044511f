//! Testing utilities for the admin.
//!
//! - Alba-style HTTP scenarios that run requests through a router without a
//!   server, authenticated with [`Scenario::as_principal`]
//! - Device, owner and principal [`fixtures`]
//! - [`TestDb`], an in-memory SQLite store (feature `database`)
//!
//! # Example
//!
//! ```rust,ignore
//! use otp_admin::testing::{self, fixtures};
//!
//! #[tokio::test]
//! async fn test_config_page_hidden() {
//!     let app = admin_router(true).await;
//!
//!     testing::get(app, "/admin/otp_totp/totpdevice/1/config/")
//!         .as_principal(fixtures::superuser())
//!         .execute()
//!         .await
//!         .assert_forbidden();
//! }
//! ```

#[cfg(feature = "database")]
mod database;
pub mod fixtures;
mod scenario;

#[cfg(feature = "database")]
pub use database::TestDb;
pub use scenario::{Scenario, ScenarioAssert, get, post};
