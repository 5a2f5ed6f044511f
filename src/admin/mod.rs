//! Admin site and the TOTP device admin.
//!
//! # Architecture
//!
//! - [`AdminSite`] holds the settings and a registry of [`ModelAdmin`]s and
//!   builds the router
//! - [`totp::TotpDeviceAdmin`] is the model admin for TOTP devices
//! - [`Principal`] is the authenticated staff member, inserted into request
//!   extensions by the host's authentication middleware
//! - [`PermissionChecker`] decides view, change and add access
//!
//! # Example
//!
//! ```rust,ignore
//! use otp_admin::admin::{AdminSite, totp::{self, TotpDeviceAdmin}};
//! use otp_admin::device::InMemoryDeviceStore;
//!
//! let site = Arc::new(AdminSite::new(config.admin.clone()));
//! totp::register(&site, TotpDeviceAdmin::new(Arc::new(InMemoryDeviceStore::new()))?);
//!
//! let app = site.router().layer(axum::middleware::from_fn(authenticate));
//! ```

mod model_admin;
pub mod options;
mod permissions;
mod site;
pub mod totp;

pub use model_admin::{ModelAdmin, ModelKey, UrlPattern};
pub use options::{Fieldset, SearchFields};
pub use permissions::{ModelPermissions, PermissionChecker, Principal};
pub use site::{AdminSite, RegisteredModel, SiteContext};
