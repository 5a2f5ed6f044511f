//! Device storage trait.
//!
//! The admin never talks to a database directly. Applications implement
//! [`DeviceStore`] for their persistence layer, or use one of the provided
//! stores.

use async_trait::async_trait;

use super::query::{DeviceQuery, PaginatedResult};
use super::types::{NewDevice, TotpDevice};
use crate::error::Result;

/// Trait for TOTP device storage.
///
/// Every method that returns a device returns it with its owning user joined
/// in, so list pages never issue one user lookup per row.
///
/// # Example
///
/// ```rust,ignore
/// use otp_admin::device::{DeviceStore, DeviceQuery, NewDevice, PaginatedResult, TotpDevice};
/// use async_trait::async_trait;
///
/// struct MyDeviceStore { db: DatabaseConnection }
///
/// #[async_trait]
/// impl DeviceStore for MyDeviceStore {
///     async fn get(&self, pk: i64) -> Result<Option<TotpDevice>> {
///         // SELECT ... FROM otp_totp_totpdevice JOIN users ... WHERE id = $1
///     }
///
///     // ... implement other methods
/// }
/// ```
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Look up a device by primary key.
    async fn get(&self, pk: i64) -> Result<Option<TotpDevice>>;

    /// List devices matching the query, newest first.
    async fn list(&self, query: &DeviceQuery) -> Result<PaginatedResult<TotpDevice>>;

    /// Create a device. The store assigns the id and `created_at`.
    async fn create(&self, device: NewDevice) -> Result<TotpDevice>;

    /// Persist the editable fields of an existing device.
    ///
    /// `created_at`, `last_used_at` and the owner are not written.
    async fn update(&self, device: &TotpDevice) -> Result<()>;
}
