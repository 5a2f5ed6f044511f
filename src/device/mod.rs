//! TOTP device records and their storage.
//!
//! The admin reads devices through the [`DeviceStore`] trait. Two stores are
//! provided:
//!
//! - [`InMemoryDeviceStore`] for development and tests
//! - `SeaOrmDeviceStore` (feature `database`) for SQL databases
//!
//! # Example
//!
//! ```rust,ignore
//! use otp_admin::device::{DeviceUser, InMemoryDeviceStore, NewDevice, DeviceStore};
//!
//! let store = InMemoryDeviceStore::new();
//! store.add_user(DeviceUser { id: 1, username: "alice".into(), email: "alice@example.com".into() }).await;
//!
//! let device = store.create(NewDevice::new(1, "Alice's phone")).await?;
//! println!("{}", device.config_url(&Default::default())?);
//! ```

mod in_memory;
mod query;
#[cfg(feature = "database")]
mod sea_orm_store;
mod storage;
mod types;

pub use in_memory::InMemoryDeviceStore;
pub use query::{DateFilter, DeviceQuery, PaginatedResult};
#[cfg(feature = "database")]
pub use sea_orm_store::SeaOrmDeviceStore;
pub use storage::DeviceStore;
pub use types::{
    DEFAULT_KEY_BYTES, DIGIT_CHOICES, DeviceUser, MAX_KEY_BYTES, MAX_NAME_LEN, NewDevice,
    ProvisioningOptions, TotpDevice, random_hex_key, validate_key,
};
