//! SQLite-backed stores for tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use otp_admin::testing::{TestDb, fixtures};
//!
//! #[tokio::test]
//! async fn test_with_database() {
//!     let db = TestDb::new().await.expect("Failed to create test database");
//!     db.add_user(&fixtures::user(1, "alice")).await.unwrap();
//!
//!     let admin = TotpDeviceAdmin::new(db.store())?;
//! }
//! ```

use sea_orm::{ConnectionTrait, Database, DatabaseConnection};
use std::sync::Arc;

use crate::device::{DeviceUser, SeaOrmDeviceStore};
use crate::error::Result;

/// An in-memory SQLite database with the device tables created.
pub struct TestDb {
    store: SeaOrmDeviceStore,
}

impl TestDb {
    pub async fn new() -> Result<Self> {
        let connection = Database::connect("sqlite::memory:").await?;
        connection
            .execute_unprepared("PRAGMA foreign_keys = ON;")
            .await?;

        let store = SeaOrmDeviceStore::new(connection);
        store.create_tables().await?;
        Ok(Self { store })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        self.store.connection()
    }

    pub fn store(&self) -> Arc<SeaOrmDeviceStore> {
        Arc::new(self.store.clone())
    }

    pub async fn add_user(&self, user: &DeviceUser) -> Result<()> {
        self.store.insert_user(user).await
    }
}
