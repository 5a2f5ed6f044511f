use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use super::query::{DeviceQuery, PaginatedResult};
use super::storage::DeviceStore;
use super::types::{DeviceUser, NewDevice, TotpDevice};
use crate::error::{AdminError, Result};

/// In-memory device store
///
/// Keeps users and devices in maps. Suitable for development and testing;
/// nothing survives a restart.
#[derive(Clone, Default)]
pub struct InMemoryDeviceStore {
    users: Arc<RwLock<HashMap<i64, DeviceUser>>>,
    devices: Arc<RwLock<BTreeMap<i64, TotpDevice>>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user that devices can be attached to.
    pub async fn add_user(&self, user: DeviceUser) {
        self.users.write().await.insert(user.id, user);
    }

    /// Insert a fully formed device, keeping its id.
    pub async fn insert(&self, device: TotpDevice) {
        self.next_id.fetch_max(device.id, Ordering::SeqCst);
        self.users
            .write()
            .await
            .insert(device.user.id, device.user.clone());
        self.devices.write().await.insert(device.id, device);
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }
}

#[async_trait]
impl DeviceStore for InMemoryDeviceStore {
    async fn get(&self, pk: i64) -> Result<Option<TotpDevice>> {
        Ok(self.devices.read().await.get(&pk).cloned())
    }

    async fn list(&self, query: &DeviceQuery) -> Result<PaginatedResult<TotpDevice>> {
        let now = Utc::now();
        let devices = self.devices.read().await;

        let mut matched: Vec<&TotpDevice> =
            devices.values().filter(|d| query.matches(d, now)).collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.per_page as usize)
            .cloned()
            .collect();

        Ok(PaginatedResult::new(items, total, query.page, query.per_page))
    }

    async fn create(&self, device: NewDevice) -> Result<TotpDevice> {
        let user = self
            .users
            .read()
            .await
            .get(&device.user_id)
            .cloned()
            .ok_or_else(|| AdminError::field("user", "Select a valid user"))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = TotpDevice {
            id,
            user,
            name: device.name,
            created_at: Some(Utc::now()),
            last_used_at: None,
            confirmed: device.confirmed,
            key: device.key,
            step: device.step,
            t0: device.t0,
            digits: device.digits,
            tolerance: device.tolerance,
            drift: device.drift,
            throttling_failure_timestamp: device.throttling_failure_timestamp,
            throttling_failure_count: device.throttling_failure_count,
        };

        self.devices.write().await.insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, device: &TotpDevice) -> Result<()> {
        let mut devices = self.devices.write().await;
        let existing = devices
            .get_mut(&device.id)
            .ok_or_else(|| AdminError::not_found(format!("TOTP device {}", device.id)))?;

        existing.name = device.name.clone();
        existing.confirmed = device.confirmed;
        existing.key = device.key.clone();
        existing.step = device.step;
        existing.t0 = device.t0;
        existing.digits = device.digits;
        existing.tolerance = device.tolerance;
        existing.drift = device.drift;
        existing.throttling_failure_timestamp = device.throttling_failure_timestamp;
        existing.throttling_failure_count = device.throttling_failure_count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> DeviceUser {
        DeviceUser {
            id: 1,
            username: "alice".into(),
            email: "alice@example.com".into(),
        }
    }

    #[tokio::test]
    async fn test_create_joins_user() {
        let store = InMemoryDeviceStore::new();
        store.add_user(alice()).await;

        let device = store.create(NewDevice::new(1, "phone")).await.unwrap();
        assert_eq!(device.id, 1);
        assert_eq!(device.user.username, "alice");
        assert!(device.created_at.is_some());

        let fetched = store.get(device.id).await.unwrap().unwrap();
        assert_eq!(fetched, device);
    }

    #[tokio::test]
    async fn test_create_unknown_user() {
        let store = InMemoryDeviceStore::new();
        let result = store.create(NewDevice::new(99, "phone")).await;
        assert!(matches!(result, Err(AdminError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_paginates_newest_first() {
        let store = InMemoryDeviceStore::new();
        store.add_user(alice()).await;
        for i in 0..5 {
            store
                .create(NewDevice::new(1, format!("device {}", i)))
                .await
                .unwrap();
        }

        let query = DeviceQuery {
            per_page: 2,
            page: 1,
            ..Default::default()
        };
        let page = store.list(&query).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].name, "device 4");
    }

    #[tokio::test]
    async fn test_update_keeps_read_only_fields() {
        let store = InMemoryDeviceStore::new();
        store.add_user(alice()).await;
        let mut device = store.create(NewDevice::new(1, "phone")).await.unwrap();
        let created_at = device.created_at;

        device.name = "tablet".into();
        device.created_at = None;
        store.update(&device).await.unwrap();

        let fetched = store.get(device.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "tablet");
        assert_eq!(fetched.created_at, created_at);
    }
}
