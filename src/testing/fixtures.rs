//! Fixtures for devices, owners and principals.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::admin::Principal;
use crate::device::{DeviceUser, InMemoryDeviceStore, TotpDevice};

/// RFC 6238 test secret, `12345678901234567890`.
pub const RFC_KEY: &str = "3132333435363738393031323334353637383930";

/// Fake identifiers.
pub mod fake {
    use super::*;

    pub fn username() -> String {
        format!("user_{}", &Uuid::new_v4().simple().to_string()[..8])
    }

    pub fn email() -> String {
        format!("test-{}@example.com", Uuid::new_v4().simple())
    }
}

/// Owner with a predictable username and email.
pub fn user(id: i64, username: &str) -> DeviceUser {
    DeviceUser {
        id,
        username: username.to_string(),
        email: format!("{}@example.com", username),
    }
}

/// Owner with a unique random username and email.
pub fn random_user(id: i64) -> DeviceUser {
    DeviceUser {
        id,
        username: fake::username(),
        email: fake::email(),
    }
}

/// Confirmed device `id` owned by `alice`, keyed with [`RFC_KEY`].
pub fn device(id: i64) -> TotpDevice {
    device_builder(id).build()
}

pub fn device_builder(id: i64) -> DeviceBuilder {
    DeviceBuilder::new(id)
}

/// Builder for [`TotpDevice`] fixtures.
pub struct DeviceBuilder {
    device: TotpDevice,
}

impl DeviceBuilder {
    fn new(id: i64) -> Self {
        Self {
            device: TotpDevice {
                id,
                user: user(1, "alice"),
                name: format!("device {}", id),
                created_at: Some(Utc::now() - Duration::days(30)),
                last_used_at: None,
                confirmed: true,
                key: RFC_KEY.to_string(),
                step: 30,
                t0: 0,
                digits: 6,
                tolerance: 1,
                drift: 0,
                throttling_failure_timestamp: None,
                throttling_failure_count: 0,
            },
        }
    }

    pub fn user(mut self, user: DeviceUser) -> Self {
        self.device.user = user;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.device.name = name.into();
        self
    }

    pub fn confirmed(mut self, confirmed: bool) -> Self {
        self.device.confirmed = confirmed;
        self
    }

    pub fn used_days_ago(mut self, days: i64) -> Self {
        self.device.last_used_at = Some(Utc::now() - Duration::days(days));
        self
    }

    pub fn created_days_ago(mut self, days: i64) -> Self {
        self.device.created_at = Some(Utc::now() - Duration::days(days));
        self
    }

    pub fn build(self) -> TotpDevice {
        self.device
    }
}

pub fn superuser() -> Principal {
    Principal::superuser(100, "root")
}

/// Staff member holding only `otp_totp.view_totpdevice`.
pub fn viewer() -> Principal {
    Principal::staff(101, "viewer").with_permission("otp_totp.view_totpdevice")
}

/// Staff member holding only `otp_totp.change_totpdevice`.
pub fn editor() -> Principal {
    Principal::staff(102, "editor").with_permission("otp_totp.change_totpdevice")
}

/// Staff member without device permissions.
pub fn staff() -> Principal {
    Principal::staff(103, "staff")
}

/// A store with users `alice` (1) and `bob` (2) and one device each.
///
/// Device 1 belongs to alice and device 2, unconfirmed, to bob.
pub async fn seeded_store() -> InMemoryDeviceStore {
    let store = InMemoryDeviceStore::new();
    let alice = user(1, "alice");
    let bob = user(2, "bob");
    store.add_user(alice.clone()).await;
    store.add_user(bob.clone()).await;

    store
        .insert(device_builder(1).user(alice).name("alice phone").build())
        .await;
    store
        .insert(
            device_builder(2)
                .user(bob)
                .name("bob tablet")
                .confirmed(false)
                .created_days_ago(1)
                .build(),
        )
        .await;
    store
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_users_are_unique() {
        let (a, b) = (random_user(7), random_user(8));
        assert_ne!(a.username, b.username);
        assert_ne!(a.email, b.email);
        assert!(a.email.ends_with("@example.com"));
    }

    #[test]
    fn test_device_fixture_is_valid() {
        let device = device(4);
        device.validate().unwrap();
        assert_eq!(device.id, 4);
        assert_eq!(device.user.username, "alice");
    }

    #[tokio::test]
    async fn test_seeded_store() {
        let store = seeded_store().await;
        assert_eq!(store.len().await, 2);
    }
}
