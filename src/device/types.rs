//! TOTP device records and provisioning helpers.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use totp_rs::Secret;

use crate::error::{AdminError, Result};

/// Number of random bytes in a generated device key.
pub const DEFAULT_KEY_BYTES: usize = 20;
/// Longest accepted key, in bytes.
pub const MAX_KEY_BYTES: usize = 40;
/// Longest accepted device name.
pub const MAX_NAME_LEN: usize = 64;
/// Code lengths a device may be configured with.
pub const DIGIT_CHOICES: [u8; 2] = [6, 8];

/// The user that owns a device.
///
/// Stores always return devices with their owner joined in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl DeviceUser {
    /// Value of a user model field by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "username" => Some(&self.username),
            "email" => Some(&self.email),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeviceUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.username)
    }
}

/// A TOTP device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotpDevice {
    pub id: i64,
    pub user: DeviceUser,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub confirmed: bool,
    /// Hex-encoded shared secret.
    pub key: String,
    /// Time step in seconds.
    pub step: u32,
    /// Unix time at which counting starts.
    pub t0: i64,
    pub digits: u8,
    /// Number of steps in either direction a code is accepted for.
    pub tolerance: u8,
    /// Current clock drift, in steps.
    pub drift: i32,
    pub throttling_failure_timestamp: Option<DateTime<Utc>>,
    pub throttling_failure_count: u32,
}

/// Fields required to create a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDevice {
    pub user_id: i64,
    pub name: String,
    pub confirmed: bool,
    pub key: String,
    pub step: u32,
    pub t0: i64,
    pub digits: u8,
    pub tolerance: u8,
    pub drift: i32,
    pub throttling_failure_timestamp: Option<DateTime<Utc>>,
    pub throttling_failure_count: u32,
}

impl NewDevice {
    /// A device for `user_id` with a fresh key and default settings.
    pub fn new(user_id: i64, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            confirmed: true,
            key: random_hex_key(DEFAULT_KEY_BYTES),
            step: 30,
            t0: 0,
            digits: 6,
            tolerance: 1,
            drift: 0,
            throttling_failure_timestamp: None,
            throttling_failure_count: 0,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn confirmed(mut self, confirmed: bool) -> Self {
        self.confirmed = confirmed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.name, &self.key, self.step, self.digits)
    }
}

/// Options that shape the provisioning URI.
#[derive(Debug, Clone, Default)]
pub struct ProvisioningOptions {
    pub issuer: Option<String>,
    pub image: Option<String>,
}

impl TotpDevice {
    /// The decoded shared secret.
    pub fn bin_key(&self) -> Result<Vec<u8>> {
        hex::decode(&self.key).map_err(|e| AdminError::internal(format!("Invalid device key: {}", e)))
    }

    /// Base32 form of the key, as typed into an authenticator by hand.
    pub fn base32_key(&self) -> Result<String> {
        Ok(Secret::Raw(self.bin_key()?).to_encoded().to_string())
    }

    /// The `otpauth://` URI used to provision this device.
    ///
    /// The label is the owner's username, prefixed with `issuer:` when an
    /// issuer is configured.
    pub fn config_url(&self, options: &ProvisioningOptions) -> Result<String> {
        let mut label = self.user.username.clone();
        let mut params = format!(
            "secret={}&algorithm=SHA1&digits={}&period={}",
            self.base32_key()?,
            self.digits,
            self.step
        );

        if let Some(issuer) = options.issuer.as_deref().filter(|i| !i.is_empty()) {
            let issuer = issuer.replace(':', "");
            label = format!("{}:{}", issuer, label);
            params.push_str("&issuer=");
            params.push_str(&urlencoding::encode(&issuer));
        }

        if let Some(image) = options.image.as_deref().filter(|i| !i.is_empty()) {
            params.push_str("&image=");
            params.push_str(&urlencoding::encode(image));
        }

        Ok(format!(
            "otpauth://totp/{}?{}",
            urlencoding::encode(&label),
            params
        ))
    }

    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.name, &self.key, self.step, self.digits)
    }
}

impl std::fmt::Display for TotpDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.user)
    }
}

/// Generate a random key of `len` bytes, hex-encoded.
pub fn random_hex_key(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Check that `key` is hex and decodes to between 1 and [`MAX_KEY_BYTES`] bytes.
pub fn validate_key(key: &str) -> std::result::Result<(), String> {
    let bytes = hex::decode(key).map_err(|e| format!("Key must be hex-encoded: {}", e))?;
    if bytes.is_empty() {
        return Err("Key must not be empty".to_string());
    }
    if bytes.len() > MAX_KEY_BYTES {
        return Err(format!("Key must be at most {} bytes", MAX_KEY_BYTES));
    }
    Ok(())
}

fn validate_fields(name: &str, key: &str, step: u32, digits: u8) -> Result<()> {
    let mut errors: HashMap<String, Vec<String>> = HashMap::new();

    if name.trim().is_empty() {
        errors
            .entry("name".into())
            .or_default()
            .push("This field is required".into());
    } else if name.chars().count() > MAX_NAME_LEN {
        errors
            .entry("name".into())
            .or_default()
            .push(format!("Ensure this value has at most {} characters", MAX_NAME_LEN));
    }
    if let Err(msg) = validate_key(key) {
        errors.entry("key".into()).or_default().push(msg);
    }
    if step == 0 {
        errors
            .entry("step".into())
            .or_default()
            .push("Step must be greater than 0".into());
    }
    if !DIGIT_CHOICES.contains(&digits) {
        errors
            .entry("digits".into())
            .or_default()
            .push("Select a valid choice: 6 or 8".into());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AdminError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(username: &str, key: &str) -> TotpDevice {
        TotpDevice {
            id: 1,
            user: DeviceUser {
                id: 7,
                username: username.to_string(),
                email: format!("{}@example.com", username),
            },
            name: "phone".into(),
            created_at: None,
            last_used_at: None,
            confirmed: true,
            key: key.to_string(),
            step: 30,
            t0: 0,
            digits: 6,
            tolerance: 1,
            drift: 0,
            throttling_failure_timestamp: None,
            throttling_failure_count: 0,
        }
    }

    // "12345678901234567890" in hex, the RFC 6238 test secret
    const RFC_KEY: &str = "3132333435363738393031323334353637383930";

    #[test]
    fn test_random_key_shape() {
        let key = random_hex_key(DEFAULT_KEY_BYTES);
        assert_eq!(key.len(), 40);
        assert!(validate_key(&key).is_ok());
        assert_ne!(key, random_hex_key(DEFAULT_KEY_BYTES));
    }

    #[test]
    fn test_base32_key() {
        let d = device("alice", RFC_KEY);
        assert_eq!(d.base32_key().unwrap(), "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ");
    }

    #[test]
    fn test_config_url_without_issuer() {
        let d = device("alice", RFC_KEY);
        let url = d.config_url(&ProvisioningOptions::default()).unwrap();
        assert_eq!(
            url,
            "otpauth://totp/alice?secret=GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ&algorithm=SHA1&digits=6&period=30"
        );
    }

    #[test]
    fn test_config_url_with_issuer_and_image() {
        let d = device("alice", RFC_KEY);
        let options = ProvisioningOptions {
            issuer: Some("Example: Corp".into()),
            image: Some("https://example.com/logo.png".into()),
        };
        let url = d.config_url(&options).unwrap();

        assert!(url.starts_with("otpauth://totp/Example%20Corp%3Aalice?"));
        assert!(url.contains("&issuer=Example%20Corp"));
        assert!(url.ends_with("&image=https%3A%2F%2Fexample.com%2Flogo.png"));
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let mut d = device("alice", "not-hex");
        d.digits = 7;
        d.name = String::new();

        let Err(AdminError::Validation(errors)) = d.validate() else {
            panic!("expected validation error");
        };
        assert!(errors.contains_key("key"));
        assert!(errors.contains_key("digits"));
        assert!(errors.contains_key("name"));
        assert!(!errors.contains_key("step"));
    }

    #[test]
    fn test_validate_key_length() {
        assert!(validate_key("").is_err());
        assert!(validate_key(&"ab".repeat(MAX_KEY_BYTES)).is_ok());
        assert!(validate_key(&"ab".repeat(MAX_KEY_BYTES + 1)).is_err());
    }
}
