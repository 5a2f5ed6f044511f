//! Add and change endpoints for devices.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};

use super::{AdminState, TotpDeviceAdmin};
use crate::admin::options::{self, Fieldset, QRCODE_LINK};
use crate::admin::permissions::Principal;
use crate::admin::site::AdminSite;
use crate::device::{DEFAULT_KEY_BYTES, DIGIT_CHOICES, NewDevice, TotpDevice, random_hex_key};
use crate::error::{AdminError, Result};

/// Submitted device fields.
///
/// Omitted fields keep their current value (or the default when adding).
/// Read-only fields such as `created_at` are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceForm {
    /// Owner id. Only read when adding.
    pub user: Option<i64>,
    pub name: Option<String>,
    pub confirmed: Option<bool>,
    pub key: Option<String>,
    pub step: Option<u32>,
    pub t0: Option<i64>,
    pub digits: Option<u8>,
    pub tolerance: Option<u8>,
    pub drift: Option<i32>,
    /// `null` clears the timestamp.
    #[serde(default, deserialize_with = "present")]
    pub throttling_failure_timestamp: Option<Option<DateTime<Utc>>>,
    pub throttling_failure_count: Option<u32>,
}

fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl DeviceForm {
    fn into_new_device(self) -> Result<NewDevice> {
        let user = self
            .user
            .ok_or_else(|| AdminError::field("user", "This field is required"))?;

        let mut device = NewDevice::new(user, self.name.unwrap_or_default());
        if let Some(key) = self.key {
            device.key = key;
        }
        if let Some(confirmed) = self.confirmed {
            device.confirmed = confirmed;
        }
        if let Some(step) = self.step {
            device.step = step;
        }
        if let Some(t0) = self.t0 {
            device.t0 = t0;
        }
        if let Some(digits) = self.digits {
            device.digits = digits;
        }
        if let Some(tolerance) = self.tolerance {
            device.tolerance = tolerance;
        }
        if let Some(drift) = self.drift {
            device.drift = drift;
        }
        if let Some(timestamp) = self.throttling_failure_timestamp {
            device.throttling_failure_timestamp = timestamp;
        }
        if let Some(count) = self.throttling_failure_count {
            device.throttling_failure_count = count;
        }

        device.validate()?;
        Ok(device)
    }

    fn apply(self, device: &mut TotpDevice) -> Result<()> {
        if let Some(name) = self.name {
            device.name = name;
        }
        if let Some(key) = self.key {
            device.key = key;
        }
        if let Some(confirmed) = self.confirmed {
            device.confirmed = confirmed;
        }
        if let Some(step) = self.step {
            device.step = step;
        }
        if let Some(t0) = self.t0 {
            device.t0 = t0;
        }
        if let Some(digits) = self.digits {
            device.digits = digits;
        }
        if let Some(tolerance) = self.tolerance {
            device.tolerance = tolerance;
        }
        if let Some(drift) = self.drift {
            device.drift = drift;
        }
        if let Some(timestamp) = self.throttling_failure_timestamp {
            device.throttling_failure_timestamp = timestamp;
        }
        if let Some(count) = self.throttling_failure_count {
            device.throttling_failure_count = count;
        }

        device.validate()
    }
}

fn form_options() -> Value {
    let radio_fields: Vec<Value> = options::radio_fields()
        .into_iter()
        .map(|(field, layout)| json!({ "field": field, "layout": layout, "choices": DIGIT_CHOICES }))
        .collect();

    json!({
        "readonly_fields": options::READONLY_FIELDS,
        "raw_id_fields": options::RAW_ID_FIELDS,
        "radio_fields": radio_fields,
    })
}

/// Values of the fields `fieldsets` shows.
fn field_values(
    admin: &TotpDeviceAdmin,
    site: &AdminSite,
    fieldsets: &[Fieldset],
    device: &TotpDevice,
) -> Value {
    let mut values = serde_json::Map::new();
    for field in fieldsets.iter().flat_map(|set| set.fields.iter()) {
        let value = match *field {
            "user" => json!({ "id": device.user.id, "username": device.user.username }),
            "name" => json!(device.name),
            "confirmed" => json!(device.confirmed),
            "created_at" => json!(device.created_at),
            "last_used_at" => json!(device.last_used_at),
            "key" => json!(device.key),
            "step" => json!(device.step),
            "t0" => json!(device.t0),
            "digits" => json!(device.digits),
            "tolerance" => json!(device.tolerance),
            "drift" => json!(device.drift),
            "throttling_failure_timestamp" => json!(device.throttling_failure_timestamp),
            "throttling_failure_count" => json!(device.throttling_failure_count),
            QRCODE_LINK => json!(admin.qrcode_link(site, device)),
            _ => continue,
        };
        values.insert((*field).to_string(), value);
    }
    Value::Object(values)
}

fn change_representation(
    admin: &TotpDeviceAdmin,
    site: &AdminSite,
    principal: &Principal,
    device: &TotpDevice,
) -> Value {
    let fieldsets = admin.get_fieldsets(site, Some(device));
    json!({
        "id": device.id,
        "title": device.to_string(),
        "fieldsets": fieldsets,
        "values": field_values(admin, site, &fieldsets, device),
        "options": form_options(),
        "has_change_permission": admin.permissions.has_change_permission(principal, Some(device)),
    })
}

fn require_add(admin: &TotpDeviceAdmin, principal: &Principal) -> Result<()> {
    if admin.permissions.has_add_permission(principal) {
        Ok(())
    } else {
        tracing::warn!(principal = %principal.username, "Device add denied");
        Err(AdminError::forbidden("Permission denied"))
    }
}

/// `GET add/`
pub(crate) async fn add_form(
    State(state): State<AdminState>,
    principal: Principal,
) -> Result<Json<Value>> {
    let AdminState { site, admin } = &state;
    require_add(admin, &principal)?;

    let defaults = NewDevice::new(0, "");
    Ok(Json(json!({
        "fieldsets": admin.get_fieldsets(site, None),
        "options": form_options(),
        "initial": {
            "confirmed": defaults.confirmed,
            "key": random_hex_key(DEFAULT_KEY_BYTES),
            "step": defaults.step,
            "t0": defaults.t0,
            "digits": defaults.digits,
            "tolerance": defaults.tolerance,
            "drift": defaults.drift,
            "throttling_failure_count": defaults.throttling_failure_count,
        },
    })))
}

/// `POST add/`
pub(crate) async fn add_device(
    State(state): State<AdminState>,
    principal: Principal,
    Json(form): Json<DeviceForm>,
) -> Result<(StatusCode, Json<Value>)> {
    let AdminState { site, admin } = &state;
    require_add(admin, &principal)?;

    let device = admin.store.create(form.into_new_device()?).await?;
    tracing::info!(
        principal = %principal.username,
        device_id = device.id,
        user = %device.user,
        "TOTP device added"
    );

    Ok((
        StatusCode::CREATED,
        Json(change_representation(admin, site, &principal, &device)),
    ))
}

/// `GET <pk>/change/`
pub(crate) async fn change_form(
    State(state): State<AdminState>,
    principal: Principal,
    Path(pk): Path<i64>,
) -> Result<Json<Value>> {
    let AdminState { site, admin } = &state;
    let device = admin.find(pk).await?;

    if !admin
        .permissions
        .has_view_or_change_permission(&principal, Some(&device))
    {
        tracing::warn!(principal = %principal.username, device_id = pk, "Device view denied");
        return Err(AdminError::forbidden("Permission denied"));
    }

    Ok(Json(change_representation(admin, site, &principal, &device)))
}

/// `POST <pk>/change/`
pub(crate) async fn change_device(
    State(state): State<AdminState>,
    principal: Principal,
    Path(pk): Path<i64>,
    Json(form): Json<DeviceForm>,
) -> Result<Json<Value>> {
    let AdminState { site, admin } = &state;
    let mut device = admin.find(pk).await?;

    if !admin
        .permissions
        .has_change_permission(&principal, Some(&device))
    {
        tracing::warn!(principal = %principal.username, device_id = pk, "Device change denied");
        return Err(AdminError::forbidden("Permission denied"));
    }

    let shows_key = options::shows_field(&admin.get_fieldsets(site, Some(&device)), "key");
    if form.key.is_some() && !shows_key {
        return Err(AdminError::bad_request(
            "The key cannot be changed while sensitive data is hidden",
        ));
    }

    form.apply(&mut device)?;
    admin.store.update(&device).await?;
    tracing::info!(principal = %principal.username, device_id = pk, "TOTP device changed");

    Ok(Json(change_representation(admin, site, &principal, &device)))
}
