use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{AdminState, CHANGE, QRCODE, TotpDeviceAdmin};
use crate::admin::options::{self, QRCODE_LINK};
use crate::admin::permissions::Principal;
use crate::admin::site::{AdminSite, SiteContext};
use crate::device::{DateFilter, DeviceQuery, TotpDevice};
use crate::error::{AdminError, Result};
use crate::qr::QrError;
use crate::templates::CONFIG_TEMPLATE;
use crate::utils::parse_bool_flag;

const MAX_PER_PAGE: u32 = 500;

/// Query string of the changelist.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChangelistParams {
    q: Option<String>,
    confirmed: Option<String>,
    created_at: Option<String>,
    last_used_at: Option<String>,
    page: Option<u32>,
    per_page: Option<u32>,
}

impl ChangelistParams {
    fn into_query(self, search_fields: Vec<String>) -> Result<DeviceQuery> {
        let mut query = DeviceQuery {
            search: self.q,
            search_fields,
            ..Default::default()
        };

        if let Some(confirmed) = self.confirmed.as_deref().filter(|v| !v.is_empty()) {
            query.confirmed = Some(parse_bool_flag(confirmed).ok_or_else(|| {
                AdminError::field("confirmed", format!("Invalid choice: {}", confirmed))
            })?);
        }
        if let Some(filter) = self.created_at.as_deref().filter(|v| !v.is_empty()) {
            query.created_at = filter
                .parse()
                .map_err(|e: String| AdminError::field("created_at", e))?;
        }
        if let Some(filter) = self.last_used_at.as_deref().filter(|v| !v.is_empty()) {
            query.last_used_at = filter
                .parse()
                .map_err(|e: String| AdminError::field("last_used_at", e))?;
        }
        if let Some(page) = self.page {
            query.page = page.max(1);
        }
        if let Some(per_page) = self.per_page {
            query.per_page = per_page.clamp(1, MAX_PER_PAGE);
        }

        Ok(query)
    }
}

#[derive(Debug, Serialize)]
struct Column {
    name: &'static str,
    label: &'static str,
}

fn date_cell(value: Option<DateTime<Utc>>) -> Value {
    value.map_or(Value::Null, |v| Value::String(v.to_rfc3339()))
}

fn row(admin: &TotpDeviceAdmin, site: &AdminSite, columns: &[&str], device: &TotpDevice) -> Value {
    let mut row = serde_json::Map::new();
    row.insert("id".into(), json!(device.id));
    for column in columns {
        let cell = match *column {
            "user" => json!(device.user.to_string()),
            "name" => json!(device.name),
            "created_at" => date_cell(device.created_at),
            "last_used_at" => date_cell(device.last_used_at),
            "confirmed" => json!(device.confirmed),
            QRCODE_LINK => json!(admin.qrcode_link(site, device)),
            _ => Value::Null,
        };
        row.insert((*column).to_string(), cell);
    }
    let change_url = site
        .reverse(&TotpDeviceAdmin::route_name(site, CHANGE), Some(device.id))
        .ok();
    row.insert("change_url".into(), json!(change_url));
    Value::Object(row)
}

fn filters() -> Value {
    let dates: Vec<Value> = DateFilter::CHOICES
        .iter()
        .map(|choice| json!({ "value": choice.as_str(), "label": choice.label() }))
        .collect();

    options::LIST_FILTER
        .iter()
        .map(|field| {
            let choices = if *field == "confirmed" {
                json!([
                    { "value": "", "label": "All" },
                    { "value": "1", "label": "Yes" },
                    { "value": "0", "label": "No" },
                ])
            } else {
                Value::Array(dates.clone())
            };
            json!({ "field": field, "label": options::column_label(field), "choices": choices })
        })
        .collect()
}

/// `GET /` on the model prefix.
pub(crate) async fn changelist(
    State(state): State<AdminState>,
    principal: Principal,
    Query(params): Query<ChangelistParams>,
) -> Result<Json<Value>> {
    let AdminState { site, admin } = &state;

    if !admin.permissions.has_view_or_change_permission(&principal, None) {
        tracing::warn!(principal = %principal.username, "Device changelist denied");
        return Err(AdminError::forbidden("Permission denied"));
    }

    let search = admin.search_fields(site);
    // The login identifier is exposed on devices as `username`.
    let username_field = &site.settings().username_field;
    let search_fields = search
        .user_fields
        .iter()
        .map(|field| {
            if field == username_field {
                "username".to_string()
            } else {
                field.clone()
            }
        })
        .collect();

    let query = params.into_query(search_fields)?;
    let page = admin.store.list(&query).await?;

    let columns = admin.list_display(site);
    let rows: Vec<Value> = page
        .items
        .iter()
        .map(|device| row(admin, site, &columns, device))
        .collect();

    Ok(Json(json!({
        "columns": columns
            .iter()
            .map(|name| Column { name: *name, label: options::column_label(name) })
            .collect::<Vec<_>>(),
        "rows": rows,
        "filters": filters(),
        "search_help_text": search.help_text,
        "page": page.page,
        "per_page": page.per_page,
        "total": page.total,
        "total_pages": page.total_pages,
    })))
}

#[derive(Debug, Serialize)]
struct DeviceSummary {
    id: i64,
    name: String,
    user: String,
}

#[derive(Debug, Serialize)]
struct ConfigPage {
    site: SiteContext,
    title: &'static str,
    device: DeviceSummary,
    secret: String,
    config_url: String,
    qrcode_url: String,
    change_url: String,
}

/// `GET <pk>/config/`: provisioning page with the QR code and manual secret.
pub(crate) async fn config_view(
    State(state): State<AdminState>,
    principal: Principal,
    Path(pk): Path<i64>,
) -> Result<Response> {
    let AdminState { site, admin } = &state;
    let device = admin.sensitive_device(site, &principal, pk).await?;

    let page = ConfigPage {
        site: site.each_context(&principal),
        title: "TOTP device configuration",
        secret: device.base32_key()?,
        config_url: device.config_url(&admin.provisioning_options(site))?,
        qrcode_url: site.reverse(&TotpDeviceAdmin::route_name(site, QRCODE), Some(pk))?,
        change_url: site.reverse(&TotpDeviceAdmin::route_name(site, CHANGE), Some(pk))?,
        device: DeviceSummary {
            id: device.id,
            name: device.name.clone(),
            user: device.user.to_string(),
        },
    };

    let html = admin.templates.render(CONFIG_TEMPLATE, &page)?;
    Ok(Html(html).into_response())
}

/// `GET <pk>/qrcode/`: the provisioning URI as an SVG QR code.
pub(crate) async fn qrcode_view(
    State(state): State<AdminState>,
    principal: Principal,
    Path(pk): Path<i64>,
) -> Result<Response> {
    let AdminState { site, admin } = &state;
    let device = admin.sensitive_device(site, &principal, pk).await?;
    let data = device.config_url(&admin.provisioning_options(site))?;

    let mut body = Vec::new();
    match admin.qr.write_svg(&data, &mut body) {
        Ok(()) => Ok(([(header::CONTENT_TYPE, "image/svg+xml")], body).into_response()),
        Err(QrError::Unavailable) => {
            tracing::warn!(device_id = pk, "QR code requested but no renderer is available");
            Ok(StatusCode::SERVICE_UNAVAILABLE.into_response())
        }
        Err(e @ QrError::Encode(_)) => Err(AdminError::internal(e.to_string())),
    }
}
