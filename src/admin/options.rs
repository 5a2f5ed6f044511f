//! Declarative options of the TOTP device admin.
//!
//! Everything here is a pure function of the settings, so it can be tested
//! without an HTTP context.

use serde::Serialize;

/// Column names shown on the changelist, before the conditional QR column.
pub const LIST_DISPLAY: [&str; 5] = ["user", "name", "created_at", "last_used_at", "confirmed"];
pub const LIST_FILTER: [&str; 3] = ["created_at", "last_used_at", "confirmed"];
pub const READONLY_FIELDS: [&str; 3] = ["created_at", "last_used_at", "qrcode_link"];
pub const RAW_ID_FIELDS: [&str; 1] = ["user"];

/// The computed column holding the link to the config page.
pub const QRCODE_LINK: &str = "qrcode_link";

/// A named group of fields on the change form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fieldset {
    pub name: Option<&'static str>,
    pub fields: Vec<&'static str>,
}

impl Fieldset {
    fn new(name: Option<&'static str>, fields: &[&'static str]) -> Self {
        Self {
            name,
            fields: fields.to_vec(),
        }
    }
}

/// How a choice field is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioLayout {
    Horizontal,
    Vertical,
}

/// Fields rendered as radio buttons instead of a select.
pub fn radio_fields() -> Vec<(&'static str, RadioLayout)> {
    vec![("digits", RadioLayout::Horizontal)]
}

/// Human label for a column.
pub fn column_label(column: &str) -> &'static str {
    match column {
        "user" => "user",
        "name" => "name",
        "created_at" => "created at",
        "last_used_at" => "last used at",
        "confirmed" => "confirmed",
        QRCODE_LINK => "QR Code",
        _ => "",
    }
}

/// Columns of the changelist.
///
/// The QR code column only appears when sensitive data is shown.
pub fn list_display(is_hiding: bool) -> Vec<&'static str> {
    let mut columns = LIST_DISPLAY.to_vec();
    if !is_hiding {
        columns.push(QRCODE_LINK);
    }
    columns
}

/// Fieldsets of the add/change form.
///
/// - `is_hiding`: sensitive data is hidden
/// - `is_existing`: an existing device is shown
/// - `is_adding`: the add form is shown
///
/// The key is left out only when an existing device is edited while
/// sensitive data is hidden. The QR code section is only added for existing
/// devices when sensitive data is shown.
pub fn fieldsets(is_hiding: bool, is_existing: bool, is_adding: bool) -> Vec<Fieldset> {
    let configuration: &[&'static str] = if is_hiding && is_existing && !is_adding {
        &["step", "t0", "digits", "tolerance"]
    } else {
        &["key", "step", "t0", "digits", "tolerance"]
    };

    let mut sets = vec![
        Fieldset::new(Some("Identity"), &["user", "name", "confirmed"]),
        Fieldset::new(Some("Timestamps"), &["created_at", "last_used_at"]),
        Fieldset::new(Some("Configuration"), configuration),
        Fieldset::new(Some("State"), &["drift"]),
        Fieldset::new(
            Some("Throttling"),
            &["throttling_failure_timestamp", "throttling_failure_count"],
        ),
    ];

    if !is_hiding && is_existing {
        sets.push(Fieldset::new(None, &[QRCODE_LINK]));
    }

    sets
}

/// Whether any fieldset shows `field`.
pub fn shows_field(sets: &[Fieldset], field: &str) -> bool {
    sets.iter().any(|set| set.fields.contains(&field))
}

/// Search configuration derived from the user model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchFields {
    /// Lookups such as `user__email`.
    pub lookups: Vec<String>,
    /// The user fields behind the lookups.
    pub user_fields: Vec<String>,
    pub help_text: Option<String>,
}

/// Keep the candidate user fields that exist on the user model.
///
/// Candidates missing from `available` are skipped silently, so a user model
/// without an email field still gets a working search box.
pub fn user_search_fields(candidates: &[&str], available: &[String]) -> SearchFields {
    let user_fields: Vec<String> = candidates
        .iter()
        .filter(|candidate| available.iter().any(|field| field == *candidate))
        .map(|field| field.to_string())
        .collect();

    let help_text = if user_fields.is_empty() {
        None
    } else {
        let names: Vec<String> = user_fields.iter().map(|f| f.replace('_', " ")).collect();
        Some(format!("Search by {}.", names.join(" or ")))
    };

    SearchFields {
        lookups: user_fields.iter().map(|f| format!("user__{}", f)).collect(),
        user_fields,
        help_text,
    }
}
