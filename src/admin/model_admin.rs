//! The trait model admins implement to be hosted by an [`AdminSite`].

use axum::Router;
use serde::Serialize;
use std::sync::Arc;

use super::site::AdminSite;

/// Identifies a model inside the admin, e.g. `otp_totp.totpdevice`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ModelKey {
    pub app_label: String,
    pub model_name: String,
}

impl ModelKey {
    pub fn new(app_label: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            app_label: app_label.into(),
            model_name: model_name.into(),
        }
    }

    /// Route name of one of this model's views, without the site namespace.
    pub fn route_name(&self, suffix: &str) -> String {
        format!("{}_{}_{}", self.app_label, self.model_name, suffix)
    }
}

impl std::fmt::Display for ModelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.app_label, self.model_name)
    }
}

/// A named route of a model admin.
///
/// `path` is relative to the model's base url and may contain a `{pk}`
/// placeholder, e.g. `{pk}/config/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlPattern {
    pub suffix: &'static str,
    pub path: &'static str,
}

impl UrlPattern {
    pub const fn new(suffix: &'static str, path: &'static str) -> Self {
        Self { suffix, path }
    }

    pub fn takes_pk(&self) -> bool {
        self.path.contains("{pk}")
    }
}

/// Binds one model to the admin site.
///
/// # Example
///
/// ```rust,ignore
/// struct WidgetAdmin;
///
/// impl ModelAdmin for WidgetAdmin {
///     fn key(&self) -> ModelKey {
///         ModelKey::new("shop", "widget")
///     }
///
///     fn verbose_name(&self) -> &str {
///         "widget"
///     }
///
///     fn urls(&self) -> Vec<UrlPattern> {
///         vec![UrlPattern::new("changelist", "")]
///     }
///
///     fn routes(self: Arc<Self>, site: Arc<AdminSite>) -> Router {
///         Router::new().route(&site.model_path(&self.key(), ""), get(list_widgets))
///     }
/// }
/// ```
pub trait ModelAdmin: Send + Sync + 'static {
    fn key(&self) -> ModelKey;

    /// Human name of the model, used on the site index.
    fn verbose_name(&self) -> &str;

    /// Named routes, used for url reversal.
    fn urls(&self) -> Vec<UrlPattern>;

    /// The model's routes, with full paths from [`AdminSite::model_path`].
    fn routes(self: Arc<Self>, site: Arc<AdminSite>) -> Router;
}
