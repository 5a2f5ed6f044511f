//! Admin for TOTP devices.
//!
//! Lists devices, hides or shows secrets according to
//! [`AdminConfig::hide_sensitive_data`](crate::config::AdminConfig), and adds
//! two provisioning views: an HTML config page and an SVG QR code.

mod forms;
mod views;

pub use forms::DeviceForm;

use axum::{Router, routing::get};
use std::sync::Arc;

use super::model_admin::{ModelAdmin, ModelKey, UrlPattern};
use super::options::{self, Fieldset, SearchFields};
use super::permissions::{ModelPermissions, PermissionChecker, Principal};
use super::site::AdminSite;
use crate::device::{DeviceStore, ProvisioningOptions, TotpDevice};
use crate::error::{AdminError, Result};
use crate::qr::{QrRenderer, default_renderer};
use crate::templates::Templates;

pub const APP_LABEL: &str = "otp_totp";
pub const MODEL_NAME: &str = "totpdevice";

pub const CHANGELIST: UrlPattern = UrlPattern::new("changelist", "");
pub const ADD: UrlPattern = UrlPattern::new("add", "add/");
pub const CHANGE: UrlPattern = UrlPattern::new("change", "{pk}/change/");
pub const CONFIG: UrlPattern = UrlPattern::new("config", "{pk}/config/");
pub const QRCODE: UrlPattern = UrlPattern::new("qrcode", "{pk}/qrcode/");

/// Binds [`TotpDevice`] to an [`AdminSite`].
///
/// # Example
///
/// ```rust,ignore
/// let site = Arc::new(AdminSite::new(config.admin.clone()));
/// let admin = TotpDeviceAdmin::new(Arc::new(store))?;
/// totp::register(&site, admin);
///
/// let app = site.router();
/// ```
pub struct TotpDeviceAdmin {
    store: Arc<dyn DeviceStore>,
    permissions: Arc<dyn PermissionChecker>,
    qr: Arc<dyn QrRenderer>,
    templates: Arc<Templates>,
}

impl TotpDeviceAdmin {
    /// An admin over `store` with codename permissions and the default QR renderer.
    pub fn new(store: Arc<dyn DeviceStore>) -> Result<Self> {
        Ok(Self {
            store,
            permissions: Arc::new(ModelPermissions::new(APP_LABEL, MODEL_NAME)),
            qr: default_renderer(),
            templates: Arc::new(Templates::new()?),
        })
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionChecker>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_qr_renderer(mut self, qr: Arc<dyn QrRenderer>) -> Self {
        self.qr = qr;
        self
    }

    pub fn with_templates(mut self, templates: Arc<Templates>) -> Self {
        self.templates = templates;
        self
    }

    pub fn model_key() -> ModelKey {
        ModelKey::new(APP_LABEL, MODEL_NAME)
    }

    /// Namespaced route name, e.g. `admin:otp_totp_totpdevice_config`.
    pub fn route_name(site: &AdminSite, pattern: UrlPattern) -> String {
        format!(
            "{}:{}",
            site.settings().site_name,
            Self::model_key().route_name(pattern.suffix)
        )
    }

    pub fn list_display(&self, site: &AdminSite) -> Vec<&'static str> {
        options::list_display(site.hide_sensitive_data())
    }

    /// Fieldsets for the add form (`obj` is `None`) or an existing device.
    pub fn get_fieldsets(&self, site: &AdminSite, obj: Option<&TotpDevice>) -> Vec<Fieldset> {
        options::fieldsets(site.hide_sensitive_data(), obj.is_some(), obj.is_none())
    }

    /// Searchable user fields: the login identifier and the email address.
    pub fn search_fields(&self, site: &AdminSite) -> SearchFields {
        let settings = site.settings();
        options::user_search_fields(
            &[settings.username_field.as_str(), "email"],
            &settings.user_fields,
        )
    }

    pub fn provisioning_options(&self, site: &AdminSite) -> ProvisioningOptions {
        let settings = site.settings();
        ProvisioningOptions {
            issuer: settings.totp_issuer.clone(),
            image: settings.totp_image.clone(),
        }
    }

    /// Link to the device's config page, or `None` if the route can't be reversed.
    pub fn try_qrcode_link(&self, site: &AdminSite, device: &TotpDevice) -> Option<String> {
        match site.reverse(&Self::route_name(site, CONFIG), Some(device.id)) {
            Ok(href) => Some(format!(
                r#"<a href="{}">qrcode</a>"#,
                handlebars::html_escape(&href)
            )),
            Err(e) => {
                tracing::debug!(device_id = device.id, error = %e, "No QR code link for device");
                None
            }
        }
    }

    /// The "QR Code" cell. Empty when no link can be built.
    pub fn qrcode_link(&self, site: &AdminSite, device: &TotpDevice) -> String {
        self.try_qrcode_link(site, device).unwrap_or_default()
    }

    /// Look up a device for a view that exposes its secret.
    ///
    /// 403 while sensitive data is hidden, 404 for an unknown pk, 403 without
    /// view or change permission on the device.
    pub(crate) async fn sensitive_device(
        &self,
        site: &AdminSite,
        principal: &Principal,
        pk: i64,
    ) -> Result<TotpDevice> {
        if site.hide_sensitive_data() {
            tracing::warn!(
                principal = %principal.username,
                device_id = pk,
                "Sensitive device data requested while hidden"
            );
            return Err(AdminError::forbidden("Sensitive data is hidden"));
        }

        let device = self.find(pk).await?;

        if !self
            .permissions
            .has_view_or_change_permission(principal, Some(&device))
        {
            tracing::warn!(principal = %principal.username, device_id = pk, "Device access denied");
            return Err(AdminError::forbidden("Permission denied"));
        }

        Ok(device)
    }

    pub(crate) async fn find(&self, pk: i64) -> Result<TotpDevice> {
        self.store
            .get(pk)
            .await?
            .ok_or_else(|| AdminError::not_found(format!("TOTP device {} not found", pk)))
    }
}

impl ModelAdmin for TotpDeviceAdmin {
    fn key(&self) -> ModelKey {
        Self::model_key()
    }

    fn verbose_name(&self) -> &str {
        "TOTP device"
    }

    fn urls(&self) -> Vec<UrlPattern> {
        vec![CHANGELIST, ADD, CHANGE, CONFIG, QRCODE]
    }

    fn routes(self: Arc<Self>, site: Arc<AdminSite>) -> Router {
        let key = self.key();
        let path = |pattern: UrlPattern| site.model_path(&key, pattern.path);

        Router::new()
            .route(&path(CHANGELIST), get(views::changelist))
            .route(&path(ADD), get(forms::add_form).post(forms::add_device))
            .route(
                &path(CHANGE),
                get(forms::change_form).post(forms::change_device),
            )
            .route(&path(CONFIG), get(views::config_view))
            .route(&path(QRCODE), get(views::qrcode_view))
            .with_state(AdminState {
                site: site.clone(),
                admin: self,
            })
    }
}

/// State shared by the device admin handlers.
#[derive(Clone)]
pub(crate) struct AdminState {
    pub site: Arc<AdminSite>,
    pub admin: Arc<TotpDeviceAdmin>,
}

/// Register `admin` on `site` unless a device admin is already registered.
///
/// Returns `true` if this call registered it.
pub fn register(site: &AdminSite, admin: TotpDeviceAdmin) -> bool {
    site.register_once(Arc::new(admin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdminConfig;
    use crate::device::InMemoryDeviceStore;
    use crate::testing::fixtures;

    fn admin() -> TotpDeviceAdmin {
        TotpDeviceAdmin::new(Arc::new(InMemoryDeviceStore::new())).unwrap()
    }

    fn site(hide: bool) -> AdminSite {
        AdminSite::new(AdminConfig {
            hide_sensitive_data: hide,
            ..Default::default()
        })
    }

    #[test]
    fn test_qrcode_link_unregistered_is_empty() {
        let site = site(false);
        let device = fixtures::device(3);
        assert_eq!(admin().try_qrcode_link(&site, &device), None);
        assert_eq!(admin().qrcode_link(&site, &device), "");
    }

    #[test]
    fn test_qrcode_link_registered() {
        let site = site(false);
        assert!(register(&site, admin()));

        let link = admin().qrcode_link(&site, &fixtures::device(3));
        assert_eq!(link, r#"<a href="/admin/otp_totp/totpdevice/3/config/">qrcode</a>"#);
    }

    #[test]
    fn test_register_is_idempotent() {
        let site = site(false);
        assert!(register(&site, admin()));
        assert!(!register(&site, admin()));
        assert!(site.is_registered(&TotpDeviceAdmin::model_key()));
    }

    #[test]
    fn test_hiding_shapes_options() {
        let device = fixtures::device(1);

        let hidden = site(true);
        assert!(!admin().list_display(&hidden).contains(&options::QRCODE_LINK));
        let sets = admin().get_fieldsets(&hidden, Some(&device));
        assert!(!options::shows_field(&sets, "key"));
        assert!(options::shows_field(&admin().get_fieldsets(&hidden, None), "key"));

        let shown = site(false);
        assert!(admin().list_display(&shown).contains(&options::QRCODE_LINK));
        let sets = admin().get_fieldsets(&shown, Some(&device));
        assert!(options::shows_field(&sets, options::QRCODE_LINK));
    }

    #[test]
    fn test_search_fields_follow_user_model() {
        let site = AdminSite::new(AdminConfig {
            username_field: "login".to_string(),
            user_fields: vec!["login".to_string()],
            ..Default::default()
        });
        let search = admin().search_fields(&site);
        assert_eq!(search.lookups, vec!["user__login"]);
    }

    #[test]
    fn test_provisioning_options_from_settings() {
        let site = AdminSite::new(AdminConfig {
            totp_issuer: Some("Example".to_string()),
            ..Default::default()
        });
        let options = admin().provisioning_options(&site);
        assert_eq!(options.issuer.as_deref(), Some("Example"));
        assert!(options.image.is_none());
    }
}
