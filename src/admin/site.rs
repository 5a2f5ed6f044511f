//! The admin site: model registry, url reversal and the top-level router.

use axum::{Json, Router, extract::State, routing::get};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use std::sync::Arc;

use super::model_admin::{ModelAdmin, ModelKey};
use super::permissions::Principal;
use crate::config::AdminConfig;
use crate::error::{AdminError, Result};

/// Chrome shared by every admin page.
#[derive(Debug, Clone, Serialize)]
pub struct SiteContext {
    pub site_header: String,
    pub site_title: String,
    pub site_url: String,
    pub index_url: String,
    pub user: String,
}

/// Entry on the site index.
#[derive(Debug, Clone, Serialize)]
pub struct RegisteredModel {
    pub app_label: String,
    pub model_name: String,
    pub name: String,
    pub url: String,
}

/// Hosts model admins under a common url prefix.
///
/// Settings are read through the site on every request, so a site built from
/// a different [`AdminConfig`] behaves differently without any global state.
pub struct AdminSite {
    config: AdminConfig,
    registry: DashMap<ModelKey, Arc<dyn ModelAdmin>>,
}

impl AdminSite {
    pub fn new(config: AdminConfig) -> Self {
        Self {
            config,
            registry: DashMap::new(),
        }
    }

    pub fn settings(&self) -> &AdminConfig {
        &self.config
    }

    pub fn hide_sensitive_data(&self) -> bool {
        self.config.hide_sensitive_data
    }

    /// Register `admin` under `key`.
    ///
    /// # Errors
    ///
    /// [`AdminError::AlreadyRegistered`] if the key is taken.
    pub fn register(&self, key: ModelKey, admin: Arc<dyn ModelAdmin>) -> Result<()> {
        match self.registry.entry(key) {
            Entry::Occupied(entry) => Err(AdminError::AlreadyRegistered(entry.key().to_string())),
            Entry::Vacant(entry) => {
                tracing::info!(model = %entry.key(), "Registered model admin");
                entry.insert(admin);
                Ok(())
            }
        }
    }

    /// Register `admin` under its own key unless something already is.
    ///
    /// Returns `true` if the admin was registered by this call.
    pub fn register_once(&self, admin: Arc<dyn ModelAdmin>) -> bool {
        let key = admin.key();
        match self.register(key.clone(), admin) {
            Ok(()) => true,
            Err(AdminError::AlreadyRegistered(_)) => {
                tracing::debug!(model = %key, "Model admin already registered, skipping");
                false
            }
            Err(e) => {
                tracing::warn!(model = %key, error = %e, "Model admin registration failed");
                false
            }
        }
    }

    pub fn is_registered(&self, key: &ModelKey) -> bool {
        self.registry.contains_key(key)
    }

    pub fn get(&self, key: &ModelKey) -> Option<Arc<dyn ModelAdmin>> {
        self.registry.get(key).map(|entry| entry.value().clone())
    }

    /// Registered models, sorted by app label then model name.
    pub fn registered(&self) -> Vec<RegisteredModel> {
        let mut models: Vec<RegisteredModel> = self
            .registry
            .iter()
            .map(|entry| RegisteredModel {
                app_label: entry.key().app_label.clone(),
                model_name: entry.key().model_name.clone(),
                name: entry.value().verbose_name().to_string(),
                url: self.model_path(entry.key(), ""),
            })
            .collect();
        models.sort_by(|a, b| {
            (a.app_label.as_str(), a.model_name.as_str())
                .cmp(&(b.app_label.as_str(), b.model_name.as_str()))
        });
        models
    }

    /// Url of the site index, with a trailing slash.
    pub fn index_path(&self) -> String {
        format!("{}/", self.config.url_prefix.trim_end_matches('/'))
    }

    /// Full path of a model route, e.g. `/admin/otp_totp/totpdevice/{pk}/config/`.
    pub fn model_path(&self, key: &ModelKey, path: &str) -> String {
        format!(
            "{}{}/{}/{}",
            self.index_path(),
            key.app_label,
            key.model_name,
            path
        )
    }

    /// Resolve a route name such as `admin:otp_totp_totpdevice_config` to a path.
    ///
    /// # Errors
    ///
    /// [`AdminError::NoReverseMatch`] when the namespace is not this site's,
    /// no registered admin declares the name, or a `{pk}` route gets no pk.
    pub fn reverse(&self, name: &str, pk: Option<i64>) -> Result<String> {
        let no_match = || AdminError::NoReverseMatch(name.to_string());

        let route = match name.split_once(':') {
            Some((namespace, route)) if namespace == self.config.site_name => route,
            _ => return Err(no_match()),
        };

        if route == "index" {
            return Ok(self.index_path());
        }

        for entry in self.registry.iter() {
            let key = entry.key();
            for pattern in entry.value().urls() {
                if key.route_name(pattern.suffix) != route {
                    continue;
                }
                let path = match (pattern.takes_pk(), pk) {
                    (true, Some(pk)) => pattern.path.replace("{pk}", &pk.to_string()),
                    (true, None) => return Err(no_match()),
                    (false, _) => pattern.path.to_string(),
                };
                return Ok(self.model_path(key, &path));
            }
        }

        Err(no_match())
    }

    /// Template chrome for `principal`.
    pub fn each_context(&self, principal: &Principal) -> SiteContext {
        SiteContext {
            site_header: self.config.site_header.clone(),
            site_title: self.config.site_title.clone(),
            site_url: "/".to_string(),
            index_url: self.index_path(),
            user: principal.username.clone(),
        }
    }

    /// Router serving the site index and every registered model admin.
    pub fn router(self: &Arc<Self>) -> Router {
        let admins: Vec<Arc<dyn ModelAdmin>> = self
            .registry
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut router = Router::new()
            .route(&self.index_path(), get(index))
            .with_state(self.clone());

        for admin in admins {
            router = router.merge(admin.routes(self.clone()));
        }

        router
    }
}

async fn index(
    State(site): State<Arc<AdminSite>>,
    principal: Principal,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "site": site.each_context(&principal),
        "models": site.registered(),
    }))
}
