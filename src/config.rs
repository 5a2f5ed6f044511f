use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::error::{AdminError, Result};
use crate::utils::{get_env_with_prefix, parse_bool_flag};

/// Main configuration for the admin console
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum request body size in bytes (default: 1MB)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

/// Settings consumed by the admin site and its model admins.
///
/// These are read at request time through the [`AdminSite`](crate::admin::AdminSite)
/// that owns them.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminConfig {
    /// Hide secret keys and QR codes from the admin.
    ///
    /// When set, the QR code column and section disappear, the key field is
    /// not shown for existing devices, and the config and QR code views
    /// respond with 403.
    #[serde(default)]
    pub hide_sensitive_data: bool,
    /// Mount point of the admin site.
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
    /// Namespace used when reversing admin route names.
    #[serde(default = "default_site_name")]
    pub site_name: String,
    #[serde(default = "default_site_header")]
    pub site_header: String,
    #[serde(default = "default_site_title")]
    pub site_title: String,
    /// Issuer embedded in provisioning URIs.
    #[serde(default)]
    pub totp_issuer: Option<String>,
    /// Image URL embedded in provisioning URIs.
    #[serde(default)]
    pub totp_image: Option<String>,
    /// Login identifier field of the user model.
    #[serde(default = "default_username_field")]
    pub username_field: String,
    /// Text fields available on the user model for searching.
    #[serde(default = "default_user_fields")]
    pub user_fields: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            hide_sensitive_data: false,
            url_prefix: default_url_prefix(),
            site_name: default_site_name(),
            site_header: default_site_header(),
            site_title: default_site_title(),
            totp_issuer: None,
            totp_image: None,
            username_field: default_username_field(),
            user_fields: default_user_fields(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_body_size() -> usize {
    1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_url_prefix() -> String {
    "/admin".to_string()
}

fn default_site_name() -> String {
    "admin".to_string()
}

fn default_site_header() -> String {
    "Administration".to_string()
}

fn default_site_title() -> String {
    "Site administration".to_string()
}

fn default_username_field() -> String {
    "username".to_string()
}

fn default_user_fields() -> Vec<String> {
    vec!["username".to_string(), "email".to_string()]
}

impl ServerConfig {
    pub fn addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.config.server.max_body_size = max_body_size;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_admin(mut self, admin: AdminConfig) -> Self {
        self.config.admin = admin;
        self
    }

    pub fn with_hide_sensitive_data(mut self, hide: bool) -> Self {
        self.config.admin.hide_sensitive_data = hide;
        self
    }

    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.admin.url_prefix = prefix.into();
        self
    }

    pub fn with_totp_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.config.admin.totp_issuer = Some(issuer.into());
        self
    }

    pub fn with_totp_image(mut self, image: impl Into<String>) -> Self {
        self.config.admin.totp_image = Some(image.into());
        self
    }

    /// Load configuration from environment variables with OTP_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(host) = get_env_with_prefix("HOST") {
            self.config.server.host = host;
        }
        if let Some(port) = get_env_with_prefix("PORT") {
            if let Ok(p) = port.parse() {
                self.config.server.port = p;
            }
        }
        if let Some(max_body_size) = get_env_with_prefix("MAX_BODY_SIZE") {
            if let Ok(size) = max_body_size.parse() {
                self.config.server.max_body_size = size;
            }
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = parse_bool_flag(&json).unwrap_or(false);
        }

        if let Some(hide) = get_env_with_prefix("ADMIN_HIDE_SENSITIVE_DATA") {
            match parse_bool_flag(&hide) {
                Some(value) => self.config.admin.hide_sensitive_data = value,
                None => tracing::warn!(
                    value = %hide,
                    "Ignoring unparseable OTP_ADMIN_HIDE_SENSITIVE_DATA"
                ),
            }
        }
        if let Some(prefix) = get_env_with_prefix("ADMIN_URL_PREFIX") {
            self.config.admin.url_prefix = prefix;
        }
        if let Some(header) = get_env_with_prefix("ADMIN_SITE_HEADER") {
            self.config.admin.site_header = header;
        }
        if let Some(issuer) = get_env_with_prefix("TOTP_ISSUER") {
            self.config.admin.totp_issuer = Some(issuer).filter(|s| !s.is_empty());
        }
        if let Some(image) = get_env_with_prefix("TOTP_IMAGE") {
            self.config.admin.totp_image = Some(image).filter(|s| !s.is_empty());
        }

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns an error if the server address does not parse, the log level is
    /// unknown, the body limit or port is zero, or the admin url prefix does
    /// not start with `/`.
    pub fn build(self) -> Result<Config> {
        self.config.server.addr().map_err(|e| {
            AdminError::bad_request(format!(
                "Invalid server address {}:{} - {}",
                self.config.server.host, self.config.server.port, e
            ))
        })?;

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging.level.to_lowercase().as_str()) {
            return Err(AdminError::bad_request(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        if self.config.server.port == 0 {
            return Err(AdminError::bad_request("Server port must be greater than 0"));
        }

        if self.config.server.max_body_size == 0 {
            return Err(AdminError::bad_request(
                "Maximum body size must be greater than 0",
            ));
        }

        if !self.config.admin.url_prefix.starts_with('/') {
            return Err(AdminError::bad_request(format!(
                "Admin url prefix must start with '/', got: {}",
                self.config.admin.url_prefix
            )));
        }

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
