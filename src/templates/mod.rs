//! Handlebars templates for the HTML admin pages.
//!
//! Templates live under `templates/` at the crate root and are embedded at
//! compile time. A file `otp_totp/admin/config.html.hbs` is registered as
//! `otp_totp/admin/config.html`.

use handlebars::Handlebars;
use include_dir::{Dir, DirEntry, include_dir};
use serde::Serialize;

use crate::error::{AdminError, Result};

static TEMPLATES_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/templates");

/// Name of the device config page template.
pub const CONFIG_TEMPLATE: &str = "otp_totp/admin/config.html";

/// Registry of the embedded templates.
pub struct Templates {
    handlebars: Handlebars<'static>,
}

impl Templates {
    /// Load every embedded template.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::Template`] if a template does not parse.
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        register_dir(&mut handlebars, &TEMPLATES_DIR)?;
        Ok(Self { handlebars })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.has_template(name)
    }

    /// Render `name` with `data`.
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String> {
        if !self.handlebars.has_template(name) {
            return Err(AdminError::Template(format!("Template not found: {}", name)));
        }
        Ok(self.handlebars.render(name, data)?)
    }
}

fn register_dir(handlebars: &mut Handlebars<'static>, dir: &'static Dir<'static>) -> Result<()> {
    for entry in dir.entries() {
        match entry {
            DirEntry::Dir(subdir) => register_dir(handlebars, subdir)?,
            DirEntry::File(file) => {
                let path = file.path().to_string_lossy().replace('\\', "/");
                let Some(name) = path.strip_suffix(".hbs") else {
                    continue;
                };
                let content = file.contents_utf8().ok_or_else(|| {
                    AdminError::Template(format!("Invalid UTF-8 in template: {}", path))
                })?;
                handlebars
                    .register_template_string(name, content)
                    .map_err(|e| AdminError::Template(format!("{}: {}", name, e)))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_context() -> serde_json::Value {
        json!({
            "site": {
                "site_header": "Administration",
                "site_title": "Site administration",
                "site_url": "/",
                "index_url": "/admin/",
                "user": "root",
            },
            "title": "TOTP device configuration",
            "device": { "id": 7, "name": "Phone <1>", "user": "alice" },
            "secret": "GEZDGNBVGY3TQOJQ",
            "config_url": "otpauth://totp/alice?secret=GEZDGNBVGY3TQOJQ",
            "qrcode_url": "/admin/otp_totp/totpdevice/7/qrcode/",
            "change_url": "/admin/otp_totp/totpdevice/7/change/",
        })
    }

    #[test]
    fn test_config_template_registered() {
        let templates = Templates::new().unwrap();
        assert!(templates.has_template(CONFIG_TEMPLATE));
    }

    #[test]
    fn test_render_config_page() {
        let templates = Templates::new().unwrap();
        let html = templates.render(CONFIG_TEMPLATE, &config_context()).unwrap();

        assert!(html.contains("/admin/otp_totp/totpdevice/7/qrcode/"));
        assert!(html.contains("GEZDGNBVGY3TQOJQ"));
        assert!(html.contains("Phone &lt;1&gt;"));
        assert!(html.contains("Administration"));
    }

    #[test]
    fn test_missing_template() {
        let templates = Templates::new().unwrap();
        let err = templates.render("nope.html", &json!({})).unwrap_err();
        assert!(matches!(err, AdminError::Template(_)));
    }

    #[test]
    fn test_strict_mode_rejects_missing_fields() {
        let templates = Templates::new().unwrap();
        assert!(templates.render(CONFIG_TEMPLATE, &json!({})).is_err());
    }
}
