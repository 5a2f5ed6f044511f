//! Principals and permission checks for admin views.

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::device::TotpDevice;
use crate::error::AdminError;

/// The authenticated actor making an admin request.
///
/// Authentication is the host's job: its middleware inserts a `Principal`
/// into the request extensions. Extracting a `Principal` is the staff gate
/// every admin view passes through.
///
/// # Example
///
/// ```rust,ignore
/// async fn authenticate(mut request: Request, next: Next) -> Result<Response, AdminError> {
///     let principal = load_principal_from_session(&request).await?;
///     request.extensions_mut().insert(principal);
///     Ok(next.run(request).await)
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub username: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    /// Permission codenames such as `otp_totp.view_totpdevice`.
    #[serde(default)]
    pub permissions: HashSet<String>,
}

impl Principal {
    /// An active staff member with no permissions.
    pub fn staff(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            is_active: true,
            is_staff: true,
            is_superuser: false,
            permissions: HashSet::new(),
        }
    }

    /// An active superuser.
    pub fn superuser(id: i64, username: impl Into<String>) -> Self {
        Self {
            is_superuser: true,
            ..Self::staff(id, username)
        }
    }

    pub fn with_permission(mut self, codename: impl Into<String>) -> Self {
        self.permissions.insert(codename.into());
        self
    }

    /// Whether the principal holds `codename`. Active superusers hold all.
    pub fn has_perm(&self, codename: &str) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_superuser || self.permissions.contains(codename)
    }
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AdminError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| AdminError::unauthorized("Authentication required"))?;

        if !principal.is_active || !principal.is_staff {
            tracing::warn!(
                principal = %principal.username,
                "Non-staff principal rejected from admin"
            );
            return Err(AdminError::forbidden("Staff access required"));
        }

        Ok(principal)
    }
}

/// Decides what a principal may do with TOTP devices.
///
/// `obj` is `None` for model-level checks (the changelist) and `Some` for a
/// specific device.
pub trait PermissionChecker: Send + Sync {
    fn has_view_permission(&self, principal: &Principal, obj: Option<&TotpDevice>) -> bool;

    fn has_change_permission(&self, principal: &Principal, obj: Option<&TotpDevice>) -> bool;

    fn has_add_permission(&self, principal: &Principal) -> bool;

    fn has_view_or_change_permission(
        &self,
        principal: &Principal,
        obj: Option<&TotpDevice>,
    ) -> bool {
        self.has_view_permission(principal, obj) || self.has_change_permission(principal, obj)
    }
}

/// Model-level permissions keyed by codename.
///
/// Holding `change` implies `view`, matching how admin changelists behave.
#[derive(Debug, Clone)]
pub struct ModelPermissions {
    view: String,
    change: String,
    add: String,
}

impl ModelPermissions {
    pub fn new(app_label: &str, model_name: &str) -> Self {
        Self {
            view: format!("{}.view_{}", app_label, model_name),
            change: format!("{}.change_{}", app_label, model_name),
            add: format!("{}.add_{}", app_label, model_name),
        }
    }

    pub fn view_codename(&self) -> &str {
        &self.view
    }

    pub fn change_codename(&self) -> &str {
        &self.change
    }

    pub fn add_codename(&self) -> &str {
        &self.add
    }
}

impl PermissionChecker for ModelPermissions {
    fn has_view_permission(&self, principal: &Principal, _obj: Option<&TotpDevice>) -> bool {
        principal.has_perm(&self.view) || principal.has_perm(&self.change)
    }

    fn has_change_permission(&self, principal: &Principal, _obj: Option<&TotpDevice>) -> bool {
        principal.has_perm(&self.change)
    }

    fn has_add_permission(&self, principal: &Principal) -> bool {
        principal.has_perm(&self.add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perms() -> ModelPermissions {
        ModelPermissions::new("otp_totp", "totpdevice")
    }

    #[test]
    fn test_codenames() {
        let p = perms();
        assert_eq!(p.view_codename(), "otp_totp.view_totpdevice");
        assert_eq!(p.change_codename(), "otp_totp.change_totpdevice");
        assert_eq!(p.add_codename(), "otp_totp.add_totpdevice");
    }

    #[test]
    fn test_view_or_change() {
        let p = perms();
        let viewer = Principal::staff(1, "viewer").with_permission("otp_totp.view_totpdevice");
        let changer = Principal::staff(2, "changer").with_permission("otp_totp.change_totpdevice");
        let nobody = Principal::staff(3, "nobody");

        assert!(p.has_view_or_change_permission(&viewer, None));
        assert!(!p.has_change_permission(&viewer, None));
        assert!(p.has_view_or_change_permission(&changer, None));
        assert!(!p.has_view_or_change_permission(&nobody, None));
    }

    #[test]
    fn test_superuser_and_inactive() {
        let p = perms();
        let root = Principal::superuser(1, "root");
        assert!(p.has_add_permission(&root));

        let mut inactive = Principal::superuser(2, "gone");
        inactive.is_active = false;
        assert!(!p.has_view_permission(&inactive, None));
    }
}
