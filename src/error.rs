use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::HashMap;

/// The main error type for the admin console
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(HashMap<String, Vec<String>>),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A model admin is already registered under this key.
    #[error("The model {0} is already registered")]
    AlreadyRegistered(String),

    /// No admin route is registered under this name.
    #[error("Reverse for '{0}' not found")]
    NoReverseMatch(String),

    /// The device database could not be reached.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    /// Lets host handlers merged into the admin router use `?` on
    /// `anyhow::Result`.
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Standard error response body.
#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
    error_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field_errors: Option<HashMap<String, Vec<String>>>,
}

impl AdminError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    /// Build a validation error for a single field.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.into(), vec![message.into()]);
        Self::Validation(errors)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::AlreadyRegistered(_)
            | Self::NoReverseMatch(_)
            | Self::Storage(_)
            | Self::Template(_)
            | Self::Internal(_)
            | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message suitable for clients.
    ///
    /// Client errors (4xx) carry their message. Server errors are reduced to a
    /// generic message; the full error is only logged server-side.
    fn safe_message(&self) -> String {
        match self {
            Self::NotFound(_)
            | Self::BadRequest(_)
            | Self::Validation(_)
            | Self::Unauthorized(_)
            | Self::Forbidden(_) => self.to_string(),
            Self::ServiceUnavailable(_) => "Service unavailable".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Request failed"
            );
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let field_errors = match &self {
            Self::Validation(errors) => Some(errors.clone()),
            _ => None,
        };

        let body = Json(ErrorResponse {
            error: self.safe_message(),
            error_id,
            field_errors,
        });

        (status, body).into_response()
    }
}

/// Result type alias for admin operations and handlers
pub type Result<T> = std::result::Result<T, AdminError>;

impl From<serde_json::Error> for AdminError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            AdminError::BadRequest(format!("JSON error: {}", err))
        } else {
            AdminError::Internal(format!("JSON serialization error: {}", err))
        }
    }
}

impl From<handlebars::RenderError> for AdminError {
    fn from(err: handlebars::RenderError) -> Self {
        AdminError::Template(err.to_string())
    }
}

#[cfg(feature = "database")]
impl From<sea_orm::DbErr> for AdminError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err {
            sea_orm::DbErr::ConnectionAcquire(_) | sea_orm::DbErr::Conn(_) => {
                AdminError::ServiceUnavailable(format!("Connection error: {}", err))
            }
            _ => AdminError::Storage(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AdminError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AdminError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AdminError::field("key", "bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AdminError::service_unavailable("qr").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AdminError::NoReverseMatch("admin:nope".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_server_errors_hide_details() {
        let err = AdminError::storage("connection refused to 10.0.0.3");
        assert_eq!(err.safe_message(), "Internal server error");

        let err = AdminError::forbidden("sensitive data is hidden");
        assert_eq!(err.safe_message(), "Forbidden: sensitive data is hidden");
    }

    #[tokio::test]
    async fn test_host_handler_can_propagate_anyhow() {
        fn lookup() -> anyhow::Result<&'static str> {
            anyhow::bail!("token cache at 10.0.0.3 unreachable")
        }

        async fn handler() -> Result<&'static str> {
            let value = lookup()?;
            Ok(value)
        }

        let err = handler().await.unwrap_err();
        assert!(matches!(err, AdminError::Anyhow(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.safe_message(), "Internal server error");
    }

    #[cfg(feature = "database")]
    #[test]
    fn test_db_connection_errors_are_unavailable() {
        let err = AdminError::from(sea_orm::DbErr::Conn(sea_orm::RuntimeErr::Internal(
            "pool timed out".into(),
        )));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.safe_message(), "Service unavailable");

        let err = AdminError::from(sea_orm::DbErr::RecordNotInserted);
        assert!(matches!(err, AdminError::Storage(_)));
    }

    #[tokio::test]
    async fn test_validation_response_carries_field_errors() {
        let response = AdminError::field("digits", "must be 6 or 8").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["field_errors"]["digits"][0], "must be 6 or 8");
        assert!(body["error_id"].is_string());
    }
}
