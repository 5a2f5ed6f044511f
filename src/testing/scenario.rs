//! Alba-style request scenarios for admin routers.
//!
//! A scenario builds one request, runs it through the router with
//! `tower::ServiceExt::oneshot` and returns a [`ScenarioAssert`] for fluent
//! checks. No server is started.
//!
//! # Example
//!
//! ```rust,ignore
//! use otp_admin::testing::{self, fixtures};
//!
//! #[tokio::test]
//! async fn test_changelist() {
//!     let app = build_admin_router().await;
//!
//!     let body: serde_json::Value = testing::get(app, "/admin/otp_totp/totpdevice/")
//!         .as_principal(fixtures::superuser())
//!         .execute()
//!         .await
//!         .assert_ok()
//!         .assert_json()
//!         .json()
//!         .await;
//!
//!     assert_eq!(body["total"], 1);
//! }
//! ```

use axum::{
    Router,
    body::Body,
    http::{HeaderName, Method, Request, StatusCode, header},
    response::Response,
};
use serde::{Deserialize, Serialize};
use tower::ServiceExt;

use crate::admin::Principal;

/// Builder for a single request against a router.
pub struct Scenario {
    app: Router,
    request: Request<Body>,
}

impl Scenario {
    pub fn new(app: Router) -> Self {
        let mut request = Request::new(Body::empty());
        *request.method_mut() = Method::GET;
        Self { app, request }
    }

    pub fn method(mut self, method: Method) -> Self {
        *self.request.method_mut() = method;
        self
    }

    pub fn uri(mut self, uri: &str) -> Self {
        *self.request.uri_mut() = uri.parse().expect("invalid test URI");
        self
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.request.headers_mut().insert(
            HeaderName::from_bytes(key.as_bytes()).expect("invalid header name"),
            value.parse().expect("invalid header value"),
        );
        self
    }

    /// Authenticate the request as `principal`, the way host middleware would.
    pub fn as_principal(mut self, principal: Principal) -> Self {
        self.request.extensions_mut().insert(principal);
        self
    }

    /// Append query parameters to the URI.
    pub fn with_query(self, params: &[(&str, &str)]) -> Self {
        let uri = self.request.uri().clone();
        let mut parts: Vec<String> = uri.query().map(str::to_string).into_iter().collect();
        parts.extend(
            params
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))),
        );

        let uri = if parts.is_empty() {
            uri.path().to_string()
        } else {
            format!("{}?{}", uri.path(), parts.join("&"))
        };
        self.uri(&uri)
    }

    /// Send `body` as JSON.
    pub fn json_body<T: Serialize>(mut self, body: &T) -> Self {
        let json = serde_json::to_vec(body).expect("failed to serialize test body");
        *self.request.body_mut() = Body::from(json);
        self.request
            .headers_mut()
            .insert(header::CONTENT_TYPE, "application/json".parse().expect("static header"));
        self
    }

    pub async fn execute(self) -> ScenarioAssert {
        let response = self
            .app
            .oneshot(self.request)
            .await
            .expect("router is infallible");
        ScenarioAssert { response }
    }
}

/// Fluent assertions over a response.
pub struct ScenarioAssert {
    response: Response,
}

impl ScenarioAssert {
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn assert_status(self, expected: StatusCode) -> Self {
        assert_eq!(
            self.response.status(),
            expected,
            "Expected status {}, got {}",
            expected,
            self.response.status()
        );
        self
    }

    pub fn assert_ok(self) -> Self {
        self.assert_status(StatusCode::OK)
    }

    pub fn assert_created(self) -> Self {
        self.assert_status(StatusCode::CREATED)
    }

    pub fn assert_bad_request(self) -> Self {
        self.assert_status(StatusCode::BAD_REQUEST)
    }

    pub fn assert_unauthorized(self) -> Self {
        self.assert_status(StatusCode::UNAUTHORIZED)
    }

    pub fn assert_forbidden(self) -> Self {
        self.assert_status(StatusCode::FORBIDDEN)
    }

    pub fn assert_not_found(self) -> Self {
        self.assert_status(StatusCode::NOT_FOUND)
    }

    pub fn assert_service_unavailable(self) -> Self {
        self.assert_status(StatusCode::SERVICE_UNAVAILABLE)
    }

    pub fn assert_header(self, key: &str, expected: &str) -> Self {
        let value = self
            .response
            .headers()
            .get(key)
            .unwrap_or_else(|| panic!("Header '{}' not found", key))
            .to_str()
            .expect("non-ASCII header value");
        assert_eq!(value, expected, "Header '{}' value mismatch", key);
        self
    }

    /// Assert the `Content-Type` starts with `expected`.
    pub fn assert_content_type(self, expected: &str) -> Self {
        let content_type = self
            .response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(
            content_type.starts_with(expected),
            "Expected content type {}, got: {:?}",
            expected,
            content_type
        );
        self
    }

    pub fn assert_json(self) -> Self {
        self.assert_content_type("application/json")
    }

    pub fn assert_html(self) -> Self {
        self.assert_content_type("text/html")
    }

    pub async fn body_bytes(self) -> Vec<u8> {
        axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .expect("failed to read response body")
            .to_vec()
    }

    pub async fn body_string(self) -> String {
        String::from_utf8(self.body_bytes().await).expect("response body is not UTF-8")
    }

    pub async fn json<T: for<'de> Deserialize<'de>>(self) -> T {
        let bytes = self.body_bytes().await;
        serde_json::from_slice(&bytes).expect("Failed to parse JSON response")
    }

    pub async fn assert_empty_body(self) -> Self {
        let status = self.response.status();
        let headers = self.response.headers().clone();
        let bytes = self.body_bytes().await;
        assert!(bytes.is_empty(), "Expected empty body, got {} bytes", bytes.len());
        rebuild(status, headers, bytes)
    }

    /// Assert the body contains `text`.
    pub async fn assert_contains(self, text: &str) -> Self {
        let status = self.response.status();
        let headers = self.response.headers().clone();
        let bytes = self.body_bytes().await;
        let body = String::from_utf8_lossy(&bytes);
        assert!(
            body.contains(text),
            "Response body does not contain '{}'. Body: {}",
            text,
            body
        );
        rebuild(status, headers, bytes)
    }

    pub fn response(self) -> Response {
        self.response
    }
}

fn rebuild(status: StatusCode, headers: axum::http::HeaderMap, body: Vec<u8>) -> ScenarioAssert {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    ScenarioAssert { response }
}

pub fn get(app: Router, uri: &str) -> Scenario {
    Scenario::new(app).method(Method::GET).uri(uri)
}

pub fn post(app: Router, uri: &str) -> Scenario {
    Scenario::new(app).method(Method::POST).uri(uri)
}
