//! Authentication endpoints consumed by the session store.

use crate::transport::{ApiRequest, ApiResponse, HttpTransport};
use crate::user::Credentials;
use crate::{SessionError, SessionResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const LOGIN_PATH: &str = "/api/v1/login";
pub const REFRESH_PATH: &str = "/api/v1/auth/refresh";
pub const REGISTER_PATH: &str = "/api/v1/auth/register";
pub const CURRENT_USER_PATH: &str = "/api/v1/auth/me";

/// Login response. Fields are optional because the store decides what a
/// usable response is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<Value>,
}

impl LoginResponse {
    pub fn from_value(body: Value) -> Self {
        let Value::Object(mut map) = body else {
            return Self::default();
        };
        Self {
            access_token: take_token(map.remove("access_token")),
            refresh_token: take_token(map.remove("refresh_token")),
            user: map.remove("user"),
        }
    }
}

/// Refresh response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshResponse {
    pub access_token: Option<String>,
}

impl RefreshResponse {
    pub fn from_value(body: Value) -> Self {
        Self {
            access_token: take_token(body.get("access_token").cloned()),
        }
    }
}

fn take_token(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(token)) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// Message carried in a payload's `error` or `detail` field, if non-empty.
///
/// Strings are used as-is; any other non-null value is rendered as JSON text.
pub fn payload_error(body: &Value) -> Option<String> {
    let map = body.as_object()?;
    ["error", "detail"].iter().find_map(|field| match map.get(*field) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    })
}

/// Body of a successful response, or the error it represents.
pub fn check_response(response: ApiResponse) -> SessionResult<Value> {
    if let Some(message) = payload_error(&response.body) {
        return Err(SessionError::MalformedResponse(message));
    }
    if !response.is_success() {
        return Err(SessionError::from_status(response.status));
    }
    Ok(response.body)
}

/// Authentication collaborator.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> SessionResult<LoginResponse>;

    async fn refresh(&self, refresh_token: &str) -> SessionResult<RefreshResponse>;

    async fn register(&self, user_data: &Value) -> SessionResult<Value>;

    /// Host whose cookies are expired on logout.
    fn cookie_host(&self) -> Option<String> {
        None
    }
}

/// [`AuthApi`] over an [`HttpTransport`].
///
/// These calls bypass the request pipeline: they never carry a bearer token
/// and a 401 from them is final.
pub struct HttpAuthApi {
    transport: Arc<dyn HttpTransport>,
}

impl HttpAuthApi {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, credentials: &Credentials) -> SessionResult<LoginResponse> {
        debug!(email = %credentials.email, "Calling login endpoint");
        let request = ApiRequest::post(LOGIN_PATH).with_json(credentials)?;
        let body = check_response(self.transport.send(&request).await?)?;
        Ok(LoginResponse::from_value(body))
    }

    async fn refresh(&self, refresh_token: &str) -> SessionResult<RefreshResponse> {
        let request =
            ApiRequest::post(REFRESH_PATH).with_body(json!({ "refresh_token": refresh_token }));
        let response = self.transport.send(&request).await?;
        if !response.is_success() {
            warn!(status = response.status, "Refresh endpoint rejected the request");
        }
        let body = check_response(response)?;
        Ok(RefreshResponse::from_value(body))
    }

    async fn register(&self, user_data: &Value) -> SessionResult<Value> {
        let request = ApiRequest::post(REGISTER_PATH).with_body(user_data.clone());
        check_response(self.transport.send(&request).await?)
    }

    fn cookie_host(&self) -> Option<String> {
        self.transport.host()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use crate::transport::Method;

    #[test]
    fn test_payload_error_fields() {
        assert_eq!(payload_error(&json!({"error": "bad"})).as_deref(), Some("bad"));
        assert_eq!(payload_error(&json!({"detail": "nope"})).as_deref(), Some("nope"));
        assert_eq!(
            payload_error(&json!({"detail": [{"msg": "field required"}]})).as_deref(),
            Some(r#"[{"msg":"field required"}]"#)
        );
        assert!(payload_error(&json!({"error": ""})).is_none());
        assert!(payload_error(&json!({"error": null, "data": 1})).is_none());
        assert!(payload_error(&json!([1, 2])).is_none());
        assert!(payload_error(&Value::Null).is_none());
    }

    #[test]
    fn test_check_response_prefers_payload_message() {
        let err = check_response(ApiResponse::new(200, json!({"error": "quota"}))).unwrap_err();
        assert!(matches!(err, SessionError::MalformedResponse(ref m) if m == "quota"));

        let err = check_response(ApiResponse::new(403, json!({}))).unwrap_err();
        assert!(matches!(err, SessionError::PermissionDenied));

        let body = check_response(ApiResponse::new(200, json!({"id": 1}))).unwrap();
        assert_eq!(body, json!({"id": 1}));
    }

    #[test]
    fn test_login_response_parsing() {
        let parsed = LoginResponse::from_value(json!({
            "access_token": "A",
            "refresh_token": "R",
            "user": {"id": 1}
        }));
        assert_eq!(parsed.access_token.as_deref(), Some("A"));
        assert_eq!(parsed.refresh_token.as_deref(), Some("R"));
        assert_eq!(parsed.user, Some(json!({"id": 1})));

        let empty = LoginResponse::from_value(json!({"access_token": "", "user": "x"}));
        assert!(empty.access_token.is_none());
        assert_eq!(empty.user, Some(json!("x")));

        assert_eq!(LoginResponse::from_value(json!("oops")), LoginResponse::default());
    }

    #[tokio::test]
    async fn test_login_posts_credentials() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(200, json!({"access_token": "A", "refresh_token": "R"}));
        let api = HttpAuthApi::new(transport.clone());

        let response = api.login(&Credentials::new("a@b", "pw")).await.unwrap();
        assert_eq!(response.access_token.as_deref(), Some("A"));

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::Post);
        assert_eq!(sent[0].path, LOGIN_PATH);
        assert_eq!(sent[0].body, Some(json!({"email": "a@b", "password": "pw"})));
        assert!(sent[0].bearer().is_none());
    }

    #[tokio::test]
    async fn test_login_rejection_surfaces_detail() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(401, json!({"detail": "Incorrect email or password"}));
        let api = HttpAuthApi::new(transport);

        let err = api.login(&Credentials::new("a@b", "bad")).await.unwrap_err();
        assert_eq!(err.user_message(), "Incorrect email or password");
    }

    #[tokio::test]
    async fn test_refresh_sends_refresh_token() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(200, json!({"access_token": "B"}));
        let api = HttpAuthApi::new(transport.clone());

        let response = api.refresh("R").await.unwrap();
        assert_eq!(response.access_token.as_deref(), Some("B"));
        assert_eq!(transport.requests()[0].path, REFRESH_PATH);
        assert_eq!(
            transport.requests()[0].body,
            Some(json!({"refresh_token": "R"}))
        );
    }

    #[tokio::test]
    async fn test_network_failure_propagates() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_network_failure("connection refused");
        let api = HttpAuthApi::new(transport);

        let err = api.register(&json!({"email": "a@b"})).await.unwrap_err();
        assert!(matches!(err, SessionError::NetworkFailure(_)));
    }
}
