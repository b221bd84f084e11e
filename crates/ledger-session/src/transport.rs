//! HTTP transport seam and its reqwest implementation.

use crate::{SessionError, SessionResult};
use async_trait::async_trait;
use ledger_storage::CookieJar;
use reqwest::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP method of an [`ApiRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// A request relative to the API base URL.
///
/// Cloneable so the pipeline can re-issue it after a refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn with_json<T: Serialize>(mut self, body: &T) -> SessionResult<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set a header, replacing any existing value (names compare case-insensitively).
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_bearer(&mut self, token: &str) {
        self.set_header(AUTHORIZATION.as_str(), format!("Bearer {}", token));
    }

    /// Token carried in the `Authorization` header, if any.
    pub fn bearer(&self) -> Option<&str> {
        self.header(AUTHORIZATION.as_str())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

/// Status plus decoded body.
///
/// An empty body decodes to `Null`; a body that is not JSON is kept as a
/// string.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests to the API.
///
/// Returning `Err` means the request never produced a response
/// ([`SessionError::NetworkFailure`]); every HTTP status comes back as `Ok`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> SessionResult<ApiResponse>;

    /// Host requests are sent to; used to scope cookie cleanup.
    fn host(&self) -> Option<String>;
}

/// [`HttpTransport`] backed by reqwest.
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
    cookies: Option<Arc<CookieJar>>,
}

impl ReqwestTransport {
    pub fn new(base_url: Url, timeout: Duration) -> SessionResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            cookies: None,
        })
    }

    /// Capture `Set-Cookie` headers into `jar` and send matching cookies back.
    pub fn with_cookie_jar(mut self, jar: Arc<CookieJar>) -> Self {
        self.cookies = Some(jar);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> SessionResult<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{}/{}", base, path))?)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> SessionResult<ApiResponse> {
        let url = self.url_for(&request.path)?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        debug!(method = request.method.as_str(), url = %url, "Sending request");

        let mut builder = self.client.request(method, url.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let (Some(jar), Some(host)) = (&self.cookies, url.host_str()) {
            if let Some(cookie) = jar.header_for(host) {
                builder = builder.header(COOKIE, cookie);
            }
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SessionError::NetworkFailure(e.to_string()))?;
        let status = response.status().as_u16();

        if let (Some(jar), Some(host)) = (&self.cookies, url.host_str()) {
            for value in response.headers().get_all(SET_COOKIE) {
                let Ok(header) = value.to_str() else {
                    continue;
                };
                if let Err(e) = jar.store_set_cookie(host, header) {
                    warn!(error = %e, "Failed to store cookie");
                }
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SessionError::NetworkFailure(e.to_string()))?;
        let body = decode_body(&bytes);

        debug!(status, "Received response");
        Ok(ApiResponse { status, body })
    }

    fn host(&self) -> Option<String> {
        self.base_url.host_str().map(str::to_string)
    }
}

fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
