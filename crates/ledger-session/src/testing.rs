//! Scripted collaborators for unit tests.

use crate::api::{AuthApi, LoginResponse, RefreshResponse};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport};
use crate::user::Credentials;
use crate::{SessionError, SessionResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// One scripted transport outcome.
#[derive(Debug, Clone)]
pub enum Scripted {
    Response(ApiResponse),
    NetworkFailure(String),
}

type Handler = Box<dyn Fn(&ApiRequest) -> Scripted + Send + Sync>;

/// Transport that records requests and replays scripted outcomes.
///
/// With a handler installed every request is answered by it; otherwise
/// outcomes are popped from a queue in order.
pub struct ScriptedTransport {
    queue: Mutex<VecDeque<Scripted>>,
    handler: Option<Handler>,
    requests: Mutex<Vec<ApiRequest>>,
    host: Option<String>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            handler: None,
            requests: Mutex::new(Vec::new()),
            host: Some("localhost".to_string()),
        }
    }

    pub fn with_handler(handler: impl Fn(&ApiRequest) -> Scripted + Send + Sync + 'static) -> Self {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::new()
        }
    }

    pub fn push(&self, status: u16, body: Value) {
        self.queue
            .lock()
            .push_back(Scripted::Response(ApiResponse::new(status, body)));
    }

    pub fn push_network_failure(&self, message: &str) {
        self.queue
            .lock()
            .push_back(Scripted::NetworkFailure(message.to_string()));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> SessionResult<ApiResponse> {
        self.requests.lock().push(request.clone());
        let outcome = match &self.handler {
            Some(handler) => handler(request),
            None => self
                .queue
                .lock()
                .pop_front()
                .unwrap_or_else(|| Scripted::NetworkFailure("no scripted response".into())),
        };
        match outcome {
            Scripted::Response(response) => Ok(response),
            Scripted::NetworkFailure(message) => Err(SessionError::NetworkFailure(message)),
        }
    }

    fn host(&self) -> Option<String> {
        self.host.clone()
    }
}

/// Auth collaborator with queued results and call counters.
#[derive(Default)]
pub struct FakeAuthApi {
    logins: Mutex<VecDeque<SessionResult<LoginResponse>>>,
    refreshes: Mutex<VecDeque<SessionResult<RefreshResponse>>>,
    registrations: Mutex<Vec<Value>>,
    login_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    /// When set, `refresh` waits for a notification before answering.
    refresh_gate: Option<Arc<Notify>>,
    cookie_host: Option<String>,
}

impl FakeAuthApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_refresh_gate(mut self, gate: Arc<Notify>) -> Self {
        self.refresh_gate = Some(gate);
        self
    }

    pub fn with_cookie_host(mut self, host: &str) -> Self {
        self.cookie_host = Some(host.to_string());
        self
    }

    pub fn push_login(&self, result: SessionResult<LoginResponse>) {
        self.logins.lock().push_back(result);
    }

    pub fn push_login_body(&self, body: Value) {
        self.push_login(Ok(LoginResponse::from_value(body)));
    }

    pub fn push_refresh(&self, result: SessionResult<RefreshResponse>) {
        self.refreshes.lock().push_back(result);
    }

    pub fn push_refresh_token(&self, token: &str) {
        self.push_refresh(Ok(RefreshResponse {
            access_token: Some(token.to_string()),
        }));
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn registrations(&self) -> Vec<Value> {
        self.registrations.lock().clone()
    }
}

fn unscripted<T>() -> SessionResult<T> {
    Err(SessionError::NetworkFailure("unscripted call".into()))
}

#[async_trait]
impl AuthApi for FakeAuthApi {
    async fn login(&self, _credentials: &Credentials) -> SessionResult<LoginResponse> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.logins.lock().pop_front().unwrap_or_else(unscripted)
    }

    async fn refresh(&self, _refresh_token: &str) -> SessionResult<RefreshResponse> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.refresh_gate {
            gate.notified().await;
        } else {
            tokio::task::yield_now().await;
        }
        self.refreshes.lock().pop_front().unwrap_or_else(unscripted)
    }

    async fn register(&self, user_data: &Value) -> SessionResult<Value> {
        self.registrations.lock().push(user_data.clone());
        Ok(serde_json::json!({"id": 99, "email": user_data.get("email")}))
    }

    fn cookie_host(&self) -> Option<String> {
        self.cookie_host.clone()
    }
}
