//! Authenticated request pipeline with one refresh-and-retry on 401.

use crate::api::{payload_error, CURRENT_USER_PATH};
use crate::routes;
use crate::store::SessionStore;
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Method};
use crate::user::UserRecord;
use crate::{SessionError, SessionResult};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Surfaces a failure message to the user.
pub trait Notifier: Send + Sync {
    fn notify_error(&self, message: &str);
}

/// Writes user-facing messages to the log.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_error(&self, message: &str) {
        warn!(message, "Request failed");
    }
}

/// Moves the shell to another route.
pub trait Navigator: Send + Sync {
    fn redirect(&self, path: &str);
}

/// Remembers the last redirect target.
#[derive(Default)]
pub struct RecordingNavigator {
    last: Mutex<Option<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_redirect(&self) -> Option<String> {
        self.last.lock().clone()
    }

    pub fn take_redirect(&self) -> Option<String> {
        self.last.lock().take()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, path: &str) {
        info!(path, "Redirecting");
        *self.last.lock() = Some(path.to_string());
    }
}

enum Outcome {
    Success(Value),
    Unauthorized,
    Failed(SessionError),
}

/// HTTP client wrapper that attaches the session's bearer token and
/// transparently recovers from one expired access token.
pub struct RequestPipeline {
    transport: Arc<dyn HttpTransport>,
    session: Arc<SessionStore>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
}

impl RequestPipeline {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        session: Arc<SessionStore>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            transport,
            session,
            notifier,
            navigator,
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Send `request` and return the response body.
    ///
    /// A 401 triggers at most one refresh and one retry; the caller only sees
    /// the retried outcome or [`SessionError::AuthExpired`]. Every other
    /// failure is surfaced through the notifier once and returned.
    pub async fn send(&self, request: ApiRequest) -> SessionResult<Value> {
        let (sent_token, response) = self.dispatch(&request).await?;
        match classify(response) {
            Outcome::Success(body) => Ok(body),
            Outcome::Failed(e) => Err(self.surface(e)),
            Outcome::Unauthorized => self.recover(&request, sent_token).await,
        }
    }

    pub async fn get(&self, path: &str) -> SessionResult<Value> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> SessionResult<Value> {
        self.send(ApiRequest::post(path).with_body(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> SessionResult<Value> {
        self.send(ApiRequest::new(Method::Put, path).with_body(body))
            .await
    }

    pub async fn delete(&self, path: &str) -> SessionResult<Value> {
        self.send(ApiRequest::new(Method::Delete, path)).await
    }

    /// Fetch the current user and merge it into the stored record.
    pub async fn current_user(&self) -> SessionResult<UserRecord> {
        let body = self.get(CURRENT_USER_PATH).await?;
        let Some(record) = UserRecord::from_value(body) else {
            return Err(self.surface(SessionError::MalformedResponse(
                "current user response is not an object".to_string(),
            )));
        };
        self.session.update_user_info(&record.to_value())?;
        Ok(self.session.user().unwrap_or(record))
    }

    /// Attach the current token, if any, and send.
    async fn dispatch(&self, request: &ApiRequest) -> SessionResult<(Option<String>, ApiResponse)> {
        let mut outgoing = request.clone();
        let token = self.session.access_token();
        let sent_token = if token.is_empty() {
            None
        } else {
            outgoing.set_bearer(&token);
            Some(token)
        };

        match self.transport.send(&outgoing).await {
            Ok(response) => Ok((sent_token, response)),
            Err(e) => Err(self.surface(e)),
        }
    }

    async fn recover(
        &self,
        request: &ApiRequest,
        sent_token: Option<String>,
    ) -> SessionResult<Value> {
        let current = self.session.access_token();
        let refreshed = match sent_token {
            Some(sent) if !current.is_empty() && current != sent => {
                debug!(path = %request.path, "Token already refreshed, retrying");
                true
            }
            _ => {
                self.session.refresh_access_token().await
                    || self.token_replaced(sent_token.as_deref())
            }
        };

        if !refreshed {
            return Err(self.expire());
        }

        debug!(path = %request.path, "Retrying request after refresh");
        let (_, response) = self.dispatch(request).await?;
        match classify(response) {
            Outcome::Success(body) => Ok(body),
            Outcome::Failed(e) => Err(self.surface(e)),
            Outcome::Unauthorized => {
                warn!(path = %request.path, "Retried request was rejected again");
                Err(self.expire())
            }
        }
    }

    /// A login replaced the session while the refresh ran; the refresh result
    /// was discarded but the new token is usable.
    fn token_replaced(&self, sent_token: Option<&str>) -> bool {
        let current = self.session.access_token();
        let replaced = !current.is_empty() && Some(current.as_str()) != sent_token;
        if replaced {
            debug!("Session replaced during refresh, retrying with the new token");
        }
        replaced
    }

    /// Unrecoverable 401: log out and send the user to the login route.
    fn expire(&self) -> SessionError {
        self.session.logout();
        self.navigator.redirect(routes::LOGIN);
        let e = SessionError::AuthExpired;
        self.notifier.notify_error(&e.user_message());
        e
    }

    fn surface(&self, e: SessionError) -> SessionError {
        self.notifier.notify_error(&e.user_message());
        e
    }
}

/// A 401 always goes to recovery. Otherwise a payload error wins over the
/// status, then non-success statuses map to their error class.
fn classify(response: ApiResponse) -> Outcome {
    if response.status == 401 {
        return Outcome::Unauthorized;
    }
    if let Some(message) = payload_error(&response.body) {
        return Outcome::Failed(SessionError::MalformedResponse(message));
    }
    if !response.is_success() {
        return Outcome::Failed(SessionError::from_status(response.status));
    }
    Outcome::Success(response.body)
}
