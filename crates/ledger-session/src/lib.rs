//! Session lifecycle for the Project Ledger client.
//!
//! This crate provides:
//! - Login, registration and logout against the ledger API
//! - Single-flight access token refresh
//! - An independent monitoring session for the admin surface
//! - An authenticated request pipeline that recovers from one expired token
//! - Route table and pre-navigation guard
//! - Explicit FSM-based session phase tracking

mod api;
mod error;
mod guard;
mod phase;
mod pipeline;
pub mod routes;
mod store;
mod transport;
mod user;

#[cfg(test)]
mod testing;

pub use api::{
    check_response, payload_error, AuthApi, HttpAuthApi, LoginResponse, RefreshResponse,
    CURRENT_USER_PATH, LOGIN_PATH, REFRESH_PATH, REGISTER_PATH,
};
pub use error::{SessionError, SessionResult};
pub use guard::{decide, AuthFlags, GuardDecision, Navigation, RouteGuard};
pub use phase::session_machine;
pub use phase::{PhaseChanged, PhaseInput, PhaseMachine, PhaseMachineState, SessionPhase};
pub use pipeline::{Navigator, Notifier, RecordingNavigator, RequestPipeline, TracingNotifier};
pub use routes::{ResolvedRoute, Route, RouteMeta, RouteTable};
pub use store::{
    AcceptAllTokens, PhaseCallback, RestoreReport, SessionSnapshot, SessionStore, TokenValidator,
    DEFAULT_SYSTEM_NAME,
};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, ReqwestTransport, DEFAULT_TIMEOUT};
pub use user::{Credentials, LoginUser, UserRecord, DEFAULT_USERNAME};
