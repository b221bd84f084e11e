//! Session phase state machine using rust-fsm.
//!
//! The phase is purely observational. Authorization decisions read the
//! tokens held by the store, never the phase.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐   SessionRestored    ┌─────────────────┐
//! │    SignedOut    │ ───────────────────► │    SignedIn     │
//! └────────┬────────┘                      └──┬───────────┬──┘
//!          │ LoginAttempt                     │           │ RefreshStarted
//!          ▼                                  │           ▼
//! ┌─────────────────┐   LoginSuccess          │  ┌─────────────────┐
//! │    LoggingIn    │ ────────────────────────┘  │   Refreshing    │
//! └────────┬────────┘                            └────────┬────────┘
//!          │ LoginFailed                                  │ RefreshSuccess ──► SignedIn
//!          ▼                                              │ LogoutRequested
//!      SignedOut                                          ▼
//!                                                ┌─────────────────┐
//!                     LogoutRequested (any) ───► │   SigningOut    │
//!                                                └────────┬────────┘
//!                                                         │ LogoutComplete
//!                                                         ▼
//!                                                     SignedOut
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Generates `session_machine::{State, Input, StateMachine, Impl}`.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(SignedOut)

    SignedOut => {
        LoginAttempt => LoggingIn,
        SessionRestored => SignedIn,
        // Logout is always allowed so storage can be wiped from any phase
        LogoutRequested => SigningOut
    },
    LoggingIn => {
        LoginSuccess => SignedIn,
        LoginFailed => SignedOut,
        // A failed re-login leaves the previous session in place
        LoginFailedWithSession => SignedIn,
        LogoutRequested => SigningOut
    },
    SignedIn => {
        LoginAttempt => LoggingIn,
        RefreshStarted => Refreshing,
        LogoutRequested => SigningOut
    },
    Refreshing => {
        RefreshSuccess => SignedIn,
        LoginAttempt => LoggingIn,
        LogoutRequested => SigningOut
    },
    SigningOut => {
        LogoutComplete => SignedOut
    }
}

pub use session_machine::Input as PhaseInput;
pub use session_machine::State as PhaseMachineState;
pub use session_machine::StateMachine as PhaseMachine;

/// Public view of the session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    SignedOut,
    LoggingIn,
    SignedIn,
    Refreshing,
    SigningOut,
}

impl SessionPhase {
    /// Returns true while a network round trip is changing the session.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionPhase::LoggingIn | SessionPhase::Refreshing | SessionPhase::SigningOut
        )
    }
}

impl From<&PhaseMachineState> for SessionPhase {
    fn from(state: &PhaseMachineState) -> Self {
        match state {
            PhaseMachineState::SignedOut => SessionPhase::SignedOut,
            PhaseMachineState::LoggingIn => SessionPhase::LoggingIn,
            PhaseMachineState::SignedIn => SessionPhase::SignedIn,
            PhaseMachineState::Refreshing => SessionPhase::Refreshing,
            PhaseMachineState::SigningOut => SessionPhase::SigningOut,
        }
    }
}

/// Payload passed to the phase callback on every change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseChanged {
    pub previous: SessionPhase,
    pub phase: SessionPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in() -> PhaseMachine {
        let mut machine = PhaseMachine::new();
        machine.consume(&PhaseInput::LoginAttempt).unwrap();
        machine.consume(&PhaseInput::LoginSuccess).unwrap();
        machine
    }

    #[test]
    fn test_initial_state_is_signed_out() {
        let machine = PhaseMachine::new();
        assert_eq!(*machine.state(), PhaseMachineState::SignedOut);
    }

    #[test]
    fn test_login_flow() {
        let machine = signed_in();
        assert_eq!(*machine.state(), PhaseMachineState::SignedIn);
    }

    #[test]
    fn test_failed_login_returns_to_signed_out() {
        let mut machine = PhaseMachine::new();
        machine.consume(&PhaseInput::LoginAttempt).unwrap();
        machine.consume(&PhaseInput::LoginFailed).unwrap();
        assert_eq!(*machine.state(), PhaseMachineState::SignedOut);
    }

    #[test]
    fn test_failed_relogin_keeps_session() {
        let mut machine = signed_in();
        machine.consume(&PhaseInput::LoginAttempt).unwrap();
        machine.consume(&PhaseInput::LoginFailedWithSession).unwrap();
        assert_eq!(*machine.state(), PhaseMachineState::SignedIn);
    }

    #[test]
    fn test_refresh_cycle() {
        let mut machine = signed_in();
        machine.consume(&PhaseInput::RefreshStarted).unwrap();
        assert_eq!(*machine.state(), PhaseMachineState::Refreshing);
        machine.consume(&PhaseInput::RefreshSuccess).unwrap();
        assert_eq!(*machine.state(), PhaseMachineState::SignedIn);
    }

    #[test]
    fn test_logout_from_refreshing() {
        let mut machine = signed_in();
        machine.consume(&PhaseInput::RefreshStarted).unwrap();
        machine.consume(&PhaseInput::LogoutRequested).unwrap();
        machine.consume(&PhaseInput::LogoutComplete).unwrap();
        assert_eq!(*machine.state(), PhaseMachineState::SignedOut);
    }

    #[test]
    fn test_restore_skips_login() {
        let mut machine = PhaseMachine::new();
        machine.consume(&PhaseInput::SessionRestored).unwrap();
        assert_eq!(*machine.state(), PhaseMachineState::SignedIn);
    }

    #[test]
    fn test_invalid_transitions_return_error() {
        let mut machine = PhaseMachine::new();
        assert!(machine.consume(&PhaseInput::RefreshStarted).is_err());
        assert!(machine.consume(&PhaseInput::LoginSuccess).is_err());

        let mut machine = signed_in();
        assert!(machine.consume(&PhaseInput::RefreshSuccess).is_err());
        assert!(machine.consume(&PhaseInput::SessionRestored).is_err());
    }

    #[test]
    fn test_phase_conversion_and_transience() {
        assert_eq!(
            SessionPhase::from(&PhaseMachineState::Refreshing),
            SessionPhase::Refreshing
        );
        assert_eq!(
            SessionPhase::from(&PhaseMachineState::SignedOut),
            SessionPhase::SignedOut
        );
        assert!(SessionPhase::LoggingIn.is_transient());
        assert!(SessionPhase::SigningOut.is_transient());
        assert!(!SessionPhase::SignedIn.is_transient());
        assert!(!SessionPhase::SignedOut.is_transient());
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        let json = serde_json::to_string(&SessionPhase::SigningOut).unwrap();
        assert_eq!(json, "\"signing_out\"");
    }
}
