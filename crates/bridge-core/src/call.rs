//! Call identity and the session state machine (C4).
//!
//! Grounded on `InternalSessionRegistry::update_session_state`'s
//! validate-then-mutate shape: state only ever moves forward through this
//! explicit transition table, never mutated directly by callers.

use std::fmt;

use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(pub String);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CallId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CallId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A call's lifecycle state (spec.md §4.4's `init -> accepting -> active ->
/// ending -> closed` state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Init,
    Accepting,
    Active,
    Ending,
    Closed,
}

impl CallState {
    /// Whether `self -> next` is an allowed transition.
    pub fn can_transition_to(self, next: CallState) -> bool {
        use CallState::*;
        matches!(
            (self, next),
            (Init, Accepting)
                | (Accepting, Active)
                | (Accepting, Ending)
                | (Active, Ending)
                | (Ending, Closed)
                // Any live state may fail straight to Ending on a hard error.
                | (Init, Ending)
        )
    }
}

/// A live call, mediating between one telephony connection and one
/// realtime AI peer connection.
#[derive(Debug, Clone)]
pub struct Call {
    pub id: CallId,
    pub state: CallState,
    pub dialect: String,
    pub caller: String,
    pub bot: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Call {
    pub fn new(id: CallId, dialect: impl Into<String>, caller: impl Into<String>, bot: impl Into<String>) -> Self {
        Self {
            id,
            state: CallState::Init,
            dialect: dialect.into(),
            caller: caller.into(),
            bot: bot.into(),
            created_at: chrono::Utc::now(),
        }
    }

    /// Attempt to move to `next`, rejecting disallowed transitions
    /// (spec.md §4.4's invariant: state never moves backward or skips).
    pub fn transition_to(&mut self, next: CallState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(BridgeError::InvalidTransition { from: self.state, to: next });
        }
        self.state = next;
        Ok(())
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, CallState::Accepting | CallState::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let mut call = Call::new(CallId::from("c1"), "audiocodes", "caller", "bot");
        assert_eq!(call.state, CallState::Init);
        call.transition_to(CallState::Accepting).unwrap();
        call.transition_to(CallState::Active).unwrap();
        call.transition_to(CallState::Ending).unwrap();
        call.transition_to(CallState::Closed).unwrap();
    }

    #[test]
    fn rejects_backward_transition() {
        let mut call = Call::new(CallId::from("c1"), "audiocodes", "caller", "bot");
        call.transition_to(CallState::Accepting).unwrap();
        call.transition_to(CallState::Active).unwrap();
        let err = call.transition_to(CallState::Accepting).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidTransition { .. }));
    }

    #[test]
    fn rejects_skipping_a_state() {
        let mut call = Call::new(CallId::from("c1"), "audiocodes", "caller", "bot");
        assert!(call.transition_to(CallState::Active).is_err());
    }

    #[test]
    fn init_can_fail_straight_to_ending() {
        let mut call = Call::new(CallId::from("c1"), "audiocodes", "caller", "bot");
        call.transition_to(CallState::Ending).unwrap();
    }
}
