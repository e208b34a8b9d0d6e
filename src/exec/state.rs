//! Streaming session state machine.

/// Current state of a streaming session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Connecting,
    Streaming,
    Stopping,
    Closed,
    Failed,
}

impl SessionState {
    /// Whether no further transition can happen.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

/// State machine for tracking session progress.
#[derive(Debug, Clone, Default)]
pub struct SessionStateMachine {
    state: SessionState,
    connect_attempts: usize,
    lines_relayed: usize,
}

impl SessionStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `new_state`, logging the change.
    pub fn transition(&mut self, new_state: SessionState) {
        tracing::debug!(from = ?self.state, to = ?new_state, "State transition");
        self.state = new_state;
    }

    pub fn record_connect_attempt(&mut self) {
        self.connect_attempts = self.connect_attempts.saturating_add(1);
    }

    pub fn record_line(&mut self) {
        self.lines_relayed = self.lines_relayed.saturating_add(1);
    }

    /// Counters gathered so far.
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            connect_attempts: self.connect_attempts,
            lines_relayed: self.lines_relayed,
        }
    }
}

/// Session statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub connect_attempts: usize,
    pub lines_relayed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_connecting() {
        let machine = SessionStateMachine::new();
        assert_eq!(machine.state(), SessionState::Connecting);
        assert!(!machine.state().is_terminal());
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Closed.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Streaming.is_terminal());
        assert!(!SessionState::Stopping.is_terminal());
    }

    #[test]
    fn test_counters() {
        let mut machine = SessionStateMachine::new();
        machine.record_connect_attempt();
        machine.record_connect_attempt();
        machine.record_line();
        machine.transition(SessionState::Streaming);

        assert_eq!(machine.state(), SessionState::Streaming);
        assert_eq!(
            machine.stats(),
            SessionStats {
                connect_attempts: 2,
                lines_relayed: 1,
            }
        );
    }
}
