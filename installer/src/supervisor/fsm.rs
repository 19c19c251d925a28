//! Finite State Machine for a supervised application run

use serde::{Deserialize, Serialize};

/// Run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Child not yet launched
    Starting,

    /// Child launched, watching output
    Running,

    /// A readiness pattern was seen; termination requested
    SignaledReady,

    /// The tick budget ran out; termination requested
    TimedOut,

    /// Child has stopped
    Terminated,
}

/// How a run ended, kept for logging once the child is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Ready,
    TimedOut,
    /// The child stopped before signalling readiness
    Exited,
}

/// Run event
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// Child process spawned
    Launched,

    /// A readiness pattern appeared in the output
    ReadinessSeen(String),

    /// Tick counter reached the timeout
    TimeoutElapsed,

    /// Close, exit, disconnect or error: the child is gone
    ChildStopped,
}

/// Supervised run FSM
#[derive(Debug, Clone)]
pub struct RunFsm {
    state: RunState,
    outcome: Option<RunOutcome>,
    matched: Option<String>,
}

impl RunFsm {
    /// Create a new FSM in starting state
    pub fn new() -> Self {
        Self {
            state: RunState::Starting,
            outcome: None,
            matched: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Outcome once the run has left `Running`
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.outcome
    }

    /// Readiness pattern that ended the run
    pub fn matched(&self) -> Option<&str> {
        self.matched.as_deref()
    }

    /// Whether the child should be asked to stop
    pub fn termination_requested(&self) -> bool {
        matches!(self.state, RunState::SignaledReady | RunState::TimedOut)
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: RunEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            // From Starting
            (RunState::Starting, RunEvent::Launched) => RunState::Running,
            (RunState::Starting, RunEvent::ChildStopped) => {
                self.outcome = Some(RunOutcome::Exited);
                RunState::Terminated
            }

            // From Running
            (RunState::Running, RunEvent::ReadinessSeen(pattern)) => {
                self.matched = Some(pattern.clone());
                self.outcome = Some(RunOutcome::Ready);
                RunState::SignaledReady
            }
            (RunState::Running, RunEvent::TimeoutElapsed) => {
                self.outcome = Some(RunOutcome::TimedOut);
                RunState::TimedOut
            }
            (RunState::Running, RunEvent::ChildStopped) => {
                self.outcome = Some(RunOutcome::Exited);
                RunState::Terminated
            }

            // Termination requested
            (RunState::SignaledReady | RunState::TimedOut, RunEvent::ChildStopped) => {
                RunState::Terminated
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for RunFsm {
    fn default() -> Self {
        Self::new()
    }
}
