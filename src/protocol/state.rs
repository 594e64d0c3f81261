use std::fmt;

use crate::core::{Error, Result};

/// Lifecycle of the TCNet engine
///
/// ```text
/// Stopped --start--> Started --run--> Running
///    ^                  |                |
///    +------stop--------+-------stop-----+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// No endpoint bound
    #[default]
    Stopped,
    /// Endpoints bound, no poll step taken yet
    Started,
    /// At least one poll step taken since start
    Running,
}

impl EngineState {
    /// Whether endpoints are bound
    pub fn is_active(self) -> bool {
        !matches!(self, EngineState::Stopped)
    }

    /// Transition taken by a successful `start`
    pub fn on_start(self) -> Result<EngineState> {
        match self {
            EngineState::Stopped => Ok(EngineState::Started),
            other => Err(Error::invalid_state(format!("Cannot start engine while {}", other))),
        }
    }

    /// Transition taken by a poll step; a stopped engine stays stopped
    pub fn on_run(self) -> EngineState {
        match self {
            EngineState::Stopped => EngineState::Stopped,
            EngineState::Started | EngineState::Running => EngineState::Running,
        }
    }

    pub fn on_stop(self) -> EngineState {
        EngineState::Stopped
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Stopped => "stopped",
            EngineState::Started => "started",
            EngineState::Running => "running",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let state = EngineState::default();
        assert!(!state.is_active());
        assert_eq!(state.on_run(), EngineState::Stopped);

        let started = state.on_start().unwrap();
        assert_eq!(started, EngineState::Started);
        assert!(started.is_active());

        let running = started.on_run();
        assert_eq!(running, EngineState::Running);
        assert_eq!(running.on_run(), EngineState::Running);
        assert_eq!(running.on_stop(), EngineState::Stopped);
    }

    #[test]
    fn test_double_start_rejected() {
        let err = EngineState::Running.on_start().unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(err.to_string(), "Invalid state: Cannot start engine while running");
    }
}
