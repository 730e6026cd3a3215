//! Capture session state machine

use std::fmt;
use thiserror::Error;

/// Capture states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Recording,
    Stopping,
    Closed,
}

impl CaptureState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Stopping => "stopping",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while {current_state}")]
pub struct InvalidStateTransition {
    pub current_state: CaptureState,
    pub action: String,
}

/// Capture session entity.
///
/// State machine:
///   IDLE -> RECORDING (start)
///   RECORDING -> STOPPING (request_stop)
///   STOPPING -> CLOSED (close)
///
/// A session is single-use: once closed it cannot be restarted.
#[derive(Debug, Default)]
pub struct CaptureSession {
    state: CaptureState,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == CaptureState::Recording
    }

    pub fn is_closed(&self) -> bool {
        self.state == CaptureState::Closed
    }

    /// Transition from IDLE to RECORDING
    pub fn start(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(CaptureState::Idle, CaptureState::Recording, "start recording")
    }

    /// Transition from RECORDING to STOPPING
    pub fn request_stop(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(CaptureState::Recording, CaptureState::Stopping, "stop recording")
    }

    /// Transition from STOPPING to CLOSED
    pub fn close(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(CaptureState::Stopping, CaptureState::Closed, "close")
    }

    fn transition(
        &mut self,
        from: CaptureState,
        to: CaptureState,
        action: &str,
    ) -> Result<(), InvalidStateTransition> {
        if self.state != from {
            return Err(InvalidStateTransition {
                current_state: self.state,
                action: action.to_string(),
            });
        }
        self.state = to;
        Ok(())
    }
}
