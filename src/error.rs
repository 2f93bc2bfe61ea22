//! Error types for robot session operations.
//!
//! All caller-facing failures map to a distinct [`RobotError`] variant so the
//! tool layer above can report something more useful than a generic failure.
//!
//! ## Error Categories
//!
//! - **Connection Errors**: the robot is unreachable, the connect timeout
//!   expired, or the link died under an explicit dispatch
//! - **Not Connected**: a command or snapshot was attempted without a live
//!   session
//! - **Unknown Action**: an action/posture/animation name outside the device
//!   vocabulary, which is a caller bug and never retried
//! - **No Frame**: the video stream has not produced a frame yet
//!
//! Transient faults (a dropped keepalive packet, a corrupt video chunk) are
//! recovered inside the session's background tasks and never appear here.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use sumolink::RobotError;
//!
//! let error = RobotError::connection_failed("robot not reachable");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T, E = RobotError> = std::result::Result<T, E>;

/// Main error type for robot session operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RobotError {
    #[error("Failed to reach robot: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Not connected to robot")]
    NotConnected,

    #[error("Unknown {kind} '{name}'")]
    UnknownAction { kind: &'static str, name: String },

    #[error("No camera frame received yet")]
    NoFrame,
}

impl RobotError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            RobotError::Connection { .. } => true,
            RobotError::NotConnected => false,
            RobotError::UnknownAction { .. } => false,
            // A frame usually shows up within a few hundred milliseconds of
            // connecting, so asking again later is reasonable.
            RobotError::NoFrame => true,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            RobotError::Connection { .. } => vec![
                "Ensure the robot is powered on",
                "Join the robot's WiFi network (JumpingSumo-XXXXXX)",
                "Verify the robot's IP address is reachable",
                "Check that no other controller is connected to the robot",
            ],
            RobotError::NotConnected => vec![
                "Call connect() to establish a session",
                "Check status() to confirm the session state",
            ],
            RobotError::UnknownAction { .. } => vec![
                "Check the action name spelling",
                "See the kind enum documentation for supported names",
            ],
            RobotError::NoFrame => vec![
                "Wait a moment for the video stream to warm up",
                "Verify the session is still connected",
            ],
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        RobotError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        RobotError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for unknown action names.
    pub fn unknown_action(kind: &'static str, name: impl Into<String>) -> Self {
        RobotError::UnknownAction { kind, name: name.into() }
    }
}

impl From<std::io::Error> for RobotError {
    fn from(err: std::io::Error) -> Self {
        RobotError::Connection {
            reason: "I/O error on robot link".to_string(),
            source: Some(Box::new(err)),
        }
    }
}
