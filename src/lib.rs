//! Async Rust control session for the Parrot Jumping Sumo WiFi robot.
//!
//! Sumolink owns one live link to the robot and everything that keeps it
//! healthy: a 40Hz keepalive scheduler, a hold loop that re-asserts motion
//! commands for their full duration, last-command-wins preemption, and a
//! best-effort video ingest loop that always exposes the newest camera frame.
//!
//! # Features
//!
//! - **Session lifecycle**: connect/disconnect with supervised background tasks
//! - **Motion & actions**: driving, jumps, kicks, postures, animations, photos
//! - **Live camera**: non-blocking snapshots plus throttled frame streams
//! - **Pluggable transport**: the wire protocol is injected through traits,
//!   so tests and simulators run without a robot
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use sumolink::{JumpKind, Session, SessionConfig};
//! # struct WifiConnector;
//! # #[async_trait::async_trait]
//! # impl sumolink::Connector for WifiConnector {
//! #     async fn connect(&self, _address: &str) -> sumolink::Result<sumolink::TransportPair> {
//! #         Err(sumolink::RobotError::connection_failed("doc example"))
//! #     }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::new(WifiConnector, SessionConfig::default());
//!     session.connect().await?;
//!
//!     session.drive(60, 0, Duration::from_secs(1)).await?;
//!     session.jump(JumpKind::High).await?;
//!
//!     let frame = session.snapshot_frame().await?;
//!     println!("camera frame: {} bytes", frame.len());
//!
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod command;
pub mod config;
mod error;
#[cfg(test)]
pub(crate) mod test_utils;

// Session architecture
pub mod session;
pub mod stream;
pub mod transport;
pub mod video;

// Core exports
pub use command::{
    AnimationKind, DiscreteAction, EncodedCommand, JumpKind, MotionCommand, PostureKind,
    RobotCommand,
};
pub use config::SessionConfig;
pub use error::*;
pub use session::{DispatchOutcome, Session, SessionStatus};
pub use transport::{CommandSink, Connector, TransportPair, VideoSource};
pub use video::{Frame, FrameRate};

/// Unified entry point for robot sessions.
///
/// Thin convenience over [`Session`]: builds the session and connects in one
/// call.
///
/// # Example
///
/// ```rust,no_run
/// use sumolink::{Sumolink, SessionConfig};
/// # struct WifiConnector;
/// # #[async_trait::async_trait]
/// # impl sumolink::Connector for WifiConnector {
/// #     async fn connect(&self, _address: &str) -> sumolink::Result<sumolink::TransportPair> {
/// #         Err(sumolink::RobotError::connection_failed("doc example"))
/// #     }
/// # }
///
/// #[tokio::main]
/// async fn main() -> sumolink::Result<()> {
///     let session = Sumolink::connect(WifiConnector, SessionConfig::default()).await?;
///     // Use session...
///     session.disconnect().await;
///     Ok(())
/// }
/// ```
pub struct Sumolink;

impl Sumolink {
    /// Connect to a robot through the given transport.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Connection`] when the robot cannot be reached
    /// within the configured timeout.
    pub async fn connect(connector: impl Connector, config: SessionConfig) -> Result<Session> {
        let session = Session::new(connector, config);
        session.connect().await?;
        Ok(session)
    }
}
