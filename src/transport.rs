//! Transport capability traits.
//!
//! The session does not speak the device's discovery/handshake bytes itself;
//! it drives an injected transport through these traits. A production
//! implementation wraps the robot's TCP handshake plus UDP command/video
//! ports; tests inject channel-backed fakes.

use crate::Result;
use crate::command::EncodedCommand;

/// Establishes a link to the robot.
///
/// Returns the two halves the session needs: an outbound command sink and an
/// inbound video source. The session owns both exclusively for the lifetime
/// of the connection; the physical device accepts a single controller.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connect to the robot at `address`.
    ///
    /// The session wraps this call in its own connect timeout; implementations
    /// may block indefinitely waiting for the device.
    async fn connect(&self, address: &str) -> Result<TransportPair>;
}

/// Both halves of a connected transport.
pub struct TransportPair {
    pub commands: Box<dyn CommandSink>,
    pub video: Box<dyn VideoSource>,
}

/// Outbound half: frames and sends encoded commands.
///
/// Implementations own sequence numbering and acknowledgement bookkeeping;
/// the session only decides *what* goes on the wire and *when*.
#[async_trait::async_trait]
pub trait CommandSink: Send + 'static {
    /// Send one encoded command.
    async fn send(&mut self, command: &EncodedCommand) -> Result<()>;

    /// Best-effort link teardown. Errors are logged by the session, never
    /// propagated to the caller of `disconnect`.
    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Inbound half: a lazy, non-restartable sequence of raw video chunks.
#[async_trait::async_trait]
pub trait VideoSource: Send + 'static {
    /// Next raw chunk from the video stream.
    ///
    /// Returns:
    /// - `Ok(Some(chunk))` - more bytes arrived
    /// - `Ok(None)` - the stream ended (normal termination)
    /// - `Err(e)` - transport-level read failure
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}
