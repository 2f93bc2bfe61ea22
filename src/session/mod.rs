//! Robot session management.
//!
//! [`Session`] owns the single live link to the robot: it drives the connect
//! and disconnect lifecycle, arbitrates the outbound command channel between
//! the keepalive scheduler and explicit dispatches, and supervises the frame
//! ingest loop. The physical device accepts one controller, so the transport
//! halves are owned exclusively here while connected.

mod ingest;
mod keepalive;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use futures::{Stream, StreamExt};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{
    AnimationKind, DiscreteAction, JumpKind, MotionCommand, PostureKind, RobotCommand,
};
use crate::config::SessionConfig;
use crate::error::{Result, RobotError};
use crate::stream::ThrottleExt;
use crate::transport::{CommandSink, Connector};
use crate::video::{Frame, FrameRate};

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Disconnecting => "disconnecting",
        };
        f.write_str(label)
    }
}

/// How a dispatch finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The command ran for its full duration (or was a one-shot action).
    Completed,
    /// A newer command took over before the duration elapsed.
    Preempted,
    /// The session disconnected while the command was being held.
    Disconnected,
}

/// Arbitration state between hold loops and the keepalive scheduler.
///
/// Each motion dispatch claims a fresh generation and publishes it as the
/// active hold. A hold loop that no longer owns the active generation has
/// been preempted and exits without sending again; the keepalive scheduler
/// skips ticks while any generation is active.
#[derive(Debug, Default)]
pub(crate) struct HoldState {
    generation: AtomicU64,
    active: AtomicU64,
}

impl HoldState {
    fn begin(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.active.store(generation, Ordering::SeqCst);
        generation
    }

    fn superseded(&self, generation: u64) -> bool {
        self.active.load(Ordering::SeqCst) != generation
    }

    /// Release keepalive suppression, but only if this hold still owns it.
    fn finish(&self, generation: u64) {
        let _ = self.active.compare_exchange(generation, 0, Ordering::SeqCst, Ordering::SeqCst);
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) != 0
    }
}

/// Timestamp of the last command that made it onto the wire.
#[derive(Debug, Default)]
pub(crate) struct Activity {
    last_command: std::sync::Mutex<Option<SystemTime>>,
}

impl Activity {
    pub(crate) fn mark(&self) {
        *self.last_command.lock().expect("activity lock poisoned") = Some(SystemTime::now());
    }

    fn last(&self) -> Option<SystemTime> {
        *self.last_command.lock().expect("activity lock poisoned")
    }
}

/// Everything that exists only while connected.
struct Link {
    commands: Arc<Mutex<Box<dyn CommandSink>>>,
    frames: watch::Receiver<Option<Arc<Frame>>>,
    hold: Arc<HoldState>,
    activity: Arc<Activity>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// A control session for one robot.
///
/// Created disconnected; [`connect`](Session::connect) brings the link up and
/// starts the keepalive and frame-ingest tasks, both bound to the session's
/// lifetime. All methods take `&self`, so the session can be shared behind an
/// `Arc` between the tool layer and any number of frame consumers.
pub struct Session {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    status: watch::Sender<SessionStatus>,
    link: Mutex<Option<Link>>,
}

impl Session {
    /// Create a disconnected session that will dial through `connector`.
    pub fn new(connector: impl Connector, config: SessionConfig) -> Self {
        let (status, _) = watch::channel(SessionStatus::Disconnected);
        Self { config, connector: Arc::new(connector), status, link: Mutex::new(None) }
    }

    /// Current lifecycle state.
    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Target robot address.
    pub fn address(&self) -> &str {
        &self.config.address
    }

    /// When the last command (explicit or keepalive) was sent, if connected.
    pub async fn last_command_at(&self) -> Option<SystemTime> {
        let guard = self.link.lock().await;
        guard.as_ref().and_then(|link| link.activity.last())
    }

    fn set_status(&self, status: SessionStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            debug!("Session status: {} -> {}", previous, status);
        }
    }

    /// Bring the link up.
    ///
    /// Dials the robot through the transport capability, then starts the
    /// keepalive scheduler and frame ingest loop. Fails with
    /// [`RobotError::Connection`] if the robot cannot be reached within the
    /// configured timeout. Calling this on an already-connected session is a
    /// no-op that returns the current status; a second transport handle is
    /// never created.
    pub async fn connect(&self) -> Result<SessionStatus> {
        let mut guard = self.link.lock().await;
        if guard.is_some() {
            debug!("connect() while already connected, returning current status");
            return Ok(SessionStatus::Connected);
        }

        self.set_status(SessionStatus::Connecting);
        info!("Connecting to robot at {}", self.config.address);

        let dial = self.connector.connect(&self.config.address);
        let pair = match tokio::time::timeout(self.config.connect_timeout, dial).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                self.set_status(SessionStatus::Disconnected);
                return Err(e);
            }
            Err(_) => {
                self.set_status(SessionStatus::Disconnected);
                return Err(RobotError::connection_failed(format!(
                    "no response from {} within {:?}",
                    self.config.address, self.config.connect_timeout
                )));
            }
        };

        let commands = Arc::new(Mutex::new(pair.commands));
        let hold = Arc::new(HoldState::default());
        let activity = Arc::new(Activity::default());
        let (frame_tx, frame_rx) = watch::channel(None);
        let cancel = CancellationToken::new();

        let keepalive = tokio::spawn(keepalive::keepalive_task(
            Arc::clone(&commands),
            Arc::clone(&hold),
            Arc::clone(&activity),
            self.config.tick_interval,
            cancel.clone(),
        ));
        let ingest = tokio::spawn(ingest::ingest_task(pair.video, frame_tx, cancel.clone()));

        *guard = Some(Link {
            commands,
            frames: frame_rx,
            hold,
            activity,
            cancel,
            tasks: vec![keepalive, ingest],
        });
        self.set_status(SessionStatus::Connected);
        info!("Connected to robot at {}", self.config.address);

        Ok(SessionStatus::Connected)
    }

    /// Tear the link down.
    ///
    /// Signals the background tasks to stop, puts a final stop command on the
    /// wire, and waits up to the configured grace period for the tasks before
    /// abandoning them. Best-effort from the caller's perspective: transport
    /// errors during teardown are logged, never propagated. Idempotent.
    pub async fn disconnect(&self) {
        let mut guard = self.link.lock().await;
        let Some(link) = guard.take() else {
            self.set_status(SessionStatus::Disconnected);
            return;
        };

        self.set_status(SessionStatus::Disconnecting);
        info!("Disconnecting from robot");

        // Stop the background tasks and any in-progress hold loop first so
        // nothing re-sends after our final stop.
        link.cancel.cancel();

        {
            let mut sink = link.commands.lock().await;
            let stop = MotionCommand::neutral().encode();
            if let Err(e) = sink.send(&stop).await {
                debug!("Final stop command failed during teardown: {}", e);
            }
            if let Err(e) = sink.shutdown().await {
                debug!("Transport shutdown failed during teardown: {}", e);
            }
        }

        for mut task in link.tasks {
            if tokio::time::timeout(self.config.disconnect_grace, &mut task).await.is_err() {
                warn!("Background task did not stop within grace period, aborting");
                task.abort();
            }
        }

        drop(guard);
        self.set_status(SessionStatus::Disconnected);
        info!("Disconnected from robot");
    }

    /// Send a command to the robot.
    ///
    /// Discrete actions are sent once. Motion commands are held: re-sent every
    /// tick for their full duration, suppressing the keepalive scheduler, with
    /// the caller blocked until the duration elapses. A newer dispatch
    /// preempts an in-progress hold immediately ("last command wins"), and the
    /// preempted caller returns early with [`DispatchOutcome::Preempted`].
    ///
    /// Fails with [`RobotError::NotConnected`] when no link is up, and with
    /// [`RobotError::Connection`] when the link dies mid-dispatch - in that
    /// case the session transitions to Disconnected so later calls fail fast.
    pub async fn dispatch(&self, command: impl Into<RobotCommand>) -> Result<DispatchOutcome> {
        // Clone the shared handles out so the link lock is not held for the
        // duration of a hold loop; disconnect must stay callable concurrently.
        let (commands, hold, activity, cancel) = {
            let guard = self.link.lock().await;
            let link = guard.as_ref().ok_or(RobotError::NotConnected)?;
            (
                Arc::clone(&link.commands),
                Arc::clone(&link.hold),
                Arc::clone(&link.activity),
                link.cancel.clone(),
            )
        };

        match command.into() {
            RobotCommand::Action(action) => {
                let encoded = action.encode();
                let mut sink = commands.lock().await;
                if cancel.is_cancelled() {
                    return Ok(DispatchOutcome::Disconnected);
                }
                match sink.send(&encoded).await {
                    Ok(()) => {
                        activity.mark();
                        debug!("Dispatched {:?}", action);
                        Ok(DispatchOutcome::Completed)
                    }
                    Err(e) => {
                        drop(sink);
                        self.fail_link().await;
                        Err(as_link_loss(e))
                    }
                }
            }
            RobotCommand::Motion(motion) => {
                self.hold_motion(motion, commands, hold, activity, cancel).await
            }
        }
    }

    /// The hold loop: re-send `motion` every tick until its duration elapses,
    /// a newer command takes the active generation, or the session disconnects.
    async fn hold_motion(
        &self,
        motion: MotionCommand,
        commands: Arc<Mutex<Box<dyn CommandSink>>>,
        hold: Arc<HoldState>,
        activity: Arc<Activity>,
        cancel: CancellationToken,
    ) -> Result<DispatchOutcome> {
        let encoded = motion.encode();
        let generation = hold.begin();
        let deadline = Instant::now() + motion.duration();

        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        debug!(
            "Holding motion speed={} turn={} for {:?}",
            motion.speed(),
            motion.turn(),
            motion.duration()
        );

        let outcome = loop {
            // First tick fires immediately, so preemption hits the wire
            // within one tick interval of the new dispatch.
            tokio::select! {
                _ = cancel.cancelled() => break DispatchOutcome::Disconnected,
                _ = interval.tick() => {}
            }

            if hold.superseded(generation) {
                break DispatchOutcome::Preempted;
            }

            {
                let mut sink = commands.lock().await;
                // Waiting for the lock may have outlived the hold
                if cancel.is_cancelled() {
                    break DispatchOutcome::Disconnected;
                }
                if hold.superseded(generation) {
                    break DispatchOutcome::Preempted;
                }
                if let Err(e) = sink.send(&encoded).await {
                    drop(sink);
                    hold.finish(generation);
                    self.fail_link().await;
                    return Err(as_link_loss(e));
                }
                activity.mark();
            }

            if Instant::now() >= deadline {
                break DispatchOutcome::Completed;
            }
        };

        hold.finish(generation);
        debug!("Motion hold finished: {:?}", outcome);
        Ok(outcome)
    }

    /// Latest camera frame, if any has been assembled since connecting.
    ///
    /// Never waits for a new frame: returns whatever the ingest loop has
    /// buffered, or [`RobotError::NoFrame`] when the stream has not produced
    /// one yet.
    pub async fn snapshot_frame(&self) -> Result<Arc<Frame>> {
        let guard = self.link.lock().await;
        let link = guard.as_ref().ok_or(RobotError::NotConnected)?;
        let frame = link.frames.borrow().clone();
        frame.ok_or(RobotError::NoFrame)
    }

    /// Subscribe to camera frames as a stream.
    ///
    /// The stream yields each newly assembled frame (latest-wins when
    /// throttled) and ends when the session disconnects.
    pub async fn frames(&self, rate: FrameRate) -> Result<impl Stream<Item = Arc<Frame>> + 'static> {
        let receiver = {
            let guard = self.link.lock().await;
            let link = guard.as_ref().ok_or(RobotError::NotConnected)?;
            link.frames.clone()
        };

        let frames = WatchStream::new(receiver).filter_map(|opt| async move { opt });

        Ok(match rate {
            FrameRate::Native => frames.boxed(),
            FrameRate::Max(hz) => {
                let interval = Duration::from_secs_f64(1.0 / hz.max(1) as f64);
                frames.throttle(interval).boxed()
            }
        })
    }

    /// Tear down a link that died under an explicit dispatch. The handle is
    /// already dead, so tasks are aborted rather than drained.
    async fn fail_link(&self) {
        let mut guard = self.link.lock().await;
        if let Some(link) = guard.take() {
            warn!("Robot link lost, tearing down session");
            link.cancel.cancel();
            for task in link.tasks {
                task.abort();
            }
        }
        drop(guard);
        self.set_status(SessionStatus::Disconnected);
    }
}

/// Caller-facing intents, mirroring the robot's tool surface.
impl Session {
    /// Drive: speed and turn in [-100, 100], held for `duration`.
    pub async fn drive(&self, speed: i32, turn: i32, duration: Duration) -> Result<DispatchOutcome> {
        self.dispatch(MotionCommand::new(speed, turn, duration)).await
    }

    pub async fn jump(&self, kind: JumpKind) -> Result<DispatchOutcome> {
        self.dispatch(DiscreteAction::Jump(kind)).await
    }

    /// Compress the spring without firing it.
    pub async fn load_jump(&self) -> Result<DispatchOutcome> {
        self.dispatch(DiscreteAction::LoadJump).await
    }

    pub async fn cancel_jump(&self) -> Result<DispatchOutcome> {
        self.dispatch(DiscreteAction::CancelJump).await
    }

    /// Emergency stop for the jump motor.
    pub async fn stop_jump(&self) -> Result<DispatchOutcome> {
        self.dispatch(DiscreteAction::StopJump).await
    }

    /// Fire the spring from kicker posture.
    pub async fn kick(&self) -> Result<DispatchOutcome> {
        self.dispatch(DiscreteAction::Kick).await
    }

    pub async fn load_kick(&self) -> Result<DispatchOutcome> {
        self.dispatch(DiscreteAction::LoadKick).await
    }

    pub async fn change_posture(&self, kind: PostureKind) -> Result<DispatchOutcome> {
        self.dispatch(DiscreteAction::Posture(kind)).await
    }

    pub async fn play_animation(&self, kind: AnimationKind) -> Result<DispatchOutcome> {
        self.dispatch(DiscreteAction::Animation(kind)).await
    }

    /// Store a photo on the device. The image stays on the robot's internal
    /// storage; use [`snapshot_frame`](Session::snapshot_frame) for inline
    /// image data.
    pub async fn capture_photo(&self) -> Result<DispatchOutcome> {
        self.dispatch(DiscreteAction::CapturePhoto).await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Cancel tasks on drop for clean shutdown
        if let Ok(guard) = self.link.try_lock()
            && let Some(link) = guard.as_ref()
        {
            debug!("Dropping connected session");
            link.cancel.cancel();
        }
    }
}

fn as_link_loss(error: RobotError) -> RobotError {
    match error {
        e @ RobotError::Connection { .. } => e,
        other => RobotError::connection_failed_with_source(
            "robot link lost during dispatch",
            Box::new(other),
        ),
    }
}
