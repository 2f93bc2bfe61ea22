//! Keepalive scheduler: neutral commands at link cadence while idle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{Activity, HoldState};
use crate::command::MotionCommand;
use crate::transport::CommandSink;

/// Emits a neutral "hold position" command every tick so the device's
/// connection supervision does not time out.
///
/// The dispatch lock is only ever tried, never awaited: if an explicit
/// command holds it, that command is being re-sent at the same cadence and
/// the link is live without us, so the tick is simply dropped. Stopping is
/// cooperative - cancellation is observed between ticks, never mid-send.
pub(super) async fn keepalive_task(
    commands: Arc<Mutex<Box<dyn CommandSink>>>,
    hold: Arc<HoldState>,
    activity: Arc<Activity>,
    tick: Duration,
    cancel: CancellationToken,
) {
    info!("Keepalive scheduler started ({:?} tick)", tick);

    let neutral = MotionCommand::neutral().encode();
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Keepalive scheduler cancelled");
                break;
            }
            _ = interval.tick() => {}
        }

        // An active hold re-sends its own command at this cadence; stay out
        // of its way so the explicit command is not overwritten.
        if hold.is_active() {
            trace!("Keepalive tick suppressed by active hold");
            continue;
        }

        let Ok(mut sink) = commands.try_lock() else {
            trace!("Dispatch lock contended, skipping keepalive tick");
            continue;
        };

        match sink.send(&neutral).await {
            Ok(()) => activity.mark(),
            // A single dropped packet is not session-fatal; a dead link
            // surfaces on the next explicit dispatch instead.
            Err(e) => warn!("Keepalive send failed: {}", e),
        }
    }

    info!("Keepalive scheduler stopped");
}
