//! Frame ingest task: turns the raw video byte stream into latest-frame state.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::transport::VideoSource;
use crate::video::{Frame, FrameAssembler};

const MAX_ERRORS: u32 = 10;

/// Reads chunks from the video source for the lifetime of the session,
/// reassembles complete frames, and publishes each one as the new latest
/// value. Decode failures are absorbed by the assembler; transport read
/// errors are retried with backoff up to [`MAX_ERRORS`].
pub(super) async fn ingest_task(
    mut video: Box<dyn VideoSource>,
    frame_tx: watch::Sender<Option<Arc<Frame>>>,
    cancel: CancellationToken,
) {
    info!("Frame ingest task started");
    let mut assembler = FrameAssembler::new();
    let mut frame_count = 0u64;
    let mut error_count = 0u32;

    loop {
        // Use select to allow cancellation during a blocking read
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Frame ingest cancelled");
                break;
            }
            result = video.next_chunk() => result,
        };

        match result {
            Ok(Some(chunk)) => {
                error_count = 0;
                if let Some(image) = assembler.push(&chunk) {
                    frame_count += 1;
                    trace!("Frame {}: {} bytes", frame_count, image.len());

                    if frame_tx.send(Some(Arc::new(Frame::new(image)))).is_err() {
                        debug!("Frame receiver dropped, shutting down ingest");
                        break;
                    }
                }
            }
            Ok(None) => {
                info!("Video stream ended after {} frames", frame_count);
                break;
            }
            Err(e) => {
                error_count += 1;
                warn!("Video read error ({}/{}): {}", error_count, MAX_ERRORS, e);

                if error_count >= MAX_ERRORS {
                    error!("Too many video read errors, stopping ingest");
                    break;
                }

                // Exponential backoff: 100ms, 200ms, 400ms, ...
                let backoff = std::time::Duration::from_millis(50 * (1 << error_count.min(5)));
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }
    }

    info!("Frame ingest task ended ({} frames)", frame_count);
}
