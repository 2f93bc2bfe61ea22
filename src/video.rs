//! Video frame types and best-effort JPEG reassembly.

use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// A decoded camera frame.
///
/// The latest frame is the only one that matters: the ingest loop replaces it
/// continuously while connected, and readers always observe the newest
/// snapshot.
#[derive(Debug, Clone)]
pub struct Frame {
    /// JPEG payload (zero-copy via Arc).
    pub data: Arc<[u8]>,

    /// Wall-clock time the frame was assembled.
    pub captured_at: SystemTime,
}

impl Frame {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self { data: data.into(), captured_at: SystemTime::now() }
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Delivery rate for frame subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameRate {
    /// Every assembled frame, at whatever rate the camera produces them.
    Native,
    /// At most N frames per second, latest-wins.
    Max(u32),
}

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Upper bound on buffered undecodable bytes before the assembler resets.
/// The camera's frames are tens of kilobytes; anything this large without a
/// terminator is a corrupt stream.
const MAX_PENDING: usize = 512 * 1024;

/// Reassembles complete JPEG images from raw transport chunks.
///
/// The link is unreliable: chunks can be truncated, duplicated, or garbage.
/// The assembler scans for start/end-of-image markers and emits the newest
/// complete frame, silently discarding partial frames and noise in between.
#[derive(Debug, Default)]
pub(crate) struct FrameAssembler {
    pending: Vec<u8>,
}

impl FrameAssembler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns the newest complete frame it finished, if any.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        self.pending.extend_from_slice(chunk);

        let mut latest = None;
        while let Some(end) = find(&self.pending, &EOI) {
            // The last start marker before this terminator bounds the frame.
            // Anything earlier is a truncated frame or line noise.
            if let Some(start) = rfind(&self.pending[..end], &SOI) {
                latest = Some(self.pending[start..end + 2].to_vec());
            }
            self.pending.drain(..end + 2);
        }

        if latest.is_none() && self.pending.len() > MAX_PENDING {
            self.pending.clear();
        }

        latest
    }
}

fn find(haystack: &[u8], needle: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|window| window == needle)
}

fn rfind(haystack: &[u8], needle: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).rposition(|window| window == needle)
}
