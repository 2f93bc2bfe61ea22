//! Test doubles for the transport capability seam.
//!
//! `MockConnector` stands in for a real WiFi transport: it records every
//! command "sent" to the robot, lets tests feed raw video chunks to the
//! ingest loop, and can be told to refuse connections, hang forever, or drop
//! the link mid-session.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::mpsc;

use crate::command::EncodedCommand;
use crate::error::{Result, RobotError};
use crate::transport::{CommandSink, Connector, TransportPair, VideoSource};

/// Shared record of every command the mock link accepted.
#[derive(Clone, Default)]
pub(crate) struct SentLog {
    inner: Arc<StdMutex<Vec<EncodedCommand>>>,
}

impl SentLog {
    pub(crate) fn commands(&self) -> Vec<EncodedCommand> {
        self.inner.lock().unwrap().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub(crate) fn last(&self) -> Option<EncodedCommand> {
        self.inner.lock().unwrap().last().cloned()
    }

    pub(crate) fn count_of(&self, command: &EncodedCommand) -> usize {
        self.inner.lock().unwrap().iter().filter(|sent| *sent == command).count()
    }

    fn push(&self, command: EncodedCommand) {
        self.inner.lock().unwrap().push(command);
    }
}

struct MockSink {
    log: SentLog,
    link_down: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl CommandSink for MockSink {
    async fn send(&mut self, command: &EncodedCommand) -> Result<()> {
        if self.link_down.load(Ordering::SeqCst) {
            return Err(RobotError::connection_failed("mock link down"));
        }
        self.log.push(command.clone());
        Ok(())
    }
}

struct MockVideo {
    chunks: mpsc::UnboundedReceiver<Result<Vec<u8>>>,
}

#[async_trait::async_trait]
impl VideoSource for MockVideo {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self.chunks.recv().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

#[derive(Clone, Copy)]
enum ConnectBehavior {
    Accept,
    Refuse,
    Hang,
}

/// Mock transport connector; create via [`MockConnector::accepting`] and
/// grab a [`MockHandle`] before handing the connector to the session.
pub(crate) struct MockConnector {
    behavior: ConnectBehavior,
    log: SentLog,
    link_down: Arc<AtomicBool>,
    connects: Arc<AtomicUsize>,
    video_tx: Arc<StdMutex<Option<mpsc::UnboundedSender<Result<Vec<u8>>>>>>,
}

impl MockConnector {
    fn with_behavior(behavior: ConnectBehavior) -> Self {
        Self {
            behavior,
            log: SentLog::default(),
            link_down: Arc::new(AtomicBool::new(false)),
            connects: Arc::new(AtomicUsize::new(0)),
            video_tx: Arc::new(StdMutex::new(None)),
        }
    }

    /// A robot that answers the dial.
    pub(crate) fn accepting() -> Self {
        Self::with_behavior(ConnectBehavior::Accept)
    }

    /// A robot that is off or on another network.
    pub(crate) fn refusing() -> Self {
        Self::with_behavior(ConnectBehavior::Refuse)
    }

    /// A robot that never answers, to exercise the connect timeout.
    pub(crate) fn hanging() -> Self {
        Self::with_behavior(ConnectBehavior::Hang)
    }

    pub(crate) fn handle(&self) -> MockHandle {
        MockHandle {
            log: self.log.clone(),
            link_down: Arc::clone(&self.link_down),
            connects: Arc::clone(&self.connects),
            video_tx: Arc::clone(&self.video_tx),
        }
    }
}

#[async_trait::async_trait]
impl Connector for MockConnector {
    async fn connect(&self, address: &str) -> Result<TransportPair> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            ConnectBehavior::Refuse => {
                Err(RobotError::connection_failed(format!("no robot answering at {address}")))
            }
            ConnectBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
            ConnectBehavior::Accept => {
                let (tx, rx) = mpsc::unbounded_channel();
                *self.video_tx.lock().unwrap() = Some(tx);
                Ok(TransportPair {
                    commands: Box::new(MockSink {
                        log: self.log.clone(),
                        link_down: Arc::clone(&self.link_down),
                    }),
                    video: Box::new(MockVideo { chunks: rx }),
                })
            }
        }
    }
}

/// Test-side view of the mock robot.
#[derive(Clone)]
pub(crate) struct MockHandle {
    log: SentLog,
    link_down: Arc<AtomicBool>,
    connects: Arc<AtomicUsize>,
    video_tx: Arc<StdMutex<Option<mpsc::UnboundedSender<Result<Vec<u8>>>>>>,
}

impl MockHandle {
    pub(crate) fn sent(&self) -> SentLog {
        self.log.clone()
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Every subsequent send fails, as if the WiFi link dropped.
    pub(crate) fn drop_link(&self) {
        self.link_down.store(true, Ordering::SeqCst);
    }

    pub(crate) fn push_chunk(&self, chunk: Vec<u8>) {
        let guard = self.video_tx.lock().unwrap();
        let tx = guard.as_ref().expect("no video link established");
        tx.send(Ok(chunk)).expect("ingest loop gone");
    }

    pub(crate) fn push_video_error(&self) {
        let guard = self.video_tx.lock().unwrap();
        let tx = guard.as_ref().expect("no video link established");
        tx.send(Err(RobotError::connection_failed("mock video read failure")))
            .expect("ingest loop gone");
    }

    /// End the video stream (robot stopped sending).
    pub(crate) fn close_video(&self) {
        self.video_tx.lock().unwrap().take();
    }
}

/// A minimal but valid-looking JPEG frame for ingest tests.
pub(crate) fn jpeg_frame(body: &[u8]) -> Vec<u8> {
    let mut frame = vec![0xFF, 0xD8];
    frame.extend_from_slice(body);
    frame.extend_from_slice(&[0xFF, 0xD9]);
    frame
}
