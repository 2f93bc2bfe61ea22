//! Stream throttling utilities for frame subscriptions.

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Interval, interval};

/// Adds [`throttle`](ThrottleExt::throttle) to any stream.
pub trait ThrottleExt: Stream {
    /// Cap the stream at one item per `duration`, latest-wins.
    ///
    /// A frame consumer that asked for 10 Hz has no use for the frames it
    /// skipped, so everything that arrived since the last emission is
    /// dropped except the newest item.
    fn throttle(self, duration: Duration) -> Throttle<Self>
    where
        Self: Sized,
    {
        Throttle::new(self, duration)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// Rate-limiting combinator behind [`ThrottleExt::throttle`].
    pub struct Throttle<S: Stream> {
        #[pin]
        stream: S,
        interval: Interval,
        pending: Option<S::Item>,
    }
}

impl<S: Stream> Throttle<S> {
    pub fn new(stream: S, duration: Duration) -> Self {
        let mut interval = interval(duration);
        // A slow consumer gets the next item one interval after it catches
        // up, never a burst of backlogged ticks.
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        Self { stream, interval, pending: None }
    }
}

impl<S: Stream> Stream for Throttle<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        ready!(this.interval.poll_tick(cx));

        // Drain the source, keeping only the newest item
        loop {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    *this.pending = Some(item);
                }
                Poll::Ready(None) => {
                    // Source ended; flush the held item before reporting end
                    return Poll::Ready(this.pending.take());
                }
                Poll::Pending => {
                    // No more items available right now. An empty interval is
                    // not end-of-stream: a camera can stall between frames.
                    return match this.pending.take() {
                        Some(item) => Poll::Ready(Some(item)),
                        None => Poll::Pending,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_latest() {
        let mut stream = futures::stream::iter(1..=10).throttle(Duration::from_millis(100));

        // All ten items are ready within the first interval; only the
        // newest survives.
        assert_eq!(stream.next().await, Some(10));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_interval_does_not_end_the_stream() {
        let (tx, rx) = mpsc::channel(4);
        let mut stream = ReceiverStream::new(rx).throttle(Duration::from_millis(50));

        tx.send(1u32).await.unwrap();
        assert_eq!(stream.next().await, Some(1));

        // Nothing arrives for several intervals, then a late item
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(400)).await;
            tx.send(2).await.unwrap();
        });

        assert_eq!(stream.next().await, Some(2));
    }
}
