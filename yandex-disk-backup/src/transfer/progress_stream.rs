//! Progress-tracking stream wrapper for chunked transfers.

use bytes::Bytes;
use futures_util::Stream;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, info};

use super::progress::format_bytes;
use super::PROGRESS_LOG_INTERVAL;
use crate::disk::DiskError;

/// Stream wrapper that counts chunks and bytes, logs progress every
/// [`PROGRESS_LOG_INTERVAL`] chunks and ends with [`DiskError::Cancelled`]
/// once its token is cancelled.
pub struct ProgressStream<S> {
    inner: S,
    label: String,
    chunks: u64,
    bytes_transferred: Arc<AtomicU64>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    done: bool,
}

impl<S> ProgressStream<S>
where
    S: Stream<Item = Result<Bytes, DiskError>>,
{
    pub fn new(inner: S, label: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            inner,
            label: label.into(),
            chunks: 0,
            bytes_transferred: Arc::new(AtomicU64::new(0)),
            cancelled: Box::pin(cancel.cancelled_owned()),
            done: false,
        }
    }

    /// Shared byte counter; stays readable after the stream is handed off.
    pub fn counter(&self) -> Arc<AtomicU64> {
        self.bytes_transferred.clone()
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = Result<Bytes, DiskError>> + Unpin,
{
    type Item = Result<Bytes, DiskError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        if self.cancelled.as_mut().poll(cx).is_ready() {
            self.done = true;
            debug!("{}: cancelled after {} chunks", self.label, self.chunks);
            return Poll::Ready(Some(Err(DiskError::Cancelled)));
        }

        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(bytes))) => {
                self.chunks += 1;
                let total = self
                    .bytes_transferred
                    .fetch_add(bytes.len() as u64, Ordering::Relaxed)
                    + bytes.len() as u64;

                if self.chunks % PROGRESS_LOG_INTERVAL == 0 {
                    debug!(
                        "{}: {} chunks, {} transferred",
                        self.label,
                        self.chunks,
                        format_bytes(total)
                    );
                }

                Poll::Ready(Some(Ok(bytes)))
            }
            Poll::Ready(Some(Err(e))) => {
                self.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.done = true;
                info!(
                    "{}: finished, {} in {} chunks",
                    self.label,
                    format_bytes(self.bytes_transferred.load(Ordering::Relaxed)),
                    self.chunks
                );
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{stream, StreamExt};

    fn source(count: usize, size: usize) -> impl Stream<Item = Result<Bytes, DiskError>> + Unpin {
        let items: Vec<Result<Bytes, DiskError>> =
            (0..count).map(|_| Ok(Bytes::from(vec![7u8; size]))).collect();
        stream::iter(items)
    }

    #[tokio::test]
    async fn test_counts_bytes() {
        let progress = ProgressStream::new(source(25, 3), "test", CancellationToken::new());
        let counter = progress.counter();

        let chunks = progress.collect::<Vec<_>>().await;
        assert_eq!(chunks.len(), 25);
        assert_eq!(counter.load(Ordering::Relaxed), 75);
    }

    #[tokio::test]
    async fn test_cancellation_ends_stream() {
        let token = CancellationToken::new();
        let mut progress = ProgressStream::new(source(5, 1), "test", token.clone());

        assert!(matches!(progress.next().await, Some(Ok(_))));
        token.cancel();
        assert!(matches!(progress.next().await, Some(Err(DiskError::Cancelled))));
        assert!(progress.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_pending_stream_wakes() {
        let token = CancellationToken::new();
        let pending = stream::pending::<Result<Bytes, DiskError>>();
        let mut progress = ProgressStream::new(pending, "test", token.clone());

        let canceller = tokio::spawn(async move {
            tokio::task::yield_now().await;
            token.cancel();
        });

        assert!(matches!(progress.next().await, Some(Err(DiskError::Cancelled))));
        canceller.await.unwrap();
    }
}
