//! Fixed-size re-chunking stream adapter.

use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::disk::DiskError;

/// Regroups an arbitrary byte stream into `chunk_size` pieces.
///
/// Every chunk except the last has exactly `chunk_size` bytes. Errors from
/// the inner stream are passed through immediately.
pub struct Chunked<S> {
    inner: S,
    buffer: BytesMut,
    chunk_size: usize,
    finished: bool,
}

impl<S> Chunked<S> {
    pub fn new(inner: S, chunk_size: usize) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(chunk_size),
            chunk_size: chunk_size.max(1),
            finished: false,
        }
    }
}

impl<S> Stream for Chunked<S>
where
    S: Stream<Item = Result<Bytes, DiskError>> + Unpin,
{
    type Item = Result<Bytes, DiskError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.buffer.len() >= self.chunk_size {
                let size = self.chunk_size;
                return Poll::Ready(Some(Ok(self.buffer.split_to(size).freeze())));
            }

            if self.finished {
                if self.buffer.is_empty() {
                    return Poll::Ready(None);
                }
                let rest = self.buffer.split().freeze();
                return Poll::Ready(Some(Ok(rest)));
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => self.buffer.extend_from_slice(&bytes),
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => self.finished = true,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
