//! Streaming helpers shared by uploads and downloads.

pub mod chunked;
pub mod progress;
pub mod progress_stream;

use tokio_util::sync::CancellationToken;

use crate::disk::ByteStream;

pub use chunked::Chunked;
pub use progress_stream::ProgressStream;

/// Size of the chunks forwarded to and from the remote store (4 MiB)
pub const CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// A progress line is logged after this many chunks
pub const PROGRESS_LOG_INTERVAL: u64 = 10;

/// Re-chunk `stream` to [`CHUNK_SIZE`] pieces, log progress and stop when
/// `cancel` fires.
pub fn instrument(
    stream: ByteStream,
    label: impl Into<String>,
    cancel: CancellationToken,
) -> ProgressStream<Chunked<ByteStream>> {
    ProgressStream::new(Chunked::new(stream, CHUNK_SIZE), label, cancel)
}
