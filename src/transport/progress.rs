//! Progress-tracked request body.
//!
//! The file part of an upload is streamed in fixed-size blocks. Each time the
//! HTTP client asks for the next block, the previous one has been handed to
//! the network layer, which is when progress is reported. Once the stream is
//! exhausted every byte has left the client and the record moves to
//! `Processing`.

use crate::registry::UploadRegistry;
use crate::types::UploadId;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Translates byte counts into registry updates for one upload
#[derive(Clone, Debug)]
pub(crate) struct ProgressReporter {
    registry: UploadRegistry,
    id: UploadId,
    /// Total size in bytes, 0 when unknown
    total: u64,
}

impl ProgressReporter {
    pub(crate) fn new(registry: UploadRegistry, id: UploadId, total: u64) -> Self {
        Self {
            registry,
            id,
            total,
        }
    }

    /// Report that `sent` bytes have been handed to the network layer.
    /// Nothing is reported while the total is unknown.
    pub(crate) fn report(&self, sent: u64) {
        if let Some(percent) = percent_of(sent, self.total) {
            self.registry.update_progress(&self.id, percent);
        }
    }

    /// Every byte has been sent
    pub(crate) fn finish(&self) {
        self.registry.mark_processing(&self.id);
    }
}

/// `round(sent / total * 100)`, or `None` if `total` is unknown
pub(crate) fn percent_of(sent: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let sent = u128::from(sent.min(total));
    let total = u128::from(total);
    let percent = (sent * 100 + total / 2) / total;
    Some(percent.min(100) as u8)
}

/// Body stream over an in-memory file that reports progress as it is consumed
pub(crate) struct UploadProgressStream {
    data: Bytes,
    block_size: usize,
    bytes_sent: usize,
    reporter: ProgressReporter,
    finished: bool,
}

impl UploadProgressStream {
    pub(crate) fn new(data: Bytes, block_size: usize, reporter: ProgressReporter) -> Self {
        Self {
            data,
            block_size: block_size.max(1),
            bytes_sent: 0,
            reporter,
            finished: false,
        }
    }
}

impl Stream for UploadProgressStream {
    type Item = std::result::Result<Bytes, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        // The block handed out by the previous poll has been consumed
        if this.bytes_sent != 0 {
            this.reporter.report(this.bytes_sent as u64);
        }

        if this.bytes_sent == this.data.len() {
            if !this.finished {
                this.finished = true;
                this.reporter.finish();
            }
            return Poll::Ready(None);
        }

        let start = this.bytes_sent;
        let end = (start + this.block_size).min(this.data.len());
        this.bytes_sent = end;

        Poll::Ready(Some(Ok(this.data.slice(start..end))))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.data.len() - self.bytes_sent).div_ceil(self.block_size);
        (remaining, Some(remaining))
    }
}
