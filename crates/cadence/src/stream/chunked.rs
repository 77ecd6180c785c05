use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{BoxStream, FusedStream};
use futures::{Future, Stream, StreamExt, TryStreamExt};
use tokio::time::{Instant, Sleep};

use crate::error::UpstreamError;

/// Re-chunks an upstream byte stream into pieces no larger than
/// `chunk_size`, bounding every wait on upstream by `read_timeout`.
///
/// At most one upstream chunk is held at a time. After the first error the
/// stream ends.
pub struct ChunkedStream {
    upstream: BoxStream<'static, Result<Bytes, UpstreamError>>,
    pending: Bytes,
    chunk_size: usize,
    read_timeout: Option<Duration>,
    deadline: Option<Pin<Box<Sleep>>>,
    awaiting_upstream: bool,
    done: bool,
    bytes_emitted: u64,
}

impl ChunkedStream {
    pub fn new<S, E>(upstream: S, chunk_size: usize, read_timeout: Option<Duration>) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<UpstreamError> + 'static,
    {
        Self {
            upstream: upstream.map_err(Into::into).boxed(),
            pending: Bytes::new(),
            chunk_size: chunk_size.max(1),
            read_timeout: read_timeout.filter(|t| !t.is_zero()),
            deadline: None,
            awaiting_upstream: false,
            done: false,
            bytes_emitted: 0,
        }
    }

    /// Total bytes handed out so far
    pub fn bytes_emitted(&self) -> u64 {
        self.bytes_emitted
    }

    fn take_chunk(&mut self) -> Bytes {
        let len = self.chunk_size.min(self.pending.len());
        self.bytes_emitted += len as u64;
        self.pending.split_to(len)
    }

    fn finish(&mut self) {
        self.done = true;
        self.awaiting_upstream = false;
        self.deadline = None;
    }
}

impl Stream for ChunkedStream {
    type Item = Result<Bytes, UpstreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        if !this.pending.is_empty() {
            return Poll::Ready(Some(Ok(this.take_chunk())));
        }
        if this.done {
            return Poll::Ready(None);
        }

        loop {
            match this.upstream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    this.awaiting_upstream = false;
                    if chunk.is_empty() {
                        continue;
                    }
                    this.pending = chunk;
                    return Poll::Ready(Some(Ok(this.take_chunk())));
                }
                Poll::Ready(Some(Err(e))) => {
                    this.finish();
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.finish();
                    return Poll::Ready(None);
                }
                Poll::Pending => {
                    let Some(limit) = this.read_timeout else {
                        return Poll::Pending;
                    };

                    // The deadline starts when we begin waiting, not when the
                    // consumer last polled.
                    if !this.awaiting_upstream {
                        this.awaiting_upstream = true;
                        let at = Instant::now() + limit;
                        match this.deadline.as_mut() {
                            Some(deadline) => deadline.as_mut().reset(at),
                            None => this.deadline = Some(Box::pin(tokio::time::sleep_until(at))),
                        }
                    }

                    let expired = this
                        .deadline
                        .as_mut()
                        .is_some_and(|deadline| deadline.as_mut().poll(cx).is_ready());
                    if expired {
                        this.finish();
                        return Poll::Ready(Some(Err(UpstreamError::ReadTimeout(limit))));
                    }
                    return Poll::Pending;
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            let remaining = self.pending.len().div_ceil(self.chunk_size);
            (remaining, Some(remaining))
        } else {
            (0, None)
        }
    }
}

impl FusedStream for ChunkedStream {
    fn is_terminated(&self) -> bool {
        self.done && self.pending.is_empty()
    }
}
