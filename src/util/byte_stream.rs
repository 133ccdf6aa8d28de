use std::{
  pin::Pin,
  task::{Context, Poll},
};

use bytes::Bytes;
use futures::Stream;
use tracing::{info, warn};

/// Forwards chunks from an upstream body, never yielding more than
/// `limit_bytes` in total, and reports how much was forwarded once the
/// stream ends or is dropped.
pub struct ByteStream<T> {
  stream: T,
  label: String,
  // inclusive
  limit_bytes: Option<u64>,
  forwarded: u64,
  finished: bool,
}

impl<T> ByteStream<T> {
  pub fn new(stream: T, label: impl Into<String>) -> Self {
    ByteStream {
      stream,
      label: label.into(),
      limit_bytes: None,
      forwarded: 0,
      finished: false,
    }
  }

  pub fn limit_bytes(mut self, bytes: Option<u64>) -> Self {
    self.limit_bytes = bytes;
    self
  }

  fn finish(&mut self) {
    if !self.finished {
      self.finished = true;
      info!(media = %self.label, bytes = self.forwarded, "relay finished");
    }
  }
}

impl<T, E> Stream for ByteStream<T>
where
  T: Stream<Item = Result<Bytes, E>> + Unpin,
  E: std::fmt::Display,
{
  type Item = Result<Bytes, E>;

  fn poll_next(
    mut self: Pin<&mut Self>,
    cx: &mut Context<'_>,
  ) -> Poll<Option<Self::Item>> {
    let this = &mut *self;
    if this.finished {
      return Poll::Ready(None);
    }

    let remaining = this.limit_bytes.map(|l| l.saturating_sub(this.forwarded));
    if remaining == Some(0) {
      this.finish();
      return Poll::Ready(None);
    }

    match Pin::new(&mut this.stream).poll_next(cx) {
      Poll::Ready(Some(Ok(mut bytes))) => {
        if let Some(remaining) = remaining {
          if bytes.len() as u64 > remaining {
            bytes = bytes.slice(..remaining as usize);
          }
        }
        this.forwarded += bytes.len() as u64;
        Poll::Ready(Some(Ok(bytes)))
      }
      Poll::Ready(Some(Err(err))) => {
        warn!(
          media = %this.label,
          bytes = this.forwarded,
          "upstream read failed: {err}"
        );
        this.finished = true;
        Poll::Ready(Some(Err(err)))
      }
      Poll::Ready(None) => {
        this.finish();
        Poll::Ready(None)
      }
      Poll::Pending => Poll::Pending,
    }
  }
}

impl<T> Drop for ByteStream<T> {
  fn drop(&mut self) {
    if !self.finished {
      info!(
        media = %self.label,
        bytes = self.forwarded,
        "relay aborted by caller"
      );
    }
  }
}
