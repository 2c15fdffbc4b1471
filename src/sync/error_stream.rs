use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use futures::Stream;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

use crate::Error;

/// Errors raised by a client's background work
///
/// Returned by `AppClient::start`. Ends after the client is stopped. A
/// receiver that falls behind skips the errors it missed.
pub struct ErrorStream {
    inner: BroadcastStream<Arc<Error>>,
}

impl std::fmt::Debug for ErrorStream {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ErrorStream").finish_non_exhaustive()
    }
}

impl ErrorStream {
    pub(crate) fn new(receiver: broadcast::Receiver<Arc<Error>>) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
        }
    }

    /// Next error, or `None` once the client has stopped.
    pub async fn recv(&mut self) -> Option<Arc<Error>> {
        self.next().await
    }
}

impl Stream for ErrorStream {
    type Item = Arc<Error>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        loop {
            match self.inner.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(error))) => return Poll::Ready(Some(error)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    warn!(skipped, "error stream receiver lagged, errors skipped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
