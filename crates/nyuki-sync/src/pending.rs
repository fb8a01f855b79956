use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::WriteError;

/// The eventual outcome of a store write.
///
/// The optimistic change is already visible when this is returned; awaiting it
/// yields the authoritative result. Dropping it does not cancel the write.
#[must_use = "a PendingWrite reports whether the write committed"]
pub struct PendingWrite<T> {
    client_ref: Option<String>,
    state: State<T>,
}

enum State<T> {
    Ready(Option<Result<T, WriteError>>),
    Waiting(oneshot::Receiver<Result<T, WriteError>>),
}

impl<T> Unpin for PendingWrite<T> {}

impl<T> PendingWrite<T> {
    pub(crate) const fn ready(result: Result<T, WriteError>) -> Self {
        Self {
            client_ref: None,
            state: State::Ready(Some(result)),
        }
    }

    pub(crate) const fn failed(error: WriteError) -> Self {
        Self::ready(Err(error))
    }

    pub(crate) const fn waiting(rx: oneshot::Receiver<Result<T, WriteError>>) -> Self {
        Self {
            client_ref: None,
            state: State::Waiting(rx),
        }
    }

    pub(crate) fn with_client_ref(mut self, client_ref: String) -> Self {
        self.client_ref = Some(client_ref);
        self
    }

    /// Correlation id of the placeholder, for creates.
    #[must_use]
    pub fn client_ref(&self) -> Option<&str> {
        self.client_ref.as_deref()
    }
}

impl<T> Future for PendingWrite<T> {
    type Output = Result<T, WriteError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            State::Ready(result) => Poll::Ready(result.take().unwrap_or(Err(WriteError::TornDown))),
            // The sender only disappears if the write task was aborted.
            State::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|received| received.unwrap_or(Err(WriteError::TornDown))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ready_resolves_immediately() {
        let write = PendingWrite::ready(Ok(7));
        assert_eq!(write.await, Ok(7));
    }

    #[tokio::test]
    async fn dropped_sender_resolves_torn_down() {
        let (tx, rx) = oneshot::channel::<Result<(), WriteError>>();
        drop(tx);
        assert_eq!(PendingWrite::waiting(rx).await, Err(WriteError::TornDown));
    }

    #[tokio::test]
    async fn waiting_resolves_with_sent_value() {
        let (tx, rx) = oneshot::channel::<Result<(), WriteError>>();
        let write = PendingWrite::waiting(rx).with_client_ref("tmp-00000001".into());
        assert_eq!(write.client_ref(), Some("tmp-00000001"));
        tx.send(Err(WriteError::Timeout)).unwrap();
        assert_eq!(write.await, Err(WriteError::Timeout));
    }
}
