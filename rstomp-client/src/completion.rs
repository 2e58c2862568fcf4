//! Completion handles for receipted requests.

use crate::error::ClientError;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Producer side of a pending request's result.
///
/// The session engine keeps one completion per outstanding receipt and hands
/// the matching [`Completion::Handle`] to the caller.
pub trait Completion: Sized {
    /// Caller-visible side of the completion.
    type Handle;

    /// Creates a pending completion for `receipt_id`.
    fn new(receipt_id: &str) -> (Self, Self::Handle);

    /// Completes the request successfully.
    fn resolve(self);

    /// Fails the request.
    fn reject(self, error: ClientError);

    /// Returns whether the caller has given up on the result.
    fn is_cancelled(&self) -> bool;
}

/// Completion backed by a `tokio::sync::oneshot` channel.
#[derive(Debug)]
pub struct OneshotCompletion {
    tx: oneshot::Sender<Result<(), ClientError>>,
}

impl Completion for OneshotCompletion {
    type Handle = ReceiptHandle;

    fn new(receipt_id: &str) -> (Self, Self::Handle) {
        let (tx, rx) = oneshot::channel();
        let handle = ReceiptHandle {
            receipt_id: receipt_id.to_string(),
            rx,
        };
        (Self { tx }, handle)
    }

    fn resolve(self) {
        // The handle may already be gone; nobody is waiting then.
        let _ = self.tx.send(Ok(()));
    }

    fn reject(self, error: ClientError) {
        let _ = self.tx.send(Err(error));
    }

    fn is_cancelled(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Resolves when the broker acknowledges (or rejects) a request.
///
/// Dropping the handle, or calling [`ReceiptHandle::cancel`], cancels
/// interest in the result. Resolves to [`ClientError::TransportLost`] if the
/// session goes away first.
#[derive(Debug)]
pub struct ReceiptHandle {
    receipt_id: String,
    rx: oneshot::Receiver<Result<(), ClientError>>,
}

impl ReceiptHandle {
    /// Receipt id the request was sent with.
    pub fn receipt_id(&self) -> &str {
        &self.receipt_id
    }

    pub fn cancel(self) {}
}

impl Future for ReceiptHandle {
    type Output = Result<(), ClientError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ClientError::TransportLost)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstomp_protocol::ApplicationError;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_resolve() {
        let (completion, handle) = OneshotCompletion::new("1");
        assert_eq!(handle.receipt_id(), "1");

        let mut handle = task::spawn(handle);
        assert_pending!(handle.poll());

        completion.resolve();
        assert!(handle.is_woken());
        assert!(assert_ready!(handle.poll()).is_ok());
    }

    #[test]
    fn test_reject() {
        let (completion, handle) = OneshotCompletion::new("2");
        completion.reject(ClientError::Application(ApplicationError {
            receipt_id: "2".to_string(),
            message: Some("nope".to_string()),
            body: None,
        }));

        let mut handle = task::spawn(handle);
        let result = assert_ready!(handle.poll());
        assert!(matches!(result, Err(ClientError::Application(e)) if e.receipt_id == "2"));
    }

    #[test]
    fn test_dropped_completion_is_transport_lost() {
        let (completion, handle) = OneshotCompletion::new("3");
        drop(completion);

        let mut handle = task::spawn(handle);
        assert!(matches!(
            assert_ready!(handle.poll()),
            Err(ClientError::TransportLost)
        ));
    }

    #[test]
    fn test_cancel() {
        let (completion, handle) = OneshotCompletion::new("4");
        assert!(!completion.is_cancelled());
        handle.cancel();
        assert!(completion.is_cancelled());

        // Resolving a cancelled completion is harmless.
        completion.resolve();
    }
}
