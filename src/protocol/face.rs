//! The transport seam.
//!
//! A [Face] expresses interests and registers prefixes against whatever
//! forwarding substrate the application runs on. The protocol actors are
//! generic over it; tests use the in-memory [crate::protocol::mocks::Router].

use crate::{
    name::Name,
    packet::{Data, Interest},
};
use futures::channel::{mpsc, oneshot};
use futures::Stream;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use thiserror::Error;

/// Why an expressed interest yielded no data.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceError {
    #[error("request nacked")]
    Nack,
    #[error("request timed out")]
    Timeout,
    #[error("face closed")]
    Closed,
}

/// One interest arriving under a registered prefix, with its response
/// channel. Responding with `None` nacks; dropping the responder leaves the
/// requester to its interest lifetime.
pub struct Incoming {
    pub interest: Interest,
    responder: oneshot::Sender<Option<Data>>,
}

impl Incoming {
    pub fn new(interest: Interest, responder: oneshot::Sender<Option<Data>>) -> Self {
        Self {
            interest,
            responder,
        }
    }

    /// Answers the interest with a data packet.
    pub fn respond(self, data: Data) {
        let _ = self.responder.send(Some(data));
    }

    /// Nacks the interest.
    pub fn nack(self) {
        let _ = self.responder.send(None);
    }
}

/// A live prefix registration: a stream of [Incoming] interests. Dropping it
/// unregisters the prefix, so no interest is delivered to an owner that no
/// longer exists.
pub struct Registration {
    prefix: Name,
    receiver: mpsc::UnboundedReceiver<Incoming>,
    unregister: Option<Box<dyn FnOnce() + Send>>,
}

impl Registration {
    pub fn new(
        prefix: Name,
        receiver: mpsc::UnboundedReceiver<Incoming>,
        unregister: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            prefix,
            receiver,
            unregister: Some(Box::new(unregister)),
        }
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }
}

impl Stream for Registration {
    type Item = Incoming;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }
}

/// A handle onto the forwarding substrate. Cheap to clone; clones share the
/// underlying connection.
pub trait Face: Clone + Send + 'static {
    /// Expresses an interest and awaits the matching data, bounded by the
    /// interest lifetime.
    fn express(
        &mut self,
        interest: Interest,
    ) -> impl Future<Output = Result<Data, FaceError>> + Send;

    /// Registers a prefix, receiving every interest arriving under it.
    fn register(&mut self, prefix: Name) -> impl Future<Output = Registration> + Send;
}
