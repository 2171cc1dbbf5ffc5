//! In-memory transport for tests.
//!
//! A [Router] connects any number of [MemoryFace]s: interests dispatch to
//! the longest registered matching prefix, responses travel back over a
//! oneshot, and an unanswered interest expires after its lifetime (which
//! tests drive with virtual time).

use super::{
    face::{Face, FaceError, Incoming, Registration},
    TIMEOUT,
};
use crate::{
    name::Name,
    packet::{Data, Interest},
};
use futures::{
    channel::{mpsc, oneshot},
    StreamExt as _,
};
use std::{
    future::Future,
    sync::{Arc, Mutex},
};

struct Route {
    prefix: Name,
    token: u64,
    sender: mpsc::UnboundedSender<Incoming>,
}

#[derive(Default)]
struct RouterInner {
    routes: Vec<Route>,
    next_token: u64,
}

/// An in-memory forwarding plane.
#[derive(Default)]
pub struct Router {
    inner: Arc<Mutex<RouterInner>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new face attached to this router.
    pub fn face(&self) -> MemoryFace {
        MemoryFace {
            inner: self.inner.clone(),
        }
    }
}

/// A [Face] attached to a [Router].
#[derive(Clone)]
pub struct MemoryFace {
    inner: Arc<Mutex<RouterInner>>,
}

async fn await_response(
    sender: Option<mpsc::UnboundedSender<Incoming>>,
    interest: Interest,
) -> Option<Data> {
    // Every failure below is network silence: the caller's timeout decides.
    let Some(sender) = sender else {
        return futures::future::pending().await;
    };
    let (tx, rx) = oneshot::channel();
    if sender.unbounded_send(Incoming::new(interest, tx)).is_err() {
        return futures::future::pending().await;
    }
    match rx.await {
        Ok(response) => response,
        Err(_) => futures::future::pending().await,
    }
}

impl Face for MemoryFace {
    fn express(
        &mut self,
        interest: Interest,
    ) -> impl Future<Output = Result<Data, FaceError>> + Send {
        let inner = self.inner.clone();
        async move {
            let lifetime = interest.lifetime.unwrap_or(TIMEOUT);
            let sender = {
                let inner = inner.lock().expect("router poisoned");
                inner
                    .routes
                    .iter()
                    .filter(|route| interest.name.starts_with(&route.prefix))
                    .max_by_key(|route| route.prefix.len())
                    .map(|route| route.sender.clone())
            };
            match tokio::time::timeout(lifetime, await_response(sender, interest)).await {
                Ok(Some(data)) => Ok(data),
                Ok(None) => Err(FaceError::Nack),
                Err(_) => Err(FaceError::Timeout),
            }
        }
    }

    fn register(&mut self, prefix: Name) -> impl Future<Output = Registration> + Send {
        let inner = self.inner.clone();
        async move {
            let (sender, receiver) = mpsc::unbounded();
            let token = {
                let mut inner = inner.lock().expect("router poisoned");
                let token = inner.next_token;
                inner.next_token += 1;
                inner.routes.push(Route {
                    prefix: prefix.clone(),
                    token,
                    sender,
                });
                token
            };
            let weak = Arc::downgrade(&inner);
            Registration::new(prefix, receiver, move || {
                if let Some(inner) = weak.upgrade() {
                    if let Ok(mut inner) = inner.lock() {
                        inner.routes.retain(|route| route.token != token);
                    }
                }
            })
        }
    }
}

/// Serves a fixed data packet under a prefix until the registration closes.
pub async fn serve(mut face: MemoryFace, prefix: Name, data: Data) {
    let mut registration = face.register(prefix).await;
    while let Some(incoming) = registration.next().await {
        incoming.respond(data.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_express_reaches_longest_prefix() {
        let router = Router::new();
        let mut short = router.face().register(name("/a")).await;
        let mut long = router.face().register(name("/a/b")).await;

        let mut face = router.face();
        let request = tokio::spawn(async move {
            face.express(Interest::new(name("/a/b/c"))).await
        });
        let incoming = long.next().await.unwrap();
        assert_eq!(incoming.interest.name, name("/a/b/c"));
        incoming.respond(Data::new(name("/a/b/c")));
        assert_eq!(request.await.unwrap().unwrap().name, name("/a/b/c"));

        // The short prefix saw nothing.
        use futures::FutureExt as _;
        assert!(short.next().now_or_never().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_nack_and_timeout() {
        let router = Router::new();
        let mut registration = router.face().register(name("/svc")).await;
        let mut face = router.face();
        let request = tokio::spawn(async move {
            face.express(Interest::new(name("/svc/x"))).await
        });
        registration.next().await.unwrap().nack();
        assert_eq!(request.await.unwrap(), Err(FaceError::Nack));

        // No route: silence until the lifetime expires.
        let mut face = router.face();
        let started = tokio::time::Instant::now();
        let result = face.express(Interest::new(name("/nowhere"))).await;
        assert_eq!(result, Err(FaceError::Timeout));
        assert_eq!(started.elapsed(), TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_registration_unregisters() {
        let router = Router::new();
        let registration = router.face().register(name("/svc")).await;
        drop(registration);
        let mut face = router.face();
        let mut request = Interest::new(name("/svc/x"));
        request.lifetime = Some(Duration::from_millis(100));
        assert_eq!(face.express(request).await, Err(FaceError::Timeout));
    }
}
