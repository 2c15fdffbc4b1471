use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use dashmap::DashMap;
use futures::Stream;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tokio_util::sync::WaitForCancellationFutureOwned;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::ChangeEvent;

/// What a subscription listens to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WatchScope {
    /// Every namespace of the client
    Global,
    Namespace(String),
}

#[derive(Debug)]
struct Watcher {
    id: u64,
    sender: mpsc::Sender<Arc<ChangeEvent>>,
}

struct WatchHubInner {
    watchers: DashMap<WatchScope, Vec<Watcher>>,
    next_id: AtomicU64,
    /// Publish holds the read side, close the write side
    closed: RwLock<bool>,
    buffer_size: usize,
}

impl std::fmt::Debug for WatchHubInner {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("WatchHubInner")
            .field("scopes", &self.watchers.len())
            .field("closed", &*self.closed.read())
            .field("buffer_size", &self.buffer_size)
            .finish_non_exhaustive()
    }
}

/// In-memory fan-out of [`ChangeEvent`]s
///
/// Every subscription owns a bounded channel. Publishing uses `try_send`: a
/// full channel loses the event with a warning, a closed one is pruned.
/// `publish` therefore never waits on a subscriber.
#[derive(Debug, Clone)]
pub struct WatchHub {
    inner: Arc<WatchHubInner>,
}

impl WatchHub {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            inner: Arc::new(WatchHubInner {
                watchers: DashMap::new(),
                next_id: AtomicU64::new(1),
                closed: RwLock::new(false),
                buffer_size: buffer_size.max(1),
            }),
        }
    }

    /// Delivers `event` to global subscribers and to subscribers of its namespace.
    pub fn publish(
        &self,
        event: ChangeEvent,
    ) {
        let closed = self.inner.closed.read();
        if *closed {
            trace!(namespace = %event.namespace, "watch hub closed, event discarded");
            return;
        }

        let event = Arc::new(event);
        let namespace_scope = WatchScope::Namespace(event.namespace.clone());
        for scope in [WatchScope::Global, namespace_scope] {
            self.dispatch(&scope, &event);
        }
    }

    fn dispatch(
        &self,
        scope: &WatchScope,
        event: &Arc<ChangeEvent>,
    ) {
        let mut disconnected = Vec::new();

        if let Some(watchers) = self.inner.watchers.get(scope) {
            for watcher in watchers.iter() {
                match watcher.sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!(
                            watcher_id = watcher.id,
                            namespace = %event.namespace,
                            "subscriber buffer full, change event dropped"
                        );
                    }
                    Err(TrySendError::Closed(_)) => disconnected.push(watcher.id),
                }
            }
            trace!(
                namespace = %event.namespace,
                ?scope,
                watchers = watchers.len(),
                "change event dispatched"
            );
        }

        // The map guard is released before pruning
        for id in disconnected {
            debug!(watcher_id = id, ?scope, "pruning disconnected subscriber");
            unregister_watcher(&self.inner, scope, id);
        }
    }

    /// Subscribes to the changes of every namespace.
    pub fn subscribe_global(&self) -> Subscription {
        self.register(WatchScope::Global, None)
    }

    /// Subscribes to the changes of one namespace.
    pub fn subscribe_namespace(
        &self,
        namespace: impl Into<String>,
    ) -> Subscription {
        self.register(WatchScope::Namespace(namespace.into()), None)
    }

    /// Like [`WatchHub::subscribe_namespace`], ending the stream once `cancel` fires.
    pub fn subscribe_namespace_until(
        &self,
        namespace: impl Into<String>,
        cancel: CancellationToken,
    ) -> Subscription {
        self.register(WatchScope::Namespace(namespace.into()), Some(cancel))
    }

    fn register(
        &self,
        scope: WatchScope,
        cancel: Option<CancellationToken>,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.inner.buffer_size);

        let closed = self.inner.closed.read();
        if *closed {
            // The sender is dropped right away, so the stream ends immediately
            return Subscription::new(receiver, None, cancel);
        }
        self.inner.watchers.entry(scope.clone()).or_default().push(Watcher { id, sender });
        drop(closed);

        trace!(watcher_id = id, ?scope, buffer_size = self.inner.buffer_size, "subscriber registered");

        Subscription::new(
            receiver,
            Some(WatcherCleanup {
                id,
                scope,
                hub: self.inner.clone(),
            }),
            cancel,
        )
    }

    /// Drops every subscriber sender; all subscription streams end.
    ///
    /// Waits for in-flight publishes and nothing is delivered afterwards.
    pub fn close(&self) {
        let mut closed = self.inner.closed.write();
        if *closed {
            return;
        }
        *closed = true;
        self.inner.watchers.clear();
        debug!("watch hub closed");
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.read()
    }

    /// Number of live subscriptions, global and per-namespace.
    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn namespace_watcher_count(
        &self,
        namespace: &str,
    ) -> usize {
        self.inner
            .watchers
            .get(&WatchScope::Namespace(namespace.to_string()))
            .map(|w| w.len())
            .unwrap_or(0)
    }
}

struct WatcherCleanup {
    id: u64,
    scope: WatchScope,
    hub: Arc<WatchHubInner>,
}

fn unregister_watcher(
    hub: &WatchHubInner,
    scope: &WatchScope,
    id: u64,
) {
    hub.watchers.remove_if_mut(scope, |_scope, watchers| {
        watchers.retain(|w| w.id != id);
        watchers.is_empty()
    });
}

/// Cancellable stream of [`ChangeEvent`]s
///
/// Dropping the subscription unregisters it. After [`Subscription::cancel`]
/// (or once its cancellation token fires) no further event is delivered.
pub struct Subscription {
    receiver: mpsc::Receiver<Arc<ChangeEvent>>,
    cleanup: Option<WatcherCleanup>,
    cancelled: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
    done: bool,
}

impl std::fmt::Debug for Subscription {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.cleanup.as_ref().map(|c| c.id))
            .field("scope", &self.cleanup.as_ref().map(|c| &c.scope))
            .field("done", &self.done)
            .finish()
    }
}

impl Subscription {
    fn new(
        receiver: mpsc::Receiver<Arc<ChangeEvent>>,
        cleanup: Option<WatcherCleanup>,
        cancel: Option<CancellationToken>,
    ) -> Self {
        Self {
            receiver,
            cleanup,
            cancelled: cancel.map(|token| Box::pin(token.cancelled_owned())),
            done: false,
        }
    }

    /// Scope this subscription was registered for; `None` once cancelled.
    pub fn scope(&self) -> Option<&WatchScope> {
        self.cleanup.as_ref().map(|c| &c.scope)
    }

    /// Next event, or `None` once cancelled or the hub is closed.
    pub async fn recv(&mut self) -> Option<Arc<ChangeEvent>> {
        std::future::poll_fn(|cx| self.poll_event(cx)).await
    }

    /// Stops delivery. Calling it again has no effect.
    pub fn cancel(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        self.cancelled = None;
        if let Some(cleanup) = self.cleanup.take() {
            unregister_watcher(&cleanup.hub, &cleanup.scope, cleanup.id);
            trace!(watcher_id = cleanup.id, scope = ?cleanup.scope, "subscriber cancelled");
        }
        self.receiver.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.done
    }

    fn poll_event(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Arc<ChangeEvent>>> {
        if self.done {
            return Poll::Ready(None);
        }
        if let Some(cancelled) = self.cancelled.as_mut() {
            if cancelled.as_mut().poll(cx).is_ready() {
                self.cancel();
                return Poll::Ready(None);
            }
        }
        self.receiver.poll_recv(cx)
    }
}

impl Stream for Subscription {
    type Item = Arc<ChangeEvent>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_event(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            unregister_watcher(&cleanup.hub, &cleanup.scope, cleanup.id);
            trace!(watcher_id = cleanup.id, scope = ?cleanup.scope, "subscriber unregistered");
        }
    }
}
