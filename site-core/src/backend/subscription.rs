use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Owned handle to a listener task draining a push feed.
///
/// Releasing the handle (via [`Subscription::unsubscribe`] or by dropping
/// it) stops the listener; after `unsubscribe` returns no further callback
/// runs. Ownership guarantees the release happens exactly once.
#[derive(Debug)]
pub struct Subscription {
    name: &'static str,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Spawns a task that hands every item of `feed` to `on_item` until the
    /// feed closes or the subscription is released.
    pub fn listen<T, F, Fut>(
        name: &'static str,
        mut feed: mpsc::UnboundedReceiver<T>,
        mut on_item: F,
    ) -> Self
    where
        T: Send + 'static,
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = Flow> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            loop {
                let item = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    item = feed.recv() => item,
                };

                let Some(item) = item else {
                    tracing::debug!(subscription = name, "Feed closed by the store");
                    break;
                };

                // Re-check after the handler's own suspension points.
                if on_item(item).await == Flow::Stop || token.is_cancelled() {
                    break;
                }
            }
        });

        Self {
            name,
            cancel,
            task: Some(task),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stops the listener and waits for it, so that no callback is running
    /// or will run once this returns.
    pub async fn unsubscribe(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
            && e.is_panic()
        {
            tracing::error!(subscription = self.name, "Listener task panicked");
        }
        tracing::debug!(subscription = self.name, "Unsubscribed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Push fan-out used by stores that deliver to several subscribers.
/// Subscribers that dropped their receiver are pruned on the next send.
#[derive(Debug)]
pub struct Fanout<T> {
    senders: Vec<mpsc::UnboundedSender<T>>,
}

impl<T> Default for Fanout<T> {
    fn default() -> Self {
        Self {
            senders: Vec::new(),
        }
    }
}

impl<T: Clone> Fanout<T> {
    pub fn add(&mut self, initial: Option<T>) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(item) = initial {
            let _ = tx.send(item);
        }
        self.senders.push(tx);
        rx
    }

    pub fn send(&mut self, item: &T) {
        self.senders.retain(|tx| tx.send(item.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders.iter().filter(|tx| !tx.is_closed()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every sender, closing all feeds.
    pub fn close(&mut self) {
        self.senders.clear();
    }
}
