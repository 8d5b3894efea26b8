//! Multi-subscriber observation channels
//!
//! Every subscriber gets its own buffer, bounded or unbounded depending on
//! the subject. A closed subject hands out nothing more, even to subscribers
//! that still have buffered items or are already waiting.

use std::sync::{Mutex, MutexGuard, PoisonError};

use futures_util::Stream;
use tokio::sync::{mpsc, watch};
use tracing::warn;

use crate::{PlaybackError, Result};

/// Sending half of one subscriber's buffer
enum Outlet<T> {
    Bounded(mpsc::Sender<T>),
    Unbounded(mpsc::UnboundedSender<T>),
}

impl<T> Clone for Outlet<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Bounded(tx) => Self::Bounded(tx.clone()),
            Self::Unbounded(tx) => Self::Unbounded(tx.clone()),
        }
    }
}

impl<T> Outlet<T> {
    fn is_closed(&self) -> bool {
        match self {
            Self::Bounded(tx) => tx.is_closed(),
            Self::Unbounded(tx) => tx.is_closed(),
        }
    }
}

/// Receiving half of one subscriber's buffer
enum Inlet<T> {
    Bounded(mpsc::Receiver<T>),
    Unbounded(mpsc::UnboundedReceiver<T>),
}

impl<T> Inlet<T> {
    async fn recv(&mut self) -> Option<T> {
        match self {
            Self::Bounded(rx) => rx.recv().await,
            Self::Unbounded(rx) => rx.recv().await,
        }
    }

    fn try_recv(&mut self) -> Option<T> {
        match self {
            Self::Bounded(rx) => rx.try_recv().ok(),
            Self::Unbounded(rx) => rx.try_recv().ok(),
        }
    }
}

/// Broadcast point for messages observed by the engine
pub struct Subject<T> {
    subscribers: Mutex<Vec<Outlet<T>>>,
    closed: watch::Sender<bool>,
    capacity: Option<usize>,
}

impl<T: Clone + Send + 'static> Subject<T> {
    /// Create a subject buffering up to `capacity` items per subscriber
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self::with_capacity(Some(capacity))
    }

    /// Create a subject whose subscribers buffer without limit
    ///
    /// Publishing never waits and never drops an item.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        let (closed, _) = watch::channel(false);

        Self {
            subscribers: Mutex::new(Vec::new()),
            closed,
            capacity,
        }
    }

    /// Subscribe to items published from now on
    ///
    /// Subscribing to a closed subject yields an already finished stream.
    pub fn subscribe(&self) -> Subscription<T> {
        let (outlet, inlet) = match self.capacity {
            Some(capacity) => {
                let (tx, rx) = mpsc::channel(capacity);
                (Outlet::Bounded(tx), Inlet::Bounded(rx))
            }
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                (Outlet::Unbounded(tx), Inlet::Unbounded(rx))
            }
        };

        if !self.is_closed() {
            self.lock().push(outlet);
        }

        Subscription {
            inlet,
            closed: self.closed.subscribe(),
        }
    }

    /// Publish without waiting
    ///
    /// On a bounded subject a subscriber whose buffer is full misses this
    /// item. Returns the number of subscribers the item reached.
    pub fn publish_now(&self, item: &T) -> usize {
        if self.is_closed() {
            return 0;
        }

        let mut delivered = 0;
        self.lock().retain(|outlet| match outlet {
            Outlet::Bounded(tx) => match tx.try_send(item.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Subscriber buffer full, dropping item");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            },
            Outlet::Unbounded(tx) => {
                let sent = tx.send(item.clone()).is_ok();
                delivered += usize::from(sent);
                sent
            }
        });

        delivered
    }

    /// Publish, waiting for room in every subscriber's buffer
    ///
    /// # Errors
    ///
    /// Returns `ChannelClosed` if the subject is closed
    pub async fn publish(&self, item: &T) -> Result<()> {
        if self.is_closed() {
            return Err(PlaybackError::ChannelClosed);
        }

        // Never hold the lock across an await
        let outlets: Vec<Outlet<T>> = self.lock().clone();

        // A dropped receiver only means that subscriber left
        for outlet in &outlets {
            match outlet {
                Outlet::Bounded(tx) => {
                    let _ = tx.send(item.clone()).await;
                }
                Outlet::Unbounded(tx) => {
                    let _ = tx.send(item.clone());
                }
            }
        }

        self.lock().retain(|outlet| !outlet.is_closed());
        Ok(())
    }

    /// Close the subject and end every subscription, waking waiting readers
    ///
    /// Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        let was_open = !self.closed.send_replace(true);
        self.lock().clear();
        was_open
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Outlet<T>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Receiving end of a [`Subject`]
pub struct Subscription<T> {
    inlet: Inlet<T>,
    closed: watch::Receiver<bool>,
}

impl<T: Send + 'static> Subscription<T> {
    /// Wait for the next item; `None` once the subject is closed
    pub async fn recv(&mut self) -> Option<T> {
        if self.is_closed() {
            return None;
        }

        let item = tokio::select! {
            biased;
            () = wait_closed(&mut self.closed) => None,
            item = self.inlet.recv() => item,
        };

        if self.is_closed() {
            return None;
        }

        item
    }

    /// Next buffered item, if any
    pub fn try_recv(&mut self) -> Option<T> {
        if self.is_closed() {
            return None;
        }

        self.inlet.try_recv()
    }

    /// Adapt into a [`Stream`]
    pub fn into_stream(self) -> impl Stream<Item = T> {
        futures_util::stream::unfold(self, |mut subscription| async move {
            subscription.recv().await.map(|item| (item, subscription))
        })
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// Resolves once the subject closes or goes away
async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    while !*closed.borrow_and_update() {
        if closed.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn test_every_subscriber_sees_items() {
        let subject = Subject::bounded(4);
        let mut a = subject.subscribe();
        let mut b = subject.subscribe();

        subject.publish(&1).await.unwrap();
        assert_eq!(subject.publish_now(&2), 2);

        assert_eq!(a.recv().await, Some(1));
        assert_eq!(a.recv().await, Some(2));
        assert_eq!(b.try_recv(), Some(1));
        assert_eq!(b.try_recv(), Some(2));
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_items() {
        let subject = Subject::bounded(4);
        subject.publish_now(&1);

        let mut late = subject.subscribe();
        assert_eq!(late.try_recv(), None);
    }

    #[tokio::test]
    async fn test_close_ends_subscriptions() {
        let subject = Subject::bounded(4);
        let mut sub = subject.subscribe();
        subject.publish_now(&1);

        assert!(subject.close());
        assert!(!subject.close());

        assert_eq!(sub.recv().await, None);
        assert!(matches!(
            subject.publish(&2).await,
            Err(PlaybackError::ChannelClosed)
        ));
        assert_eq!(subject.publish_now(&3), 0);

        let mut after = subject.subscribe();
        assert_eq!(after.recv().await, None);
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_reader() {
        let subject = std::sync::Arc::new(Subject::bounded(1));
        let _stalled = subject.subscribe();
        let mut reader = subject.subscribe();

        // Fill the stalled buffer so the next publish blocks holding senders
        subject.publish(&1).await.unwrap();
        assert_eq!(reader.try_recv(), Some(1));

        let publisher = {
            let subject = std::sync::Arc::clone(&subject);
            tokio::spawn(async move {
                let _ = tokio::time::timeout(Duration::from_secs(5), subject.publish(&2)).await;
            })
        };
        let waiting = tokio::spawn(async move { reader.recv().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        subject.close();

        let item = tokio::time::timeout(Duration::from_millis(500), waiting)
            .await
            .expect("reader still waiting after close")
            .unwrap();
        assert_eq!(item, None);

        publisher.abort();
    }

    #[tokio::test]
    async fn test_full_buffer_blocks_publish() {
        let subject = Subject::bounded(1);
        let _sub = subject.subscribe();

        subject.publish(&1).await.unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(50), subject.publish(&2)).await;
        assert!(blocked.is_err());

        // Non-blocking publish drops instead
        assert_eq!(subject.publish_now(&3), 0);
    }

    #[tokio::test]
    async fn test_unbounded_subject_never_drops() {
        let subject = Subject::unbounded();
        let mut sub = subject.subscribe();

        for i in 0..2_000 {
            assert_eq!(subject.publish_now(&i), 1);
        }

        let mut received = 0;
        while sub.try_recv().is_some() {
            received += 1;
        }
        assert_eq!(received, 2_000);
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let subject = Subject::bounded(1);
        let sub = subject.subscribe();
        drop(sub);

        subject.publish(&1).await.unwrap();
        assert_eq!(subject.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_into_stream() {
        let subject = Subject::bounded(4);
        let mut stream = Box::pin(subject.subscribe().into_stream());

        subject.publish_now(&1);
        subject.publish_now(&2);
        assert_eq!(stream.next().await, Some(1));

        // Closing wins over buffered items
        subject.close();
        assert_eq!(stream.next().await, None);
    }
}
