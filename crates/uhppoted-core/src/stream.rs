// ── Reactive snapshot streams ──
//
// Subscription handles for consuming coordinator snapshots.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::Snapshot;

/// A subscription to one coordinator's published snapshot.
///
/// Provides point-in-time access and change notification via
/// [`changed()`](Self::changed) or by converting into a `Stream`.
pub struct SnapshotStream<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    current: Snapshot<K, V>,
    receiver: watch::Receiver<Snapshot<K, V>>,
}

impl<K, V> SnapshotStream<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(receiver: watch::Receiver<Snapshot<K, V>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation or at the last `changed()`.
    pub fn current(&self) -> &Snapshot<K, V> {
        &self.current
    }

    /// The latest published snapshot.
    pub fn latest(&self) -> Snapshot<K, V> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next publication. Returns `None` once the coordinator
    /// has been dropped.
    pub async fn changed(&mut self) -> Option<Snapshot<K, V>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    pub fn into_stream(self) -> SnapshotWatchStream<K, V> {
        SnapshotWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding each published snapshot, starting with the
/// current one.
pub struct SnapshotWatchStream<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: WatchStream<Snapshot<K, V>>,
}

impl<K, V> Stream for SnapshotWatchStream<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Item = Snapshot<K, V>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
