//! Output stream: unbounded single-consumer queue of merged items.
//!
//! The engine and its debounce tasks hold [`OutputSender`] clones; the
//! consumer pulls through [`OutputQueue::stream`]. The queue ends once every
//! sender is dropped and the remaining items are drained.

use futures::Stream;
use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{AggregatorError, AggregatorResult};

/// Producer side handed to debounce tasks.
pub type OutputSender<I> = mpsc::UnboundedSender<I>;

/// Consumer side of the output queue.
///
/// Every call to [`stream`](Self::stream) returns a fresh lazy view over the
/// same receiver; views share the queue, so only one should be polled at a
/// time.
pub struct OutputQueue<I> {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<I>>>,
}

impl<I> Clone for OutputQueue<I> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

/// Create a linked sender/queue pair.
pub fn channel<I>() -> (OutputSender<I>, OutputQueue<I>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        tx,
        OutputQueue {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

impl<I: Send + 'static> OutputQueue<I> {
    /// Lazy stream of merged items.
    ///
    /// Suspends while the queue is empty. Items already queued are returned
    /// even after `cancel` fired; once the queue is empty a fired token yields
    /// `Err(Cancelled)` once, then the stream ends. Ends with `None` after all
    /// senders are gone and the queue is drained.
    pub fn stream(
        &self,
        cancel: CancellationToken,
    ) -> impl Stream<Item = AggregatorResult<I>> + Send + 'static {
        let rx = Arc::clone(&self.rx);
        futures::stream::unfold(Some((rx, cancel)), |state| async move {
            let (rx, cancel) = state?;
            match next_item(&rx, &cancel).await {
                Ok(Some(item)) => Some((Ok(item), Some((rx, cancel)))),
                Ok(None) => {
                    debug!("output queue closed");
                    None
                }
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

async fn next_item<I>(
    rx: &Mutex<mpsc::UnboundedReceiver<I>>,
    cancel: &CancellationToken,
) -> AggregatorResult<Option<I>> {
    let mut guard = match rx.try_lock() {
        Ok(guard) => guard,
        Err(_) => tokio::select! {
            biased;
            guard = rx.lock() => guard,
            _ = cancel.cancelled() => return Err(AggregatorError::Cancelled),
        },
    };

    // Ready items win over a fired token; only a wait is cancellable.
    match guard.try_recv() {
        Ok(item) => return Ok(Some(item)),
        Err(TryRecvError::Disconnected) => return Ok(None),
        Err(TryRecvError::Empty) => {}
    }

    tokio::select! {
        biased;
        item = guard.recv() => Ok(item),
        _ = cancel.cancelled() => Err(AggregatorError::Cancelled),
    }
}

/// Push a merged item unless the token already fired.
///
/// A cancelled push drops the item: delivery is at-most-once under
/// cancellation.
pub fn deliver<I>(
    tx: &OutputSender<I>,
    item: I,
    cancel: &CancellationToken,
) -> AggregatorResult<()> {
    if cancel.is_cancelled() {
        return Err(AggregatorError::Cancelled);
    }
    if tx.send(item).is_err() {
        warn!("output queue has no consumer, merged item dropped");
    }
    Ok(())
}
