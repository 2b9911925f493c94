//! Debounce scheduler: one tracked task per open window.
//!
//! ```text
//! Open ──append──▶ Delaying ──deadline──▶ Delivering ──push──▶ Closed
//!                     │  ▲                    │
//!                     └──┘ append             └─ cancelled push: result dropped
//! ```
//!
//! The deadline is fixed when the window opens. Later arrivals for the same
//! key join the group but never extend the window.

use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::engine::Shared;
use crate::error::{AggregatorError, AggregatorResult};
use crate::item::AggregatorItem;
use crate::output::{deliver, OutputSender};
use crate::store::WindowPhase;

/// Spawn the firing task for a freshly opened window.
///
/// Called with the engine lock held, so the window is registered before the
/// task can observe the store.
pub(crate) fn schedule<I>(
    shared: &Arc<Shared<I>>,
    key: I::Key,
    deadline: Instant,
    tx: OutputSender<I>,
) where
    I: AggregatorItem,
{
    debug!(key = ?key, phase = %WindowPhase::Delaying, "debounce window scheduled");

    let task_shared = Arc::clone(shared);
    shared.tracker.spawn(async move {
        match run_window(&task_shared, &key, deadline, tx).await {
            Ok(()) => task_shared.stats.window_delivered(),
            Err(AggregatorError::Cancelled) => {
                task_shared.stats.window_cancelled();
                warn!(key = ?key, "debounce window abandoned: cancellation requested");
            }
            Err(e) => {
                task_shared.stats.window_failed();
                error!(key = ?key, error = %e, "debounce window failed");
                task_shared.record_failure(e);
            }
        }
    });
}

async fn run_window<I>(
    shared: &Shared<I>,
    key: &I::Key,
    deadline: Instant,
    tx: OutputSender<I>,
) -> AggregatorResult<()>
where
    I: AggregatorItem,
{
    tokio::select! {
        biased;
        _ = shared.cancel.cancelled() => return Err(AggregatorError::Cancelled),
        _ = tokio::time::sleep_until(deadline) => {}
    }

    let group = {
        let mut state = shared.lock().await?;
        state.store.detach(key)?
    };

    debug!(
        key = ?key,
        phase = %WindowPhase::Delivering,
        items = group.items.len(),
        window_ms = group.opened_at.elapsed().as_millis() as u64,
        "debounce window fired"
    );

    let merged = shared.strategy.merge(group.items);
    deliver(&tx, merged, &shared.cancel)?;

    debug!(key = ?key, phase = %WindowPhase::Closed, "merged item delivered");
    Ok(())
}
