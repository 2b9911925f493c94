//! Aggregator engine: the public façade over store, scheduler and output.
//!
//! ## Lifecycle
//!
//! ```text
//! Aggregator::new / builder().build()   running = true
//!   → send(item)*                       group per key, one window per group
//!   → stop()                            running = false, wait for open windows
//!   → stream() drains and ends          all senders gone
//! ```
//!
//! A single `tokio::sync::Mutex` guards the key group store, the output
//! sender and writes to `running`. Merging and pushing happen outside it so
//! one slow key never blocks another.

use futures::Stream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, trace, warn};

use crate::config::AggregatorConfig;
use crate::error::{AggregatorError, AggregatorResult};
use crate::item::{AggregatorItem, MergeStrategy};
use crate::output::{self, OutputQueue, OutputSender};
use crate::scheduler;
use crate::stats::{AggregatorStats, StatsCounters};
use crate::store::{AppendOutcome, KeyGroupStore, WindowPhase};

/// State mutated only under the engine lock.
pub(crate) struct EngineState<I: AggregatorItem> {
    pub(crate) store: KeyGroupStore<I::Key, I>,
    /// Taken by `stop`; debounce tasks keep their own clones.
    pub(crate) output: Option<OutputSender<I>>,
}

/// Everything the engine shares with its debounce tasks.
pub(crate) struct Shared<I: AggregatorItem> {
    pub(crate) state: Mutex<EngineState<I>>,
    /// Written under `state`'s lock, read lock-free on the `send` fast path.
    pub(crate) running: AtomicBool,
    pub(crate) delay: Duration,
    pub(crate) strategy: Arc<dyn MergeStrategy<I>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) tracker: TaskTracker,
    pub(crate) stats: StatsCounters,
    /// First fatal error raised by a debounce task, reported by `stop`.
    pub(crate) failure: OnceLock<AggregatorError>,
}

impl<I: AggregatorItem> Shared<I> {
    /// Keep the first fatal window error; later ones are only logged.
    pub(crate) fn record_failure(&self, error: AggregatorError) {
        let _ = self.failure.set(error);
    }

    /// Acquire the engine lock, giving up if the token fires first.
    pub(crate) async fn lock(&self) -> AggregatorResult<MutexGuard<'_, EngineState<I>>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AggregatorError::Cancelled),
            guard = self.state.lock() => Ok(guard),
        }
    }
}

/// Per-key fixed-window debounce aggregator.
///
/// Items with the same key that arrive within `delay` of the first one are
/// merged into a single output item. Windows are anchored at the first item
/// and never extended.
///
/// # Usage
///
/// ```rust,ignore
/// let aggregator = Aggregator::new(100, Duration::from_secs(1), JoinWords, None)?;
/// aggregator.send(update).await?;
///
/// let mut merged = Box::pin(aggregator.stream());
/// while let Some(item) = merged.next().await {
///     handle(item?);
/// }
/// ```
pub struct Aggregator<I: AggregatorItem> {
    shared: Arc<Shared<I>>,
    output: OutputQueue<I>,
}

impl<I> Aggregator<I>
where
    I: AggregatorItem,
{
    /// Create a running aggregator.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `initial_capacity` is zero or `delay` is zero.
    pub fn new<S>(
        initial_capacity: usize,
        delay: Duration,
        strategy: S,
        cancel: Option<CancellationToken>,
    ) -> AggregatorResult<Self>
    where
        S: MergeStrategy<I> + 'static,
    {
        Self::from_parts(initial_capacity, delay, Arc::new(strategy), cancel)
    }

    /// Start building an aggregator from defaults or a config.
    pub fn builder() -> AggregatorBuilder<I> {
        AggregatorBuilder::new()
    }

    fn from_parts(
        initial_capacity: usize,
        delay: Duration,
        strategy: Arc<dyn MergeStrategy<I>>,
        cancel: Option<CancellationToken>,
    ) -> AggregatorResult<Self> {
        if initial_capacity == 0 {
            return Err(AggregatorError::invalid_argument(
                "initial_capacity",
                "should be more than zero",
            ));
        }
        if delay.is_zero() {
            return Err(AggregatorError::invalid_argument(
                "delay",
                "must be more than zero",
            ));
        }

        let (tx, output) = output::channel();
        let shared = Shared {
            state: Mutex::new(EngineState {
                store: KeyGroupStore::with_capacity(initial_capacity),
                output: Some(tx),
            }),
            running: AtomicBool::new(true),
            delay,
            strategy,
            cancel: cancel.unwrap_or_default(),
            tracker: TaskTracker::new(),
            stats: StatsCounters::default(),
            failure: OnceLock::new(),
        };

        info!(
            initial_capacity,
            delay_ms = delay.as_millis() as u64,
            "aggregator started"
        );

        Ok(Self {
            shared: Arc::new(shared),
            output,
        })
    }

    /// Whether the aggregator still accepts items.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Configured debounce window.
    pub fn delay(&self) -> Duration {
        self.shared.delay
    }

    /// Add an item to its key's pending group.
    ///
    /// Opens a window if the key has none. After [`stop`](Self::stop) the
    /// call is a silent no-op.
    ///
    /// # Errors
    ///
    /// `Cancelled` if the token fires while waiting for the lock.
    pub async fn send(&self, item: I) -> AggregatorResult<()> {
        if !self.is_running() {
            self.drop_item();
            return Ok(());
        }

        let key = item.key();
        let mut state = self.shared.lock().await?;

        // `stop` may have won the lock between the fast-path check and here.
        let tx = match state.output.as_ref() {
            Some(tx) if self.is_running() => tx.clone(),
            _ => {
                self.drop_item();
                return Ok(());
            }
        };

        self.shared.stats.item_received();
        match state
            .store
            .append(key.clone(), item, Instant::now(), self.shared.delay)
        {
            AppendOutcome::Opened { deadline } => {
                debug!(key = ?key, phase = %WindowPhase::Open, "debounce window opened");
                self.shared.stats.window_opened();
                scheduler::schedule(&self.shared, key, deadline, tx);
            }
            AppendOutcome::Appended { len } => {
                trace!(key = ?key, pending = len, "item appended to open window");
            }
        }

        Ok(())
    }

    fn drop_item(&self) {
        self.shared.stats.item_dropped();
        trace!("aggregator stopped, item ignored");
    }

    /// Lazy stream of merged items, cancelled by the engine's token.
    ///
    /// Each call returns a new view over the same queue; poll one at a time.
    pub fn stream(&self) -> impl Stream<Item = AggregatorResult<I>> + Send + 'static {
        self.output.stream(self.shared.cancel.clone())
    }

    /// Lazy stream of merged items, cancelled by a consumer-owned token.
    pub fn stream_with_cancellation(
        &self,
        cancel: CancellationToken,
    ) -> impl Stream<Item = AggregatorResult<I>> + Send + 'static {
        self.output.stream(cancel)
    }

    /// Stop accepting items and wait for every open window to deliver.
    ///
    /// # Errors
    ///
    /// - `InvalidOperationState` if already stopped.
    /// - `InternalInconsistency` (or another fatal error) raised by a
    ///   debounce task; the first one wins.
    /// - `Cancelled` if the token fired and windows were abandoned.
    pub async fn stop(&self) -> AggregatorResult<()> {
        let open_windows = {
            let mut state = self.shared.lock().await?;
            if !self.is_running() {
                return Err(AggregatorError::invalid_state(
                    "aggregator is already in stopping state",
                ));
            }
            self.shared.running.store(false, Ordering::Release);
            state.output = None;
            state.store.open_windows()
        };

        info!(open_windows, "aggregator stopping, draining open windows");
        self.shared.tracker.close();
        self.shared.tracker.wait().await;

        if let Some(failure) = self.shared.failure.get() {
            error!(error = %failure, "aggregator stopped after a window failure");
            return Err(failure.clone());
        }

        let abandoned = self.shared.stats.cancelled_windows();
        if abandoned > 0 {
            warn!(abandoned, "aggregator stopped with abandoned windows");
            return Err(AggregatorError::Cancelled);
        }

        info!("aggregator stopped");
        Ok(())
    }

    /// Number of keys with a window currently delaying.
    pub async fn open_windows(&self) -> AggregatorResult<usize> {
        Ok(self.shared.lock().await?.store.open_windows())
    }

    /// Snapshot of the engine counters.
    pub fn stats(&self) -> AggregatorStats {
        self.shared.stats.snapshot()
    }
}

/// Builder for [`Aggregator`].
///
/// Unlike [`Aggregator::new`], the strategy may be left unset, in which case
/// [`build`](Self::build) fails with `InvalidArgument`.
pub struct AggregatorBuilder<I: AggregatorItem> {
    initial_capacity: usize,
    delay: Duration,
    strategy: Option<Arc<dyn MergeStrategy<I>>>,
    cancel: Option<CancellationToken>,
}

impl<I> AggregatorBuilder<I>
where
    I: AggregatorItem,
{
    pub fn new() -> Self {
        let defaults = AggregatorConfig::default();
        Self {
            initial_capacity: defaults.initial_capacity,
            delay: defaults.delay(),
            strategy: None,
            cancel: None,
        }
    }

    /// Take capacity and delay from a config.
    pub fn config(mut self, config: &AggregatorConfig) -> Self {
        self.initial_capacity = config.initial_capacity;
        self.delay = config.delay();
        self
    }

    pub fn initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn strategy<S>(mut self, strategy: S) -> Self
    where
        S: MergeStrategy<I> + 'static,
    {
        self.strategy = Some(Arc::new(strategy));
        self
    }

    /// Use a strategy already shared with other aggregators.
    pub fn shared_strategy(mut self, strategy: Arc<dyn MergeStrategy<I>>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Validate and start the aggregator.
    pub fn build(self) -> AggregatorResult<Aggregator<I>> {
        let strategy = self
            .strategy
            .ok_or_else(|| AggregatorError::invalid_argument("strategy", "must be set"))?;
        Aggregator::from_parts(self.initial_capacity, self.delay, strategy, self.cancel)
    }
}

impl<I> Default for AggregatorBuilder<I>
where
    I: AggregatorItem,
{
    fn default() -> Self {
        Self::new()
    }
}
