//! Key group store: pending items per key plus the companion window table.
//!
//! Both maps are mutated together under the engine lock. A key has a pending
//! group if and only if it has a `Delaying` window entry; `append` creates
//! both, `detach` removes both.

use std::collections::HashMap;
use std::hash::Hash;
use tokio::time::{Duration, Instant};

use crate::error::{AggregatorError, AggregatorResult};

/// Lifecycle of a key's debounce window.
///
/// Only `Delaying` is ever stored; the other phases are transient and exist
/// for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPhase {
    /// First item arrived, window not yet registered.
    Open,
    /// Timer running; further items are appended.
    Delaying,
    /// Group detached, merge and push in progress.
    Delivering,
    /// Result pushed (or dropped under cancellation).
    Closed,
}

impl std::fmt::Display for WindowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Delaying => write!(f, "delaying"),
            Self::Delivering => write!(f, "delivering"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// State table entry for a key with an in-flight window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Delaying { opened_at: Instant, deadline: Instant },
}

impl WindowState {
    pub fn phase(&self) -> WindowPhase {
        match self {
            Self::Delaying { .. } => WindowPhase::Delaying,
        }
    }

    /// Instant the window fires. Fixed at creation, never extended.
    pub fn deadline(&self) -> Instant {
        match self {
            Self::Delaying { deadline, .. } => *deadline,
        }
    }
}

/// What `append` did with the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// A new group was created; the caller must schedule its firing.
    Opened { deadline: Instant },
    /// The item joined an existing group of `len` items.
    Appended { len: usize },
}

/// A group removed from the store, ready for merging.
#[derive(Debug)]
pub struct DetachedGroup<I> {
    pub items: Vec<I>,
    pub opened_at: Instant,
}

/// Pending groups and window states keyed by `K`.
#[derive(Debug)]
pub struct KeyGroupStore<K, I> {
    groups: HashMap<K, Vec<I>>,
    windows: HashMap<K, WindowState>,
}

impl<K, I> KeyGroupStore<K, I>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    /// Create a store sized for roughly `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            groups: HashMap::with_capacity(capacity),
            windows: HashMap::with_capacity(capacity),
        }
    }

    /// Append `item` to the group for `key`, opening a window if none exists.
    pub fn append(&mut self, key: K, item: I, now: Instant, delay: Duration) -> AppendOutcome {
        if let Some(group) = self.groups.get_mut(&key) {
            group.push(item);
            return AppendOutcome::Appended { len: group.len() };
        }

        let deadline = now + delay;
        self.groups.insert(key.clone(), vec![item]);
        self.windows.insert(
            key,
            WindowState::Delaying {
                opened_at: now,
                deadline,
            },
        );
        AppendOutcome::Opened { deadline }
    }

    /// Remove the group and window entry for `key` in one step.
    ///
    /// A missing group means a window fired twice or was never registered.
    pub fn detach(&mut self, key: &K) -> AggregatorResult<DetachedGroup<I>> {
        let items = self
            .groups
            .remove(key)
            .ok_or_else(|| AggregatorError::inconsistency(key))?;

        let opened_at = match self.windows.remove(key) {
            Some(WindowState::Delaying { opened_at, .. }) => opened_at,
            None => return Err(AggregatorError::inconsistency(key)),
        };

        Ok(DetachedGroup { items, opened_at })
    }

    /// Window state for `key`, if a window is open.
    pub fn window(&self, key: &K) -> Option<WindowState> {
        self.windows.get(key).copied()
    }

    /// Number of items waiting in `key`'s group.
    pub fn pending_len(&self, key: &K) -> usize {
        self.groups.get(key).map_or(0, Vec::len)
    }

    /// Number of keys with an open window.
    pub fn open_windows(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
