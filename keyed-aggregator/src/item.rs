//! Capability contracts the host must satisfy: keyed items and a merge strategy.

use std::fmt::Debug;
use std::hash::Hash;

/// An item that can be aggregated: exposes a stable key for its lifetime.
///
/// Items move between the caller, debounce tasks and the consumer, so they
/// must be `Send + Sync + 'static`.
pub trait AggregatorItem: Send + Sync + 'static {
    /// Grouping key. Items with equal keys land in the same pending group.
    type Key: Eq + Hash + Clone + Debug + Send + Sync + 'static;

    fn key(&self) -> Self::Key;
}

/// Collapses one debounce window worth of same-key items into one item.
///
/// `items` is never empty and is in arrival order. Implementations should be
/// pure with respect to engine state and must not block indefinitely: merge
/// latency directly delays delivery of that key's result.
///
/// Merging runs outside the engine lock. Results for one key stay in window
/// order only while `merge` returns within the configured delay: a merge
/// slower than that can let the key's next window deliver first.
#[cfg_attr(test, mockall::automock)]
pub trait MergeStrategy<I: Send + Sync + 'static>: Send + Sync {
    fn merge(&self, items: Vec<I>) -> I;
}

/// Adapter turning a closure into a [`MergeStrategy`].
#[derive(Clone)]
pub struct MergeFn<F> {
    f: F,
}

/// Wrap a closure as a merge strategy.
///
/// ```rust,ignore
/// let strategy = merge_fn(|mut items: Vec<Update>| items.pop().unwrap_or_default());
/// ```
pub fn merge_fn<I, F>(f: F) -> MergeFn<F>
where
    I: Send + Sync + 'static,
    F: Fn(Vec<I>) -> I + Send + Sync,
{
    MergeFn { f }
}

impl<I, F> MergeStrategy<I> for MergeFn<F>
where
    I: Send + Sync + 'static,
    F: Fn(Vec<I>) -> I + Send + Sync,
{
    fn merge(&self, items: Vec<I>) -> I {
        (self.f)(items)
    }
}

impl<F> Debug for MergeFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeFn").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Reading {
        sensor: u32,
        value: i64,
    }

    impl AggregatorItem for Reading {
        type Key = u32;

        fn key(&self) -> u32 {
            self.sensor
        }
    }

    #[test]
    fn test_merge_fn_sums_in_order() {
        let strategy = merge_fn(|items: Vec<Reading>| Reading {
            sensor: items[0].sensor,
            value: items.iter().map(|r| r.value).sum(),
        });

        let merged = strategy.merge(vec![
            Reading { sensor: 7, value: 2 },
            Reading { sensor: 7, value: 5 },
        ]);

        assert_eq!(merged, Reading { sensor: 7, value: 7 });
        assert_eq!(merged.key(), 7);
    }

    #[test]
    fn test_mock_strategy_sees_items() {
        let mut mock = MockMergeStrategy::<Reading>::new();
        mock.expect_merge()
            .withf(|items| items.len() == 1 && items[0].value == 3)
            .times(1)
            .returning(|mut items| items.remove(0));

        let merged = mock.merge(vec![Reading { sensor: 1, value: 3 }]);
        assert_eq!(merged.value, 3);
    }

    #[test]
    fn test_mock_strategy_shared_across_threads() {
        let mut mock = MockMergeStrategy::<Reading>::new();
        mock.expect_merge()
            .times(1)
            .returning(|mut items| items.pop().unwrap());
        let strategy: std::sync::Arc<dyn MergeStrategy<Reading>> = std::sync::Arc::new(mock);

        let merged = std::thread::spawn(move || {
            strategy.merge(vec![Reading { sensor: 2, value: 1 }, Reading { sensor: 2, value: 8 }])
        })
        .join()
        .unwrap();
        assert_eq!(merged, Reading { sensor: 2, value: 8 });
    }
}
