//! Keyed debounce aggregator
//!
//! Coalesces bursts of updates for the same entity before reacting to them:
//! - Items are grouped by key while a debounce window is open
//! - Each window is fixed at `delay` from its first item (never extended)
//! - When a window fires, its group is merged by a caller-supplied
//!   [`MergeStrategy`] and the single result is pushed to an output stream
//! - `stop` drains every open window before returning
//!
//! # Usage
//!
//! ```rust,ignore
//! use keyed_aggregator::{merge_fn, Aggregator, AggregatorItem};
//!
//! let aggregator = Aggregator::builder()
//!     .config(&AggregatorConfig::from_env())
//!     .strategy(merge_fn(|mut items: Vec<Update>| items.pop().unwrap()))
//!     .cancellation(token.clone())
//!     .build()?;
//!
//! aggregator.send(update).await?;
//! let mut merged = Box::pin(aggregator.stream());
//! while let Some(item) = merged.next().await { /* ... */ }
//!
//! aggregator.stop().await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod item;
pub mod output;
mod scheduler;
pub mod stats;
pub mod store;

pub use config::AggregatorConfig;
pub use engine::{Aggregator, AggregatorBuilder};
pub use error::{AggregatorError, AggregatorResult};
pub use item::{merge_fn, AggregatorItem, MergeFn, MergeStrategy};
pub use stats::AggregatorStats;
pub use store::{WindowPhase, WindowState};

// Re-exported so callers can build tokens without a direct tokio-util dependency.
pub use tokio_util::sync::CancellationToken;
