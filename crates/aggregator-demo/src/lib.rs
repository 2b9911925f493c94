//! Demo harness for the keyed debounce aggregator.
//!
//! A producer cycles the words of a pangram across one or more keys at
//! random intervals; the aggregator collapses each key's burst into a single
//! `-`-joined update that a consumer logs.

pub mod feed;

pub use feed::{run_consumer, run_producer, FeedConfig, JoinWords, WordUpdate, PANGRAM};
