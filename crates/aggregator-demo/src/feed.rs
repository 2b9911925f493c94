//! Word feed: a producer pushing words per key and a consumer logging merges.

use futures::StreamExt;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use keyed_aggregator::{
    Aggregator, AggregatorError, AggregatorItem, CancellationToken, MergeStrategy,
};

/// Source text cycled by the producer.
pub const PANGRAM: &str = "The quick brown fox jumps over the lazy dog";

/// One word update for a numeric key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordUpdate {
    pub key: u32,
    pub value: String,
}

impl WordUpdate {
    pub fn new(key: u32, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

impl AggregatorItem for WordUpdate {
    type Key = u32;

    fn key(&self) -> u32 {
        self.key
    }
}

/// Joins a window's words with `-`, keeping the key of the group.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinWords;

impl MergeStrategy<WordUpdate> for JoinWords {
    fn merge(&self, items: Vec<WordUpdate>) -> WordUpdate {
        let key = items.first().map_or(0, |item| item.key);
        let value = items
            .iter()
            .map(|item| item.value.as_str())
            .collect::<Vec<_>>()
            .join("-");
        WordUpdate { key, value }
    }
}

/// Producer pacing and key fan-out.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Keys `1..=keys` receive words round-robin.
    pub keys: u32,
    pub min_pause: Duration,
    pub max_pause: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            keys: 1,
            min_pause: Duration::from_millis(100),
            max_pause: Duration::from_millis(600),
        }
    }
}

impl FeedConfig {
    fn pause(&self) -> Duration {
        if self.max_pause <= self.min_pause {
            return self.min_pause;
        }
        rand::thread_rng().gen_range(self.min_pause..=self.max_pause)
    }
}

/// Send words until `shutdown` fires. Returns the number of words sent.
pub async fn run_producer(
    aggregator: Arc<Aggregator<WordUpdate>>,
    config: FeedConfig,
    shutdown: CancellationToken,
) -> u64 {
    let words: Vec<&str> = PANGRAM.split(' ').collect();
    let keys = config.keys.max(1);
    let mut sent: u64 = 0;

    for (i, word) in words.iter().cycle().enumerate() {
        let pause = config.pause();
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }

        let key = (i as u32 % keys) + 1;
        match aggregator.send(WordUpdate::new(key, *word)).await {
            Ok(()) => {
                sent += 1;
                debug!(key, word, "word sent");
            }
            Err(e) => {
                warn!(error = %e, "producer stopping");
                break;
            }
        }
    }

    info!(sent, "producer finished");
    sent
}

/// Log merged updates until the stream ends or is cancelled.
///
/// Returns every merged update received, in arrival order.
pub async fn run_consumer(aggregator: Arc<Aggregator<WordUpdate>>) -> Vec<WordUpdate> {
    let mut merged = Box::pin(aggregator.stream());
    let mut received = Vec::new();

    while let Some(item) = merged.next().await {
        match item {
            Ok(update) => {
                info!(key = update.key, value = %update.value, "merged update");
                received.push(update);
            }
            Err(AggregatorError::Cancelled) => {
                info!("consumer cancelled");
                break;
            }
            Err(e) => {
                warn!(error = %e, "consumer stopping on error");
                break;
            }
        }
    }

    received
}
