//! Word feed tests: merge strategy contract and a full producer/consumer run
//! on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use aggregator_demo::{run_consumer, run_producer, FeedConfig, JoinWords, WordUpdate, PANGRAM};
use keyed_aggregator::{Aggregator, CancellationToken, MergeStrategy};

fn fixed_pace(keys: u32, pause_ms: u64) -> FeedConfig {
    FeedConfig {
        keys,
        min_pause: Duration::from_millis(pause_ms),
        max_pause: Duration::from_millis(pause_ms),
    }
}

#[test]
fn join_words_keeps_order_and_key() {
    let merged = JoinWords.merge(vec![
        WordUpdate::new(1, "quick"),
        WordUpdate::new(1, "brown"),
        WordUpdate::new(1, "fox"),
    ]);
    assert_eq!(merged, WordUpdate::new(1, "quick-brown-fox"));
}

#[test]
fn join_words_single_item_is_identity() {
    let merged = JoinWords.merge(vec![WordUpdate::new(4, "dog")]);
    assert_eq!(merged, WordUpdate::new(4, "dog"));
}

#[tokio::test(start_paused = true)]
async fn feed_round_trip_preserves_per_key_word_order() {
    let aggregator = Arc::new(
        Aggregator::<WordUpdate>::new(8, Duration::from_secs(1), JoinWords, None).unwrap(),
    );
    let shutdown = CancellationToken::new();

    let producer = tokio::spawn(run_producer(
        aggregator.clone(),
        fixed_pace(2, 100),
        shutdown.clone(),
    ));
    let consumer = tokio::spawn(run_consumer(aggregator.clone()));

    tokio::time::sleep(Duration::from_millis(2050)).await;
    shutdown.cancel();
    let sent = producer.await.unwrap();
    aggregator.stop().await.unwrap();
    let merged = consumer.await.unwrap();

    assert_eq!(sent, 20);
    assert_eq!(merged.len() as u64, aggregator.stats().windows_delivered);
    // Bursts were coalesced: far fewer results than words.
    assert!(merged.len() < sent as usize);

    let words: Vec<&str> = PANGRAM.split(' ').collect();
    for key in 1..=2u32 {
        let expected: Vec<&str> = (0..sent as usize)
            .filter(|i| (*i as u32 % 2) + 1 == key)
            .map(|i| words[i % words.len()])
            .collect();
        let received: Vec<&str> = merged
            .iter()
            .filter(|update| update.key == key)
            .flat_map(|update| update.value.split('-'))
            .collect();
        assert_eq!(received, expected, "word order broken for key {key}");
    }
}

#[tokio::test(start_paused = true)]
async fn producer_stops_when_aggregator_is_cancelled() {
    let cancel = CancellationToken::new();
    let aggregator = Arc::new(
        Aggregator::<WordUpdate>::new(1, Duration::from_secs(1), JoinWords, Some(cancel.clone()))
            .unwrap(),
    );

    let producer = tokio::spawn(run_producer(
        aggregator.clone(),
        fixed_pace(1, 100),
        CancellationToken::new(),
    ));
    let consumer = tokio::spawn(run_consumer(aggregator.clone()));

    tokio::time::sleep(Duration::from_millis(550)).await;
    cancel.cancel();

    let sent = producer.await.unwrap();
    assert_eq!(sent, 5);
    assert!(consumer.await.unwrap().is_empty());
    assert_eq!(aggregator.stats().windows_cancelled, 1);
}
