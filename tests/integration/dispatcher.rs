//! Batch dispatch through the worker pool.

use cadence::testing::FlakyProcessor;
use cadence::{
    Dispatcher, DispatcherConfig, FixedLoad, FnUnit, ItemId, ItemProcessor, RetryPolicy,
    UnitProcessor, Uppercase, WorkError, WorkItem, WorkOutput, WorkUnit,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn dispatcher(load: f64) -> Dispatcher {
    Dispatcher::new(
        DispatcherConfig::default()
            .with_pool_size(2)
            .with_retry(RetryPolicy::fixed(3, Duration::from_millis(10))),
        Arc::new(FixedLoad(load)),
    )
}

fn upper() -> Arc<dyn ItemProcessor<String, String>> {
    Arc::new(Uppercase)
}

fn words(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("word{i}")).collect()
}

#[tokio::test]
async fn test_small_batch_processes_every_item() {
    let dispatcher = dispatcher(0.2);

    let outputs = dispatcher
        .dispatch(upper(), WorkItem::batch(words(5)))
        .await;

    let got: HashSet<String> = outputs.into_iter().collect();
    let want: HashSet<String> = words(5).iter().map(|w| w.to_uppercase()).collect();
    assert_eq!(got, want);
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_large_batch_splits_under_low_load() {
    let dispatcher = dispatcher(0.2);

    let outcome = dispatcher
        .dispatch_detailed(upper(), WorkItem::batch(words(20)))
        .await;

    assert_eq!(outcome.workers, 2);
    assert_eq!(outcome.chunk_sizes, vec![10, 10]);
    assert_eq!(outcome.outputs.len(), 20);
    assert!(outcome.abandoned.is_empty());
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_large_batch_stays_on_one_worker_under_high_load() {
    let dispatcher = dispatcher(3.5);

    let outcome = dispatcher
        .dispatch_detailed(upper(), WorkItem::batch(words(20)))
        .await;

    assert_eq!(outcome.workers, 1);
    assert_eq!(outcome.chunk_sizes, vec![20]);
    assert_eq!(outcome.outputs.len(), 20);
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_retry_recovers_flaky_items_and_drops_hopeless_ones() {
    let dispatcher = dispatcher(0.2);
    let processor = Arc::new(FlakyProcessor::new(2).always_failing("item-1"));

    let outputs = dispatcher
        .dispatch_with_retry(
            processor.clone() as Arc<dyn ItemProcessor<u32, u32>>,
            WorkItem::batch([10u32, 11, 12, 13]),
        )
        .await;

    assert_eq!(outputs, vec![10, 12, 13]);
    assert_eq!(processor.calls(&ItemId::new("item-0")).await, 3);
    assert_eq!(processor.calls(&ItemId::new("item-1")).await, 3);
    assert_eq!(processor.total_calls().await, 12);
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_work_units_dispatch_through_unit_processor() {
    let dispatcher = dispatcher(0.2);
    let units: Vec<Arc<dyn WorkUnit>> = vec![
        Arc::new(FnUnit::new("one", || Ok("1".to_string()))),
        Arc::new(FnUnit::new("broken", || {
            Err(WorkError::ExecutionFailed("nope".to_string()))
        })),
        Arc::new(FnUnit::new("three", || Ok("3".to_string()))),
    ];
    let processor: Arc<dyn ItemProcessor<Arc<dyn WorkUnit>, WorkOutput>> = Arc::new(UnitProcessor);

    let outputs = dispatcher.dispatch(processor, WorkItem::batch(units)).await;

    let stdout: Vec<&str> = outputs.iter().map(|o| o.stdout.as_str()).collect();
    assert_eq!(stdout, vec!["1", "3"]);
    dispatcher.shutdown().await;
}
