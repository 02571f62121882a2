//! Executor integration tests.
//!
//! Tests that verify jobs from many submitters run one at a time, in
//! submission order, and that waiting with a deadline never disturbs the job.

use predictor::testing::{FailingModel, FixedDelayModel, find_overlap};
use predictor::{Event, EventBus, Executor, ExecutorError};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::common::{RecordingHandler, payload, tag};

/// Test: Three queued jobs complete in order, and the last one is
/// available once the two ahead of it have run.
#[tokio::test]
async fn test_jobs_complete_in_submission_order() {
    let model = FixedDelayModel::new(Duration::from_millis(50));
    let executor = Executor::start(model.clone());

    let start = Instant::now();
    let a = executor.submit(payload(1)).unwrap();
    let b = executor.submit(payload(2)).unwrap();
    let c = executor.submit(payload(3)).unwrap();

    let output = c.wait(Duration::from_millis(200)).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(tag(&output), 3);
    assert!(
        elapsed >= Duration::from_millis(150),
        "C finished after only {:?}",
        elapsed
    );

    // A and B each finished before the next job started.
    let timings_a = a.status().timings().unwrap();
    let timings_b = b.status().timings().unwrap();
    let timings_c = c.status().timings().unwrap();
    assert!(timings_a.finished_at <= timings_b.started_at);
    assert!(timings_b.finished_at <= timings_c.started_at);
    assert_eq!(find_overlap(&model.executions().await), None);

    assert_eq!(tag(&a.wait(Duration::ZERO).await.unwrap()), 1);
    assert_eq!(tag(&b.wait(Duration::ZERO).await.unwrap()), 2);

    let order: Vec<u64> = model
        .executions()
        .await
        .iter()
        .map(|e| tag(&e.input))
        .collect();
    assert_eq!(order, vec![1, 2, 3]);
}

/// Test: A wait that gives up early does not cancel the job, and a later
/// wait on the same handle gets the real result.
#[tokio::test]
async fn test_timed_out_wait_then_success() {
    let model = FixedDelayModel::new(Duration::from_millis(100));
    let executor = Executor::start(model.clone());

    let handle = executor.submit(payload(7)).unwrap();

    let first = handle.wait(Duration::from_millis(10)).await;
    assert!(
        matches!(first, Err(ExecutorError::TimedOut { job_id, .. }) if job_id == handle.id()),
        "expected TimedOut, got {:?}",
        first
    );
    assert!(!handle.is_consumed());

    let second = handle.wait(Duration::from_millis(150)).await.unwrap();
    assert_eq!(tag(&second), 7);
    assert_eq!(model.call_count().await, 1);
}

/// Test: 100 concurrent submitters get 100 distinct handles and the model
/// never runs two jobs at once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submitters_are_serialized() {
    let model = FixedDelayModel::new(Duration::from_millis(2));
    let executor = Arc::new(Executor::start(model.clone()));

    let mut tasks = Vec::new();
    for n in 0..100u64 {
        let executor = Arc::clone(&executor);
        tasks.push(tokio::spawn(async move {
            let handle = executor.submit(payload(n)).unwrap();
            let output = handle.wait(Duration::from_secs(10)).await.unwrap();
            (handle.id(), handle.job().sequence(), tag(&output), n)
        }));
    }

    let mut ids = HashSet::new();
    let mut sequences = HashSet::new();
    for task in tasks {
        let (id, sequence, output, input) = task.await.unwrap();
        assert_eq!(output, input, "a caller received someone else's result");
        ids.insert(id);
        sequences.insert(sequence);
    }
    assert_eq!(ids.len(), 100);
    assert_eq!(sequences.len(), 100);

    let executions = model.executions().await;
    assert_eq!(executions.len(), 100);
    assert_eq!(find_overlap(&executions), None);
    assert_eq!(model.max_concurrent(), 1);
}

/// Test: Execution order follows sequence numbers assigned at submission.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_execution_order_matches_sequence() {
    let model = FixedDelayModel::new(Duration::from_millis(1));
    let executor = Arc::new(Executor::start(model.clone()));

    let mut tasks = Vec::new();
    for n in 0..20u64 {
        let executor = Arc::clone(&executor);
        tasks.push(tokio::spawn(async move {
            let handle = executor.submit(payload(n)).unwrap();
            (handle.job().sequence(), n, handle)
        }));
    }

    let mut by_sequence = Vec::new();
    for task in tasks {
        let (sequence, n, handle) = task.await.unwrap();
        handle.wait(Duration::from_secs(5)).await.unwrap();
        by_sequence.push((sequence, n));
    }
    by_sequence.sort();

    let expected: Vec<u64> = by_sequence.iter().map(|(_, n)| *n).collect();
    let executed: Vec<u64> = model
        .executions()
        .await
        .iter()
        .map(|e| tag(&e.input))
        .collect();
    assert_eq!(executed, expected);
}

/// Test: A failing job reports JobFailed and the next job still runs.
#[tokio::test]
async fn test_failure_does_not_block_queue() {
    let model = FailingModel::failing_on("n", json!(1));
    let executor = Executor::start(model.clone());

    let first = executor.submit(payload(0)).unwrap();
    let failing = executor.submit(payload(1)).unwrap();
    let last = executor.submit(payload(2)).unwrap();

    assert_eq!(tag(&first.wait(Duration::from_secs(1)).await.unwrap()), 0);
    match failing.wait(Duration::from_secs(1)).await {
        Err(ExecutorError::JobFailed { job_id, error }) => {
            assert_eq!(job_id, failing.id());
            assert!(error.contains("injected failure"), "got {}", error);
        }
        other => panic!("Expected JobFailed, got {:?}", other),
    }
    assert_eq!(tag(&last.wait(Duration::from_secs(1)).await.unwrap()), 2);
    assert_eq!(model.call_count(), 3);
}

/// Test: A panicking model is reported as a failed job, not a dead worker.
#[tokio::test]
async fn test_panic_is_contained() {
    let model = FailingModel::panicking_on("n", json!(1));
    let executor = Executor::start(model.clone());

    let panicking = executor.submit(payload(1)).unwrap();
    let next = executor.submit(payload(2)).unwrap();

    let result = panicking.wait(Duration::from_secs(1)).await;
    assert!(
        matches!(&result, Err(ExecutorError::JobFailed { error, .. }) if error.contains("panicked")),
        "expected JobFailed, got {:?}",
        result
    );
    assert_eq!(tag(&next.wait(Duration::from_secs(1)).await.unwrap()), 2);
}

/// Test: A result is delivered once; later waits on any clone are refused.
#[tokio::test]
async fn test_second_wait_is_already_consumed() {
    let model = FixedDelayModel::new(Duration::from_millis(5));
    let executor = Executor::start(model);

    let handle = executor.submit(payload(1)).unwrap();
    let clone = handle.clone();

    handle.wait(Duration::from_secs(1)).await.unwrap();

    assert_eq!(
        handle.wait(Duration::from_secs(1)).await,
        Err(ExecutorError::HandleAlreadyConsumed(handle.id()))
    );
    assert_eq!(
        clone.wait(Duration::from_secs(1)).await,
        Err(ExecutorError::HandleAlreadyConsumed(handle.id()))
    );
}

/// Test: Submitting never waits for the worker, however deep the queue.
#[tokio::test]
async fn test_submit_does_not_block_on_busy_worker() {
    let model = FixedDelayModel::new(Duration::from_millis(200));
    let executor = Executor::start(model);

    let start = Instant::now();
    let handles: Vec<_> = (0..500)
        .map(|n| executor.submit(payload(n)).unwrap())
        .collect();
    let elapsed = start.elapsed();

    assert_eq!(handles.len(), 500);
    assert!(
        elapsed < Duration::from_millis(100),
        "submitting took {:?}",
        elapsed
    );
    assert!(executor.queue_depth() >= 499);
}

/// Test: The worker reports each job's start and completion, in order.
#[tokio::test]
async fn test_events_follow_job_lifecycle() {
    let recorder = RecordingHandler::new();
    let bus = EventBus::new();
    bus.register(recorder.clone()).await;

    let model = FailingModel::failing_on("n", json!(2));
    let executor = Executor::builder(model)
        .with_event_bus(Arc::new(bus))
        .start();

    let ok = executor.submit(payload(1)).unwrap();
    let failed = executor.submit(payload(2)).unwrap();
    ok.wait(Duration::from_secs(1)).await.unwrap();
    failed.wait(Duration::from_secs(1)).await.unwrap_err();
    executor.shutdown().await;

    let events = recorder.events().await;
    assert_eq!(events.len(), 4);
    assert!(matches!(&events[0], Event::JobStarted { job_id, sequence: 0, .. } if *job_id == ok.id()));
    assert!(matches!(&events[1], Event::JobCompleted { job_id, .. } if *job_id == ok.id()));
    assert!(matches!(&events[2], Event::JobStarted { job_id, sequence: 1, .. } if *job_id == failed.id()));
    assert!(matches!(&events[3], Event::JobFailed { job_id, .. } if *job_id == failed.id()));
}
