//! Dispatch loop behavior with scripted adapters

use crate::support::{puzzle, success_outcome, ScriptedAdapter};
use puzzle_bench::dispatch::{RetryPolicy, SweepExecutor};
use puzzle_bench::store::ResultStore;
use puzzle_bench::puzzles::NoAttachments;
use puzzle_bench::AttemptSpec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

fn store_at(dir: &tempfile::TempDir) -> Arc<Mutex<ResultStore>> {
    Arc::new(Mutex::new(
        ResultStore::load(dir.path().join("results.json")).unwrap(),
    ))
}

#[tokio::test(start_paused = true)]
async fn idempotence_no_calls_when_everything_succeeded() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = store_at(&dir);
    {
        let mut locked = store.lock().await;
        locked.commit(1, "A", success_outcome(1, 0.25, "4")).unwrap();
        locked.commit(1, "A", success_outcome(2, 0.30, "4")).unwrap();
    }

    let adapter = Arc::new(ScriptedAdapter::new(vec![]));
    let executor = SweepExecutor::new(adapter.clone(), store);

    let puzzles = [puzzle(1, "A", Some("2+2?"))];
    let schedule = AttemptSpec::schedule(&[0.25, 0.30]);
    let progress = executor.run(&puzzles, &schedule, &NoAttachments).await.unwrap();

    assert_eq!(adapter.calls(), 0);
    assert_eq!(progress.attempted, 0);
    assert_eq!(progress.outstanding, 0);
}

#[tokio::test(start_paused = true)]
async fn throttle_retry_converges_on_the_same_task() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = store_at(&dir);

    let adapter = Arc::new(ScriptedAdapter::new(vec![
        ScriptedAdapter::throttled(Duration::from_millis(50)),
        ScriptedAdapter::throttled(Duration::from_millis(50)),
        ScriptedAdapter::completed("4"),
    ]));
    let executor = SweepExecutor::new(adapter.clone(), store.clone());

    let puzzles = [puzzle(1, "A", Some("2+2?"))];
    let schedule = AttemptSpec::schedule(&[0.25]);

    let started = Instant::now();
    let progress = executor.run(&puzzles, &schedule, &NoAttachments).await.unwrap();
    let elapsed = Instant::now().duration_since(started);

    // Exactly 3 execute calls, one terminal success, at least the two retry
    // hints' worth of waiting before it
    assert_eq!(adapter.calls(), 3);
    assert_eq!(progress.attempted, 1);
    assert_eq!(progress.succeeded, 1);
    assert_eq!(progress.throttle_retries, 2);
    assert!(elapsed >= Duration::from_millis(100), "elapsed {elapsed:?}");

    let locked = store.lock().await;
    assert_eq!(
        locked
            .document()
            .get(1)
            .unwrap()
            .answer_for(1)
            .unwrap()
            .answer
            .as_deref(),
        Some("4")
    );
}

#[tokio::test(start_paused = true)]
async fn fatal_error_is_committed_and_not_retried() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = store_at(&dir);

    let adapter = Arc::new(ScriptedAdapter::new(vec![ScriptedAdapter::fatal(
        "content policy rejection",
    )]));
    let executor = SweepExecutor::new(adapter.clone(), store.clone());

    let puzzles = [puzzle(1, "A", Some("2+2?"))];
    let schedule = AttemptSpec::schedule(&[0.25]);
    let progress = executor.run(&puzzles, &schedule, &NoAttachments).await.unwrap();

    assert_eq!(adapter.calls(), 1);
    assert_eq!(progress.failed, 1);

    {
        let locked = store.lock().await;
        let outcome = locked.document().get(1).unwrap().answer_for(1).unwrap();
        assert!(outcome.answer.is_none());
        assert_eq!(outcome.error.as_deref(), Some("content policy rejection"));
    }

    // The sweep continues past the failure and a later run does not retry it
    let adapter2 = Arc::new(ScriptedAdapter::new(vec![]));
    let executor2 = SweepExecutor::new(adapter2.clone(), store);
    let progress2 = executor2.run(&puzzles, &schedule, &NoAttachments).await.unwrap();
    assert_eq!(adapter2.calls(), 0);
    assert_eq!(progress2.attempted, 0);
}

#[tokio::test(start_paused = true)]
async fn throttle_cap_turns_task_failed_terminal() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = store_at(&dir);

    let adapter = Arc::new(ScriptedAdapter::new(vec![
        ScriptedAdapter::throttled(Duration::from_millis(10)),
        ScriptedAdapter::throttled(Duration::from_millis(10)),
        ScriptedAdapter::throttled(Duration::from_millis(10)),
    ]));
    let executor = SweepExecutor::new(adapter.clone(), store.clone())
        .with_retry_policy(RetryPolicy::new().with_max_throttle_retries(Some(2)));

    let puzzles = [puzzle(1, "A", Some("2+2?"))];
    let schedule = AttemptSpec::schedule(&[0.25]);
    let progress = executor.run(&puzzles, &schedule, &NoAttachments).await.unwrap();

    // Two retries allowed, so three throttles end the task
    assert_eq!(adapter.calls(), 3);
    assert_eq!(progress.failed, 1);

    let locked = store.lock().await;
    let outcome = locked.document().get(1).unwrap().answer_for(1).unwrap();
    assert!(outcome
        .error
        .as_deref()
        .unwrap()
        .contains("throttle retry cap"));
}

#[tokio::test(start_paused = true)]
async fn skip_on_missing_content_across_repeated_runs() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = store_at(&dir);

    let puzzles = [puzzle(1, "no-text", None), puzzle(2, "B", Some("1+1?"))];
    let schedule = AttemptSpec::schedule(&[0.25]);

    for _ in 0..2 {
        let adapter = Arc::new(ScriptedAdapter::new(vec![ScriptedAdapter::completed("2")]));
        let executor = SweepExecutor::new(adapter.clone(), store.clone());
        executor.run(&puzzles, &schedule, &NoAttachments).await.unwrap();
        // Only puzzle 2 is ever dispatched
        assert!(adapter.calls() <= 1);
    }

    let locked = store.lock().await;
    assert!(locked.document().get(1).is_none());
    assert!(locked.document().get(2).is_some());
}

#[tokio::test(start_paused = true)]
async fn end_to_end_scenario_produces_the_expected_document() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("results.json");
    let store = Arc::new(Mutex::new(ResultStore::load(&path).unwrap()));

    let adapter = Arc::new(ScriptedAdapter::new(vec![
        ScriptedAdapter::completed("4"),
        ScriptedAdapter::completed("4"),
    ]));
    let executor = SweepExecutor::new(adapter.clone(), store);

    let puzzles = [puzzle(1, "A", Some("2+2?"))];
    let schedule = AttemptSpec::schedule(&[0.25, 0.30]);
    let progress = executor.run(&puzzles, &schedule, &NoAttachments).await.unwrap();

    assert_eq!(adapter.calls(), 2);
    assert_eq!(progress.succeeded, 2);
    assert_eq!(progress.outstanding, 0);

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["1"]["name"], "A");
    let answers = raw["1"]["answers"].as_array().unwrap();
    assert_eq!(answers.len(), 2);
    assert_eq!(answers[0]["attempt"], 1);
    assert_eq!(answers[0]["answer"], "4");
    assert_eq!(answers[1]["attempt"], 2);
    assert_eq!(answers[1]["answer"], "4");
}
