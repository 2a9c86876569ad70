//! Crash-and-resume behavior through the full loop

use crate::support::{puzzle, ScriptedAdapter};
use puzzle_bench::dispatch::SweepExecutor;
use puzzle_bench::puzzles::NoAttachments;
use puzzle_bench::shutdown::ShutdownGate;
use puzzle_bench::store::ResultStore;
use puzzle_bench::AttemptSpec;
use std::sync::Arc;
use tokio::sync::Mutex;

#[tokio::test(start_paused = true)]
async fn interrupted_sweep_resumes_with_exactly_the_remaining_work() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("results.json");

    let puzzles = [
        puzzle(1, "A", Some("first")),
        puzzle(2, "B", Some("second")),
        puzzle(3, "C", Some("third")),
    ];
    let schedule = AttemptSpec::schedule(&[0.25]);

    // First run: the script covers only two tasks; the third call hits the
    // exhausted-script fatal, simulating a run that died partway.
    {
        let store = Arc::new(Mutex::new(ResultStore::load(&path).unwrap()));
        let adapter = Arc::new(ScriptedAdapter::new(vec![
            ScriptedAdapter::completed("a1"),
            ScriptedAdapter::completed("b1"),
            ScriptedAdapter::fatal("process killed"),
        ]));
        let executor = SweepExecutor::new(adapter, store);
        executor.run(&puzzles, &schedule, &NoAttachments).await.unwrap();
    }

    // Second run against the same file: the failed-terminal task is settled,
    // so with rerun disabled nothing is outstanding.
    {
        let store = Arc::new(Mutex::new(ResultStore::load(&path).unwrap()));
        let adapter = Arc::new(ScriptedAdapter::new(vec![]));
        let executor = SweepExecutor::new(adapter.clone(), store);
        let progress = executor.run(&puzzles, &schedule, &NoAttachments).await.unwrap();
        assert_eq!(adapter.calls(), 0);
        assert_eq!(progress.attempted, 0);
    }

    // Third run with rerun-failed: only puzzle 3 is re-dispatched, and this
    // time it succeeds, replacing the failure in place.
    {
        let store = Arc::new(Mutex::new(ResultStore::load(&path).unwrap()));
        let adapter = Arc::new(ScriptedAdapter::new(vec![ScriptedAdapter::completed("c1")]));
        let executor = SweepExecutor::new(adapter.clone(), store.clone()).with_rerun_failed(true);
        let progress = executor.run(&puzzles, &schedule, &NoAttachments).await.unwrap();

        assert_eq!(adapter.calls(), 1);
        assert_eq!(progress.succeeded, 1);

        let locked = store.lock().await;
        let outcome = locked.document().get(3).unwrap().answer_for(1).unwrap();
        assert_eq!(outcome.answer.as_deref(), Some("c1"));
        assert!(outcome.error.is_none());
        // Replaced, not appended
        assert_eq!(locked.document().get(3).unwrap().answers.len(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_new_admissions_but_commits_finished_work() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("results.json");
    let store = Arc::new(Mutex::new(ResultStore::load(&path).unwrap()));

    let gate = ShutdownGate::shared();
    gate.request_stop();

    let adapter = Arc::new(ScriptedAdapter::new(vec![ScriptedAdapter::completed("x")]));
    let executor = SweepExecutor::new(adapter.clone(), store.clone()).with_shutdown(gate);

    let puzzles = [puzzle(1, "A", Some("text"))];
    let schedule = AttemptSpec::schedule(&[0.25]);
    let progress = executor.run(&puzzles, &schedule, &NoAttachments).await.unwrap();

    // Stop was requested before the first admission: nothing dispatched,
    // nothing committed, everything still outstanding for the next run.
    assert_eq!(adapter.calls(), 0);
    assert_eq!(progress.attempted, 0);
    assert_eq!(progress.outstanding, 1);
    assert!(store.lock().await.document().is_empty());
}
