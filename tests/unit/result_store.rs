//! Result store durability and replace semantics

use crate::support::success_outcome;
use puzzle_bench::store::ResultStore;
use puzzle_bench::{AttemptOutcome, ProviderKind, Task};

#[test]
fn replace_not_append_across_commits_and_reloads() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("results.json");

    let mut store = ResultStore::load(&path).unwrap();
    store
        .commit(3, "March 2021", success_outcome(1, 0.25, "first"))
        .unwrap();
    store
        .commit(3, "March 2021", success_outcome(1, 0.25, "second"))
        .unwrap();

    let reloaded = ResultStore::load(&path).unwrap();
    let puzzle = reloaded.document().get(3).unwrap();
    assert_eq!(puzzle.answers.len(), 1);
    assert_eq!(
        puzzle.answer_for(1).unwrap().answer.as_deref(),
        Some("second")
    );
}

#[test]
fn on_disk_shape_matches_the_original_results_format() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("results.json");

    let mut store = ResultStore::load(&path).unwrap();
    store
        .commit(1, "A", success_outcome(1, 0.25, "4"))
        .unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["1"]["name"], "A");
    let answer = &raw["1"]["answers"][0];
    assert_eq!(answer["attempt"], 1);
    assert_eq!(answer["temperature"], 0.25);
    assert_eq!(answer["answer"], "4");
    assert_eq!(answer["prompt_tokens"], 10);
    assert_eq!(answer["completion_tokens"], 2);
    assert_eq!(answer["total_tokens"], 12);
}

#[test]
fn commit_leaves_no_temp_files_behind() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("results.json");

    let mut store = ResultStore::load(&path).unwrap();
    for i in 0..5 {
        store
            .commit(i, "p", success_outcome(1, 0.25, "x"))
            .unwrap();
    }

    // Only the results file and its lock file remain in the directory
    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["results.json", "results.lock"]);
}

#[test]
fn every_commit_is_durable_before_returning() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("results.json");

    let mut store = ResultStore::load(&path).unwrap();
    let task = Task {
        puzzle_id: 5,
        attempt: 1,
        temperature: 0.25,
        provider: ProviderKind::Openai,
    };
    store
        .commit(5, "p", AttemptOutcome::failure(&task, "boom"))
        .unwrap();

    // A fresh load (simulating a crashed-and-restarted process) sees the
    // committed failure
    let recovered = ResultStore::load(&path).unwrap();
    assert_eq!(
        recovered
            .document()
            .get(5)
            .unwrap()
            .answer_for(1)
            .unwrap()
            .error
            .as_deref(),
        Some("boom")
    );
}
