//! Outstanding-task enumeration
//!
//! Diffs the full task space (puzzle set x attempt schedule) against the
//! result store. Read-only; the same inputs always produce the same ordered
//! task list.

use crate::puzzles::PuzzleRecord;
use crate::store::ResultsDocument;
use crate::{AttemptSpec, ProviderKind, Task};

/// Whether a (puzzle, attempt) pair still needs execution.
///
/// A pair is settled by a successful (non-blank) answer, or - unless
/// `rerun_failed` is set - by a failed-terminal outcome: failures are not
/// retried automatically across sweep runs, only on explicit request.
pub fn needs_run(
    document: &ResultsDocument,
    puzzle_id: u64,
    attempt: u32,
    rerun_failed: bool,
) -> bool {
    let Some(results) = document.get(puzzle_id) else {
        return true;
    };

    match results.answer_for(attempt) {
        None => true,
        Some(outcome) => {
            if outcome.is_success() {
                false
            } else {
                rerun_failed || outcome.error.is_none()
            }
        }
    }
}

/// Produce the ordered sequence of tasks still needing execution.
///
/// Puzzles are visited in source order; within a puzzle, attempts in
/// attempt-index order. Puzzles without text content are excluded
/// permanently, never retried.
pub fn outstanding_tasks(
    puzzles: &[PuzzleRecord],
    schedule: &[AttemptSpec],
    document: &ResultsDocument,
    provider: ProviderKind,
    rerun_failed: bool,
) -> Vec<Task> {
    let mut tasks = Vec::new();

    for puzzle in puzzles {
        if !puzzle.has_content() {
            continue;
        }

        for spec in schedule {
            if needs_run(document, puzzle.id, spec.attempt, rerun_failed) {
                tasks.push(Task {
                    puzzle_id: puzzle.id,
                    attempt: spec.attempt,
                    temperature: spec.temperature,
                    provider,
                });
            }
        }
    }

    tasks
}
