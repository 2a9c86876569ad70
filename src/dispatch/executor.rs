//! The dispatch loop
//!
//! Per task: Pending -> Admitted -> Executing -> {Succeeded, Retrying,
//! Failed}. Retrying goes back through admission after the retry delay; the
//! enumerator only advances on a terminal outcome, which is committed to the
//! store before the next task starts.

use crate::dispatch::enumerate::outstanding_tasks;
use crate::dispatch::progress::SweepProgress;
use crate::dispatch::quota::{QuotaDimension, QuotaGovernor};
use crate::dispatch::retry::RetryPolicy;
use crate::dispatch::DispatchError;
use crate::metrics;
use crate::provider::{CallOutcome, ProviderAdapter};
use crate::puzzles::{AttachmentSource, PuzzleContent, PuzzleRecord};
use crate::shutdown::{self, SharedShutdown};
use crate::store::ResultStore;
use crate::{AttemptOutcome, AttemptSpec};
use indicatif::ProgressBar;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

/// Orchestrates one provider's sweep: admission, execution, retry, commit.
pub struct SweepExecutor {
    adapter: Arc<dyn ProviderAdapter>,
    store: Arc<Mutex<ResultStore>>,
    governor: QuotaGovernor,
    retry: RetryPolicy,
    shutdown: Option<SharedShutdown>,
    rerun_failed: bool,
    progress_bar: Option<ProgressBar>,
}

impl SweepExecutor {
    /// Create an executor for an adapter, with its own quota governor sized
    /// from the adapter's quota rule.
    pub fn new(adapter: Arc<dyn ProviderAdapter>, store: Arc<Mutex<ResultStore>>) -> Self {
        let governor = QuotaGovernor::new(adapter.quota());
        Self {
            adapter,
            store,
            governor,
            retry: RetryPolicy::default(),
            shutdown: shutdown::get_global_shutdown(),
            rerun_failed: false,
            progress_bar: None,
        }
    }

    /// Override the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the quota governor (tests use shortened windows).
    pub fn with_quota_governor(mut self, governor: QuotaGovernor) -> Self {
        self.governor = governor;
        self
    }

    /// Attach a shared shutdown handle for graceful early stop.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Treat failed-terminal outcomes as outstanding (manual re-run).
    pub fn with_rerun_failed(mut self, rerun_failed: bool) -> Self {
        self.rerun_failed = rerun_failed;
        self
    }

    /// Attach a progress bar advanced once per terminal outcome.
    pub fn with_progress_bar(mut self, bar: ProgressBar) -> Self {
        self.progress_bar = Some(bar);
        self
    }

    /// Count the tasks a run would execute right now, without executing.
    pub async fn outstanding(
        &self,
        puzzles: &[PuzzleRecord],
        schedule: &[AttemptSpec],
    ) -> usize {
        let document = self.store.lock().await.document().clone();
        outstanding_tasks(
            puzzles,
            schedule,
            &document,
            self.adapter.kind(),
            self.rerun_failed,
        )
        .len()
    }

    /// Run the sweep to completion (or until shutdown).
    ///
    /// Every terminal outcome is committed before the loop advances; a crash
    /// or Ctrl+C loses at most the in-flight request.
    pub async fn run(
        &self,
        puzzles: &[PuzzleRecord],
        schedule: &[AttemptSpec],
        attachments: &dyn AttachmentSource,
    ) -> Result<SweepProgress, DispatchError> {
        let span = info_span!(
            "sweep",
            provider = %self.adapter.kind(),
            model = %self.adapter.model(),
        );
        self.run_inner(puzzles, schedule, attachments)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        puzzles: &[PuzzleRecord],
        schedule: &[AttemptSpec],
        attachments: &dyn AttachmentSource,
    ) -> Result<SweepProgress, DispatchError> {
        let kind = self.adapter.kind();
        let document = self.store.lock().await.document().clone();
        let tasks = outstanding_tasks(puzzles, schedule, &document, kind, self.rerun_failed);

        info!(
            outstanding = tasks.len(),
            puzzles = puzzles.len(),
            attempts_per_puzzle = schedule.len(),
            "Starting sweep"
        );

        let mut progress = SweepProgress::start(kind);
        let by_id: HashMap<u64, &PuzzleRecord> = puzzles.iter().map(|p| (p.id, p)).collect();

        'tasks: for task in &tasks {
            if self.stop_requested() {
                info!("Shutdown requested - no further admissions");
                break;
            }

            let Some(record) = by_id.get(&task.puzzle_id) else {
                progress.record_skip();
                continue;
            };
            let Some(text) = record.text.clone() else {
                progress.record_skip();
                continue;
            };

            let content = PuzzleContent {
                text,
                image: attachments.attachment_for(record),
            };

            // Local estimation failure: skip for this run without recording,
            // so the task is retried on the next invocation rather than
            // poisoned permanently.
            let request = match self.adapter.build_request(task, &content) {
                Ok(request) => request,
                Err(e) => {
                    warn!(
                        puzzle = task.puzzle_id,
                        attempt = task.attempt,
                        error = %e,
                        "Skipping task: could not build request"
                    );
                    progress.record_skip();
                    continue;
                }
            };
            let estimate = self.adapter.estimate_cost(&request);

            let mut throttles: u32 = 0;
            let outcome = loop {
                if self.stop_requested() {
                    info!("Shutdown requested - abandoning re-admission");
                    break 'tasks;
                }

                let admit_started = Instant::now();
                self.governor.admit(estimate).await;
                metrics::record_quota_wait(kind, admit_started.elapsed());

                info!(
                    puzzle = task.puzzle_id,
                    attempt = task.attempt,
                    estimate,
                    "Dispatching task"
                );

                let call_started = Instant::now();
                let call = self.adapter.execute(&request).await;
                metrics::record_request(kind, call_started.elapsed());

                match call {
                    CallOutcome::Completed(response) => {
                        let outcome = self.adapter.parse_response(&response, task);
                        self.governor.record(self.actual_cost(estimate, &outcome)).await;
                        break outcome;
                    }
                    CallOutcome::Throttled(signal) => {
                        throttles += 1;
                        progress.record_throttle();
                        metrics::record_throttle(kind);

                        if !self.retry.allows(throttles) {
                            warn!(
                                puzzle = task.puzzle_id,
                                attempt = task.attempt,
                                throttles,
                                "Throttle retry cap exceeded"
                            );
                            break AttemptOutcome::failure(
                                task,
                                format!("throttle retry cap exceeded after {throttles} retries"),
                            );
                        }

                        let delay = self.retry.delay_for(&signal);
                        warn!(
                            puzzle = task.puzzle_id,
                            attempt = task.attempt,
                            delay_ms = delay.as_millis() as u64,
                            "Provider throttled; backing off before re-admission"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    CallOutcome::Fatal(fatal) => {
                        error!(
                            puzzle = task.puzzle_id,
                            attempt = task.attempt,
                            error = %fatal.message,
                            "Task failed terminally"
                        );
                        break AttemptOutcome::failure(task, fatal.message);
                    }
                }
            };

            let success = outcome.is_success();
            {
                let mut store = self.store.lock().await;
                store.commit(task.puzzle_id, &record.name, outcome)?;
            }

            progress.record_outcome(success);
            metrics::record_task_outcome(kind, success);
            if let Some(bar) = &self.progress_bar {
                bar.inc(1);
            }

            info!(
                puzzle = task.puzzle_id,
                attempt = task.attempt,
                success,
                "Task committed"
            );
        }

        // Summary reports what a normal (non-rerun) next invocation would
        // still have to do.
        let final_document = self.store.lock().await.document().clone();
        progress.outstanding =
            outstanding_tasks(puzzles, schedule, &final_document, kind, false).len() as u64;

        info!(
            attempted = progress.attempted,
            succeeded = progress.succeeded,
            failed = progress.failed,
            skipped = progress.skipped,
            throttle_retries = progress.throttle_retries,
            outstanding = progress.outstanding,
            "Sweep finished"
        );

        Ok(progress)
    }

    /// The cost to record after execution.
    ///
    /// Token-dimension providers report real usage in the response; when the
    /// report is missing the pre-flight estimate stands in so the window
    /// never under-counts.
    fn actual_cost(&self, estimate: u64, outcome: &AttemptOutcome) -> u64 {
        match self.adapter.quota().dimension {
            QuotaDimension::RequestsPerMinute => 1,
            QuotaDimension::TokensPerMinute => {
                if outcome.total_tokens > 0 {
                    outcome.total_tokens
                } else {
                    estimate
                }
            }
        }
    }

    fn stop_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_stop_requested())
            .unwrap_or(false)
    }
}
