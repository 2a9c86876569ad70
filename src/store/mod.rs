//! Durable, idempotent result store
//!
//! One JSON document per provider maps each puzzle id to its recorded attempt
//! outcomes. The document is rewritten in full after every committed outcome:
//! commit frequency is bounded by provider round-trip time, so durability of
//! already-paid-for results wins over write efficiency. Writes are atomic
//! (temp file + rename) and guarded by a file lock so a crash can lose at
//! most the in-flight request.

use crate::AttemptOutcome;
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Maximum allowed results file size (50 MB) to prevent memory exhaustion
pub const MAX_RESULTS_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// All recorded outcomes for one puzzle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PuzzleResults {
    /// Puzzle name (image directory key, kept for human readability)
    pub name: String,
    /// At most one outcome per attempt index, sorted by attempt
    pub answers: Vec<AttemptOutcome>,
}

impl PuzzleResults {
    /// The stored outcome for an attempt index, if any.
    pub fn answer_for(&self, attempt: u32) -> Option<&AttemptOutcome> {
        self.answers.iter().find(|a| a.attempt == attempt)
    }

    /// Whether an attempt has a stored successful (non-blank) answer.
    pub fn has_successful_answer(&self, attempt: u32) -> bool {
        self.answer_for(attempt)
            .map(AttemptOutcome::is_success)
            .unwrap_or(false)
    }
}

/// The on-disk document: puzzle id (decimal string) -> results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultsDocument(BTreeMap<String, PuzzleResults>);

impl ResultsDocument {
    /// Results for a puzzle id, if any have been recorded.
    pub fn get(&self, puzzle_id: u64) -> Option<&PuzzleResults> {
        self.0.get(&puzzle_id.to_string())
    }

    /// Number of puzzles with at least one recorded outcome
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no outcomes have been recorded yet
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over (puzzle id string, results) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PuzzleResults)> {
        self.0.iter()
    }

    /// Merge an outcome, replacing any prior outcome for the same attempt.
    fn merge(&mut self, puzzle_id: u64, name: &str, outcome: AttemptOutcome) {
        let entry = self
            .0
            .entry(puzzle_id.to_string())
            .or_insert_with(|| PuzzleResults {
                name: name.to_string(),
                answers: Vec::new(),
            });
        entry.answers.retain(|a| a.attempt != outcome.attempt);
        entry.answers.push(outcome);
        entry.answers.sort_by_key(|a| a.attempt);
    }
}

/// Result store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Results file too large
    #[error("results file too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge {
        /// Actual file size
        size: u64,
        /// Maximum allowed size
        max: u64,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// Lock error
    #[error("lock error: {0}")]
    LockError(String),
}

/// Durable map from task identity to outcome
#[derive(Debug)]
pub struct ResultStore {
    path: PathBuf,
    document: ResultsDocument,
}

impl ResultStore {
    /// Open a store at `path`, reading any existing document.
    ///
    /// A missing file yields an empty document, not an error: the file is
    /// created lazily on first commit.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        if !path.exists() {
            debug!(path = %path.display(), "No results file yet, starting empty");
            return Ok(Self {
                path,
                document: ResultsDocument::default(),
            });
        }

        let lock_path = path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| StoreError::LockError(format!("Failed to create lock file: {e}")))?;
        let mut lock = RwLock::new(lock_file);
        let _guard = lock
            .read()
            .map_err(|e| StoreError::LockError(format!("Failed to acquire read lock: {e}")))?;

        // Check file size before reading to prevent memory exhaustion
        let metadata = std::fs::metadata(&path).map_err(|e| StoreError::IoError(e.to_string()))?;
        if metadata.len() > MAX_RESULTS_FILE_SIZE {
            return Err(StoreError::FileTooLarge {
                size: metadata.len(),
                max: MAX_RESULTS_FILE_SIZE,
            });
        }

        let contents =
            std::fs::read_to_string(&path).map_err(|e| StoreError::IoError(e.to_string()))?;
        let document: ResultsDocument = serde_json::from_str(&contents).map_err(|e| {
            warn!(error = %e, path = %path.display(), "Failed to deserialize results file");
            StoreError::DeserializationError(e.to_string())
        })?;

        info!(
            path = %path.display(),
            puzzles = document.len(),
            "Loaded existing results"
        );

        Ok(Self { path, document })
    }

    /// The store's file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read access to the in-memory document
    pub fn document(&self) -> &ResultsDocument {
        &self.document
    }

    /// Merge an outcome and persist the whole document before returning.
    ///
    /// Writing a new outcome for an existing (puzzle, attempt) pair replaces
    /// the prior one. The document on disk reflects this commit once the call
    /// returns.
    pub fn commit(
        &mut self,
        puzzle_id: u64,
        name: &str,
        outcome: AttemptOutcome,
    ) -> Result<(), StoreError> {
        debug!(
            puzzle_id,
            attempt = outcome.attempt,
            success = outcome.is_success(),
            "Committing outcome"
        );

        self.document.merge(puzzle_id, name, outcome);
        self.persist()
    }

    /// Persist the document atomically: write to a temp file in the target
    /// directory, fsync, rename over the target, fsync the directory.
    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::IoError(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(&self.document)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;

        let lock_path = self.path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| StoreError::LockError(format!("Failed to create lock file: {e}")))?;
        let mut lock = RwLock::new(lock_file);
        let _guard = lock
            .write()
            .map_err(|e| StoreError::LockError(format!("Failed to acquire write lock: {e}")))?;

        let parent_dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
            .map_err(|e| StoreError::IoError(format!("Failed to create temp file: {e}")))?;

        temp_file
            .write_all(json.as_bytes())
            .map_err(|e| StoreError::IoError(format!("Failed to write to temp file: {e}")))?;
        temp_file
            .flush()
            .map_err(|e| StoreError::IoError(format!("Failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| StoreError::IoError(format!("Failed to sync temp file: {e}")))?;

        temp_file
            .persist(&self.path)
            .map_err(|e| StoreError::IoError(format!("Failed to persist temp file: {e}")))?;

        // Fsync the parent directory so the rename itself is durable
        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = std::fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        debug!(
            path = %self.path.display(),
            puzzles = self.document.len(),
            "Results persisted"
        );

        Ok(())
    }
}
