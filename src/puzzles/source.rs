//! Puzzle CSV source
//!
//! One row per puzzle with columns `id`, `name`, `puzzleText`, `hasImage`,
//! and `answer`. The ground-truth `answer` column is carried through for
//! external graders; the dispatch engine never reads it.

use serde::{Deserialize, Deserializer};
use std::path::Path;
use tracing::{debug, warn};

/// One puzzle definition from the source dataset
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PuzzleRecord {
    /// Unique puzzle id
    pub id: u64,
    /// Puzzle name, also the image directory key
    pub name: String,
    /// Puzzle text; None when the column is blank or missing
    #[serde(rename = "puzzleText", default, deserialize_with = "blank_as_none")]
    pub text: Option<String>,
    /// Whether the puzzle references an accompanying image
    #[serde(rename = "hasImage", default, deserialize_with = "flexible_bool")]
    pub has_image: bool,
    /// Ground-truth answer, consumed only by external grading
    #[serde(default, deserialize_with = "blank_as_none")]
    pub answer: Option<String>,
}

impl PuzzleRecord {
    /// Whether this puzzle has usable text content.
    ///
    /// Puzzles without content are excluded from the task space permanently,
    /// not treated as transient failures.
    pub fn has_content(&self) -> bool {
        matches!(&self.text, Some(t) if !t.trim().is_empty())
    }
}

/// Treat blank or whitespace-only cells as absent.
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Accept the boolean spellings tabular exports actually produce.
fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(matches!(
        value.as_deref().map(str::trim),
        Some("true") | Some("True") | Some("TRUE") | Some("1")
    ))
}

/// Puzzle source errors
#[derive(Debug, thiserror::Error)]
pub enum PuzzleSourceError {
    /// Source file could not be read
    #[error("IO error: {0}")]
    IoError(String),

    /// A row could not be deserialized
    #[error("parse error: {0}")]
    ParseError(String),
}

/// Load all puzzle records from a CSV file, preserving source order.
pub fn load_puzzles(path: &Path) -> Result<Vec<PuzzleRecord>, PuzzleSourceError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| PuzzleSourceError::IoError(format!("{}: {e}", path.display())))?;

    let mut puzzles = Vec::new();
    for row in reader.deserialize() {
        let record: PuzzleRecord =
            row.map_err(|e| PuzzleSourceError::ParseError(e.to_string()))?;
        puzzles.push(record);
    }

    let without_content = puzzles.iter().filter(|p| !p.has_content()).count();
    if without_content > 0 {
        warn!(
            total = puzzles.len(),
            without_content, "Some puzzles have no text content and will be skipped"
        );
    }
    debug!(count = puzzles.len(), path = %path.display(), "Loaded puzzle source");

    Ok(puzzles)
}
