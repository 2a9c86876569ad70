//! Boundary with the external puzzle dataset
//!
//! The engine only reads puzzle definitions; it never writes them. The
//! tabular source and the per-puzzle image directory are owned by the data
//! pipeline that produced them.

pub mod images;
pub mod source;

pub use images::{find_puzzle_image, AttachmentSource, DirAttachmentSource, NoAttachments};
pub use source::{load_puzzles, PuzzleRecord, PuzzleSourceError};

use serde::{Deserialize, Serialize};

/// A prepared image payload ready to embed in a provider request.
///
/// Encoding and down-sampling happen upstream; adapters receive the payload
/// as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    /// MIME type (e.g., "image/jpeg")
    pub media_type: String,
    /// Base64-encoded image bytes
    pub data: String,
}

/// The puzzle content handed to an adapter's request builder
#[derive(Debug, Clone, PartialEq)]
pub struct PuzzleContent {
    /// Puzzle text
    pub text: String,
    /// Optional prepared image attachment
    pub image: Option<ImageAttachment>,
}
