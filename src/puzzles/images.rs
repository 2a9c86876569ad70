//! Per-puzzle image asset lookup
//!
//! Images live in a conventional per-puzzle directory:
//! `<images_dir>/<name>/0_0.<ext>`. The lookup returns zero or one file;
//! re-encoding and down-sampling stay outside the engine.

use super::{ImageAttachment, PuzzleRecord};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Extensions probed in order when looking up a puzzle image
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "PNG", "JPG"];

/// Find the image file for a puzzle name, if one exists.
pub fn find_puzzle_image(images_dir: &Path, name: &str) -> Option<PathBuf> {
    for ext in IMAGE_EXTENSIONS {
        let candidate = images_dir.join(name).join(format!("0_0.{ext}"));
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

/// Supplies prepared image attachments to the dispatch loop
pub trait AttachmentSource: Send + Sync {
    /// The attachment for a puzzle, or None when it has no usable image.
    fn attachment_for(&self, record: &PuzzleRecord) -> Option<ImageAttachment>;
}

/// An attachment source that never supplies images (text-only sweeps)
pub struct NoAttachments;

impl AttachmentSource for NoAttachments {
    fn attachment_for(&self, _record: &PuzzleRecord) -> Option<ImageAttachment> {
        None
    }
}

/// Loads attachments from the conventional per-puzzle image directory
pub struct DirAttachmentSource {
    images_dir: PathBuf,
}

impl DirAttachmentSource {
    /// Create a source rooted at `images_dir`.
    pub fn new(images_dir: impl Into<PathBuf>) -> Self {
        Self {
            images_dir: images_dir.into(),
        }
    }
}

impl AttachmentSource for DirAttachmentSource {
    fn attachment_for(&self, record: &PuzzleRecord) -> Option<ImageAttachment> {
        if !record.has_image {
            return None;
        }

        let path = find_puzzle_image(&self.images_dir, &record.name)?;
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read puzzle image");
                return None;
            }
        };

        let media_type = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            _ => "image/png",
        };

        Some(ImageAttachment {
            media_type: media_type.to_string(),
            data: BASE64.encode(bytes),
        })
    }
}
