//! Program image file format.
//!
//! An image is a JSON document listing memory segments:
//!
//! ```text
//! {
//!   "segments": [
//!     { "start": 0,   "words": [16777316, 50331748, 0] },
//!     { "start": 100, "words": [5, 10, 15] }
//!   ]
//! }
//! ```
//!
//! Loading an image writes each segment with `Cpu::load_program`. Cells not
//! covered by a segment are left alone.

use serde::{Serialize, Deserialize};
use std::path::Path;
use thiserror::Error;

/// A contiguous run of words placed at `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start: usize,
    pub words: Vec<u32>,
}

/// A loadable program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramImage {
    pub segments: Vec<Segment>,
}

impl ProgramImage {
    /// Create a new empty image.
    pub fn new() -> Self {
        Self::default()
    }

    /// An image with a single segment.
    pub fn from_words(start: usize, words: Vec<u32>) -> Self {
        Self {
            segments: vec![Segment { start, words }],
        }
    }

    /// Add a segment.
    pub fn push(&mut self, start: usize, words: Vec<u32>) {
        self.segments.push(Segment { start, words });
    }

    /// Total number of words across all segments.
    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.words.len()).sum()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The word an image places at `addr`, if any. Later segments win.
    pub fn word_at(&self, addr: usize) -> Option<u32> {
        self.segments
            .iter()
            .rev()
            .find_map(|s| addr.checked_sub(s.start).and_then(|off| s.words.get(off).copied()))
    }

    pub fn to_json(&self) -> Result<String, ImageError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ImageError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Load an image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ProgramImage, ImageError> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let image = ProgramImage::from_json(&text)?;
    if image.is_empty() {
        return Err(ImageError::Empty);
    }
    Ok(image)
}

/// Save an image to disk.
pub fn save_image<P: AsRef<Path>>(path: P, image: &ProgramImage) -> Result<(), ImageError> {
    std::fs::write(path.as_ref(), image.to_json()?)?;
    Ok(())
}

/// Errors that can occur reading or writing images.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed image: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("image contains no words")]
    Empty,
}
