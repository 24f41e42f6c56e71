use crate::domain::fragment::RawTextFragment;
use crate::domain::ports::TextRecognizer;
use crate::error::{Result, ScanError};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Plays back OCR output recorded from an earlier capture.
///
/// Frames are addressed by their 1-based number. A number with nothing recorded
/// behaves like a frame the OCR engine could not read.
#[derive(Debug, Default, Clone)]
pub struct ReplayRecognizer {
    frames: BTreeMap<u64, Vec<RawTextFragment>>,
}

impl ReplayRecognizer {
    pub fn new(frames: BTreeMap<u64, Vec<RawTextFragment>>) -> Self {
        Self { frames }
    }

    /// Builds a recording from `(frame, fragment)` pairs in any order.
    pub fn from_fragments(fragments: impl IntoIterator<Item = (u64, RawTextFragment)>) -> Self {
        let mut frames: BTreeMap<u64, Vec<RawTextFragment>> = BTreeMap::new();
        for (frame, fragment) in fragments {
            frames.entry(frame).or_default().push(fragment);
        }
        Self::new(frames)
    }

    /// Highest recorded frame number, or 0 for an empty recording.
    pub fn last_frame(&self) -> u64 {
        self.frames.keys().next_back().copied().unwrap_or(0)
    }
}

#[async_trait]
impl TextRecognizer for ReplayRecognizer {
    type Frame = u64;

    async fn recognize(&self, frame: &u64) -> Result<Vec<RawTextFragment>> {
        self.frames
            .get(frame)
            .cloned()
            .ok_or_else(|| ScanError::Recognition(format!("no text recognized in frame {frame}")))
    }
}
