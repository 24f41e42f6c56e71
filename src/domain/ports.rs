use super::fragment::RawTextFragment;
use crate::error::Result;
use async_trait::async_trait;

/// The external OCR engine.
///
/// Implementations turn one captured image into the text fragments found in it.
/// An error means the frame could not be read; callers treat it as an empty frame.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    type Frame: Send + Sync;

    async fn recognize(&self, frame: &Self::Frame) -> Result<Vec<RawTextFragment>>;
}

pub type TextRecognizerBox<F> = Box<dyn TextRecognizer<Frame = F>>;
