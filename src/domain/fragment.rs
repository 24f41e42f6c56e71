use serde::{Deserialize, Serialize};

/// Axis-aligned box in frame coordinates: origin at the top-left, `y` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width.max(0.0)
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height.max(0.0)
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height.max(0.0) * 0.5
    }

    pub fn union(&self, other: &Self) -> Self {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Self {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    /// True when the box has a positive, finite area.
    pub fn is_proper(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }
}

/// A unit of recognized text as reported by the OCR engine for a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTextFragment {
    pub text: String,
    pub bounding_box: BoundingBox,
    /// Script or orientation hint, when the engine provides one.
    #[serde(default)]
    pub script: Option<String>,
}

impl RawTextFragment {
    pub fn new(text: impl Into<String>, bounding_box: BoundingBox) -> Self {
        Self {
            text: text.into(),
            bounding_box,
            script: None,
        }
    }

    /// True when the fragment is known to be in a script other than Latin.
    pub fn is_non_latin(&self) -> bool {
        self.script
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty() && !s.trim().eq_ignore_ascii_case("latin"))
    }
}
