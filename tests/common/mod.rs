use std::io::Error;
use std::path::Path;

/// What the OCR engine "saw" in one frame. `None` fields are left out of the frame.
#[derive(Default, Clone, Copy)]
pub struct CardFrame<'a> {
    pub number: Option<&'a str>,
    pub expiry: Option<&'a str>,
    pub name: Option<&'a str>,
}

impl<'a> CardFrame<'a> {
    pub fn full(number: &'a str, expiry: &'a str, name: &'a str) -> Self {
        Self {
            number: Some(number),
            expiry: Some(expiry),
            name: Some(name),
        }
    }

    pub fn number(number: &'a str) -> Self {
        Self {
            number: Some(number),
            ..Self::default()
        }
    }
}

/// Writes a recording in the layout of a typical card: number across the middle,
/// expiry below it, holder name at the bottom.
pub fn write_recording(path: &Path, frames: &[CardFrame]) -> Result<(), Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["frame", "text", "x", "y", "width", "height"])?;

    for (i, frame) in frames.iter().enumerate() {
        let n = (i + 1).to_string();
        if let Some(number) = frame.number {
            wtr.write_record([n.as_str(), number, "40", "250", "600", "40"])?;
        }
        if let Some(expiry) = frame.expiry {
            wtr.write_record([n.as_str(), expiry, "300", "330", "120", "30"])?;
        }
        if let Some(name) = frame.name {
            wtr.write_record([n.as_str(), name, "40", "420", "300", "30"])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
