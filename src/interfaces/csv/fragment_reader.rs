use crate::domain::fragment::{BoundingBox, RawTextFragment};
use crate::error::{Result, ScanError};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct FragmentRecord {
    frame: u64,
    text: String,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    #[serde(default)]
    script: Option<String>,
}

impl FragmentRecord {
    fn into_fragment(self) -> Result<(u64, RawTextFragment)> {
        if self.frame == 0 {
            return Err(ScanError::InvalidRecord(
                "frame numbers start at 1".to_string(),
            ));
        }
        let bounding_box = BoundingBox::new(self.x, self.y, self.width, self.height);
        if !bounding_box.is_proper() {
            return Err(ScanError::InvalidRecord(format!(
                "fragment {:?} has an empty or non-finite bounding box",
                self.text
            )));
        }
        let fragment = RawTextFragment {
            text: self.text,
            bounding_box,
            script: self.script.filter(|s| !s.is_empty()),
        };
        Ok((self.frame, fragment))
    }
}

/// Reads recorded OCR fragments from a CSV source.
///
/// Expected header: `frame,text,x,y,width,height`, optionally followed by a
/// `script` column that rows may leave out. Each row yields the frame number
/// and its fragment.
pub struct FragmentReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> FragmentReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and validates rows. A bad row yields an error and reading
    /// carries on with the next one.
    pub fn fragments(self) -> impl Iterator<Item = Result<(u64, RawTextFragment)>> {
        self.reader.into_deserialize().map(|result| {
            let record: FragmentRecord = result.map_err(ScanError::from)?;
            record.into_fragment()
        })
    }
}
