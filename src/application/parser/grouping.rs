use crate::domain::fragment::BoundingBox;

/// Spatial tolerances used to stitch split digit runs back together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Max vertical offset between centers, relative to the taller box.
    pub band: f32,
    /// Max horizontal gap between neighbours, relative to the taller box.
    pub gap: f32,
}

/// Groups boxes that sit side by side on the same horizontal band.
///
/// Returns runs of two or more indices into `boxes`, each ordered left to right.
/// Boxes are first clustered into bands by their vertical centers, then each band
/// is cut wherever the horizontal gap between neighbours exceeds the tolerance.
pub fn group_runs(boxes: &[BoundingBox], tolerance: Tolerance) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..boxes.len()).collect();
    order.sort_by(|&a, &b| boxes[a].center_y().total_cmp(&boxes[b].center_y()));

    let mut bands: Vec<Band> = Vec::new();
    for idx in order {
        let bbox = &boxes[idx];
        match bands.last_mut() {
            Some(band) if band.accepts(bbox, tolerance.band) => band.push(idx, bbox),
            _ => bands.push(Band::start(idx, bbox)),
        }
    }

    let mut runs = Vec::new();
    for band in bands {
        let mut members = band.members;
        members.sort_by(|&a, &b| boxes[a].x.total_cmp(&boxes[b].x));

        let mut run = vec![members[0]];
        for pair in members.windows(2) {
            let (prev, next) = (&boxes[pair[0]], &boxes[pair[1]]);
            let allowed = tolerance.gap * prev.height.max(next.height);
            if next.x - prev.right() <= allowed {
                run.push(pair[1]);
            } else {
                flush(&mut runs, std::mem::replace(&mut run, vec![pair[1]]));
            }
        }
        flush(&mut runs, run);
    }
    runs
}

fn flush(runs: &mut Vec<Vec<usize>>, run: Vec<usize>) {
    if run.len() >= 2 {
        runs.push(run);
    }
}

struct Band {
    members: Vec<usize>,
    center_sum: f32,
    max_height: f32,
}

impl Band {
    fn start(idx: usize, bbox: &BoundingBox) -> Self {
        Self {
            members: vec![idx],
            center_sum: bbox.center_y(),
            max_height: bbox.height,
        }
    }

    fn center(&self) -> f32 {
        self.center_sum / self.members.len() as f32
    }

    fn accepts(&self, bbox: &BoundingBox, tolerance: f32) -> bool {
        (bbox.center_y() - self.center()).abs() <= tolerance * self.max_height.max(bbox.height)
    }

    fn push(&mut self, idx: usize, bbox: &BoundingBox) {
        self.members.push(idx);
        self.center_sum += bbox.center_y();
        self.max_height = self.max_height.max(bbox.height);
    }
}
