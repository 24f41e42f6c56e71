use crate::config::ConsensusConfig;
use crate::domain::card::CardDetails;
use crate::domain::field::{FieldCandidate, FieldKind, FrameScanResult};
use crate::error::{Result, ScanError};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// Lifecycle of a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Scanning,
    Ready,
    Finalized,
    Cancelled,
}

/// A value a field has committed to for the rest of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockedValue {
    pub value: String,
    pub frame: u64,
}

/// Where a value was first seen: frame index, then position within that frame.
type Sighting = (u64, usize);

#[derive(Debug, Clone, PartialEq, Eq)]
struct TallyEntry {
    count: u32,
    first_seen: Sighting,
}

/// Votes for one field, plus the value it locked to, if any.
#[derive(Debug, Clone, Default)]
pub struct FieldTally {
    counts: HashMap<String, TallyEntry>,
    locked: Option<LockedValue>,
}

impl FieldTally {
    pub fn locked(&self) -> Option<&LockedValue> {
        self.locked.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.locked.is_some()
    }

    pub fn count(&self, value: &str) -> u32 {
        self.counts.get(value).map_or(0, |e| e.count)
    }

    fn vote(&mut self, value: &str, seen: Sighting) {
        self.counts
            .entry(value.to_string())
            .and_modify(|e| e.count += 1)
            .or_insert(TallyEntry {
                count: 1,
                first_seen: seen,
            });
    }

    /// Locks the strongest value at or above `threshold`. Ties go to the higher
    /// count, then to the earliest first sighting.
    fn try_lock(&mut self, threshold: u32, frame: u64) -> Option<&LockedValue> {
        if self.locked.is_some() {
            return None;
        }

        let (value, _) = self
            .counts
            .iter()
            .filter(|(_, e)| e.count >= threshold)
            .min_by(|(_, a), (_, b)| {
                b.count
                    .cmp(&a.count)
                    .then_with(|| a.first_seen.cmp(&b.first_seen))
            })?;

        self.locked = Some(LockedValue {
            value: value.clone(),
            frame,
        });
        self.locked.as_ref()
    }
}

/// Progress counters of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub frames_processed: u64,
    /// Frames that carried at least one valid card number.
    pub valid_scans_so_far: u64,
    /// Frames that carried at least one valid expiry date.
    pub dates_collected_so_far: u64,
    pub started_at_frame: u64,
}

/// Accumulates per-field votes across frames and decides when a scan is done.
///
/// A value locks once it has been read `threshold` times; a locked field never
/// changes again. The scan is complete when both the card number and the expiry
/// date are locked, or when the frame budget runs out. The holder name is
/// best-effort and never holds a scan open.
///
/// The engine does no locking of its own: `ingest` takes `&mut self`, so callers
/// feeding it from several tasks must serialize access.
#[derive(Debug, Clone)]
pub struct ConsensusEngine {
    config: ConsensusConfig,
    tallies: [FieldTally; 3],
    stats: ScanStats,
    state: SessionState,
    snapshot: Option<CardDetails>,
}

impl ConsensusEngine {
    /// Creates an engine for a new session, rejecting invalid configuration.
    pub fn new(config: ConsensusConfig) -> Result<Self> {
        Self::starting_at(config, 0)
    }

    /// Like [`ConsensusEngine::new`], numbering frames from `started_at_frame + 1`.
    pub fn starting_at(config: ConsensusConfig, started_at_frame: u64) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tallies: Default::default(),
            stats: ScanStats {
                started_at_frame,
                ..ScanStats::default()
            },
            state: SessionState::Scanning,
            snapshot: None,
        })
    }

    /// Feeds one frame's candidates into the tallies.
    ///
    /// A no-op once the session is finalized or cancelled.
    pub fn ingest(&mut self, result: &FrameScanResult) {
        if matches!(self.state, SessionState::Finalized | SessionState::Cancelled) {
            debug!(state = ?self.state, "Ignoring frame after session end");
            return;
        }

        self.stats.frames_processed += 1;
        let frame = self.current_frame();

        for (position, candidate) in result.iter().enumerate().filter(|(_, c)| c.valid) {
            let tally = &mut self.tallies[candidate.kind.index()];
            if !tally.is_locked() {
                tally.vote(&candidate.normalized_value, (frame, position));
            }
        }

        for kind in FieldKind::ALL {
            if let Some(locked) = self.tallies[kind.index()].try_lock(self.config.threshold, frame) {
                let shown = kind.loggable(&locked.value);
                info!(field = %kind, value = %shown, frame, "Field locked");
            }
        }

        if has_valid(result, FieldKind::CardNumber) {
            self.stats.valid_scans_so_far += 1;
        }
        if has_valid(result, FieldKind::ExpiryDate) {
            self.stats.dates_collected_so_far += 1;
        }

        if self.state == SessionState::Scanning && self.is_complete() {
            debug!(frames = self.stats.frames_processed, "Scan ready to finish");
            self.state = SessionState::Ready;
        }
    }

    /// True when the card number and expiry date are locked, or the budget is spent.
    pub fn is_complete(&self) -> bool {
        let confident = self.tally(FieldKind::CardNumber).is_locked()
            && self.tally(FieldKind::ExpiryDate).is_locked();
        confident || self.stats.frames_processed >= u64::from(self.config.max_frames)
    }

    /// Returns the locked value of each field, or an empty string where none locked.
    ///
    /// Allowed once the scan is complete or cancelled. Later calls return the
    /// same snapshot.
    pub fn finalize(&mut self) -> Result<CardDetails> {
        if let Some(snapshot) = &self.snapshot {
            return Ok(snapshot.clone());
        }
        if self.state == SessionState::Scanning && !self.is_complete() {
            return Err(ScanError::NotReady);
        }

        let snapshot = CardDetails {
            card_number: self.locked_or_empty(FieldKind::CardNumber),
            card_holder_name: self.locked_or_empty(FieldKind::HolderName),
            expiry_date: self.locked_or_empty(FieldKind::ExpiryDate),
        };
        if self.state != SessionState::Cancelled {
            self.state = SessionState::Finalized;
        }
        info!(
            state = ?self.state,
            frames = self.stats.frames_processed,
            card_number = !snapshot.card_number.is_empty(),
            expiry_date = !snapshot.expiry_date.is_empty(),
            holder_name = !snapshot.card_holder_name.is_empty(),
            "Scan finalized"
        );
        self.snapshot = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Stops the session. Further frames are ignored; `finalize` still returns
    /// whatever had locked. Has no effect on a finalized session.
    pub fn cancel(&mut self) {
        if self.state != SessionState::Finalized {
            self.state = SessionState::Cancelled;
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    pub fn tally(&self, kind: FieldKind) -> &FieldTally {
        &self.tallies[kind.index()]
    }

    fn current_frame(&self) -> u64 {
        self.stats.started_at_frame + self.stats.frames_processed
    }

    fn locked_or_empty(&self, kind: FieldKind) -> String {
        self.tally(kind)
            .locked()
            .map(|l| l.value.clone())
            .unwrap_or_default()
    }
}

fn has_valid(result: &[FieldCandidate], kind: FieldKind) -> bool {
    result.iter().any(|c| c.kind == kind && c.valid)
}
