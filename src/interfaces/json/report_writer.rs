use crate::application::consensus::ScanStats;
use crate::application::session::ScanOutcome;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Completed,
    Cancelled,
}

/// Final, machine-readable summary of a scan session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub status: ReportStatus,
    pub card_number: String,
    pub card_holder_name: String,
    pub expiry_date: String,
    pub frames_processed: u64,
    pub valid_scans: u64,
    pub dates_collected: u64,
}

impl ScanReport {
    pub fn new(outcome: &ScanOutcome, stats: ScanStats) -> Self {
        let status = if outcome.is_completed() {
            ReportStatus::Completed
        } else {
            ReportStatus::Cancelled
        };
        let card = outcome.card().clone();
        Self {
            status,
            card_number: card.card_number,
            card_holder_name: card.card_holder_name,
            expiry_date: card.expiry_date,
            frames_processed: stats.frames_processed,
            valid_scans: stats.valid_scans_so_far,
            dates_collected: stats.dates_collected_so_far,
        }
    }
}

/// Writes scan reports as pretty-printed JSON.
pub struct ReportWriter<W: Write> {
    writer: W,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_report(&mut self, report: &ScanReport) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, report)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}
