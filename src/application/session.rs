use crate::application::consensus::{ConsensusEngine, ScanStats, SessionState};
use crate::application::parser::FieldCandidateParser;
use crate::config::ScanConfig;
use crate::domain::card::CardDetails;
use crate::domain::ports::TextRecognizerBox;
use crate::error::Result;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How a session ended. Sent exactly once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed(CardDetails),
    Cancelled(CardDetails),
}

impl ScanOutcome {
    pub fn card(&self) -> &CardDetails {
        match self {
            ScanOutcome::Completed(card) | ScanOutcome::Cancelled(card) => card,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ScanOutcome::Completed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Scanning,
    Finished(ScanOutcome),
}

/// One card scan: OCR, parsing and consensus for a stream of frames.
///
/// Every session owns its engine; nothing is shared between sessions. Methods
/// that touch scan state take `&mut self`, which keeps at most one frame in
/// flight per session.
pub struct ScanSession<F> {
    recognizer: TextRecognizerBox<F>,
    parser: FieldCandidateParser,
    engine: ConsensusEngine,
    completion: Option<oneshot::Sender<ScanOutcome>>,
    outcome: Option<ScanOutcome>,
}

impl<F: Send + Sync> ScanSession<F> {
    /// Starts a session. The receiver resolves once, when the scan completes or
    /// is cancelled.
    pub fn new(
        config: &ScanConfig,
        recognizer: TextRecognizerBox<F>,
    ) -> Result<(Self, oneshot::Receiver<ScanOutcome>)> {
        config.validate()?;
        let (tx, rx) = oneshot::channel();
        let session = Self {
            recognizer,
            parser: FieldCandidateParser::new(&config.parser),
            engine: ConsensusEngine::new(config.consensus)?,
            completion: Some(tx),
            outcome: None,
        };
        Ok((session, rx))
    }

    /// Runs one frame through OCR, parsing and consensus.
    ///
    /// A failed recognition counts as a frame with no text. Once the session has
    /// finished, frames are ignored and the original outcome is returned.
    pub async fn process_frame(&mut self, frame: &F) -> SessionStatus {
        if let Some(outcome) = &self.outcome {
            return SessionStatus::Finished(outcome.clone());
        }

        let fragments = match self.recognizer.recognize(frame).await {
            Ok(fragments) => fragments,
            Err(e) => {
                debug!(error = %e, "Recognition failed, skipping frame");
                Vec::new()
            }
        };

        let candidates = self.parser.parse_frame(&fragments);
        for candidate in &candidates {
            debug!(
                field = %candidate.kind,
                value = %candidate.display_value(),
                valid = candidate.valid,
                "Candidate"
            );
        }
        self.engine.ingest(&candidates);

        if self.engine.is_complete() {
            SessionStatus::Finished(self.finish())
        } else {
            SessionStatus::Scanning
        }
    }

    /// Stops the session and returns its outcome.
    ///
    /// A session that already reached consensus still completes normally;
    /// otherwise it is cancelled with whatever fields had locked.
    pub fn cancel(&mut self) -> ScanOutcome {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        if !self.engine.is_complete() {
            info!(frames = self.engine.stats().frames_processed, "Scan cancelled");
            self.engine.cancel();
        }
        self.finish()
    }

    /// Processes frames until the scan completes, `cancel` fires, or the frame
    /// source closes. A closed source is treated as a cancellation.
    pub async fn run(
        &mut self,
        mut frames: mpsc::Receiver<F>,
        cancel: CancellationToken,
    ) -> ScanOutcome {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break self.cancel(),
                frame = frames.recv() => match frame {
                    Some(frame) => {
                        if let SessionStatus::Finished(outcome) = self.process_frame(&frame).await {
                            break outcome;
                        }
                    }
                    None => {
                        debug!("Frame source closed");
                        break self.cancel();
                    }
                },
            }
        }
    }

    pub fn stats(&self) -> ScanStats {
        self.engine.stats()
    }

    pub fn engine(&self) -> &ConsensusEngine {
        &self.engine
    }

    fn finish(&mut self) -> ScanOutcome {
        // Complete or cancelled at this point, so finalize cannot refuse
        let card = self.engine.finalize().unwrap_or_default();
        let outcome = match self.engine.state() {
            SessionState::Cancelled => ScanOutcome::Cancelled(card),
            _ => ScanOutcome::Completed(card),
        };

        if let Some(tx) = self.completion.take() {
            // The caller may have stopped listening
            let _ = tx.send(outcome.clone());
        }
        self.outcome = Some(outcome.clone());
        outcome
    }
}

/// Producer side of a session's frame channel.
pub struct FrameFeed<F> {
    sender: mpsc::Sender<F>,
}

/// Creates a single-slot frame channel: while a frame waits, newer ones are dropped.
pub fn frame_channel<F>() -> (FrameFeed<F>, mpsc::Receiver<F>) {
    let (sender, receiver) = mpsc::channel(1);
    (FrameFeed { sender }, receiver)
}

impl<F> FrameFeed<F> {
    /// Hands a frame to the session without waiting. Returns false when the frame
    /// was dropped because the session is busy or gone.
    pub fn offer(&self, frame: F) -> bool {
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Session busy, dropping frame");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Waits for room and hands over the frame. Returns false once the session has ended.
    pub async fn send(&self, frame: F) -> bool {
        self.sender.send(frame).await.is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
