//! Application layer: field extraction, cross-frame consensus and the session
//! that ties them to an OCR engine.
//!
//! Per frame, the `ScanSession` asks its `TextRecognizer` for text fragments,
//! hands them to the `FieldCandidateParser`, and feeds the candidates into the
//! `ConsensusEngine`, finishing once the engine reports the scan complete.

pub mod consensus;
pub mod parser;
pub mod session;
