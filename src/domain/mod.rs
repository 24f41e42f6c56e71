//! Domain layer: the value types shared by parsing and consensus, and the
//! port through which the OCR engine is reached.

pub mod card;
pub mod field;
pub mod fragment;
pub mod ports;
