use serde::Serialize;
use std::fmt;

/// The card fields the scanner knows how to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    CardNumber,
    HolderName,
    ExpiryDate,
}

impl FieldKind {
    pub const ALL: [FieldKind; 3] = [
        FieldKind::CardNumber,
        FieldKind::HolderName,
        FieldKind::ExpiryDate,
    ];

    /// Stable position of the kind inside per-field arrays.
    pub fn index(self) -> usize {
        match self {
            FieldKind::CardNumber => 0,
            FieldKind::HolderName => 1,
            FieldKind::ExpiryDate => 2,
        }
    }

    /// A value of this kind in a form safe to put in logs: card numbers keep
    /// only their last four digits.
    pub fn loggable(self, value: &str) -> String {
        match self {
            FieldKind::CardNumber => mask_card_number(value),
            _ => value.to_string(),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::CardNumber => "card number",
            FieldKind::HolderName => "holder name",
            FieldKind::ExpiryDate => "expiry date",
        };
        f.write_str(name)
    }
}

/// A typed reading of one card field taken from a single frame.
///
/// `normalized_value` is the canonical form used for voting: digits only for
/// card numbers, `MM/YY` for expiry dates and trimmed upper-case for names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCandidate {
    pub kind: FieldKind,
    pub raw_text: String,
    pub normalized_value: String,
    pub valid: bool,
}

impl FieldCandidate {
    pub fn card_number(raw_text: impl Into<String>, digits: String) -> Self {
        let valid = luhn_valid(&digits);
        Self {
            kind: FieldKind::CardNumber,
            raw_text: raw_text.into(),
            normalized_value: digits,
            valid,
        }
    }

    pub fn expiry_date(raw_text: impl Into<String>, month: u8, year: &str) -> Self {
        Self {
            kind: FieldKind::ExpiryDate,
            raw_text: raw_text.into(),
            normalized_value: format!("{month:02}/{year}"),
            valid: (1..=12).contains(&month),
        }
    }

    pub fn holder_name(raw_text: impl Into<String>, name: String) -> Self {
        Self {
            kind: FieldKind::HolderName,
            raw_text: raw_text.into(),
            normalized_value: name,
            valid: true,
        }
    }

    pub fn display_value(&self) -> String {
        self.kind.loggable(&self.normalized_value)
    }
}

/// Candidates extracted from one frame, in the order they were found.
pub type FrameScanResult = Vec<FieldCandidate>;

/// Standard mod-10 check used by payment card numbers.
///
/// Anything that is not 12 to 19 ASCII digits is rejected outright.
pub fn luhn_valid(digits: &str) -> bool {
    if !(12..=19).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

pub fn mask_card_number(digits: &str) -> String {
    let keep = digits.len().min(4);
    let (hidden, shown) = digits.split_at(digits.len() - keep);
    format!("{}{}", "*".repeat(hidden.chars().count()), shown)
}
