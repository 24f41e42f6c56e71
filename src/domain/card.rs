use serde::{Deserialize, Serialize};

/// Final result of a scan session. Fields that never reached consensus are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    pub card_number: String,
    pub card_holder_name: String,
    pub expiry_date: String,
}

impl CardDetails {
    /// The card number is the only field a usable result cannot do without.
    pub fn has_card_number(&self) -> bool {
        !self.card_number.is_empty()
    }
}
