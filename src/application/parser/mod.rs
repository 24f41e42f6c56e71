//! Single-frame field extraction.
//!
//! `FieldCandidateParser` classifies the raw OCR fragments of one frame into typed
//! card-field candidates. It holds no state between frames; picking between
//! conflicting candidates is left to the consensus engine.

pub mod grouping;

use crate::config::{ParserConfig, normalize_words};
use crate::domain::field::{FieldCandidate, FrameScanResult};
use crate::domain::fragment::{BoundingBox, RawTextFragment};
use grouping::{Tolerance, group_runs};
use std::collections::HashSet;
use tracing::debug;

const CARD_NUMBER_LENGTHS: std::ops::RangeInclusive<usize> = 12..=19;
const HOLDER_NAME_LENGTHS: std::ops::RangeInclusive<usize> = 2..=26;

/// Labels that may precede an expiry date inside the same fragment. Longest first.
const EXPIRY_MARKERS: &[&str] = &[
    "VALID THROUGH",
    "VALID THRU",
    "GOOD THRU",
    "EXPIRES",
    "EXPIRY",
    "EXP",
    "THRU",
];

#[derive(Debug, Clone)]
pub struct FieldCandidateParser {
    tolerance: Tolerance,
    card_region: Option<BoundingBox>,
    denylist: Vec<String>,
    generic_words: HashSet<String>,
}

impl FieldCandidateParser {
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            tolerance: Tolerance {
                band: config.band_tolerance,
                gap: config.max_gap,
            },
            card_region: config.card_region,
            denylist: config.normalized_denylist(),
            generic_words: config.normalized_generic_words().into_iter().collect(),
        }
    }

    /// Extracts every card-field candidate visible in one frame.
    ///
    /// Fragments that fit no field are dropped silently; this never fails.
    pub fn parse_frame(&self, fragments: &[RawTextFragment]) -> FrameScanResult {
        let mut candidates = Vec::new();

        // Card numbers read as one fragment
        for fragment in fragments {
            if let Some(digits) = strip_separators(&fragment.text)
                && CARD_NUMBER_LENGTHS.contains(&digits.len())
            {
                candidates.push(FieldCandidate::card_number(fragment.text.clone(), digits));
            }
        }

        // Card numbers split over several neighbouring fragments
        let consumed = self.stitch_card_numbers(fragments, &mut candidates);

        for (idx, fragment) in fragments.iter().enumerate() {
            if consumed.contains(&idx) {
                continue;
            }
            if let Some((month, year)) = parse_expiry(&fragment.text) {
                candidates.push(FieldCandidate::expiry_date(
                    fragment.text.clone(),
                    month,
                    &year,
                ));
            }
        }

        if let Some(region) = self.card_region.or_else(|| enclosing_region(fragments)) {
            for fragment in fragments {
                if let Some(name) = self.parse_holder_name(fragment, &region) {
                    candidates.push(FieldCandidate::holder_name(fragment.text.clone(), name));
                }
            }
        }

        debug!(
            fragments = fragments.len(),
            candidates = candidates.len(),
            "Parsed frame"
        );
        candidates
    }

    /// Pushes a candidate for every run of neighbouring digit blocks that adds up
    /// to a card-number length, and returns the indices of the fragments it used.
    /// A block that is a card-number length on its own still joins a run.
    fn stitch_card_numbers(
        &self,
        fragments: &[RawTextFragment],
        candidates: &mut Vec<FieldCandidate>,
    ) -> HashSet<usize> {
        let pieces: Vec<(usize, String)> = fragments
            .iter()
            .enumerate()
            .filter_map(|(idx, f)| strip_separators(&f.text).map(|digits| (idx, digits)))
            .filter(|(_, digits)| digits.len() <= *CARD_NUMBER_LENGTHS.end())
            .collect();

        let boxes: Vec<BoundingBox> = pieces
            .iter()
            .map(|(idx, _)| fragments[*idx].bounding_box)
            .collect();

        let mut consumed = HashSet::new();
        for run in group_runs(&boxes, self.tolerance) {
            let digits: String = run.iter().map(|&i| pieces[i].1.as_str()).collect();
            if !CARD_NUMBER_LENGTHS.contains(&digits.len()) {
                continue;
            }
            let raw = run
                .iter()
                .map(|&i| fragments[pieces[i].0].text.trim())
                .collect::<Vec<_>>()
                .join(" ");
            candidates.push(FieldCandidate::card_number(raw, digits));
            consumed.extend(run.iter().map(|&i| pieces[i].0));
        }
        consumed
    }

    fn parse_holder_name(&self, fragment: &RawTextFragment, region: &BoundingBox) -> Option<String> {
        if fragment.is_non_latin() {
            return None;
        }

        let text = fragment.text.trim();
        let shape_ok = text
            .chars()
            .all(|c| c.is_whitespace() || (c.is_alphabetic() && c.is_uppercase()));
        if !shape_ok {
            return None;
        }

        let name = normalize_words(text);
        if !HOLDER_NAME_LENGTHS.contains(&name.chars().count()) {
            return None;
        }

        let padded = format!(" {name} ");
        if self
            .denylist
            .iter()
            .any(|term| padded.contains(&format!(" {term} ")))
        {
            return None;
        }
        if name.split(' ').all(|word| self.generic_words.contains(word)) {
            return None;
        }

        // Names are embossed under the number, in the lower half of the card
        if fragment.bounding_box.center_y() < region.center_y() {
            return None;
        }

        Some(name)
    }
}

/// Removes spaces and dashes; returns the digits when nothing else is left.
fn strip_separators(text: &str) -> Option<String> {
    let digits: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        Some(digits)
    } else {
        None
    }
}

/// Matches `MM/YY`, `MMYY` or `MM<any non-digit>YY`, optionally after an expiry label.
fn parse_expiry(text: &str) -> Option<(u8, String)> {
    let upper = text.trim().to_uppercase();
    let mut rest = upper.as_str();
    if let Some(stripped) = EXPIRY_MARKERS.iter().find_map(|m| rest.strip_prefix(m)) {
        rest = stripped.trim_start_matches(|c: char| c == ':' || c == '.' || c.is_whitespace());
    }

    let chars: Vec<char> = rest.chars().collect();
    let (m, y) = match chars.as_slice() {
        [m1, m2, y1, y2] => ([*m1, *m2], [*y1, *y2]),
        [m1, m2, sep, y1, y2] if !sep.is_ascii_digit() => ([*m1, *m2], [*y1, *y2]),
        _ => return None,
    };
    if !m.iter().chain(y.iter()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let month: u8 = m.iter().collect::<String>().parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    Some((month, y.iter().collect()))
}

fn enclosing_region(fragments: &[RawTextFragment]) -> Option<BoundingBox> {
    fragments
        .iter()
        .map(|f| f.bounding_box)
        .reduce(|acc, b| acc.union(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::field::{FieldKind, luhn_valid};
    use rand::Rng;

    fn parser() -> FieldCandidateParser {
        FieldCandidateParser::new(&ParserConfig::default())
    }

    fn fragment(text: &str, x: f32, y: f32, width: f32) -> RawTextFragment {
        RawTextFragment::new(text, BoundingBox::new(x, y, width, 30.0))
    }

    fn of_kind(result: &FrameScanResult, kind: FieldKind) -> Vec<&FieldCandidate> {
        result.iter().filter(|c| c.kind == kind).collect()
    }

    fn luhn_complete(prefix: &[u8]) -> String {
        (0..10u8)
            .map(|check| {
                let mut s: String = prefix.iter().map(|d| char::from(b'0' + d)).collect();
                s.push(char::from(b'0' + check));
                s
            })
            .find(|s| luhn_valid(s))
            .unwrap()
    }

    #[test]
    fn test_single_fragment_luhn_valid_numbers() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let len = rng.gen_range(12..=19);
            let prefix: Vec<u8> = (0..len - 1).map(|_| rng.gen_range(0..10)).collect();
            let number = luhn_complete(&prefix);

            let result = parser().parse_frame(&[fragment(&number, 50.0, 200.0, 400.0)]);
            let numbers = of_kind(&result, FieldKind::CardNumber);
            assert_eq!(numbers.len(), 1, "number {number}");
            assert!(numbers[0].valid);
            assert_eq!(numbers[0].normalized_value, number);
        }
    }

    #[test]
    fn test_luhn_failures_are_marked_invalid() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let len = rng.gen_range(12..=19);
            let prefix: Vec<u8> = (0..len - 1).map(|_| rng.gen_range(0..10)).collect();
            let valid = luhn_complete(&prefix);
            let last = valid.as_bytes()[len - 1] - b'0';
            let mut broken = valid[..len - 1].to_string();
            broken.push(char::from(b'0' + (last + 1) % 10));

            let result = parser().parse_frame(&[fragment(&broken, 50.0, 200.0, 400.0)]);
            let numbers = of_kind(&result, FieldKind::CardNumber);
            assert_eq!(numbers.len(), 1);
            assert!(!numbers[0].valid, "number {broken}");
        }
    }

    #[test]
    fn test_spaced_and_dashed_number() {
        let result = parser().parse_frame(&[
            fragment("4111 1111 1111 1111", 50.0, 200.0, 400.0),
            fragment("5555-5555-5555-4444", 50.0, 300.0, 400.0),
        ]);
        let numbers = of_kind(&result, FieldKind::CardNumber);
        assert_eq!(numbers.len(), 2);
        assert_eq!(numbers[0].normalized_value, "4111111111111111");
        assert_eq!(numbers[0].raw_text, "4111 1111 1111 1111");
        assert_eq!(numbers[1].normalized_value, "5555555555554444");
        assert!(numbers.iter().all(|c| c.valid));
    }

    #[test]
    fn test_too_short_or_long_digit_runs_are_ignored() {
        let result = parser().parse_frame(&[
            fragment("41111111111", 50.0, 200.0, 300.0),
            fragment("41111111111111111111", 50.0, 300.0, 400.0),
        ]);
        assert!(of_kind(&result, FieldKind::CardNumber).is_empty());
    }

    #[test]
    fn test_split_number_is_stitched() {
        let result = parser().parse_frame(&[
            fragment("1111", 290.0, 201.0, 80.0),
            fragment("4111", 50.0, 200.0, 80.0),
            fragment("1111", 370.0, 200.0, 80.0),
            fragment("1111", 170.0, 199.0, 80.0),
        ]);
        let numbers = of_kind(&result, FieldKind::CardNumber);
        assert_eq!(numbers.len(), 1);
        assert_eq!(numbers[0].normalized_value, "4111111111111111");
        assert_eq!(numbers[0].raw_text, "4111 1111 1111 1111");
        assert!(numbers[0].valid);
    }

    #[test]
    fn test_number_split_after_twelve_digits_is_stitched() {
        let result = parser().parse_frame(&[
            fragment("4111 1111 1111", 40.0, 250.0, 450.0),
            fragment("1111", 510.0, 250.0, 80.0),
        ]);
        let numbers = of_kind(&result, FieldKind::CardNumber);
        assert_eq!(numbers.len(), 2);
        assert_eq!(numbers[0].normalized_value, "411111111111");
        assert!(!numbers[0].valid);
        assert_eq!(numbers[1].normalized_value, "4111111111111111");
        assert_eq!(numbers[1].raw_text, "4111 1111 1111 1111");
        assert!(numbers[1].valid);
    }

    #[test]
    fn test_stitching_respects_gap_tolerance() {
        let mut config = ParserConfig::default();
        config.max_gap = 0.1;
        let strict = FieldCandidateParser::new(&config);
        let fragments = [
            fragment("4111", 50.0, 200.0, 80.0),
            fragment("1111", 170.0, 200.0, 80.0),
            fragment("1111", 290.0, 200.0, 80.0),
            fragment("1111", 410.0, 200.0, 80.0),
        ];
        assert!(of_kind(&strict.parse_frame(&fragments), FieldKind::CardNumber).is_empty());
        assert_eq!(
            of_kind(&parser().parse_frame(&fragments), FieldKind::CardNumber).len(),
            1
        );
    }

    #[test]
    fn test_stitched_blocks_are_not_read_as_dates() {
        let result = parser().parse_frame(&[
            fragment("5105", 50.0, 200.0, 80.0),
            fragment("1051", 170.0, 200.0, 80.0),
            fragment("0510", 290.0, 200.0, 80.0),
            fragment("5100", 410.0, 200.0, 80.0),
        ]);
        assert_eq!(of_kind(&result, FieldKind::CardNumber).len(), 1);
        assert!(of_kind(&result, FieldKind::ExpiryDate).is_empty());
    }

    #[test]
    fn test_two_number_lookalikes_are_both_forwarded() {
        let result = parser().parse_frame(&[
            fragment("4111111111111111", 50.0, 200.0, 400.0),
            fragment("4012888888881881", 50.0, 260.0, 400.0),
        ]);
        assert_eq!(of_kind(&result, FieldKind::CardNumber).len(), 2);
    }

    #[test]
    fn test_expiry_with_marker() {
        let result = parser().parse_frame(&[fragment("EXP 09/27", 300.0, 300.0, 120.0)]);
        let dates = of_kind(&result, FieldKind::ExpiryDate);
        assert_eq!(dates.len(), 1);
        assert_eq!(dates[0].normalized_value, "09/27");
        assert!(dates[0].valid);
    }

    #[test]
    fn test_expiry_shapes() {
        assert_eq!(parse_expiry("09/27"), Some((9, "27".to_string())));
        assert_eq!(parse_expiry("1229"), Some((12, "29".to_string())));
        assert_eq!(parse_expiry("01-30"), Some((1, "30".to_string())));
        assert_eq!(parse_expiry("valid thru: 11/26"), Some((11, "26".to_string())));
        assert_eq!(parse_expiry("exp09/27"), Some((9, "27".to_string())));
        assert_eq!(parse_expiry("13/27"), None);
        assert_eq!(parse_expiry("00/27"), None);
        assert_eq!(parse_expiry("9/27"), None);
        assert_eq!(parse_expiry("09/2027"), None);
        assert_eq!(parse_expiry("09//27"), None);
    }

    #[test]
    fn test_month_out_of_range_is_not_a_date() {
        let result = parser().parse_frame(&[fragment("13/27", 300.0, 300.0, 120.0)]);
        assert!(of_kind(&result, FieldKind::ExpiryDate).is_empty());
    }

    #[test]
    fn test_past_dates_are_still_valid() {
        let result = parser().parse_frame(&[fragment("01/09", 300.0, 300.0, 120.0)]);
        let dates = of_kind(&result, FieldKind::ExpiryDate);
        assert_eq!(dates.len(), 1);
        assert!(dates[0].valid);
    }

    fn card_frame(name: &str) -> Vec<RawTextFragment> {
        vec![
            fragment("BANK OF NOWHERE", 50.0, 20.0, 300.0),
            fragment("4111 1111 1111 1111", 50.0, 250.0, 600.0),
            fragment(name, 50.0, 450.0, 300.0),
        ]
    }

    #[test]
    fn test_holder_name_in_lower_half() {
        let result = parser().parse_frame(&card_frame("JOHN  SMITH"));
        let names = of_kind(&result, FieldKind::HolderName);
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].normalized_value, "JOHN SMITH");
        assert!(names[0].valid);
    }

    #[test]
    fn test_denylisted_phrase_is_not_a_name() {
        let result = parser().parse_frame(&card_frame("VALID THRU"));
        assert!(of_kind(&result, FieldKind::HolderName).is_empty());

        let result = parser().parse_frame(&card_frame("VISA"));
        assert!(of_kind(&result, FieldKind::HolderName).is_empty());
    }

    #[test]
    fn test_generic_words_only_reject_a_bare_fragment() {
        for text in ["GOLD", "WORLD ELITE", "PLATINUM  CARD"] {
            let result = parser().parse_frame(&card_frame(text));
            assert!(
                of_kind(&result, FieldKind::HolderName).is_empty(),
                "{text} should not be a name"
            );
        }

        for text in ["DAVID GOLD", "ANNA WORLD", "MIR HASSAN"] {
            let result = parser().parse_frame(&card_frame(text));
            let names = of_kind(&result, FieldKind::HolderName);
            assert_eq!(names.len(), 1, "{text} should be a name");
            assert_eq!(names[0].normalized_value, text);
        }
    }

    #[test]
    fn test_name_shape_rules() {
        for text in ["John Smith", "J", "JOHN2 SMITH", "ABCDEFGHIJKLMNOPQRSTUVWXYZA", "O'BRIEN"] {
            let result = parser().parse_frame(&card_frame(text));
            assert!(
                of_kind(&result, FieldKind::HolderName).is_empty(),
                "{text} should not be a name"
            );
        }
    }

    #[test]
    fn test_upper_half_text_is_not_a_name() {
        let result = parser().parse_frame(&[
            fragment("ACME PAYMENTS", 50.0, 20.0, 300.0),
            fragment("4111 1111 1111 1111", 50.0, 450.0, 600.0),
        ]);
        assert!(of_kind(&result, FieldKind::HolderName).is_empty());
    }

    #[test]
    fn test_configured_card_region_overrides_fragment_extent() {
        let mut config = ParserConfig::default();
        config.card_region = Some(BoundingBox::new(0.0, 0.0, 800.0, 100.0));
        let parser = FieldCandidateParser::new(&config);
        let result = parser.parse_frame(&[fragment("JANE DOE", 50.0, 60.0, 200.0)]);
        assert_eq!(of_kind(&result, FieldKind::HolderName).len(), 1);
    }

    #[test]
    fn test_non_latin_hint_skips_name() {
        let mut frame = card_frame("JOHN SMITH");
        frame[2].script = Some("Cyrillic".to_string());
        let result = parser().parse_frame(&frame);
        assert!(of_kind(&result, FieldKind::HolderName).is_empty());
    }

    #[test]
    fn test_garbage_is_dropped() {
        let result = parser().parse_frame(&[
            fragment("", 0.0, 0.0, 10.0),
            fragment("#$%!", 0.0, 50.0, 10.0),
            fragment("4111-abcd", 0.0, 100.0, 10.0),
        ]);
        assert!(result.is_empty());
        assert!(parser().parse_frame(&[]).is_empty());
    }
}
