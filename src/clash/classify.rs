//! Event-text classification and crew-size lookup.

use crate::types::BoatClass;

/// Ordered classification rules over free-text event labels.
///
/// Checked top to bottom, first match wins. Longer tokens precede their
/// prefixes so `"8x+"` never resolves as `"8+"` and `"4x+"` never resolves
/// as `"4x"` or `"4+"`. Extending the recognized codes means inserting a row
/// at its precedence position.
const EVENT_CODE_RULES: [(&str, BoatClass); 12] = [
    ("8x+", BoatClass::Octuple),
    ("8+", BoatClass::Eight),
    ("4x+", BoatClass::CoxedQuad),
    ("4x-", BoatClass::CoxlessQuad),
    ("4x", BoatClass::Quad),
    ("4+", BoatClass::CoxedFour),
    ("4-", BoatClass::CoxlessFour),
    ("2x-", BoatClass::CoxlessDouble),
    ("2x", BoatClass::Double),
    ("2-", BoatClass::Pair),
    ("1x-", BoatClass::CoxlessSingle),
    ("1x", BoatClass::Single),
];

/// Extracts the boat class from a free-text event label.
///
/// Case-insensitive substring match against the ordered rule table. Returns
/// `None` when no code token is present; callers treat that as zero blades
/// required, never as an error.
pub fn classify_event(event: &str) -> Option<BoatClass> {
    let lowered = event.to_ascii_lowercase();
    EVENT_CODE_RULES
        .iter()
        .find(|rule| lowered.contains(rule.0))
        .map(|rule| rule.1)
}

/// Individual oars required for an optional boat class.
pub fn blades_required(class: Option<BoatClass>) -> u32 {
    class.map_or(0, BoatClass::blade_count)
}
