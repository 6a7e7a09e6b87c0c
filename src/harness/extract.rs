//! Metric extraction from compiler output
//!
//! The compiler reports each metric as a block of the form
//!
//! ```text
//! ================[ Number of recursive calls ]================
//! 1234
//! ```
//!
//! A single pattern recognises every block; fields are then matched by
//! exact label.

use super::field::{Anchor, Field};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Numeric payloads found in one invocation's output
pub type Extracted = BTreeMap<Field, f64>;

fn block_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"={3,}\[ ([^\]\n]+?) \]={3,}\s+([0-9]+(?:\.[0-9]*)?(?:[eE][+-]?[0-9]+)?)")
            .expect("block pattern is valid")
    })
}

/// Iterate over `(label, value)` pairs in output order
fn blocks(text: &str) -> impl Iterator<Item = (&str, f64)> + '_ {
    block_pattern().captures_iter(text).filter_map(|caps| {
        let label = caps.get(1)?.as_str();
        let value = caps.get(2)?.as_str().parse::<f64>().ok()?;
        Some((label, value))
    })
}

/// Value of the first block labelled `anchor`
pub fn find(text: &str, anchor: Anchor) -> Option<f64> {
    blocks(text)
        .find(|(label, _)| *label == anchor.label())
        .map(|(_, value)| value)
}

/// Every field whose block is present; absent fields are simply missing
pub fn extract(text: &str) -> Extracted {
    let mut found = Extracted::new();
    for (label, value) in blocks(text) {
        let field = Field::JOINT
            .iter()
            .copied()
            .find(|f| f.anchor().map(Anchor::label) == Some(label));
        if let Some(field) = field {
            found.entry(field).or_insert(value);
        }
    }
    found
}

/// Integer fields are printed as plain numbers but may carry a fraction
pub fn as_count(value: f64) -> u64 {
    value.trunc() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::field::CNF_DECISIONS;

    const SAMPLE: &str = "\
parsing...
================[ Final compiled BDD size ]================
42
================[ Number of recursive calls ]================
1337
================[ Number of Parameters ]================
7
================[ Number of Distinct Parameters ]================
3
";

    #[test]
    fn test_extract_present_fields() {
        let found = extract(SAMPLE);
        assert_eq!(found.get(&Field::Size), Some(&42.0));
        assert_eq!(found.get(&Field::Calls), Some(&1337.0));
        assert_eq!(found.get(&Field::Params), Some(&7.0));
        assert_eq!(found.get(&Field::Distinct), Some(&3.0));
        assert!(!found.contains_key(&Field::Flips));
    }

    #[test]
    fn test_params_does_not_match_distinct() {
        let text = "================[ Number of Distinct Parameters ]================\n9\n";
        let found = extract(text);
        assert_eq!(found.get(&Field::Distinct), Some(&9.0));
        assert!(!found.contains_key(&Field::Params));
    }

    #[test]
    fn test_extract_nothing() {
        assert!(extract("Fatal error: exception Not_found\n").is_empty());
        assert!(extract("").is_empty());
    }

    #[test]
    fn test_first_occurrence_wins() {
        let text = "\
================[ Number of flips ]================ 5
================[ Number of flips ]================ 8
";
        assert_eq!(extract(text).get(&Field::Flips), Some(&5.0));
    }

    #[test]
    fn test_float_payload() {
        let text = "================[ Final compiled BDD size ]================\n12.0\n";
        let value = find(text, Field::Size.anchor().unwrap()).unwrap();
        assert_eq!(as_count(value), 12);
    }

    #[test]
    fn test_unknown_label_ignored() {
        let text = "================[ Compilation Time Elapsed ]================\n0.25\n";
        assert!(extract(text).is_empty());
    }

    #[test]
    fn test_find_cnf_decisions() {
        let text = "noise\n================[ Total CNF decisions ]================\n  991\n";
        assert_eq!(find(text, CNF_DECISIONS), Some(991.0));
        assert_eq!(find("noise", CNF_DECISIONS), None);
    }

    #[test]
    fn test_label_must_match_exactly() {
        let text = "================[ Number of parameters ]================\n4\n";
        assert!(!extract(text).contains_key(&Field::Params));
    }
}
