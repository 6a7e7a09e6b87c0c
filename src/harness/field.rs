//! Metric fields and their output anchors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Label of a `=====[ Label ]=====` block printed by the compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Anchor(pub &'static str);

impl Anchor {
    pub fn label(self) -> &'static str {
        self.0
    }
}

/// Block carrying the decision count of the CNF back end
pub const CNF_DECISIONS: Anchor = Anchor("Total CNF decisions");

/// Kind of metric recorded per benchmark and mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Time,
    Size,
    Calls,
    Flips,
    Params,
    Distinct,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Time,
        Field::Size,
        Field::Calls,
        Field::Flips,
        Field::Params,
        Field::Distinct,
    ];

    /// Fields produced together by a single counting invocation
    pub const JOINT: [Field; 5] = [
        Field::Size,
        Field::Calls,
        Field::Flips,
        Field::Params,
        Field::Distinct,
    ];

    /// Output anchor, `None` for time which the harness measures itself
    pub fn anchor(self) -> Option<Anchor> {
        match self {
            Field::Time => None,
            Field::Size => Some(Anchor("Final compiled BDD size")),
            Field::Calls => Some(Anchor("Number of recursive calls")),
            Field::Flips => Some(Anchor("Number of flips")),
            Field::Params => Some(Anchor("Number of Parameters")),
            Field::Distinct => Some(Anchor("Number of Distinct Parameters")),
        }
    }

    /// Compiler flag that makes it print this field
    pub fn selection_flag(self) -> &'static str {
        match self {
            Field::Time => "-show-time",
            Field::Size => "-show-size",
            Field::Calls => "-num-recursive-calls",
            Field::Flips => "-show-flip-count",
            Field::Params | Field::Distinct => "-show-params",
        }
    }

    pub fn is_joint(self) -> bool {
        self != Field::Time
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Time => "time",
            Field::Size => "size",
            Field::Calls => "calls",
            Field::Flips => "flips",
            Field::Params => "params",
            Field::Distinct => "distinct",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Arguments for a counting invocation covering `fields`
///
/// Only joint fields contribute; `-no-compile` is added when neither size
/// nor recursive calls are wanted, since the remaining counts do not need a
/// compiled artifact.
pub fn joint_flags(fields: &[Field]) -> Vec<&'static str> {
    let mut flags = vec!["-skip-table"];
    let wants = |f: Field| fields.contains(&f);

    for field in Field::JOINT {
        let flag = field.selection_flag();
        if wants(field) && !flags.contains(&flag) {
            flags.push(flag);
        }
    }
    if !wants(Field::Size) && !wants(Field::Calls) {
        flags.push("-no-compile");
    }
    flags
}

/// Arguments for a timing invocation
pub fn time_flags() -> Vec<&'static str> {
    vec!["-skip-table", Field::Time.selection_flag()]
}

/// Arguments for a CNF decision-count invocation
pub fn cnf_flags() -> Vec<&'static str> {
    vec!["-cnf", "-show-cnf-decisions", "-fc-timeout", "5"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_has_no_anchor() {
        assert!(Field::Time.anchor().is_none());
        assert!(Field::JOINT.iter().all(|f| f.anchor().is_some()));
    }

    #[test]
    fn test_joint_flags_size_and_calls() {
        let flags = joint_flags(&[Field::Size, Field::Calls]);
        assert_eq!(flags, vec!["-skip-table", "-show-size", "-num-recursive-calls"]);
    }

    #[test]
    fn test_joint_flags_no_compile() {
        let flags = joint_flags(&[Field::Flips, Field::Params, Field::Distinct]);
        assert_eq!(
            flags,
            vec!["-skip-table", "-show-flip-count", "-show-params", "-no-compile"]
        );
    }

    #[test]
    fn test_joint_flags_ignores_time() {
        let flags = joint_flags(&[Field::Time, Field::Size]);
        assert_eq!(flags, vec!["-skip-table", "-show-size"]);
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Field::Distinct).unwrap(), "\"distinct\"");
        let f: Field = serde_json::from_str("\"calls\"").unwrap();
        assert_eq!(f, Field::Calls);
    }
}
