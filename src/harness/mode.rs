//! Mode registry
//!
//! A mode is a named combination of optimization flags handed to the
//! compiler under test. The set is closed: adding a mode means adding a
//! variant and its row in the tables below, nothing else.

use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Optimization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "no-opts", alias = "NOOPT", alias = "no opts")]
    NoOpts,
    #[serde(rename = "det", alias = "DET", alias = "det + be")]
    Det,
    #[serde(rename = "fh", alias = "FH", alias = "fh + det + be")]
    Fh,
    #[serde(rename = "fhct", alias = "FHCT", alias = "fh + ct + det + be")]
    Fhct,
    #[serde(rename = "sbk", alias = "SBK", alias = "sbk + det + be")]
    Sbk,
    #[serde(rename = "sbk-fh", alias = "SBKFH", alias = "sbk + fh + det + be")]
    SbkFh,
    #[serde(rename = "sbk-fhct", alias = "SBKFHCT", alias = "sbk + fh + ct + det + be")]
    SbkFhct,
    #[serde(rename = "ea", alias = "EA")]
    Ea,
    #[serde(rename = "ea-det", alias = "EADET", alias = "ea + det + be")]
    EaDet,
    #[serde(rename = "ea-fh", alias = "EAFH", alias = "ea + fh + det + be")]
    EaFh,
    #[serde(rename = "ea-fhct", alias = "EAFHCT", alias = "ea + fh + ct + det + be")]
    EaFhct,
    #[serde(rename = "ea-sbk", alias = "EASBK", alias = "ea + sbk + det + be")]
    EaSbk,
    #[serde(rename = "ea-sbk-fh", alias = "EASBKFH", alias = "eg + sbk + fh + det + be")]
    EaSbkFh,
    #[serde(rename = "ea-sbk-fhct", alias = "EASBKFHCT", alias = "eg + sbk + fh + ct + det + be")]
    EaSbkFhct,
}

impl Mode {
    /// Every mode, in registry order
    pub const ALL: [Mode; 14] = [
        Mode::NoOpts,
        Mode::Det,
        Mode::Fh,
        Mode::Fhct,
        Mode::Sbk,
        Mode::SbkFh,
        Mode::SbkFhct,
        Mode::Ea,
        Mode::EaDet,
        Mode::EaFh,
        Mode::EaFhct,
        Mode::EaSbk,
        Mode::EaSbkFh,
        Mode::EaSbkFhct,
    ];

    /// Flag tokens selecting this mode, in a stable order
    pub fn flags(self) -> &'static [&'static str] {
        match self {
            Mode::NoOpts => &[],
            Mode::Det => &["-determinism"],
            Mode::Fh => &["-determinism", "-local-hoisting", "-branch-elimination"],
            Mode::Fhct => &["-determinism", "-global-hoisting", "-branch-elimination"],
            Mode::Sbk => &["-determinism", "-sbk-encoding", "-branch-elimination"],
            Mode::SbkFh => &[
                "-determinism",
                "-local-hoisting",
                "-sbk-encoding",
                "-branch-elimination",
            ],
            Mode::SbkFhct => &[
                "-determinism",
                "-global-hoisting",
                "-sbk-encoding",
                "-branch-elimination",
            ],
            Mode::Ea => &["-eager-eval"],
            Mode::EaDet => &["-eager-eval", "-determinism", "-branch-elimination"],
            Mode::EaFh => &[
                "-eager-eval",
                "-local-hoisting",
                "-determinism",
                "-branch-elimination",
            ],
            Mode::EaFhct => &[
                "-eager-eval",
                "-global-hoisting",
                "-determinism",
                "-branch-elimination",
            ],
            Mode::EaSbk => &[
                "-eager-eval",
                "-sbk-encoding",
                "-determinism",
                "-branch-elimination",
            ],
            Mode::EaSbkFh => &[
                "-eager-eval",
                "-sbk-encoding",
                "-local-hoisting",
                "-determinism",
                "-branch-elimination",
            ],
            Mode::EaSbkFhct => &[
                "-eager-eval",
                "-sbk-encoding",
                "-global-hoisting",
                "-determinism",
                "-branch-elimination",
            ],
        }
    }

    /// Column heading used in reports
    pub fn label(self) -> &'static str {
        match self {
            Mode::NoOpts => "No Opt",
            Mode::Det => "Det",
            Mode::Fh => "FH",
            Mode::Fhct => "FHCT",
            Mode::Sbk => "SBK",
            Mode::SbkFh => "SBK+FH",
            Mode::SbkFhct => "SBK+FHCT",
            Mode::Ea => "Ea",
            Mode::EaDet => "Ea+Det",
            Mode::EaFh => "Ea+FH",
            Mode::EaFhct => "Ea+FHCT",
            Mode::EaSbk => "Ea+SBK",
            Mode::EaSbkFh => "Ea+SBK+FH",
            Mode::EaSbkFhct => "Ea+SBK+FHCT",
        }
    }

    /// Identifier used on the command line and as the persisted key
    pub fn id(self) -> &'static str {
        match self {
            Mode::NoOpts => "no-opts",
            Mode::Det => "det",
            Mode::Fh => "fh",
            Mode::Fhct => "fhct",
            Mode::Sbk => "sbk",
            Mode::SbkFh => "sbk-fh",
            Mode::SbkFhct => "sbk-fhct",
            Mode::Ea => "ea",
            Mode::EaDet => "ea-det",
            Mode::EaFh => "ea-fh",
            Mode::EaFhct => "ea-fhct",
            Mode::EaSbk => "ea-sbk",
            Mode::EaSbkFh => "ea-sbk-fh",
            Mode::EaSbkFhct => "ea-sbk-fhct",
        }
    }

    fn legacy_name(self) -> &'static str {
        match self {
            Mode::NoOpts => "NOOPT",
            Mode::Det => "DET",
            Mode::Fh => "FH",
            Mode::Fhct => "FHCT",
            Mode::Sbk => "SBK",
            Mode::SbkFh => "SBKFH",
            Mode::SbkFhct => "SBKFHCT",
            Mode::Ea => "EA",
            Mode::EaDet => "EADET",
            Mode::EaFh => "EAFH",
            Mode::EaFhct => "EAFHCT",
            Mode::EaSbk => "EASBK",
            Mode::EaSbkFh => "EASBKFH",
            Mode::EaSbkFhct => "EASBKFHCT",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Mode {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        lookup(s)
    }
}

/// Resolve a mode identifier (or its legacy upper-case name)
pub fn lookup(id: &str) -> Result<Mode> {
    let id = id.trim();
    Mode::ALL
        .iter()
        .copied()
        .find(|m| m.id().eq_ignore_ascii_case(id) || m.legacy_name().eq_ignore_ascii_case(id))
        .ok_or_else(|| HarnessError::UnknownMode(id.to_string()))
}

/// Flag tokens for a mode identifier
pub fn flags_for(id: &str) -> Result<&'static [&'static str]> {
    lookup(id).map(Mode::flags)
}
