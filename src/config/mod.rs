//! Harness configuration
//!
//! Settings are layered: `.modebenchrc` first, then environment variables,
//! then command-line flags (applied by the binary). The rc file uses shell
//! assignment syntax:
//!
//! - `MODEBENCH_COMPILER` - path to the compiler under test
//! - `MODEBENCH_TIMEOUT` - per-invocation timeout in seconds, 0 for none
//! - `MODEBENCH_OUTPUT` - result document path
//! - `MODEBENCH_MODES` - space-separated mode identifiers

use crate::error::{HarnessError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const RC_FILE: &str = ".modebenchrc";
pub const DEFAULT_COMPILER: &str = "./dice";
pub const DEFAULT_OUTPUT: &str = "results.json";
pub const DEFAULT_CNF_OUTPUT: &str = "cnf_results.json";
pub const DEFAULT_REFERENCE_OUTPUT: &str = "problog_results.json";

const KEYS: [&str; 4] = [
    "MODEBENCH_COMPILER",
    "MODEBENCH_TIMEOUT",
    "MODEBENCH_OUTPUT",
    "MODEBENCH_MODES",
];

/// Values gathered from the rc file and environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarnessConfig {
    pub compiler: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub output: Option<PathBuf>,
    pub modes: Vec<String>,
}

impl HarnessConfig {
    /// rc file (explicit path, else `./.modebenchrc`, else `~/.modebenchrc`)
    /// overlaid with `MODEBENCH_*` environment variables
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|source| {
                    HarnessError::ConfigUnreadable {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
                Self::parse(&content)
            }
            None => Self::rc_path()
                .and_then(|path| Self::from_file(&path))
                .unwrap_or_default(),
        };
        config.apply(std::env::vars().filter(|(k, _)| KEYS.contains(&k.as_str())));
        Ok(config)
    }

    /// Effective per-invocation limit; the command line wins and `0` means
    /// no limit at all
    pub fn timeout(&self, cli_secs: Option<u64>) -> Option<Duration> {
        cli_secs
            .or(self.timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// First existing rc file in the current or home directory
    pub fn rc_path() -> Option<PathBuf> {
        let local = PathBuf::from(RC_FILE);
        if local.is_file() {
            return Some(local);
        }
        dirs::home_dir()
            .map(|home| home.join(RC_FILE))
            .filter(|path| path.is_file())
    }

    pub fn from_file(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        debug!(path = %path.display(), "loaded rc file");
        Some(Self::parse(&content))
    }

    /// Parse rc file content; unknown keys and malformed lines are ignored
    pub fn parse(content: &str) -> Self {
        let mut config = HarnessConfig::default();
        let assignments = content.lines().filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);
            parse_assignment(line).map(|(key, value)| (key, unquote(&value)))
        });
        config.apply(assignments);
        config
    }

    /// Overlay `KEY=value` pairs onto this configuration
    pub fn apply<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in pairs {
            match key.as_str() {
                "MODEBENCH_COMPILER" if !value.is_empty() => {
                    self.compiler = Some(PathBuf::from(value));
                }
                "MODEBENCH_TIMEOUT" => match value.trim().parse::<u64>() {
                    Ok(secs) => self.timeout_secs = Some(secs),
                    Err(_) => warn!(value = %value, "ignoring invalid MODEBENCH_TIMEOUT"),
                },
                "MODEBENCH_OUTPUT" if !value.is_empty() => {
                    self.output = Some(PathBuf::from(value));
                }
                "MODEBENCH_MODES" => {
                    self.modes = value.split_whitespace().map(str::to_string).collect();
                }
                _ => {}
            }
        }
    }
}

/// Parse a shell variable assignment (KEY=value or KEY="value")
fn parse_assignment(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || !key.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}

/// Remove surrounding quotes from a value
fn unquote(s: &str) -> String {
    let s = s.trim();
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return s[1..s.len() - 1].to_string();
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_empty() {
        assert_eq!(HarnessConfig::parse(""), HarnessConfig::default());
    }

    #[test]
    fn test_parse_all_keys() {
        let content = r#"
# harness settings
export MODEBENCH_COMPILER="/opt/dice/dice"
MODEBENCH_TIMEOUT=600
MODEBENCH_OUTPUT='out/results.json'
MODEBENCH_MODES="no-opts det  fh"
"#;
        let config = HarnessConfig::parse(content);
        assert_eq!(config.compiler, Some(PathBuf::from("/opt/dice/dice")));
        assert_eq!(config.timeout_secs, Some(600));
        assert_eq!(config.output, Some(PathBuf::from("out/results.json")));
        assert_eq!(config.modes, vec!["no-opts", "det", "fh"]);
    }

    #[test]
    fn test_invalid_timeout_ignored() {
        let config = HarnessConfig::parse("MODEBENCH_TIMEOUT=soon");
        assert_eq!(config.timeout_secs, None);
    }

    #[test]
    fn test_malformed_lines_ignored() {
        let config = HarnessConfig::parse("not an assignment\nBAD KEY=1\nOTHER=2");
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn test_overlay_replaces_values() {
        let mut config = HarnessConfig::parse("MODEBENCH_TIMEOUT=10\nMODEBENCH_MODES=det");
        config.apply([
            ("MODEBENCH_TIMEOUT".to_string(), "20".to_string()),
            ("MODEBENCH_COMPILER".to_string(), "./build/dice".to_string()),
        ]);
        assert_eq!(config.timeout_secs, Some(20));
        assert_eq!(config.compiler, Some(PathBuf::from("./build/dice")));
        assert_eq!(config.modes, vec!["det"]);
    }

    #[test]
    fn test_zero_timeout_disables_limit() {
        let config = HarnessConfig::parse("MODEBENCH_TIMEOUT=600");
        assert_eq!(config.timeout(None), Some(Duration::from_secs(600)));
        assert_eq!(config.timeout(Some(30)), Some(Duration::from_secs(30)));
        assert_eq!(config.timeout(Some(0)), None);

        let config = HarnessConfig::parse("MODEBENCH_TIMEOUT=0");
        assert_eq!(config.timeout_secs, Some(0));
        assert_eq!(config.timeout(None), None);
        assert_eq!(HarnessConfig::default().timeout(None), None);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let err = HarnessConfig::load(Some(&dir.path().join("nope"))).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_UNREADABLE");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"a b\""), "a b");
        assert_eq!(unquote("'x'"), "x");
        assert_eq!(unquote("\""), "\"");
        assert_eq!(unquote("plain"), "plain");
    }
}
