//! The engine's configuration surface (spec.md §6). Pure data: reading it
//! from `bsconfig.json`-equivalent files and wiring it to a file-watcher
//! are CLI/IO concerns that stay out of scope, but the shape the CLI would
//! hand to [`crate::Program`] is implemented and tested here.

use bsc_parser::{ParseMode as ParserParseMode, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    Baseline,
    Superset,
}

impl From<ParseMode> for ParserParseMode {
    fn from(value: ParseMode) -> Self {
        match value {
            ParseMode::Baseline => ParserParseMode::Baseline,
            ParseMode::Superset => ParserParseMode::Superset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Package-path globs selecting inputs. Glob expansion is a CLI/IO
    /// concern; the engine only records the patterns.
    pub files: Vec<String>,
    pub root_dir: String,
    #[serde(with = "severity_map")]
    pub diagnostic_severity_overrides: HashMap<u32, Severity>,
    pub ignore_error_codes: Vec<u32>,
    pub parse_mode: ParseMode,
    pub watch: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            files: vec!["**/*.brs".to_string(), "**/*.xml".to_string()],
            root_dir: ".".to_string(),
            diagnostic_severity_overrides: HashMap::new(),
            ignore_error_codes: Vec::new(),
            parse_mode: ParseMode::Superset,
            watch: false,
        }
    }
}

impl Config {
    /// Applies `diagnosticSeverityOverrides` then filters out
    /// `ignoreErrorCodes`, in that order (an override cannot resurrect a
    /// diagnostic that is then ignored).
    pub fn apply(&self, mut diagnostics: Vec<bsc_parser::Diagnostic>) -> Vec<bsc_parser::Diagnostic> {
        for d in &mut diagnostics {
            if let Some(severity) = self.diagnostic_severity_overrides.get(&d.code) {
                d.severity = *severity;
            }
        }
        diagnostics.retain(|d| !self.ignore_error_codes.contains(&d.code));
        diagnostics
    }
}

mod severity_map {
    use bsc_parser::Severity;
    use serde::de::Deserializer;
    use serde::ser::Serializer;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;

    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    enum WireSeverity {
        Hint,
        Info,
        Warn,
        Error,
    }

    impl From<Severity> for WireSeverity {
        fn from(s: Severity) -> Self {
            match s {
                Severity::Hint => WireSeverity::Hint,
                Severity::Info => WireSeverity::Info,
                Severity::Warn => WireSeverity::Warn,
                Severity::Error => WireSeverity::Error,
            }
        }
    }

    impl From<WireSeverity> for Severity {
        fn from(s: WireSeverity) -> Self {
            match s {
                WireSeverity::Hint => Severity::Hint,
                WireSeverity::Info => Severity::Info,
                WireSeverity::Warn => Severity::Warn,
                WireSeverity::Error => Severity::Error,
            }
        }
    }

    pub fn serialize<S: Serializer>(map: &HashMap<u32, Severity>, serializer: S) -> Result<S::Ok, S::Error> {
        let wire: HashMap<String, WireSeverity> = map.iter().map(|(k, v)| (k.to_string(), (*v).into())).collect();
        wire.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<HashMap<u32, Severity>, D::Error> {
        let wire: HashMap<String, WireSeverity> = HashMap::deserialize(deserializer)?;
        Ok(wire.into_iter().filter_map(|(k, v)| k.parse::<u32>().ok().map(|k| (k, v.into()))).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsc_parser::Diagnostic;
    use bsc_parser::Position;
    use bsc_parser::SourceRange;

    fn diag(code: u32) -> Diagnostic {
        Diagnostic::new(code, Severity::Error, "msg", SourceRange::new(Position::default(), Position::default()), "f.brs")
    }

    #[test]
    fn ignore_codes_wins_over_override() {
        let mut config = Config::default();
        config.diagnostic_severity_overrides.insert(42, Severity::Warn);
        config.ignore_error_codes.push(42);
        let result = config.apply(vec![diag(42)]);
        assert!(result.is_empty());
    }

    #[test]
    fn override_changes_severity() {
        let mut config = Config::default();
        config.diagnostic_severity_overrides.insert(42, Severity::Hint);
        let result = config.apply(vec![diag(42)]);
        assert_eq!(result[0].severity, Severity::Hint);
    }

    #[test]
    fn round_trips_through_json() {
        let mut config = Config::default();
        config.diagnostic_severity_overrides.insert(2002, Severity::Warn);
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
