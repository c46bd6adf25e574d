//! Flat key/value configuration consumed by the matrix factory and the
//! assembly cycle.
//!
//! A [`ParameterSet`] is an ordinary serde map, so it can be loaded from any
//! serde format, or parsed from classic `"KEY value"` strings. Only the keys
//! [`AssemblyOptions::from_params`] knows are interpreted; every other key
//! is ignored.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::assembly_error::AssemblyError;

/// One parameter value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
}

impl ParamValue {
    /// Type a raw string: `true`/`false`, then integer, then float, else string.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw {
            "true" => ParamValue::Bool(true),
            "false" => ParamValue::Bool(false),
            _ => raw
                .parse::<i64>()
                .map(ParamValue::Int)
                .or_else(|_| raw.parse::<f64>().map(ParamValue::Double))
                .unwrap_or_else(|_| ParamValue::Str(raw.to_owned())),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Int(i) => Some(*i != 0),
            ParamValue::Str(s) if s.eq_ignore_ascii_case("true") => Some(true),
            ParamValue::Str(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Double(d) => write!(f, "{d}"),
            ParamValue::Str(s) => f.write_str(s),
        }
    }
}

/// A flat, string-keyed parameter map.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    params: BTreeMap<String, ParamValue>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `"KEY value"` strings. A bare `"KEY"` is a boolean flag set to
    /// true; blank lines are skipped.
    pub fn parse_strings<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut set = Self::new();
        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() {
                continue;
            }
            match line.split_once(char::is_whitespace) {
                Some((key, value)) => set.set(key, ParamValue::parse(value)),
                None => set.set(line, ParamValue::Bool(true)),
            }
        }
        set
    }

    pub fn set(&mut self, key: impl Into<String>, value: ParamValue) {
        self.params.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Verbosity of the assembly cycle. Ordered: each level includes the
/// output of the levels below it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OutputLevel {
    #[default]
    None,
    Stats,
    MatrixFiles,
    All,
}

impl std::str::FromStr for OutputLevel {
    type Err = AssemblyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NONE" => Ok(OutputLevel::None),
            "STATS" => Ok(OutputLevel::Stats),
            "MATRIX_FILES" => Ok(OutputLevel::MatrixFiles),
            "ALL" => Ok(OutputLevel::All),
            other => Err(AssemblyError::Configuration(format!(
                "unknown outputLevel '{other}'"
            ))),
        }
    }
}

/// The interpreted subset of a [`ParameterSet`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssemblyOptions {
    /// Store the matrix as entity blocks rather than scalar rows.
    pub block_matrix: bool,
    pub output_level: OutputLevel,
    /// Directory that receives matrix dumps at `OutputLevel::MatrixFiles`.
    pub debug_output: Option<PathBuf>,
    /// Label used in log lines and dump file names.
    pub name: String,
}

impl AssemblyOptions {
    pub fn from_params(params: &ParameterSet) -> Result<Self, AssemblyError> {
        let mut opts = Self::default();
        for (key, value) in params.iter() {
            match key {
                "BLOCK_MATRIX" => {
                    opts.block_matrix = value.as_bool().ok_or_else(|| {
                        AssemblyError::Configuration(format!(
                            "BLOCK_MATRIX expects a boolean, got '{value}'"
                        ))
                    })?;
                }
                "outputLevel" => {
                    opts.output_level = value
                        .as_str()
                        .ok_or_else(|| {
                            AssemblyError::Configuration(format!(
                                "outputLevel expects a level name, got '{value}'"
                            ))
                        })?
                        .parse()?;
                }
                "debugOutput" => opts.debug_output = Some(PathBuf::from(value.to_string())),
                "name" => {
                    if value.as_str().is_none() {
                        log::warn!("parameter 'name' is not a string; using '{value}'");
                    }
                    opts.name = value.to_string();
                }
                _ => log::debug!("ignoring unrecognized parameter '{key}'"),
            }
        }
        Ok(opts)
    }
}
