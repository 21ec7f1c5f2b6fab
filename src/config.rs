//! Options read from the environment

use chrono::{DateTime, Utc};
use std::env;

use crate::error::ConfigError;

/// CI-provided branch name, preferred over asking git when set
pub const BRANCH_OVERRIDE_VAR: &str = "WORKFLOW_BRANCH_OR_TAG";
/// Reproducible-builds timestamp, replaces the commit date when set
pub const SOURCE_DATE_EPOCH_VAR: &str = "SOURCE_DATE_EPOCH";
pub const HASH_LENGTH_VAR: &str = "GIT_VERSION_INFO_HASH_LENGTH";

pub const DEFAULT_HASH_LENGTH: usize = 8;
const MIN_HASH_LENGTH: usize = 4;
const MAX_HASH_LENGTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub branch_override: Option<String>,
    pub source_date_epoch: Option<DateTime<Utc>>,
    pub hash_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            branch_override: None,
            source_date_epoch: None,
            hash_length: DEFAULT_HASH_LENGTH,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source
    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset, CI systems often export blanks
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let branch_override = var(BRANCH_OVERRIDE_VAR).map(|v| v.trim().to_string());

        let source_date_epoch = match var(SOURCE_DATE_EPOCH_VAR) {
            Some(value) => Some(parse_epoch(&value)?),
            None => None,
        };

        let hash_length = match var(HASH_LENGTH_VAR) {
            Some(value) => parse_hash_length(&value)?,
            None => DEFAULT_HASH_LENGTH,
        };

        Ok(Self {
            branch_override,
            source_date_epoch,
            hash_length,
        })
    }
}

fn parse_epoch(value: &str) -> Result<DateTime<Utc>, ConfigError> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| ConfigError {
            var: SOURCE_DATE_EPOCH_VAR,
            value: value.to_string(),
            expected: "an integer number of seconds since the Unix epoch",
        })
}

fn parse_hash_length(value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|len| (MIN_HASH_LENGTH..=MAX_HASH_LENGTH).contains(len))
        .ok_or_else(|| ConfigError {
            var: HASH_LENGTH_VAR,
            value: value.to_string(),
            expected: "an integer between 4 and 40",
        })
}
