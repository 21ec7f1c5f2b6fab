//! Error types for git queries and configuration

use thiserror::Error;

/// Failure of a single git invocation
#[derive(Debug, Error)]
pub enum QueryError {
    /// git could not be started at all (not installed, bad working directory)
    #[error("failed to run `git {args}`: {source}")]
    Spawn {
        args: String,
        #[source]
        source: std::io::Error,
    },

    /// git ran but reported failure for a query whose result is required
    #[error("`git {args}` {}: {stderr}", status_text(.status))]
    Failed {
        args: String,
        status: Option<i32>,
        stderr: String,
    },

    /// git exited with a status the caller has no meaning for
    #[error("`git {args}` returned unexpected status ({}): {stderr}", status_text(.status))]
    UnexpectedStatus {
        args: String,
        status: Option<i32>,
        stderr: String,
    },
}

/// Invalid value in one of the environment variables read at startup
#[derive(Debug, Error)]
#[error("{var}={value:?} is invalid: expected {expected}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Human-readable form of a process exit status
pub fn status_text(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exited with status {}", code),
        None => "was terminated by a signal".to_string(),
    }
}
