//! Running git queries
//!
//! Everything the collector learns about a checkout goes through
//! [`QueryRunner`], so it can be driven by a scripted fake in tests.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::{status_text, QueryError};
use crate::verbosity::Verbosity;

/// Captured result of one git invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `None` if the process was killed by a signal
    pub status: Option<i32>,
}

impl QueryOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs a git query to completion and reports what it printed
pub trait QueryRunner {
    /// Run `git <args>`. An `Err` means git could not be run at all;
    /// a non-zero exit is reported through [`QueryOutput::status`].
    fn run(&self, args: &[&str]) -> Result<QueryOutput, QueryError>;
}

/// Runs the `git` executable found on PATH inside a working directory
pub struct GitCli {
    dir: PathBuf,
    verbosity: Verbosity,
}

impl GitCli {
    pub fn new(dir: impl Into<PathBuf>, verbosity: Verbosity) -> Self {
        Self {
            dir: dir.into(),
            verbosity,
        }
    }
}

impl QueryRunner for GitCli {
    fn run(&self, args: &[&str]) -> Result<QueryOutput, QueryError> {
        // output() drains both pipes and reaps the child before returning
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| QueryError::Spawn {
                args: args.join(" "),
                source,
            })?;

        let result = QueryOutput {
            stdout: String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            status: output.status.code(),
        };

        self.verbosity.debug(&format!(
            "git {} {}",
            args.join(" "),
            status_text(&result.status)
        ));

        Ok(result)
    }
}
