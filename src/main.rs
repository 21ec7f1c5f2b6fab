//! Print version metadata of a git checkout for build systems
//!
//! ```text
//! git-version-info              # human-readable key: value lines
//! git-version-info --json       # one JSON object
//! git-version-info --env path/  # KEY=value lines
//! ```

mod collector;
mod config;
mod error;
mod info;
mod query;
mod verbosity;

use verbosity::Verbosity;

use anyhow::{Context, Result};
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::config::Config;

const USAGE: &str = "\
Usage: git-version-info [-v|-vv] [--json|--env] [PATH]
       git-version-info --help|--version

Print commit, branch, tag, dirty state, remotes and commit date of the git
checkout containing PATH (default: the current directory).

Environment:
  WORKFLOW_BRANCH_OR_TAG         branch name to report instead of asking git
  SOURCE_DATE_EPOCH              report this Unix time as the commit date
  GIT_VERSION_INFO_HASH_LENGTH   short hash length (default 8)
  GIT_VERSION_INFO_VERBOSE       1 for info, 2 for debug output on stderr";

/// Output format selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Text,
    Json,
    Env,
}

#[derive(Debug, PartialEq, Eq)]
struct Options {
    format: Format,
    path: Option<PathBuf>,
    verbose: u8,
}

#[derive(Debug, PartialEq, Eq)]
enum Invocation {
    Collect(Options),
    Help,
    Version,
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    let options = match parse_args(&args) {
        Ok(Invocation::Collect(options)) => options,
        Ok(Invocation::Help) => {
            println!("{}", USAGE);
            return Ok(());
        }
        Ok(Invocation::Version) => {
            println!(
                "git-version-info {} ({}, built {})",
                env!("CARGO_PKG_VERSION"),
                env!("GIT_HASH"),
                env!("BUILD_DATE")
            );
            return Ok(());
        }
        Err(msg) => {
            eprintln!("{}", msg);
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    let verbosity = Verbosity::from_env();
    verbosity.set_level(options.verbose);

    let config = Config::from_env().context("Invalid configuration")?;

    let dir = match options.path {
        Some(path) => path,
        None => env::current_dir().context("Failed to determine current directory")?,
    };
    verbosity.info(&format!("Collecting version info in {}", dir.display()));

    let info = collector::collect(&dir, config, verbosity)
        .with_context(|| format!("Failed to collect version info for {}", dir.display()))?;

    let mut stdout = io::stdout().lock();
    match options.format {
        Format::Text => write!(stdout, "{}", info)?,
        Format::Json => writeln!(stdout, "{}", info.to_json()?)?,
        Format::Env => info.write_env(&mut stdout)?,
    }
    stdout.flush()?;

    Ok(())
}

/// Parse command-line arguments (without the program name)
fn parse_args(args: &[String]) -> Result<Invocation, String> {
    let mut options = Options {
        format: Format::Text,
        path: None,
        verbose: 0,
    };

    for arg in args {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Invocation::Help),
            "-V" | "--version" => return Ok(Invocation::Version),
            "-v" | "--verbose" => options.verbose = options.verbose.saturating_add(1),
            "-vv" => options.verbose = options.verbose.saturating_add(2),
            "--json" => options.format = select_format(options.format, Format::Json)?,
            "--env" => options.format = select_format(options.format, Format::Env)?,
            flag if flag.starts_with('-') && flag != "-" => {
                return Err(format!("Unknown option: {}", flag));
            }
            path => {
                if options.path.is_some() {
                    return Err(format!("Unexpected argument: {}", path));
                }
                options.path = Some(PathBuf::from(path));
            }
        }
    }

    Ok(Invocation::Collect(options))
}

/// Repeating a format flag is fine, mixing two is not
fn select_format(current: Format, requested: Format) -> Result<Format, String> {
    if current == Format::Text || current == requested {
        Ok(requested)
    } else {
        Err("--json and --env are mutually exclusive".to_string())
    }
}
