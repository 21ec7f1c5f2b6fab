//! Verbosity control for diagnostic messages

use std::env;
use std::sync::atomic::{AtomicU8, Ordering};

/// Environment variable holding the initial verbosity level
pub const VERBOSE_VAR: &str = "GIT_VERSION_INFO_VERBOSE";

/// Global verbosity level (can be raised by `-v` flags)
static VERBOSITY_LEVEL: AtomicU8 = AtomicU8::new(0);

/// Verbosity level for diagnostic messages
///
/// Diagnostics always go to stderr so stdout stays machine-readable.
#[derive(Clone, Copy, Debug)]
pub struct Verbosity;

impl Verbosity {
    /// Create verbosity, initializing from the environment
    ///
    /// - GIT_VERSION_INFO_VERBOSE=1 enables info messages
    /// - GIT_VERSION_INFO_VERBOSE=2 also enables debug messages
    pub fn from_env() -> Self {
        let level = env::var(VERBOSE_VAR)
            .ok()
            .and_then(|v| v.trim().parse::<u8>().ok())
            .unwrap_or(0);

        VERBOSITY_LEVEL.store(level, Ordering::SeqCst);
        Verbosity
    }

    /// Raise the verbosity level (called for each `-v` on the command line)
    pub fn set_level(&self, level: u8) {
        // Only increase verbosity, the environment sets the floor
        VERBOSITY_LEVEL.fetch_max(level, Ordering::SeqCst);
    }

    fn level(&self) -> u8 {
        VERBOSITY_LEVEL.load(Ordering::SeqCst)
    }

    /// Print an info message (verbosity >= 1)
    pub fn info(&self, msg: &str) {
        if self.level() >= 1 {
            eprintln!("{}", msg);
        }
    }

    /// Print a debug message (verbosity >= 2)
    pub fn debug(&self, msg: &str) {
        if self.level() >= 2 {
            eprintln!("DEBUG: {}", msg);
        }
    }
}
