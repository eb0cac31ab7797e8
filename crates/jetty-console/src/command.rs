//! The command contract.

use jetty_types::error::Result;

use crate::process::Process;

/// Ordinal used when a command does not ask for a listing position.
pub const DEFAULT_ORDINAL: i32 = 1000;

/// A single executable console command.
///
/// Commands are shared between the console thread and background jobs, so
/// they must be `Send + Sync`; per-invocation state lives in the
/// [`Process`].
pub trait Command: Send + Sync {
    /// Every name the command answers to. The first is the primary name.
    fn names(&self) -> &[&'static str];

    /// Short usage format, e.g. `prop [key [value]]`.
    fn format(&self) -> &str;

    /// One-line description for `help`.
    fn description(&self) -> &str;

    /// Detail lines for `help <command>`.
    fn help(&self) -> &[&'static str] {
        &[]
    }

    /// Position in the `help` listing; lower comes first.
    fn ordinal(&self) -> i32 {
        DEFAULT_ORDINAL
    }

    /// Disabled commands are never installed.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Run the command against the process's arguments and streams.
    ///
    /// Returns the result code: `0` for success, negative for failure.
    fn execute(&self, process: &mut Process) -> Result<i32>;

    /// The primary name.
    fn name(&self) -> &str {
        self.names().first().copied().unwrap_or("")
    }
}
