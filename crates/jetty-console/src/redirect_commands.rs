//! Chain link commands: `>`/`>>` redirect the parent into a file, `&` runs
//! it in the background.
//!
//! Both are reached only through [`Process::execute`] splitting a line at
//! its last marker; invoked on their own they have no parent and fail with
//! a usage error.

use std::io::Write;
use std::sync::Arc;

use jetty_types::error::{ConsoleError, Result};

use crate::command::Command;
use crate::discovery::CommandCatalog;
use crate::jobs::JobTable;
use crate::process::Process;
use crate::stream::{Input, Output};

pub(crate) fn register_redirect_commands(catalog: &mut CommandCatalog) {
    catalog
        .contribute("pipe", |_| Ok(Arc::new(PipeCmd)))
        .contribute("ampersand", |deps| {
            Ok(Arc::new(AmpersandCmd {
                jobs: deps.get()?,
            }))
        });
}

/// The process this link applies to. It must name a command.
fn take_parent(process: &mut Process) -> Result<Process> {
    let mut parent = process.take_parent()?;
    if parent.args().is_empty() {
        return Err(ConsoleError::argument("Missing command before redirection"));
    }
    Ok(parent)
}

// ---------------------------------------------------------------------------
// pipe
// ---------------------------------------------------------------------------

struct PipeCmd;
impl Command for PipeCmd {
    fn names(&self) -> &[&'static str] {
        &[">", ">>"]
    }
    fn format(&self) -> &str {
        "command > file | command >> file"
    }
    fn description(&self) -> &str {
        "Redirect output into a file"
    }
    fn help(&self) -> &[&'static str] {
        &[
            "> truncates the file, >> appends to it.",
            "Both output and error of the command go to the file.",
        ]
    }
    fn ordinal(&self) -> i32 {
        800
    }
    fn execute(&self, process: &mut Process) -> Result<i32> {
        let append = process.name() == Some(">>");
        let usage = || ConsoleError::argument(format!("Usage: {}", self.format()));

        let path = process.args().consume_file().ok_or_else(usage)?;
        if !process.args().is_empty() {
            return Err(usage());
        }
        let mut parent = take_parent(process)?;
        if parent.args().last_index_of_any(&[">", ">>"]).is_some() {
            return Err(ConsoleError::argument(
                "Only one redirection target is allowed per line",
            ));
        }
        let file = Output::file(&path, append).map_err(|e| {
            ConsoleError::argument(format!("Cannot open {}: {e}", path.display()))
        })?;
        log::debug!(
            "Redirecting '{}' to {} (append: {append})",
            parent.args(),
            path.display()
        );
        parent.redirect(file);
        Ok(parent.execute())
    }
}

// ---------------------------------------------------------------------------
// ampersand
// ---------------------------------------------------------------------------

struct AmpersandCmd {
    jobs: Arc<JobTable>,
}

impl Command for AmpersandCmd {
    fn names(&self) -> &[&'static str] {
        &["&"]
    }
    fn format(&self) -> &str {
        "command &"
    }
    fn description(&self) -> &str {
        "Run a command in the background"
    }
    fn help(&self) -> &[&'static str] {
        &[
            "The console returns immediately. The job reports when it starts",
            "and finishes, with the command's result code.",
        ]
    }
    fn ordinal(&self) -> i32 {
        810
    }
    fn execute(&self, process: &mut Process) -> Result<i32> {
        if !process.args().is_empty() {
            return Err(ConsoleError::argument(format!(
                "Usage: {}",
                self.format()
            )));
        }
        let mut parent = take_parent(process)?;
        // Background jobs never compete with the console for its input.
        parent.set_input(Input::empty());
        let description = parent.args().to_string();
        let mut out = process.out().clone();

        self.jobs.spawn(&description, move |id| {
            let _ = writeln!(out, "[{id}] Started");
            let _ = out.flush();
            let code = parent.execute();
            let _ = writeln!(out, "[{id}] Finished (result {code})");
            let _ = out.flush();
            log::debug!("Job {id} finished with {code}");
            code
        })?;
        Ok(0)
    }
}
