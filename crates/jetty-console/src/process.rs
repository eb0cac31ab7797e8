//! One invocation of a command line.
//!
//! A process owns its arguments and its three streams. Before running, it
//! looks for the last redirection or background marker (`>`, `>>`, `&`). If
//! there is one, the marker and everything after it become a child process
//! whose parent is the remainder; the child's command (`pipe` or
//! `ampersand`) decides how to run the parent. `echo hi > out.txt &` thus
//! runs in the background, and the background job writes into the file.
//!
//! A marker used as a literal argument (a file literally named `&`) cannot be
//! told apart from the operator; there is no escaping.

use std::error::Error as _;
use std::fmt;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use jetty_types::error::{ConsoleError, Result};

use crate::arguments::Arguments;
use crate::placeholder::PlaceholderResolver;
use crate::registry::CommandRegistry;
use crate::stream::{Input, Output, Streams};

/// Tokens that split a line into a process chain.
pub const CHAIN_MARKERS: [&str; 3] = [">", ">>", "&"];

/// Result code of every failed invocation.
pub const FAILURE: i32 = -1;

pub struct Process {
    registry: Arc<CommandRegistry>,
    args: Arguments,
    streams: Streams,
    parent: Option<Box<Process>>,
    name: Option<String>,
}

impl Process {
    /// A process over `tokens`, whose first token names the command.
    pub fn new(
        registry: Arc<CommandRegistry>,
        resolver: Arc<dyn PlaceholderResolver>,
        tokens: Vec<String>,
        streams: Streams,
    ) -> Self {
        Self::with_args(registry, Arguments::new(tokens, resolver), streams)
    }

    fn with_args(registry: Arc<CommandRegistry>, args: Arguments, streams: Streams) -> Self {
        Self {
            registry,
            args,
            streams,
            parent: None,
            name: None,
        }
    }

    /// Run the process chain and return its result code.
    ///
    /// Never fails: argument errors, unknown commands, faults and panics are
    /// reported on the error stream and yield [`FAILURE`]. Owned streams are
    /// closed when the process is dropped at the end of this call.
    pub fn execute(mut self) -> i32 {
        // A marker in first position is the command itself: it has no parent.
        if let Some(index) = self
            .args
            .last_index_of_any(&CHAIN_MARKERS)
            .filter(|&i| i > 0)
        {
            let child_args = self.args.split_off(index);
            let mut child = Process::with_args(
                Arc::clone(&self.registry),
                child_args,
                self.streams.clone(),
            );
            log::trace!("Split '{}' off '{}'", child.args, self.args);
            child.parent = Some(Box::new(self));
            return child.run();
        }
        self.run()
    }

    fn run(&mut self) -> i32 {
        let Some(name) = self.args.consume_string() else {
            self.report_usage("Missing command");
            return FAILURE;
        };
        let Some(command) = self.registry.get(&name) else {
            let _ = writeln!(
                self.streams.err,
                "Unknown command: {name}\nType 'help' for a list of commands."
            );
            return FAILURE;
        };
        self.name = Some(name.clone());
        log::debug!("Executing '{name}' {}", self.args);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| command.execute(self)));
        match outcome {
            Ok(Ok(code)) => code,
            Ok(Err(e)) if e.is_usage_error() => {
                self.report_usage(&e.to_string());
                FAILURE
            },
            Ok(Err(e)) => {
                log::error!("Command '{name}' failed: {e}");
                self.report_fault(&name, &e);
                FAILURE
            },
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                log::error!("Command '{name}' panicked: {msg}");
                let _ = writeln!(self.streams.err, "Command '{name}' panicked: {msg}");
                FAILURE
            },
        }
    }

    fn report_usage(&mut self, msg: &str) {
        let _ = writeln!(self.streams.err, "{msg}");
    }

    fn report_fault(&mut self, name: &str, e: &ConsoleError) {
        let err = &mut self.streams.err;
        let _ = writeln!(err, "Command '{name}' failed: {e}");
        let mut source = e.source();
        while let Some(cause) = source {
            let _ = writeln!(err, "  caused by: {cause}");
            source = cause.source();
        }
        let _ = writeln!(err, "  {e:?}");
    }

    /// Remaining (unconsumed) arguments.
    pub fn args(&mut self) -> &mut Arguments {
        &mut self.args
    }

    /// The name the command was invoked by, once resolved.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn out(&mut self) -> &mut Output {
        &mut self.streams.out
    }

    pub fn err(&mut self) -> &mut Output {
        &mut self.streams.err
    }

    pub fn input(&mut self) -> &mut Input {
        &mut self.streams.input
    }

    pub fn streams(&self) -> &Streams {
        &self.streams
    }

    /// Whether this process is a redirection or background link.
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Take ownership of the process whose output this one redirects.
    pub fn take_parent(&mut self) -> Result<Process> {
        self.parent
            .take()
            .map(|p| *p)
            .ok_or_else(|| ConsoleError::argument("Missing command before redirection"))
    }

    /// Send both output and error to `out`.
    pub fn redirect(&mut self, out: Output) {
        self.streams.err = out.clone();
        self.streams.out = out;
    }

    /// Replace the input stream.
    pub fn set_input(&mut self, input: Input) {
        self.streams.input = input;
    }

    fn close(&mut self) {
        let Streams { out, err, .. } = &mut self.streams;
        for stream in [out, err] {
            if let Err(e) = stream.close()
                && !stream.is_standard()
            {
                log::debug!("Closing redirected stream failed: {e}");
            }
        }
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("args", &self.args)
            .field("name", &self.name)
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
