//! Shell commands: help, echo, prop, exit.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use jetty_types::error::{ConsoleError, Result};

use crate::command::Command;
use crate::discovery::CommandCatalog;
use crate::process::Process;
use crate::properties::Properties;

/// Contribute every built-in command factory to `catalog`.
///
/// The entries match the built-in service manifest.
pub fn register_builtins(catalog: &mut CommandCatalog) {
    catalog
        .contribute("help", |_| Ok(Arc::new(HelpCmd)))
        .contribute("echo", |_| Ok(Arc::new(EchoCmd)))
        .contribute("prop", |deps| {
            Ok(Arc::new(PropCmd {
                properties: deps.get()?,
            }))
        })
        .contribute("exit", |deps| {
            Ok(Arc::new(ExitCmd {
                shutdown: deps.get()?,
            }))
        });
    crate::system_commands::register_system_commands(catalog);
    crate::redirect_commands::register_redirect_commands(catalog);
}

/// What `exit` does with its exit code.
#[derive(Clone)]
pub struct Shutdown(Arc<dyn Fn(i32) + Send + Sync>);

impl Shutdown {
    pub fn new(hook: impl Fn(i32) + Send + Sync + 'static) -> Self {
        Self(Arc::new(hook))
    }

    /// Terminate the whole process.
    pub fn process_exit() -> Self {
        Self::new(|code| std::process::exit(code))
    }

    pub fn run(&self, code: i32) {
        (self.0)(code);
    }
}

impl fmt::Debug for Shutdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Shutdown")
    }
}

fn usage(cmd: &dyn Command) -> ConsoleError {
    ConsoleError::argument(format!("Usage: {}", cmd.format()))
}

// ---------------------------------------------------------------------------
// help
// ---------------------------------------------------------------------------

struct HelpCmd;
impl Command for HelpCmd {
    fn names(&self) -> &[&'static str] {
        &["help", "?"]
    }
    fn format(&self) -> &str {
        "help [command]"
    }
    fn description(&self) -> &str {
        "List commands, or show details of one"
    }
    fn ordinal(&self) -> i32 {
        0
    }
    fn execute(&self, process: &mut Process) -> Result<i32> {
        let registry = Arc::clone(process.registry());
        let name = process.args().consume_string();
        if !process.args().is_empty() {
            return Err(usage(self));
        }

        let out = process.out();
        match name {
            Some(name) => {
                let cmd = registry
                    .get(&name)
                    .ok_or_else(|| ConsoleError::argument(format!("Unknown command: {name}")))?;
                writeln!(out, "Usage: {}", cmd.format())?;
                writeln!(out, "  {}", cmd.description())?;
                let aliases = registry.aliases_of(&cmd);
                if aliases.len() > 1 {
                    writeln!(out, "Names: {}", aliases.join(", "))?;
                }
                for line in cmd.help() {
                    writeln!(out, "  {line}")?;
                }
            },
            None => {
                let cmds = registry.commands();
                let width = cmds.iter().map(|c| c.format().len()).max().unwrap_or(0);
                writeln!(out, "Available commands:")?;
                for cmd in &cmds {
                    writeln!(out, "  {:width$}  {}", cmd.format(), cmd.description())?;
                }
                writeln!(out, "Type 'help <command>' for details.")?;
            },
        }
        Ok(0)
    }
}

// ---------------------------------------------------------------------------
// echo
// ---------------------------------------------------------------------------

struct EchoCmd;
impl Command for EchoCmd {
    fn names(&self) -> &[&'static str] {
        &["echo"]
    }
    fn format(&self) -> &str {
        "echo {text...}"
    }
    fn description(&self) -> &str {
        "Print arguments"
    }
    fn help(&self) -> &[&'static str] {
        &["Placeholders like ${user.dir} are resolved before printing."]
    }
    fn ordinal(&self) -> i32 {
        10
    }
    fn execute(&self, process: &mut Process) -> Result<i32> {
        let text = process.args().consume_strings().join(" ");
        writeln!(process.out(), "{text}")?;
        Ok(0)
    }
}

// ---------------------------------------------------------------------------
// prop
// ---------------------------------------------------------------------------

struct PropCmd {
    properties: Arc<Properties>,
}

impl Command for PropCmd {
    fn names(&self) -> &[&'static str] {
        &["prop", "props"]
    }
    fn format(&self) -> &str {
        "prop [key [value]]"
    }
    fn description(&self) -> &str {
        "Show or set properties"
    }
    fn help(&self) -> &[&'static str] {
        &[
            "Without arguments, lists every property.",
            "With a key, lists the properties matching it; * and ? are wildcards,",
            "case is ignored.",
            "With a key and a value, sets the property.",
        ]
    }
    fn ordinal(&self) -> i32 {
        20
    }
    fn execute(&self, process: &mut Process) -> Result<i32> {
        let args = process.args();
        if args.len() > 2 {
            return Err(usage(self));
        }
        let pattern = args.consume_string();
        let value = args.consume_string();

        match (pattern, value) {
            (Some(key), Some(value)) => {
                self.properties.set(&key, &value);
                log::debug!("Property {key} set");
                writeln!(process.out(), "{key} = {value}")?;
            },
            (pattern, _) => {
                let pattern = pattern.unwrap_or_else(|| "*".to_string());
                let out = process.out();
                for (key, value) in self.properties.matching(&pattern) {
                    writeln!(out, "{key} = {value}")?;
                }
            },
        }
        Ok(0)
    }
}

// ---------------------------------------------------------------------------
// exit
// ---------------------------------------------------------------------------

struct ExitCmd {
    shutdown: Shutdown,
}

impl Command for ExitCmd {
    fn names(&self) -> &[&'static str] {
        &["exit", "quit"]
    }
    fn format(&self) -> &str {
        "exit"
    }
    fn description(&self) -> &str {
        "Exit the process"
    }
    fn ordinal(&self) -> i32 {
        900
    }
    fn execute(&self, process: &mut Process) -> Result<i32> {
        if !process.args().is_empty() {
            return Err(usage(self));
        }
        log::info!("Exit requested from console");
        process.out().flush()?;
        self.shutdown.run(0);
        Ok(0)
    }
}
