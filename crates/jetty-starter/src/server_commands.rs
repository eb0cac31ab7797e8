//! Console commands that control the server: stop, restart, info,
//! open-browser.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use jetty_console::{Command, CommandCatalog, Process, Properties};
use jetty_types::error::{ConsoleError, Result};

use crate::server::{ServerControl, ServerStatus};

/// Manifest listing the launcher's commands.
pub const SERVER_MANIFEST: &str = include_str!("../META-INF/services/jetty_console.Command");

/// Contribute the server command factories to `catalog`.
pub fn register_server_commands(catalog: &mut CommandCatalog) {
    catalog
        .contribute("stop", |deps| {
            Ok(Arc::new(StopCmd {
                server: deps.get()?,
            }))
        })
        .contribute("restart", |deps| {
            Ok(Arc::new(RestartCmd {
                server: deps.get()?,
            }))
        })
        .contribute("info", |deps| {
            Ok(Arc::new(InfoCmd {
                server: deps.get()?,
                properties: deps.get()?,
            }))
        })
        .contribute("open-browser", |deps| {
            let server: Arc<dyn ServerControl> = deps.get()?;
            Ok(Arc::new(OpenBrowserCmd {
                url: server.url().to_string(),
                headless: is_headless(),
            }))
        });
}

fn no_arguments(cmd: &dyn Command, process: &mut Process) -> Result<()> {
    if process.args().is_empty() {
        Ok(())
    } else {
        Err(ConsoleError::argument(format!("Usage: {}", cmd.format())))
    }
}

/// `h:mm:ss`.
fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

// ---------------------------------------------------------------------------
// stop
// ---------------------------------------------------------------------------

struct StopCmd {
    server: Arc<dyn ServerControl>,
}

impl Command for StopCmd {
    fn names(&self) -> &[&'static str] {
        &["stop"]
    }
    fn format(&self) -> &str {
        "stop"
    }
    fn description(&self) -> &str {
        "Stop the server"
    }
    fn ordinal(&self) -> i32 {
        500
    }
    fn execute(&self, process: &mut Process) -> Result<i32> {
        no_arguments(self, process)?;
        if self.server.stop()? {
            writeln!(process.out(), "Server stopped")?;
        } else {
            writeln!(process.out(), "Server is not running")?;
        }
        Ok(0)
    }
}

// ---------------------------------------------------------------------------
// restart
// ---------------------------------------------------------------------------

struct RestartCmd {
    server: Arc<dyn ServerControl>,
}

impl Command for RestartCmd {
    fn names(&self) -> &[&'static str] {
        &["restart"]
    }
    fn format(&self) -> &str {
        "restart"
    }
    fn description(&self) -> &str {
        "Restart the server"
    }
    fn ordinal(&self) -> i32 {
        510
    }
    fn execute(&self, process: &mut Process) -> Result<i32> {
        no_arguments(self, process)?;
        writeln!(process.out(), "Restarting server...")?;
        process.out().flush()?;
        let pid = self.server.restart()?;
        writeln!(process.out(), "Server started (pid {pid})")?;
        Ok(0)
    }
}

// ---------------------------------------------------------------------------
// info
// ---------------------------------------------------------------------------

struct InfoCmd {
    server: Arc<dyn ServerControl>,
    properties: Arc<Properties>,
}

impl Command for InfoCmd {
    fn names(&self) -> &[&'static str] {
        &["info"]
    }
    fn format(&self) -> &str {
        "info"
    }
    fn description(&self) -> &str {
        "Show server and runtime information"
    }
    fn ordinal(&self) -> i32 {
        520
    }
    fn execute(&self, process: &mut Process) -> Result<i32> {
        no_arguments(self, process)?;
        let state = match self.server.status() {
            ServerStatus::NotConfigured => "not configured".to_string(),
            ServerStatus::Running { pid, uptime } => {
                format!("running (pid {pid}, up {})", format_uptime(uptime))
            },
            ServerStatus::Stopped { exit: Some(exit) } => format!("stopped ({exit})"),
            ServerStatus::Stopped { exit: None } => "stopped".to_string(),
        };
        let prop = |key: &str| self.properties.get(key).unwrap_or_else(|| "?".to_string());

        let out = process.out();
        writeln!(out, "Server:   {state}")?;
        writeln!(out, "URL:      {}", self.server.url())?;
        writeln!(out, "Starter:  {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(out, "OS:       {} {}", prop("os.name"), prop("os.arch"))?;
        writeln!(out, "Dir:      {}", prop("user.dir"))?;
        Ok(0)
    }
}

// ---------------------------------------------------------------------------
// open-browser
// ---------------------------------------------------------------------------

struct OpenBrowserCmd {
    url: String,
    headless: bool,
}

impl Command for OpenBrowserCmd {
    fn names(&self) -> &[&'static str] {
        &["open-browser", "open"]
    }
    fn format(&self) -> &str {
        "open-browser"
    }
    fn description(&self) -> &str {
        "Open the server URL in a web browser"
    }
    fn ordinal(&self) -> i32 {
        530
    }
    fn is_enabled(&self) -> bool {
        !self.headless
    }
    fn execute(&self, process: &mut Process) -> Result<i32> {
        no_arguments(self, process)?;
        let (program, args) = browser_command();
        std::process::Command::new(program)
            .args(args)
            .arg(&self.url)
            .spawn()
            .map_err(|e| ConsoleError::Command(format!("cannot launch {program}: {e}")))?;
        writeln!(process.out(), "Opening {}", self.url)?;
        Ok(0)
    }
}

/// Program (and leading arguments) that opens a URL on this platform.
fn browser_command() -> (&'static str, &'static [&'static str]) {
    if cfg!(target_os = "macos") {
        ("open", &[])
    } else if cfg!(windows) {
        ("rundll32", &["url.dll,FileProtocolHandler"])
    } else {
        ("xdg-open", &[])
    }
}

/// No display to open a browser on.
fn is_headless() -> bool {
    if cfg!(any(target_os = "macos", windows)) {
        return false;
    }
    std::env::var_os("DISPLAY").is_none() && std::env::var_os("WAYLAND_DISPLAY").is_none()
}
