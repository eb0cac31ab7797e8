//! Control of the external server process.

use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use jetty_console::{PlaceholderResolver, resolve_placeholders};
use jetty_types::config::ServerConfig;
use jetty_types::error::{ConsoleError, Result};

/// Observable state of the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStatus {
    /// No server program is configured.
    NotConfigured,
    Running { pid: u32, uptime: Duration },
    /// Not running. Carries the last exit status, if the server ever ran.
    Stopped { exit: Option<String> },
}

/// What the server commands need from a server.
pub trait ServerControl: Send + Sync {
    /// Start the server. Returns its pid.
    fn start(&self) -> Result<u32>;

    /// Stop the server. Returns whether it was running.
    fn stop(&self) -> Result<bool>;

    /// Stop, pause for the configured delay, start again.
    fn restart(&self) -> Result<u32>;

    fn status(&self) -> ServerStatus;

    /// The URL the server answers on.
    fn url(&self) -> &str;

    /// Whether the server is running or in the middle of a restart.
    fn is_alive(&self) -> bool {
        self.restarting() || matches!(self.status(), ServerStatus::Running { .. })
    }

    fn restarting(&self) -> bool {
        false
    }
}

struct Running {
    child: Child,
    started: Instant,
}

#[derive(Default)]
struct State {
    running: Option<Running>,
    last_exit: Option<ExitStatus>,
}

/// A server run as a child process.
///
/// The child inherits the launcher's stdout and stderr. Its stdin is
/// closed, since the console owns the launcher's.
pub struct ExternalServer {
    program: Vec<String>,
    working_dir: Option<PathBuf>,
    url: String,
    restart_delay: Duration,
    restarting: AtomicBool,
    state: Mutex<State>,
}

impl ExternalServer {
    /// Build from configuration, resolving placeholders in the command line
    /// and the URL.
    pub fn from_config(config: &ServerConfig, resolver: &dyn PlaceholderResolver) -> Self {
        Self {
            program: config
                .command
                .iter()
                .map(|arg| resolve_placeholders(arg, resolver))
                .collect(),
            working_dir: config.working_dir.clone(),
            url: resolve_placeholders(&config.url, resolver),
            restart_delay: Duration::from_millis(config.restart_delay_ms),
            restarting: AtomicBool::new(false),
            state: Mutex::new(State::default()),
        }
    }

    pub fn program(&self) -> &[String] {
        &self.program
    }

    /// Block until the server has exited, including exits requested by
    /// `stop`. A restart in progress does not count as an exit.
    pub fn wait(&self, poll: Duration) {
        while self.is_alive() {
            thread::sleep(poll);
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Forget a child that exited on its own.
    fn refresh(state: &mut State) {
        let exited = match state.running.as_mut() {
            Some(running) => match running.child.try_wait() {
                Ok(Some(status)) => Some(status),
                Ok(None) => None,
                Err(e) => {
                    log::warn!("Cannot poll server process: {e}");
                    None
                },
            },
            None => None,
        };
        if let Some(status) = exited {
            log::info!("Server exited: {status}");
            state.running = None;
            state.last_exit = Some(status);
        }
    }
}

impl ServerControl for ExternalServer {
    fn start(&self) -> Result<u32> {
        let Some((program, args)) = self.program.split_first() else {
            return Err(ConsoleError::Server("no server command configured".into()));
        };
        let mut state = self.lock();
        Self::refresh(&mut state);
        if let Some(running) = &state.running {
            return Err(ConsoleError::Server(format!(
                "already running (pid {})",
                running.child.id()
            )));
        }

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        let child = cmd
            .spawn()
            .map_err(|e| ConsoleError::Server(format!("cannot start {program}: {e}")))?;
        let pid = child.id();
        log::info!("Server started: {} (pid {pid})", self.program.join(" "));
        state.running = Some(Running {
            child,
            started: Instant::now(),
        });
        Ok(pid)
    }

    fn stop(&self) -> Result<bool> {
        let mut state = self.lock();
        Self::refresh(&mut state);
        let Some(mut running) = state.running.take() else {
            return Ok(false);
        };
        let pid = running.child.id();
        log::info!("Stopping server (pid {pid})");
        // The child may exit between the poll and the kill.
        if let Err(e) = running.child.kill() {
            log::debug!("Kill of pid {pid} failed: {e}");
        }
        let status = running.child.wait()?;
        log::info!("Server stopped: {status}");
        state.last_exit = Some(status);
        Ok(true)
    }

    fn restart(&self) -> Result<u32> {
        self.restarting.store(true, Ordering::SeqCst);
        let result = self.stop().and_then(|_| {
            if !self.restart_delay.is_zero() {
                thread::sleep(self.restart_delay);
            }
            self.start()
        });
        self.restarting.store(false, Ordering::SeqCst);
        result
    }

    fn status(&self) -> ServerStatus {
        if self.program.is_empty() {
            return ServerStatus::NotConfigured;
        }
        let mut state = self.lock();
        Self::refresh(&mut state);
        match &state.running {
            Some(running) => ServerStatus::Running {
                pid: running.child.id(),
                uptime: running.started.elapsed(),
            },
            None => ServerStatus::Stopped {
                exit: state.last_exit.map(|s| s.to_string()),
            },
        }
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn restarting(&self) -> bool {
        self.restarting.load(Ordering::SeqCst)
    }
}

impl Drop for ExternalServer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("Cannot stop server on shutdown: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jetty_console::placeholder::MapResolver;

    fn server(command: &[&str]) -> ExternalServer {
        let config = ServerConfig {
            command: command.iter().map(|s| s.to_string()).collect(),
            ..ServerConfig::default()
        };
        ExternalServer::from_config(&config, &MapResolver::default())
    }

    #[test]
    fn placeholders_resolved_at_build() {
        let config = ServerConfig {
            command: vec!["${home}/bin/jetty".into(), "--port=${port}".into()],
            url: "http://localhost:${port}/".into(),
            ..ServerConfig::default()
        };
        let resolver = MapResolver::default().with("home", "/srv").with("port", "9090");
        let s = ExternalServer::from_config(&config, &resolver);
        assert_eq!(s.program(), ["/srv/bin/jetty", "--port=9090"]);
        assert_eq!(s.url(), "http://localhost:9090/");
    }

    #[test]
    fn unconfigured_server() {
        let s = server(&[]);
        assert_eq!(s.status(), ServerStatus::NotConfigured);
        assert!(matches!(s.start(), Err(ConsoleError::Server(_))));
        assert!(!s.stop().unwrap());
        assert!(!s.is_alive());
    }

    #[test]
    fn missing_program_fails_to_start() {
        let s = server(&["/definitely/not/a/program"]);
        let err = s.start().unwrap_err();
        assert!(err.to_string().contains("cannot start"));
        assert_eq!(s.status(), ServerStatus::Stopped { exit: None });
    }

    #[cfg(unix)]
    #[test]
    fn start_stop_lifecycle() {
        let s = server(&["sleep", "30"]);
        let pid = s.start().unwrap();
        assert!(matches!(s.status(), ServerStatus::Running { pid: p, .. } if p == pid));
        assert!(s.is_alive());
        assert!(s.start().is_err());

        assert!(s.stop().unwrap());
        assert!(matches!(s.status(), ServerStatus::Stopped { exit: Some(_) }));
        assert!(!s.stop().unwrap());
        s.wait(Duration::from_millis(1));
    }

    #[cfg(unix)]
    #[test]
    fn restart_gives_new_process() {
        let s = server(&["sleep", "30"]);
        let first = s.start().unwrap();
        let second = s.restart().unwrap();
        assert_ne!(first, second);
        assert!(!s.restarting());
        assert!(s.stop().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn exit_on_its_own_is_noticed() {
        let s = server(&["sh", "-c", "exit 3"]);
        s.start().unwrap();
        s.wait(Duration::from_millis(5));
        match s.status() {
            ServerStatus::Stopped { exit: Some(exit) } => assert!(exit.contains('3'), "{exit}"),
            other => panic!("unexpected status {other:?}"),
        }
    }
}
