//! Command registry: case-insensitive name lookup with aliases.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::command::Command;

/// Owns the installed commands. Every name of a command maps to the same
/// shared instance.
///
/// The registry is built once during bootstrap and then shared read-only
/// behind an `Arc`.
#[derive(Default)]
pub struct CommandRegistry {
    by_name: HashMap<String, Arc<dyn Command>>,
    installed: Vec<Arc<dyn Command>>,
    blocked: HashSet<String>,
}

impl CommandRegistry {
    /// Create an empty command registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that refuses any command answering to one of
    /// `names`.
    pub fn with_disabled<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            blocked: names
                .into_iter()
                .map(|n| n.as_ref().to_lowercase())
                .collect(),
            ..Self::default()
        }
    }

    /// Install a command under all of its names.
    ///
    /// Disabled or blocked commands are skipped and stay invisible. A name
    /// already taken is rebound to the new command. Returns whether the
    /// command was installed.
    pub fn install(&mut self, cmd: Arc<dyn Command>) -> bool {
        if !cmd.is_enabled() {
            log::debug!("Skipping disabled command '{}'", cmd.name());
            return false;
        }
        if cmd
            .names()
            .iter()
            .any(|n| self.blocked.contains(&n.to_lowercase()))
        {
            log::debug!("Skipping command '{}' blocked by configuration", cmd.name());
            return false;
        }
        for name in cmd.names() {
            let key = name.to_lowercase();
            if let Some(previous) = self.by_name.insert(key, Arc::clone(&cmd)) {
                log::warn!(
                    "Command name '{name}' rebound from '{}' to '{}'",
                    previous.name(),
                    cmd.name()
                );
                self.forget_if_unreferenced(&previous);
            }
        }
        log::debug!("Installed command '{}'", cmd.name());
        self.installed.push(cmd);
        true
    }

    /// Install every command, returning how many were installed.
    pub fn install_all(&mut self, cmds: impl IntoIterator<Item = Arc<dyn Command>>) -> usize {
        cmds.into_iter().filter(|c| self.install(Arc::clone(c))).count()
    }

    /// Look a command up by any of its names, ignoring case.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.by_name.get(&name.to_lowercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(&name.to_lowercase())
    }

    /// Installed commands, each once, by ordinal then primary name.
    pub fn commands(&self) -> Vec<Arc<dyn Command>> {
        let mut cmds = self.installed.clone();
        cmds.sort_by(|a, b| {
            a.ordinal()
                .cmp(&b.ordinal())
                .then_with(|| a.name().cmp(b.name()))
        });
        cmds
    }

    /// Every registered name, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Names currently bound to `cmd`.
    pub fn aliases_of(&self, cmd: &Arc<dyn Command>) -> Vec<&str> {
        cmd.names()
            .iter()
            .copied()
            .filter(|n| {
                self.by_name
                    .get(&n.to_lowercase())
                    .is_some_and(|c| Arc::ptr_eq(c, cmd))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.installed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
    }

    fn forget_if_unreferenced(&mut self, cmd: &Arc<dyn Command>) {
        let still_bound = self.by_name.values().any(|c| Arc::ptr_eq(c, cmd));
        if !still_bound {
            self.installed.retain(|c| !Arc::ptr_eq(c, cmd));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Process;
    use jetty_types::error::Result;

    struct Named {
        names: &'static [&'static str],
        ordinal: i32,
        enabled: bool,
    }

    impl Command for Named {
        fn names(&self) -> &[&'static str] {
            self.names
        }
        fn format(&self) -> &str {
            self.names[0]
        }
        fn description(&self) -> &str {
            "test command"
        }
        fn ordinal(&self) -> i32 {
            self.ordinal
        }
        fn is_enabled(&self) -> bool {
            self.enabled
        }
        fn execute(&self, _process: &mut Process) -> Result<i32> {
            Ok(0)
        }
    }

    fn cmd(names: &'static [&'static str], ordinal: i32) -> Arc<dyn Command> {
        Arc::new(Named {
            names,
            ordinal,
            enabled: true,
        })
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut reg = CommandRegistry::new();
        reg.install(cmd(&["echo"], 0));
        assert!(reg.get("ECHO").is_some());
        assert!(reg.contains("Echo"));
        assert!(reg.get("ech").is_none());
    }

    #[test]
    fn aliases_share_instance() {
        let mut reg = CommandRegistry::new();
        reg.install(cmd(&["memory", "mem"], 0));
        let a = reg.get("memory").unwrap();
        let b = reg.get("MEM").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.aliases_of(&a), vec!["memory", "mem"]);
    }

    #[test]
    fn disabled_commands_invisible() {
        let mut reg = CommandRegistry::new();
        let installed = reg.install(Arc::new(Named {
            names: &["open-browser"],
            ordinal: 0,
            enabled: false,
        }));
        assert!(!installed);
        assert!(!reg.contains("open-browser"));
        assert!(reg.commands().is_empty());
    }

    #[test]
    fn blocked_names_skip_whole_command() {
        let mut reg = CommandRegistry::with_disabled(["MEM"]);
        assert!(!reg.install(cmd(&["memory", "mem"], 0)));
        assert!(!reg.contains("memory"));
        assert!(reg.install(cmd(&["echo"], 0)));
    }

    #[test]
    fn commands_sorted_by_ordinal_then_name() {
        let mut reg = CommandRegistry::new();
        reg.install_all([cmd(&["zeta"], 1), cmd(&["beta"], 5), cmd(&["alpha"], 5)]);
        let names: Vec<String> = reg.commands().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "beta"]);
    }

    #[test]
    fn rebinding_a_name_moves_it() {
        let mut reg = CommandRegistry::new();
        reg.install(cmd(&["stop", "halt"], 0));
        reg.install(cmd(&["halt"], 0));
        assert_eq!(reg.len(), 2);
        let stop = reg.get("stop").unwrap();
        assert_eq!(reg.aliases_of(&stop), vec!["stop"]);
    }

    #[test]
    fn fully_shadowed_command_is_dropped() {
        let mut reg = CommandRegistry::new();
        reg.install(cmd(&["echo"], 0));
        reg.install(cmd(&["echo"], 0));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn names_sorted() {
        let mut reg = CommandRegistry::new();
        reg.install(cmd(&["b", "a"], 0));
        assert_eq!(reg.names(), vec!["a", "b"]);
        assert!(!reg.is_empty());
    }
}
