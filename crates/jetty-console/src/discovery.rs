//! Command discovery.
//!
//! Command implementations are contributed to a [`CommandCatalog`] as named
//! factories. Which of them get instantiated, and in what order, is decided
//! by service manifests: plain text files with one entry per line, blank
//! lines and `#` comments ignored, stored as
//! `META-INF/services/jetty_console.Command`. Factories pull the shared
//! objects they need from [`Dependencies`] by type, so the console core
//! never depends on the concrete commands plugged into it.

use std::any::{Any, TypeId, type_name};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jetty_types::error::{ConsoleError, Result};

use crate::command::Command;

/// Service name of console commands.
pub const COMMAND_SERVICE: &str = "jetty_console.Command";

/// Manifest listing the built-in commands.
pub const BUILTIN_MANIFEST: &str = include_str!("../META-INF/services/jetty_console.Command");

/// Builds a command from shared dependencies.
pub type CommandFactory = fn(&Dependencies) -> Result<Arc<dyn Command>>;

/// Shared objects keyed by type.
///
/// Values are stored as given and handed out by clone, so they are usually
/// `Arc<T>` or `Arc<dyn Trait>`.
#[derive(Default)]
pub struct Dependencies {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` under its type, replacing any previous one.
    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.values.insert(TypeId::of::<T>(), Box::new(value));
        self
    }

    /// The value registered for `T`.
    pub fn get<T: Clone + 'static>(&self) -> Result<T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
            .ok_or_else(|| {
                ConsoleError::Discovery(format!("no dependency of type {}", type_name::<T>()))
            })
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }
}

/// Named command factories.
#[derive(Default)]
pub struct CommandCatalog {
    factories: HashMap<String, CommandFactory>,
}

impl CommandCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `factory` available under `entry`.
    pub fn contribute(&mut self, entry: &str, factory: CommandFactory) -> &mut Self {
        if self.factories.insert(entry.to_string(), factory).is_some() {
            log::warn!("Command factory '{entry}' contributed twice; keeping the last");
        }
        self
    }

    pub fn factory(&self, entry: &str) -> Option<CommandFactory> {
        self.factories.get(entry).copied()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// Entries of one service manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceManifest {
    pub entries: Vec<String>,
}

impl ServiceManifest {
    /// Parse manifest text: one entry per line, trimmed; blank lines and
    /// lines starting with `#` are skipped.
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        Self { entries }
    }

    /// Path of the `service` manifest under `root`.
    pub fn path_in(root: &Path, service: &str) -> PathBuf {
        root.join("META-INF").join("services").join(service)
    }

    /// Load the command manifest under `root`, if there is one.
    pub fn load_from(root: &Path) -> Result<Option<Self>> {
        let path = Self::path_in(root, COMMAND_SERVICE);
        if !path.is_file() {
            log::debug!("No command manifest at {}", path.display());
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)?;
        log::debug!("Read command manifest {}", path.display());
        Ok(Some(Self::parse(&text)))
    }

    /// Load the command manifests of every directory in `roots`, in order.
    pub fn load_all(roots: &[PathBuf]) -> Result<Vec<Self>> {
        let mut manifests = Vec::new();
        for root in roots {
            if let Some(m) = Self::load_from(root)? {
                manifests.push(m);
            }
        }
        Ok(manifests)
    }
}

/// Instantiate every manifest entry, in manifest order.
///
/// An entry listed twice is instantiated once. Entries with no factory and
/// factories that fail are logged and skipped.
pub fn discover(
    catalog: &CommandCatalog,
    manifests: &[ServiceManifest],
    deps: &Dependencies,
) -> Vec<Arc<dyn Command>> {
    let mut seen = HashSet::new();
    let mut commands = Vec::new();
    for entry in manifests.iter().flat_map(|m| m.entries.iter()) {
        if !seen.insert(entry.as_str()) {
            continue;
        }
        let Some(factory) = catalog.factory(entry) else {
            log::warn!("No command factory for manifest entry '{entry}'");
            continue;
        };
        match factory(deps) {
            Ok(cmd) => commands.push(cmd),
            Err(e) => log::warn!("Cannot create command '{entry}': {e}"),
        }
    }
    log::debug!("Discovered {} commands", commands.len());
    commands
}
