//! Process-wide property store.
//!
//! Plays the role system properties play for a JVM-hosted server: a flat
//! string map that commands read and write and that placeholders resolve
//! against. Iteration is in key order.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::placeholder::{EnvResolver, PlaceholderResolver};
use crate::wildcard;

/// Thread-safe ordered string map. Individual operations are atomic; no
/// cross-key invariants are enforced.
#[derive(Debug, Default)]
pub struct Properties {
    map: RwLock<BTreeMap<String, String>>,
}

impl Properties {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with facts about the running process.
    pub fn system() -> Self {
        let props = Self::new();
        props.set("console.version", env!("CARGO_PKG_VERSION"));
        props.set("os.name", std::env::consts::OS);
        props.set("os.arch", std::env::consts::ARCH);
        props.set("os.family", std::env::consts::FAMILY);
        props.set("file.separator", std::path::MAIN_SEPARATOR_STR);
        props.set("path.separator", if cfg!(windows) { ";" } else { ":" });
        props.set("line.separator", if cfg!(windows) { "\r\n" } else { "\n" });
        props.set("process.id", &std::process::id().to_string());
        if let Ok(dir) = std::env::current_dir() {
            props.set("user.dir", &dir.to_string_lossy());
        }
        if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
            props.set("user.home", &home.to_string_lossy());
        }
        if let Some(user) = std::env::var_os("USER").or_else(|| std::env::var_os("USERNAME")) {
            props.set("user.name", &user.to_string_lossy());
        }
        props
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.read().get(key).cloned()
    }

    /// Set a property, overwriting any previous value. Returns the old value.
    pub fn set(&self, key: &str, value: &str) -> Option<String> {
        self.write().insert(key.to_string(), value.to_string())
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.write().remove(key)
    }

    /// Set every pair, overwriting existing keys.
    pub fn extend<I, K, V>(&self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = self.write();
        for (k, v) in pairs {
            map.insert(k.into(), v.into());
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Every pair whose key matches `pattern`, ignoring case.
    pub fn matching(&self, pattern: &str) -> Vec<(String, String)> {
        self.read()
            .iter()
            .filter(|(k, _)| wildcard::matches_ignore_case(pattern, k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// A copy of every pair, in key order.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.map.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.map.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl PlaceholderResolver for Properties {
    fn resolve(&self, key: &str) -> Option<String> {
        self.get(key)
    }
}

/// Default placeholder source: properties first, then the environment.
pub struct SystemResolver {
    properties: Arc<Properties>,
}

impl SystemResolver {
    pub fn new(properties: Arc<Properties>) -> Self {
        Self { properties }
    }
}

impl PlaceholderResolver for SystemResolver {
    fn resolve(&self, key: &str) -> Option<String> {
        self.properties
            .get(key)
            .or_else(|| EnvResolver.resolve(key))
    }
}
