//! Starter configuration loaded from a TOML file.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable configuration:
//!
//! ```toml
//! [console]
//! service_dirs = ["plugins"]
//! disabled_commands = ["open-browser"]
//!
//! [server]
//! command = ["java", "-jar", "${jetty.home}/start.jar"]
//! url = "http://localhost:${jetty.port}/"
//!
//! [properties]
//! "jetty.port" = "8080"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ConsoleError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StarterConfig {
    pub console: ConsoleConfig,
    pub server: ServerConfig,
    /// Extra properties merged into the console property store.
    pub properties: BTreeMap<String, String>,
}

/// Interactive console settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Whether the console reader thread is started at all.
    pub enabled: bool,
    /// Directories searched for `META-INF/services` command manifests.
    pub service_dirs: Vec<PathBuf>,
    /// Command names that are never installed, even when discovered.
    pub disabled_commands: Vec<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_dirs: Vec::new(),
            disabled_commands: Vec::new(),
        }
    }
}

/// External server process settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Program and arguments of the server. Empty means console only.
    pub command: Vec<String>,
    /// Working directory for the server process.
    pub working_dir: Option<PathBuf>,
    /// URL the server answers on, used by `info` and `open-browser`.
    pub url: String,
    /// Pause between stop and start on `restart`.
    pub restart_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            working_dir: None,
            url: default_url(),
            restart_delay_ms: 0,
        }
    }
}

fn default_url() -> String {
    "http://localhost:8080/".to_string()
}

impl StarterConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConsoleError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Whether a server process is configured.
    pub fn has_server(&self) -> bool {
        !self.server.command.is_empty()
    }

    fn validate(&self) -> Result<()> {
        if let Some(program) = self.server.command.first()
            && program.trim().is_empty()
        {
            return Err(ConsoleError::Config(
                "server.command must start with a program name".to_string(),
            ));
        }
        if self.server.url.trim().is_empty() {
            return Err(ConsoleError::Config("server.url must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_text_gives_defaults() {
        let config = StarterConfig::from_toml_str("").unwrap();
        assert!(config.console.enabled);
        assert!(config.console.service_dirs.is_empty());
        assert!(!config.has_server());
        assert_eq!(config.server.url, "http://localhost:8080/");
        assert_eq!(config.server.restart_delay_ms, 0);
        assert!(config.properties.is_empty());
    }

    #[test]
    fn full_config_parses() {
        let text = r#"
            [console]
            enabled = false
            service_dirs = ["plugins", "/opt/ext"]
            disabled_commands = ["open-browser"]

            [server]
            command = ["java", "-jar", "start.jar"]
            working_dir = "/srv/jetty"
            url = "http://localhost:9090/"
            restart_delay_ms = 250

            [properties]
            "jetty.port" = "9090"
        "#;
        let config = StarterConfig::from_toml_str(text).unwrap();
        assert!(!config.console.enabled);
        assert_eq!(config.console.service_dirs.len(), 2);
        assert_eq!(config.console.disabled_commands, vec!["open-browser"]);
        assert!(config.has_server());
        assert_eq!(config.server.command[0], "java");
        assert_eq!(config.server.working_dir, Some(PathBuf::from("/srv/jetty")));
        assert_eq!(config.server.restart_delay_ms, 250);
        assert_eq!(config.properties.get("jetty.port").unwrap(), "9090");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = StarterConfig::from_toml_str("[server]\nrestart_delay_ms = 10\n").unwrap();
        assert_eq!(config.server.url, "http://localhost:8080/");
        assert!(config.console.enabled);
    }

    #[test]
    fn blank_program_rejected() {
        let err = StarterConfig::from_toml_str("[server]\ncommand = [\"  \"]\n").unwrap_err();
        assert!(matches!(err, ConsoleError::Config(_)));
    }

    #[test]
    fn empty_url_rejected() {
        let err = StarterConfig::from_toml_str("[server]\nurl = \"\"\n").unwrap_err();
        assert!(matches!(err, ConsoleError::Config(_)));
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let err = StarterConfig::from_toml_str("[console\n").unwrap_err();
        assert!(matches!(err, ConsoleError::TomlParse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[properties]\nname = \"demo\"").unwrap();
        let config = StarterConfig::load(file.path()).unwrap();
        assert_eq!(config.properties.get("name").unwrap(), "demo");
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = StarterConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConsoleError::Config(_)));
    }
}
