//! Jetty starter entry point.
//!
//! Boots the configured server as a child process and runs the interactive
//! console on this process's stdin/stdout. Usage:
//!
//! ```text
//! jetty-starter [CONFIG.toml] [-Dkey=value ...]
//! ```

mod server;
mod server_commands;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use jetty_console::{
    BUILTIN_MANIFEST, CommandCatalog, CommandRegistry, Console, Dependencies, JobTable,
    PlaceholderResolver, Properties, ServiceManifest, Shutdown, Streams, SystemResolver, discover,
    register_builtins,
};
use jetty_types::config::{ConsoleConfig, StarterConfig};

use server::{ExternalServer, ServerControl};
use server_commands::{SERVER_MANIFEST, register_server_commands};

const USAGE: &str = "Usage: jetty-starter [CONFIG.toml] [-Dkey=value ...]";

/// How often the main thread checks whether the server is still up.
const SERVER_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Default, PartialEq, Eq)]
struct CliArgs {
    config: Option<PathBuf>,
    defines: Vec<(String, String)>,
    help: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs> {
    let mut cli = CliArgs::default();
    for arg in args {
        if arg == "-h" || arg == "--help" {
            cli.help = true;
        } else if let Some(define) = arg.strip_prefix("-D") {
            let (key, value) = define.split_once('=').unwrap_or((define, ""));
            if key.is_empty() {
                bail!("empty property name in '{arg}'");
            }
            cli.defines.push((key.to_string(), value.to_string()));
        } else if arg.starts_with('-') {
            bail!("unknown option '{arg}'\n{USAGE}");
        } else if cli.config.is_none() {
            cli.config = Some(PathBuf::from(arg));
        } else {
            bail!("more than one configuration file given\n{USAGE}");
        }
    }
    Ok(cli)
}

/// Discover every command and install the enabled ones.
fn build_registry(console: &ConsoleConfig, deps: &Dependencies) -> Result<CommandRegistry> {
    let mut catalog = CommandCatalog::new();
    register_builtins(&mut catalog);
    register_server_commands(&mut catalog);

    let mut manifests = vec![
        ServiceManifest::parse(BUILTIN_MANIFEST),
        ServiceManifest::parse(SERVER_MANIFEST),
    ];
    manifests.extend(
        ServiceManifest::load_all(&console.service_dirs)
            .context("reading command manifests")?,
    );

    let mut registry = CommandRegistry::with_disabled(&console.disabled_commands);
    let installed = registry.install_all(discover(&catalog, &manifests, deps));
    log::debug!("Installed {installed} console commands");
    Ok(registry)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = parse_args(std::env::args().skip(1))?;
    if cli.help {
        println!("{USAGE}");
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => StarterConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => StarterConfig::default(),
    };

    // Seeded defaults < [properties] < -D definitions.
    let properties = Arc::new(Properties::system());
    properties.extend(&config.properties);
    properties.extend(cli.defines);
    let resolver: Arc<dyn PlaceholderResolver> =
        Arc::new(SystemResolver::new(Arc::clone(&properties)));

    let server = Arc::new(ExternalServer::from_config(&config.server, resolver.as_ref()));
    let jobs = Arc::new(JobTable::new());
    let shutdown = {
        let server = Arc::clone(&server);
        Shutdown::new(move |code| {
            if let Err(e) = server.stop() {
                log::warn!("Cannot stop server: {e}");
            }
            log::info!("Exiting with code {code}");
            std::process::exit(code);
        })
    };

    let mut deps = Dependencies::new();
    deps.insert(Arc::clone(&properties))
        .insert(jobs)
        .insert(shutdown)
        .insert(Arc::clone(&server) as Arc<dyn ServerControl>);
    let registry = build_registry(&config.console, &deps)?;

    let has_server = config.has_server();
    if has_server {
        log::debug!("Server command: {:?}", server.program());
        let pid = server.start().context("starting server")?;
        log::info!("Server running at {} (pid {pid})", server.url());
    }

    let console = Console::new(Arc::new(registry), resolver, Streams::standard());
    if config.console.enabled {
        console.start().context("starting console")?;
    }

    if has_server {
        server.wait(SERVER_POLL);
        log::info!("Server is down, shutting down");
    } else if config.console.enabled {
        console.join();
    } else {
        log::warn!("Neither a server nor the console is configured; nothing to do");
    }
    console.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jetty_console::discovery::COMMAND_SERVICE;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn deps() -> Dependencies {
        let properties = Arc::new(Properties::new());
        let server = ExternalServer::from_config(
            &Default::default(),
            &SystemResolver::new(Arc::clone(&properties)),
        );
        let mut deps = Dependencies::new();
        deps.insert(properties)
            .insert(Arc::new(JobTable::new()))
            .insert(Shutdown::new(|_| {}))
            .insert(Arc::new(server) as Arc<dyn ServerControl>);
        deps
    }

    #[test]
    fn parse_config_and_defines() {
        let cli = parse_args(args(&["jetty.toml", "-Djetty.port=9090", "-Dflag"])).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("jetty.toml")));
        assert_eq!(
            cli.defines,
            vec![
                ("jetty.port".to_string(), "9090".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
        assert!(!cli.help);
    }

    #[test]
    fn parse_define_value_may_contain_equals() {
        let cli = parse_args(args(&["-Dopts=a=b"])).unwrap();
        assert_eq!(cli.defines, vec![("opts".to_string(), "a=b".to_string())]);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(parse_args(args(&["-D=x"])).is_err());
        assert!(parse_args(args(&["--verbose"])).is_err());
        assert!(parse_args(args(&["a.toml", "b.toml"])).is_err());
        assert!(parse_args(args(&["--help"])).unwrap().help);
    }

    #[test]
    fn registry_has_builtin_and_server_commands() {
        let registry = build_registry(&ConsoleConfig::default(), &deps()).unwrap();
        for name in ["help", "?", "echo", "prop", "memory", "thread", "jobs", ">", ">>", "&"] {
            assert!(registry.contains(name), "missing {name}");
        }
        for name in ["stop", "restart", "info", "exit", "QUIT"] {
            assert!(registry.contains(name), "missing {name}");
        }
    }

    #[test]
    fn disabled_commands_are_not_installed() {
        let console = ConsoleConfig {
            disabled_commands: vec!["restart".into(), "MEM".into()],
            ..ConsoleConfig::default()
        };
        let registry = build_registry(&console, &deps()).unwrap();
        assert!(!registry.contains("restart"));
        assert!(!registry.contains("memory"));
        assert!(registry.contains("stop"));
    }

    #[test]
    fn service_dirs_add_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let path = ServiceManifest::path_in(dir.path(), COMMAND_SERVICE);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "# plugin\necho\nno-such-command\n").unwrap();
        let console = ConsoleConfig {
            service_dirs: vec![dir.path().to_path_buf()],
            ..ConsoleConfig::default()
        };
        let registry = build_registry(&console, &deps()).unwrap();
        assert!(registry.contains("echo"));
        assert!(!registry.contains("no-such-command"));
    }
}
