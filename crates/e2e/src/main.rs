//! Notebook E2E launcher - Main Entry Point
//!
//! Every command-line argument is passed verbatim to `karma start`, so the
//! launcher itself is configured through environment variables only.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use notebook_e2e::injector::default_injector_path;
use notebook_e2e::karma::KarmaConfig;
use notebook_e2e::server::ServerConfig;
use notebook_e2e::{LaunchConfig, Launcher};

const BIN_NAME: &str = "run-test";

/// Launcher settings, read from the environment
#[derive(Parser, Debug)]
#[command(name = BIN_NAME)]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct Settings {
    /// Python interpreter used to run `-m notebook`
    #[arg(long, hide = true, env = "NOTEBOOK_E2E_PYTHON", default_value = "python")]
    python: PathBuf,

    /// Karma executable
    #[arg(long, hide = true, env = "NOTEBOOK_E2E_KARMA", default_value = "karma")]
    karma: PathBuf,

    /// Where to write the browser config injector
    #[arg(long, hide = true, env = "NOTEBOOK_E2E_INJECTOR")]
    injector: Option<PathBuf>,

    /// Seconds to wait for the server to become ready (0 = wait forever)
    #[arg(long, hide = true, env = "NOTEBOOK_E2E_STARTUP_TIMEOUT", default_value = "120")]
    startup_timeout: u64,

    /// Enable verbose output
    #[arg(long, hide = true, env = "NOTEBOOK_E2E_VERBOSE")]
    verbose: bool,
}

impl Settings {
    /// Settings from the environment; command-line arguments are never consulted
    fn from_env() -> Result<Self, clap::Error> {
        Self::try_parse_from([BIN_NAME])
    }

    fn launch_config(&self) -> LaunchConfig {
        let startup_timeout = match self.startup_timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        LaunchConfig {
            server: ServerConfig {
                program: self.python.clone(),
                startup_timeout,
                ..Default::default()
            },
            injector_path: self.injector.clone().unwrap_or_else(default_injector_path),
            karma: KarmaConfig {
                program: self.karma.clone(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Everything after the program name, untouched
fn forwarded_args<I>(argv: I) -> Vec<String>
where
    I: IntoIterator<Item = OsString>,
{
    argv.into_iter()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    let karma_args = forwarded_args(std::env::args_os());

    // Initialize logging
    let log_level = if settings.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let launcher = Launcher::new(settings.launch_config());
    let code = launcher
        .run(&karma_args, async {
            if tokio::signal::ctrl_c().await.is_err() {
                // No signal handler available; never interrupt
                std::future::pending::<()>().await;
            }
        })
        .await?;

    std::process::exit(code);
}
