//! Karma invocation

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};

/// Configuration for the karma test runner
#[derive(Debug, Clone)]
pub struct KarmaConfig {
    /// Karma executable
    pub program: PathBuf,

    /// Arguments placed before `start`
    pub args: Vec<String>,
}

impl Default for KarmaConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("karma"),
            args: Vec::new(),
        }
    }
}

/// Build `karma start <forwarded...>` writing stdout and stderr to the
/// launcher's stdout.
///
/// Windows resolves `karma.cmd` only through the shell, so the command is
/// wrapped in `cmd /C` there.
pub fn karma_command(config: &KarmaConfig, forwarded: &[String]) -> Command {
    karma_command_with_output(
        config,
        forwarded,
        Stdio::inherit(),
        Stdio::from(std::io::stdout()),
    )
}

/// Build `karma start <forwarded...>` with explicit output streams
pub fn karma_command_with_output(
    config: &KarmaConfig,
    forwarded: &[String],
    stdout: Stdio,
    stderr: Stdio,
) -> Command {
    let mut argv: Vec<OsString> = vec![config.program.clone().into_os_string()];
    argv.extend(config.args.iter().map(OsString::from));
    argv.push("start".into());
    argv.extend(forwarded.iter().map(OsString::from));

    let mut cmd = if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").args(&argv);
        cmd
    } else {
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]);
        cmd
    };

    cmd.stdin(Stdio::inherit())
        .stdout(stdout)
        .stderr(stderr)
        .kill_on_drop(true);
    cmd
}

/// Run karma to completion.
///
/// Returns `Ok(0)` on success; any other outcome is a `RunnerFailed` error.
pub async fn run_karma(config: &KarmaConfig, forwarded: &[String]) -> E2eResult<i32> {
    run_command(config, karma_command(config, forwarded)).await
}

async fn run_command(config: &KarmaConfig, mut cmd: Command) -> E2eResult<i32> {
    info!("Running test runner: {:?}", cmd.as_std());

    let status = cmd
        .status()
        .await
        .map_err(|source| E2eError::RunnerSpawn {
            program: config.program.display().to_string(),
            source,
        })?;

    debug!("Test runner exited with {}", status);

    if status.success() {
        Ok(0)
    } else {
        Err(E2eError::RunnerFailed {
            code: status.code(),
        })
    }
}
