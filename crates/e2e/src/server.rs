//! Server management - spawning the notebook server and waiting for it to come up
//!
//! Readiness is detected by scanning the server's log output for two marker
//! phrases. This couples the launcher to the exact wording the notebook
//! server logs at startup.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// Logged once the server has bound its address
pub const RUNNING_MARKER: &str = "Jupyter Notebook is running at:";

/// Logged once the server is fully initialized
pub const READY_MARKER: &str = "Control-C";

/// Passed verbatim, quotes included
const ALLOW_ORIGIN_ARG: &str = "--NotebookApp.allow_origin=\"*\"";

const LINE_BUFFER: usize = 256;

static BASE_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(http.*?)$").expect("base URL pattern is valid"));

/// Pull the base URL out of a trimmed log line.
///
/// Everything from the first `http` to the end of the line is taken, so a
/// trailing token query string is kept.
pub fn extract_base_url(line: &str) -> Option<&str> {
    BASE_URL_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Marker phrases that signal server startup progress
#[derive(Debug, Clone)]
pub struct ReadinessMarkers {
    /// Line carrying the base URL
    pub running: String,

    /// Line that completes readiness; only checked after `running` was seen
    pub ready: String,
}

impl Default for ReadinessMarkers {
    fn default() -> Self {
        Self {
            running: RUNNING_MARKER.to_string(),
            ready: READY_MARKER.to_string(),
        }
    }
}

/// Configuration for spawning the notebook server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interpreter or executable to launch
    pub program: PathBuf,

    /// Arguments placed before the content root
    pub args: Vec<String>,

    /// Startup log phrases to wait for
    pub markers: ReadinessMarkers,

    /// How long to wait for readiness (None = wait forever)
    pub startup_timeout: Option<Duration>,

    /// Time between SIGTERM and SIGKILL on shutdown
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("python"),
            args: vec!["-m".to_string(), "notebook".to_string()],
            markers: ReadinessMarkers::default(),
            startup_timeout: Some(Duration::from_secs(120)),
            shutdown_grace: Duration::from_millis(500),
        }
    }
}

/// Build the server command line for a content root
pub fn server_command(config: &ServerConfig, content_root: &Path) -> Command {
    let mut cmd = Command::new(&config.program);
    cmd.args(&config.args)
        .arg(content_root)
        .arg("--no-browser")
        .arg(ALLOW_ORIGIN_ARG)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Handle to a spawned notebook server.
///
/// The handle owns the child and the tasks reading its output from the moment
/// of spawning, so [`NotebookServer::shutdown`] reaps everything whether or
/// not the server ever became ready.
pub struct NotebookServer {
    child: Child,
    base_url: Option<String>,
    lines: Option<mpsc::Receiver<String>>,
    markers: ReadinessMarkers,
    startup_timeout: Option<Duration>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    shutdown_grace: Duration,
}

impl NotebookServer {
    /// Spawn the server and start reading its merged stdout and stderr
    pub fn spawn(config: &ServerConfig, content_root: &Path) -> E2eResult<Self> {
        let mut cmd = server_command(config, content_root);
        info!("Spawning notebook server: {:?}", cmd.as_std());

        let mut child = cmd.spawn().map_err(|source| E2eError::ServerSpawn {
            program: config.program.display().to_string(),
            source,
        })?;

        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();
        let (tx, rx) = mpsc::channel(LINE_BUFFER);

        if let Some(stdout) = child.stdout.take() {
            tasks.push(tokio::spawn(pump_lines(stdout, tx.clone(), cancel.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            tasks.push(tokio::spawn(pump_lines(stderr, tx.clone(), cancel.clone())));
        }
        // Pumps hold the only senders, so EOF on both pipes closes the channel
        drop(tx);

        Ok(Self {
            child,
            base_url: None,
            lines: Some(rx),
            markers: config.markers.clone(),
            startup_timeout: config.startup_timeout,
            cancel,
            tasks,
            shutdown_grace: config.shutdown_grace,
        })
    }

    /// Wait until the server reports it is ready and return its base URL.
    ///
    /// Output is echoed while waiting and keeps being echoed by a background
    /// task afterwards. On error the server is left running for the caller to
    /// shut down.
    pub async fn wait_until_ready(&mut self) -> E2eResult<String> {
        if let Some(url) = &self.base_url {
            return Ok(url.clone());
        }
        let Some(lines) = self.lines.as_mut() else {
            return Err(E2eError::ServerExited);
        };

        let ready = match self.startup_timeout {
            Some(limit) => timeout(limit, wait_for_ready(lines, &self.markers))
                .await
                .unwrap_or_else(|_| Err(E2eError::ServerNotReady { timeout: limit })),
            None => wait_for_ready(lines, &self.markers).await,
        };
        let url = ready?;

        info!("Notebook server is ready at {}", url);
        if let Some(lines) = self.lines.take() {
            self.tasks.push(tokio::spawn(forward_lines(lines, self.cancel.clone())));
        }
        self.base_url = Some(url.clone());
        Ok(url)
    }

    /// Spawn the server and wait for readiness, shutting it down on failure
    pub async fn start(config: &ServerConfig, content_root: &Path) -> E2eResult<Self> {
        let mut server = Self::spawn(config, content_root)?;
        if let Err(e) = server.wait_until_ready().await {
            warn!("Notebook server failed to start: {}", e);
            server.shutdown().await;
            return Err(e);
        }
        Ok(server)
    }

    /// Base URL reported by the server, once ready
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// OS process id, if the server has not been reaped yet
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Stop the server, reap it and stop reading its output. Errors are ignored.
    pub async fn shutdown(&mut self) {
        if let Some(pid) = self.child.id() {
            info!("Stopping notebook server (pid: {})", pid);

            // Try graceful shutdown first
            #[cfg(unix)]
            {
                use nix::sys::signal::{kill, Signal};
                use nix::unistd::Pid;

                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                    && timeout(self.shutdown_grace, self.child.wait()).await.is_ok()
                {
                    debug!("Notebook server exited after SIGTERM");
                }
            }
        }

        // Force kill if still running, then reap
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;

        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}

impl Drop for NotebookServer {
    fn drop(&mut self) {
        self.cancel.cancel();
        let _ = self.child.start_kill();
    }
}

/// Scan server output until both readiness markers have been seen.
///
/// Returns the base URL taken from the first marker line. Lines are trimmed,
/// blank lines skipped and everything else echoed to stdout.
pub async fn wait_for_ready(
    lines: &mut mpsc::Receiver<String>,
    markers: &ReadinessMarkers,
) -> E2eResult<String> {
    let mut base_url: Option<String> = None;

    while let Some(raw) = lines.recv().await {
        let Some(line) = visible_line(&raw) else {
            continue;
        };
        echo(line);

        if let Some(url) = &base_url {
            if line.contains(&markers.ready) {
                return Ok(url.clone());
            }
        } else if line.contains(&markers.running) {
            let url = extract_base_url(line).ok_or_else(|| E2eError::MissingBaseUrl {
                line: line.to_string(),
            })?;
            debug!("Found base URL: {}", url);
            base_url = Some(url.to_string());
        }
    }

    Err(E2eError::ServerExited)
}

/// Echo server output until the channel closes or the token is cancelled
async fn forward_lines(mut lines: mpsc::Receiver<String>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.recv() => match line {
                Some(raw) => {
                    if let Some(line) = visible_line(&raw) {
                        echo(line);
                    }
                }
                None => break,
            },
        }
    }
    debug!("Server output forwarding stopped");
}

/// Read lines from one pipe into the merged channel
async fn pump_lines<R>(reader: R, tx: mpsc::Sender<String>, cancel: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = reader.read_until(b'\n', &mut buf) => read,
        };

        match read {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).into_owned();
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("Error reading server output: {}", e);
                break;
            }
        }
    }
}

fn visible_line(raw: &str) -> Option<&str> {
    let line = raw.trim();
    (!line.is_empty()).then_some(line)
}

fn echo(line: &str) {
    println!("{}", line);
}
