//! Launcher that orchestrates the workspace, notebook server and karma run

use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::injector::{default_injector_path, write_injector};
use crate::karma::{run_karma, KarmaConfig};
use crate::server::{NotebookServer, ServerConfig};
use crate::workspace::{self, MockWorkspace};

/// Exit code used for a failed or interrupted test run
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Configuration for a launcher run
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Prefix for the temporary content directory
    pub workspace_prefix: String,

    /// Parent of the content directory (None = system temp dir)
    pub workspace_parent: Option<PathBuf>,

    pub server: ServerConfig,

    /// Where the browser config snippet is written
    pub injector_path: PathBuf,

    pub karma: KarmaConfig,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            workspace_prefix: workspace::DEFAULT_PREFIX.to_string(),
            workspace_parent: None,
            server: ServerConfig::default(),
            injector_path: default_injector_path(),
            karma: KarmaConfig::default(),
        }
    }
}

/// Runs karma against a throwaway notebook server
pub struct Launcher {
    config: LaunchConfig,
}

impl Launcher {
    pub fn new(config: LaunchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    /// Run the whole sequence and return the process exit code.
    ///
    /// `interrupt` resolving at any point after the workspace exists ends the
    /// run as a failure. The server is stopped and the workspace removed
    /// whatever the outcome. Errors other than a failed or interrupted test
    /// run are returned after cleanup.
    pub async fn run<F>(&self, forwarded: &[String], interrupt: F) -> E2eResult<i32>
    where
        F: Future<Output = ()>,
    {
        let prefix = &self.config.workspace_prefix;
        let workspace = match &self.config.workspace_parent {
            Some(parent) => MockWorkspace::create_in(parent, prefix)?,
            None => MockWorkspace::create(prefix)?,
        };
        let mut server: Option<NotebookServer> = None;

        let outcome = tokio::select! {
            result = self.run_tests(workspace.path(), &mut server, forwarded) => result,
            _ = interrupt => Err(E2eError::Interrupted),
        };

        if let Some(mut server) = server.take() {
            server.shutdown().await;
        }
        workspace.close();

        exit_code(outcome)
    }

    async fn run_tests(
        &self,
        content_root: &Path,
        slot: &mut Option<NotebookServer>,
        forwarded: &[String],
    ) -> E2eResult<i32> {
        // Held by the caller so an interrupt during the readiness wait still
        // reaches shutdown
        let server = slot.insert(NotebookServer::spawn(&self.config.server, content_root)?);
        let base_url = server.wait_until_ready().await?;
        write_injector(&self.config.injector_path, &base_url)?;
        run_karma(&self.config.karma, forwarded).await
    }
}

/// Map the run outcome to an exit code.
///
/// A failing or interrupted test run becomes [`FAILURE_EXIT_CODE`] rather
/// than passing the runner's own code through.
pub fn exit_code(outcome: E2eResult<i32>) -> E2eResult<i32> {
    match outcome {
        Ok(code) => {
            info!("Test run passed");
            Ok(code)
        }
        Err(e) if e.is_test_failure() => {
            warn!("{}", e);
            Ok(FAILURE_EXIT_CODE)
        }
        Err(e) => {
            error!("Launcher error: {}", e);
            Err(e)
        }
    }
}
