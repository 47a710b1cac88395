//! Error types for the launcher

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Failed to spawn notebook server {program}: {source}")]
    ServerSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Notebook server output closed before it became ready")]
    ServerExited,

    #[error("Notebook server did not become ready within {timeout:?}")]
    ServerNotReady { timeout: Duration },

    #[error("No base URL found in server output line: {line}")]
    MissingBaseUrl { line: String },

    #[error("Failed to spawn test runner {program}: {source}")]
    RunnerSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Test runner failed: {}", exit_description(.code))]
    RunnerFailed { code: Option<i32> },

    #[error("Interrupted")]
    Interrupted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl E2eError {
    /// Failures that end the run with exit code 1 instead of propagating
    pub fn is_test_failure(&self) -> bool {
        matches!(self, E2eError::RunnerFailed { .. } | E2eError::Interrupted)
    }
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
