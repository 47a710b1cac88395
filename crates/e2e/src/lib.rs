//! Notebook E2E Test Launcher
//!
//! This crate runs the karma browser test suite against a live notebook
//! server:
//! - Creates a throwaway mock content directory
//! - Spawns the notebook server on it and waits for its readiness markers
//! - Writes an injector script carrying the server's base URL
//! - Runs `karma start` and maps its result to an exit code
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Launcher                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  MockWorkspace::create() -> temp dir with src/temp.txt      │
//! │  NotebookServer::start() -> base URL                        │
//! │    ├── stdout + stderr merged into one line stream          │
//! │    ├── "Jupyter Notebook is running at:" -> base URL        │
//! │    ├── "Control-C" -> ready                                 │
//! │    └── background task keeps echoing server output          │
//! │  write_injector(base URL) -> build/injector.js              │
//! │  run_karma(args) -> exit code                               │
//! │  cleanup: server.shutdown(), workspace.close()              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod injector;
pub mod karma;
pub mod runner;
pub mod server;
pub mod workspace;

pub use error::{E2eError, E2eResult};
pub use runner::{LaunchConfig, Launcher};
