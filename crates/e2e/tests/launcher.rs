//! End-to-end launcher runs with `sh` scripts standing in for the notebook
//! server and karma.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::sys::signal::kill;
use nix::unistd::Pid;
use tempfile::TempDir;

use notebook_e2e::karma::KarmaConfig;
use notebook_e2e::server::ServerConfig;
use notebook_e2e::{E2eError, LaunchConfig, Launcher};

/// $1 = pid file, $2 = content root
const FAKE_NOTEBOOK: &str = r#"
echo $$ > "$1"
echo "$2" > "$1.root"
test -f "$2/src/temp.txt" || exit 7
echo "[I NotebookApp] Serving notebooks from local directory: $2" >&2
echo ""
echo "[I NotebookApp] The Jupyter Notebook is running at: http://localhost:8888/?token=abc" >&2
echo "[I NotebookApp] Use Control-C to stop this server and shut down all kernels" >&2
exec sleep 60
"#;

struct Fixture {
    tmp: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        std::fs::create_dir(tmp.path().join("workspaces")).unwrap();
        Self { tmp }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.tmp.path().join(name)
    }

    /// Karma stand-in: records its arguments then runs `body`
    fn launcher(&self, karma_body: &str) -> Launcher {
        let karma_script = format!(
            "out=\"$1\"; shift; printf '%s\\n' \"$@\" > \"$out\"; {}",
            karma_body
        );

        Launcher::new(LaunchConfig {
            workspace_parent: Some(self.path("workspaces")),
            server: ServerConfig {
                program: PathBuf::from("sh"),
                args: vec![
                    "-c".to_string(),
                    FAKE_NOTEBOOK.to_string(),
                    "notebook".to_string(),
                    self.path("server.pid").to_string_lossy().to_string(),
                ],
                startup_timeout: Some(Duration::from_secs(10)),
                ..Default::default()
            },
            injector_path: self.path("build/injector.js"),
            karma: KarmaConfig {
                program: PathBuf::from("sh"),
                args: vec![
                    "-c".to_string(),
                    karma_script,
                    "karma".to_string(),
                    self.path("karma.args").to_string_lossy().to_string(),
                ],
            },
            ..Default::default()
        })
    }

    fn server_pid(&self) -> Pid {
        let pid = std::fs::read_to_string(self.path("server.pid")).expect("server started");
        Pid::from_raw(pid.trim().parse().unwrap())
    }

    fn content_root(&self) -> PathBuf {
        let root = std::fs::read_to_string(self.path("server.pid.root")).expect("server started");
        PathBuf::from(root.trim())
    }

    fn karma_args(&self) -> Vec<String> {
        std::fs::read_to_string(self.path("karma.args"))
            .expect("karma ran")
            .lines()
            .map(String::from)
            .collect()
    }

    fn assert_cleaned_up(&self) {
        assert!(
            kill(self.server_pid(), None).is_err(),
            "notebook server still running"
        );
        assert!(!self.content_root().exists(), "workspace not removed");
        assert_eq!(count_entries(&self.path("workspaces")), 0);
    }
}

fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn passing_run_exits_zero() {
    let fixture = Fixture::new();
    let launcher = fixture.launcher("exit 0");

    let code = launcher.run(&[], std::future::pending()).await.unwrap();

    assert_eq!(code, 0);
    fixture.assert_cleaned_up();
}

#[tokio::test]
async fn injector_carries_base_url() {
    let fixture = Fixture::new();
    let launcher = fixture.launcher("exit 0");

    launcher.run(&[], std::future::pending()).await.unwrap();

    let script = std::fs::read_to_string(fixture.path("build/injector.js")).unwrap();
    assert!(script.contains(r#"node.textContent = '{"baseUrl": "http://localhost:8888/?token=abc"}';"#));
    assert!(script.contains("node.id = 'jupyter-config-data';"));
}

#[tokio::test]
async fn forwards_arguments_to_karma_start() {
    let fixture = Fixture::new();
    let launcher = fixture.launcher("exit 0");
    let forwarded = vec!["--single-run".to_string(), "karma.conf.js".to_string()];

    launcher.run(&forwarded, std::future::pending()).await.unwrap();

    assert_eq!(fixture.karma_args(), vec!["start", "--single-run", "karma.conf.js"]);
}

#[tokio::test]
async fn failing_run_is_normalized_to_one() {
    let fixture = Fixture::new();
    let launcher = fixture.launcher("exit 2");

    let code = launcher.run(&[], std::future::pending()).await.unwrap();

    assert_eq!(code, 1);
    fixture.assert_cleaned_up();
}

#[tokio::test]
async fn interrupt_during_test_run_exits_one() {
    let fixture = Fixture::new();
    let launcher = fixture.launcher("exec sleep 60");

    let code = launcher
        .run(&[], tokio::time::sleep(Duration::from_secs(2)))
        .await
        .unwrap();

    assert_eq!(code, 1);
    // karma was reached before the interrupt
    assert_eq!(fixture.karma_args(), vec!["start"]);
    fixture.assert_cleaned_up();
}

#[tokio::test]
async fn server_that_never_gets_ready_fails_after_cleanup() {
    let fixture = Fixture::new();
    let mut launcher_config = fixture.launcher("exit 0").config().clone();
    launcher_config.server.args[1] = r#"echo $$ > "$1"; echo "$2" > "$1.root"; exec sleep 60"#.to_string();
    launcher_config.server.startup_timeout = Some(Duration::from_millis(500));

    let err = Launcher::new(launcher_config)
        .run(&[], std::future::pending())
        .await
        .unwrap_err();

    assert!(matches!(err, E2eError::ServerNotReady { .. }));
    assert!(!fixture.path("karma.args").exists(), "karma must not run");
    fixture.assert_cleaned_up();
}

#[tokio::test]
async fn interrupt_before_ready_reaps_server() {
    let fixture = Fixture::new();
    let mut launcher_config = fixture.launcher("exit 0").config().clone();
    launcher_config.server.args[1] = r#"echo $$ > "$1"; echo "$2" > "$1.root"; exec sleep 60"#.to_string();
    launcher_config.server.startup_timeout = None;

    let code = Launcher::new(launcher_config)
        .run(&[], tokio::time::sleep(Duration::from_millis(500)))
        .await
        .unwrap();

    assert_eq!(code, 1);
    assert!(!fixture.path("karma.args").exists(), "karma must not run");
    // Signal 0 succeeds on a zombie, so an error here means the server was reaped
    fixture.assert_cleaned_up();
}
