//! The server binary driven through real processes and signals.

#![cfg(unix)]

use std::io::Write;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

mod common;

struct ServerProcess {
    child: Child,
    pid: Pid,
    logs: Arc<Mutex<Vec<String>>>,
    reader: JoinHandle<()>,
}

impl ServerProcess {
    fn launch(workers: usize, port: u16, config: Option<&Path>) -> Self {
        let mut command = Command::new(env!("CARGO_BIN_EXE_prefork-server"));
        command
            .env_remove("PREFORK_WORKER_INDEX")
            .env_remove("PREFORK_CONFIG")
            .env_remove("REQUEST_TIMEOUT_SECS")
            .env_remove("PUBLIC_URL")
            .env("PORT", port.to_string())
            .env("WORKERS", workers.to_string())
            .env("RUST_LOG", "prefork_server=info")
            .env("NO_COLOR", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(path) = config {
            command.env("PREFORK_CONFIG", path);
        }

        let mut child = command.spawn().expect("server binary starts");
        let pid = Pid::from_raw(child.id().expect("running child has a pid") as i32);

        // Workers inherit stdout, so their lines land here too.
        let stdout = child.stdout.take().expect("stdout is piped");
        let logs = Arc::new(Mutex::new(Vec::new()));
        let sink = logs.clone();
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                sink.lock().unwrap().push(line);
            }
        });

        Self {
            child,
            pid,
            logs,
            reader,
        }
    }

    fn count(&self, needle: &str) -> usize {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }

    async fn wait_for_log(&self, needle: &str, times: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
        while self.count(needle) < times {
            assert!(
                tokio::time::Instant::now() < deadline,
                "expected {} x {:?} in logs: {:#?}",
                times,
                needle,
                self.logs.lock().unwrap()
            );
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// SIGTERM twice, as an impatient operator would.
    async fn terminate_twice(&self) {
        kill(self.pid, Signal::SIGTERM).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        // The process may already be gone.
        let _ = kill(self.pid, Signal::SIGTERM);
    }

    /// Wait for exit and for every writer of the log pipe to finish.
    async fn exit(mut self) -> (ExitStatus, Vec<String>) {
        let status = tokio::time::timeout(Duration::from_secs(15), self.child.wait())
            .await
            .expect("server exits in time")
            .unwrap();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.reader).await;
        let logs = self.logs.lock().unwrap().clone();
        (status, logs)
    }
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn count(logs: &[String], needle: &str) -> usize {
    logs.iter().filter(|line| line.contains(needle)).count()
}

#[tokio::test]
async fn single_worker_drains_on_sigterm() {
    let port = free_port();
    let server = ServerProcess::launch(0, port, None);
    server.wait_for_log("Worker serving", 1).await;

    let response = common::client()
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    server.terminate_twice().await;
    let (status, logs) = server.exit().await;

    assert_eq!(status.code(), Some(0), "logs: {:#?}", logs);
    assert_eq!(count(&logs, "Backing store closed"), 1);
    assert_eq!(count(&logs, "Shutdown signal received"), 1);
    assert!(TcpStream::connect(("127.0.0.1", port)).await.is_err());
}

#[tokio::test]
async fn worker_pool_drains_on_sigterm() {
    let port = free_port();
    let server = ServerProcess::launch(2, port, None);
    server.wait_for_log("Worker serving", 2).await;

    assert_eq!(server.count("Worker spawned"), 2);
    // Only workers start HTTP servers; the parent binds nothing.
    assert_eq!(server.count("HTTP server starting"), 2);

    #[cfg(target_os = "linux")]
    if let Ok(children) = std::fs::read_to_string(format!("/proc/{0}/task/{0}/children", server.pid)) {
        assert_eq!(children.split_whitespace().count(), 2);
    }

    let response = common::client()
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    server.terminate_twice().await;
    let (status, logs) = server.exit().await;

    assert_eq!(status.code(), Some(0), "logs: {:#?}", logs);
    assert_eq!(count(&logs, "Backing store closed"), 2);
    assert_eq!(count(&logs, "All workers exited"), 1);
    assert!(TcpStream::connect(("127.0.0.1", port)).await.is_err());
}

#[tokio::test]
async fn unreachable_store_exits_nonzero_without_binding() {
    let port = free_port();
    let dead_store = free_port();
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        config,
        "[store]\naddress = \"127.0.0.1:{}\"\nconnect_timeout_secs = 1",
        dead_store
    )
    .unwrap();

    let server = ServerProcess::launch(0, port, Some(config.path()));
    let (status, logs) = server.exit().await;

    assert_eq!(status.code(), Some(1), "logs: {:#?}", logs);
    assert_eq!(count(&logs, "Worker serving"), 0);
    assert_eq!(count(&logs, "HTTP server starting"), 0);
    assert!(TcpStream::connect(("127.0.0.1", port)).await.is_err());
}
