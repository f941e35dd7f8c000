//! Test server management utilities
//!
//! Runs the devgate binary as a child process on a free local port and
//! drives its lifecycle with real signals.

use std::net::TcpListener;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::time::{sleep, timeout};

/// Client that never reuses connections, so idle keep-alives do not hold
/// the server's graceful drain open.
pub fn client() -> Client {
    Client::builder()
        .pool_max_idle_per_host(0)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to build HTTP client")
}

/// Ask the OS for a port nobody is listening on.
pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .expect("Failed to find a free port")
}

fn binary() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_devgate"));
    command
        .env("RUST_LOG", "off")
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    command
}

/// A running devgate process.
pub struct TestServer {
    process: Child,
    pub port: u16,
    pub base_url: String,
}

impl TestServer {
    /// Serve `dir` with the default proxy settings plus `extra_args`.
    pub async fn start(dir: &Path, extra_args: &[&str]) -> Result<Self, Box<dyn std::error::Error>> {
        let dir = dir.to_string_lossy().to_string();
        let mut args = vec!["--dir", dir.as_str()];
        args.extend_from_slice(extra_args);
        Self::launch(&args).await
    }

    /// Start with exactly `args`, plus a `--port` on a free local port.
    pub async fn launch(args: &[&str]) -> Result<Self, Box<dyn std::error::Error>> {
        let port = free_port();
        let listen = format!("127.0.0.1:{}", port);

        let process = binary().args(["--port", &listen]).args(args).spawn()?;

        let mut server = TestServer {
            process,
            port,
            base_url: format!("http://{}", listen),
        };
        server.wait_until_ready().await?;
        Ok(server)
    }

    /// Serve `dir`, proxying the default `/api` prefix to `upstream`.
    pub async fn with_upstream(
        dir: &Path,
        upstream: &str,
        extra_args: &[&str],
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut args = vec!["--proxy-addr", upstream];
        args.extend_from_slice(extra_args);
        Self::start(dir, &args).await
    }

    /// Get a URL for a specific path
    pub fn url_for(&self, path: &str) -> String {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        format!("{}{}", self.base_url, path)
    }

    /// Deliver SIGINT, as Ctrl-C in a terminal would.
    pub fn interrupt(&self) {
        let status = Command::new("kill")
            .args(["-INT", &self.process.id().to_string()])
            .status()
            .expect("Failed to run kill");
        assert!(status.success(), "kill -INT failed");
    }

    /// Poll for the process to exit, giving up after `limit`.
    pub async fn wait_for_exit(&mut self, limit: Duration) -> Option<ExitStatus> {
        let started = Instant::now();
        while started.elapsed() < limit {
            if let Ok(Some(status)) = self.process.try_wait() {
                return Some(status);
            }
            sleep(Duration::from_millis(50)).await;
        }
        None
    }

    async fn wait_until_ready(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let client = client();

        for _ in 0..100 {
            if let Ok(Some(status)) = self.process.try_wait() {
                return Err(format!("devgate exited during startup: {}", status).into());
            }
            match timeout(Duration::from_secs(2), client.get(&self.base_url).send()).await {
                Ok(Ok(_)) => return Ok(()),
                _ => sleep(Duration::from_millis(50)).await,
            }
        }

        Err(format!("Server at {} did not become ready in time", self.base_url).into())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

/// Run the binary with `args` and wait for it to exit on its own, as it
/// does for configuration and startup errors.
pub fn run_to_exit(args: &[&str], limit: Duration) -> Option<ExitStatus> {
    let mut process = binary().args(args).spawn().expect("Failed to start devgate");

    let started = Instant::now();
    while started.elapsed() < limit {
        if let Ok(Some(status)) = process.try_wait() {
            return Some(status);
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    let _ = process.kill();
    let _ = process.wait();
    None
}
