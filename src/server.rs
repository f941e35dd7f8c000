// src/server.rs
// Listener lifecycle: bind, serve in the background, bounded shutdown

use actix_web::{dev::ServerHandle, web, App, HttpServer};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::{Config, ListenAddr};
use crate::dispatch;
use crate::proxy;
use crate::RequestLogger;

/// How long in-flight requests get to finish once shutdown starts.
pub const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

/// Idle keep-alive connections close well inside the shutdown deadline.
const IDLE_KEEP_ALIVE: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub enum StartupError {
    Bind { addr: ListenAddr, source: io::Error },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::Bind { addr, source } => write!(f, "listen {}: {}", addr, source),
        }
    }
}

impl std::error::Error for StartupError {}

#[derive(Debug)]
pub enum ShutdownError {
    DeadlineExceeded(Duration),
    Server(io::Error),
    Task(tokio::task::JoinError),
}

impl fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownError::DeadlineExceeded(deadline) => write!(
                f,
                "requests still in flight after {}s, giving up",
                deadline.as_secs_f32()
            ),
            ShutdownError::Server(err) => write!(f, "server error: {}", err),
            ShutdownError::Task(err) => write!(f, "server task failed: {}", err),
        }
    }
}

impl std::error::Error for ShutdownError {}

/// A configured server that is not listening yet.
pub struct EdgeServer {
    config: web::Data<Config>,
}

impl EdgeServer {
    pub fn new(config: Config) -> Self {
        Self {
            config: web::Data::new(config),
        }
    }

    /// Bind the listen address and serve on a background task.
    ///
    /// Returns as soon as the socket is bound; a bind failure is returned
    /// as is and never retried.
    pub fn start(self) -> Result<RunningServer, StartupError> {
        let config = self.config;
        let listen = config.listen.clone();

        let server = HttpServer::new({
            let config = config.clone();
            move || {
                App::new()
                    .wrap(RequestLogger)
                    .app_data(config.clone())
                    .app_data(web::Data::new(proxy::upstream_client()))
                    .configure(dispatch::routes)
            }
        })
        .disable_signals()
        .keep_alive(IDLE_KEEP_ALIVE)
        // Backstop only; the deadline itself is enforced by `shutdown`.
        .shutdown_timeout(SHUTDOWN_DEADLINE.as_secs() + 1)
        .bind((listen.host.as_str(), listen.port))
        .map_err(|source| StartupError::Bind {
            addr: listen.clone(),
            source,
        })?;

        let addrs = server.addrs();
        let server = server.run();
        let handle = server.handle();
        let task = actix_web::rt::spawn(server);

        Ok(RunningServer {
            handle,
            task,
            addrs,
        })
    }
}

/// A bound, accepting server.
pub struct RunningServer {
    handle: ServerHandle,
    task: JoinHandle<io::Result<()>>,
    addrs: Vec<SocketAddr>,
}

impl RunningServer {
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    /// Stop accepting, let in-flight requests finish, and fail if they have
    /// not finished within `deadline`.
    pub async fn shutdown(self, deadline: Duration) -> Result<(), ShutdownError> {
        let RunningServer { handle, task, .. } = self;

        let drained = async move {
            handle.stop(true).await;
            task.await
        };

        match tokio::time::timeout(deadline, drained).await {
            Err(_) => Err(ShutdownError::DeadlineExceeded(deadline)),
            Ok(Err(join_err)) => Err(ShutdownError::Task(join_err)),
            Ok(Ok(Err(io_err))) => Err(ShutdownError::Server(io_err)),
            Ok(Ok(Ok(()))) => Ok(()),
        }
    }
}
