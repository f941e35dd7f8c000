// src/shutdown.rs
// Interrupt handling for graceful shutdown

use futures_util::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::{Handle, Signals};
use std::io;

/// Stream of interrupt signals (SIGINT and SIGTERM).
///
/// Registering replaces the default "terminate the process" action, so it
/// has to exist before the server starts listening.
pub struct InterruptListener {
    signals: Signals,
    handle: Handle,
}

impl InterruptListener {
    pub fn new() -> io::Result<Self> {
        let signals = Signals::new([SIGINT, SIGTERM])?;
        let handle = signals.handle();
        Ok(Self { signals, handle })
    }

    /// Wait for the next interrupt. `None` once the listener is closed.
    pub async fn recv(&mut self) -> Option<i32> {
        self.signals.next().await
    }

    pub fn close(&self) {
        self.handle.close();
    }
}

impl Drop for InterruptListener {
    fn drop(&mut self) {
        self.close();
    }
}

/// After the first interrupt: a second one abandons the graceful drain and
/// exits immediately with a failure status.
pub fn force_exit_on_repeat(mut listener: InterruptListener) {
    let logger = crate::logger::get_logger();

    actix_web::rt::spawn(async move {
        if listener.recv().await.is_some() {
            logger.force_shutdown_message();
            std::process::exit(1);
        }
    });
}
