#![allow(dead_code)]

use crossbeam_channel::{bounded, Receiver, Sender};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Routes library logs to the test harness. `RUST_LOG=tempo_rs=debug` for detail.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Polls `cond` until it holds or `timeout` elapses.
pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut cond: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}

/// Task body that reports it started and then blocks until released. Used to
/// hold a worker busy while the test arranges queue contents.
pub struct Gate {
    started_tx: Sender<()>,
    started_rx: Receiver<()>,
    release_tx: Sender<()>,
    release_rx: Receiver<()>,
}

impl Gate {
    pub fn new() -> Self {
        let (started_tx, started_rx) = bounded(16);
        let (release_tx, release_rx) = bounded(16);
        Self {
            started_tx,
            started_rx,
            release_tx,
            release_rx,
        }
    }

    pub fn task(&self) -> impl FnOnce() + Send + 'static {
        let started = self.started_tx.clone();
        let release = self.release_rx.clone();
        move || {
            let _ = started.send(());
            let _ = release.recv_timeout(Duration::from_secs(10));
        }
    }

    pub fn wait_started(&self) {
        self.started_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("gate task never started");
    }

    pub fn release(&self) {
        let _ = self.release_tx.send(());
    }

    pub fn releaser(&self) -> Sender<()> {
        self.release_tx.clone()
    }
}
