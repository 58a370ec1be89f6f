//! Gateway shutdown sequencing
//!
//! Stopping the gateway is a three-stage affair. First the stop flag is
//! tripped: the WebSocket accept loop refuses new charge points, the
//! operator API stops taking requests, and the heartbeat sweeper winds
//! down. Then connected sessions drain: each connection finishes the
//! frame it is processing, fails its pending calls, and applies its
//! disconnect side effects before releasing its [`DrainGuard`]. Finally,
//! [`GatewayShutdown::wait_drained`] holds the process open until every
//! guard is gone or the grace period runs out.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::info;

/// Observer half of the stop flag. Cheap to clone; long-running tasks
/// (accept loop, reader loops, sweeper, API server) each hold one.
#[derive(Clone)]
pub struct StopToken {
    rx: watch::Receiver<bool>,
}

impl StopToken {
    /// Resolves once shutdown has been requested. Safe to re-await and to
    /// recreate per iteration inside `select!` loops.
    pub async fn stopped(&self) {
        let mut rx = self.rx.clone();
        // A closed channel means the owner is gone, which is also a stop
        let _ = rx.wait_for(|stop| *stop).await;
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Drain participation. A charge point connection holds one for its whole
/// lifetime, so the guard drops only after the connection's cleanup
/// (pending calls failed, connectors marked unavailable) has run.
#[derive(Clone)]
pub struct DrainGuard {
    _permit: mpsc::Sender<()>,
}

/// What the WebSocket server needs from the shutdown machinery: the stop
/// flag for its loops plus the guard template it hands to each connection.
#[derive(Clone)]
pub struct ShutdownHandle {
    pub stop: StopToken,
    pub drain: DrainGuard,
}

/// Owner of the shutdown sequence; lives in `main`.
pub struct GatewayShutdown {
    stop: Arc<watch::Sender<bool>>,
    guard: DrainGuard,
    drained: mpsc::Receiver<()>,
    grace: Duration,
}

impl GatewayShutdown {
    pub fn new(grace_secs: u64) -> Self {
        let (stop, _) = watch::channel(false);
        let (permit, drained) = mpsc::channel(1);
        Self {
            stop: Arc::new(stop),
            guard: DrainGuard { _permit: permit },
            drained,
            grace: Duration::from_secs(grace_secs),
        }
    }

    pub fn token(&self) -> StopToken {
        StopToken {
            rx: self.stop.subscribe(),
        }
    }

    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            stop: self.token(),
            drain: self.guard.clone(),
        }
    }

    /// Request shutdown. Idempotent; every [`StopToken`] resolves.
    pub fn trigger(&self) {
        if !self.stop.send_replace(true) {
            info!("Gateway shutdown requested");
        }
    }

    /// Trip the stop flag when the process receives SIGTERM / SIGINT.
    pub fn spawn_signal_listener(&self) {
        let stop = Arc::clone(&self.stop);
        tokio::spawn(async move {
            wait_for_os_signal().await;
            if !stop.send_replace(true) {
                info!("Gateway shutdown requested");
            }
        });
    }

    /// Final stage: wait until every [`DrainGuard`] has been dropped,
    /// meaning all charge point connections finished their cleanup.
    /// Returns `false` when the grace period expired with sessions still
    /// open; the caller exits anyway.
    pub async fn wait_drained(self) -> bool {
        let Self {
            stop,
            guard,
            mut drained,
            grace,
        } = self;
        // Stragglers that never saw an explicit trigger still stop here
        stop.send_replace(true);
        drop(guard);

        tokio::time::timeout(grace, async {
            while drained.recv().await.is_some() {}
        })
        .await
        .is_ok()
    }
}

async fn wait_for_os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => info!("SIGTERM received"),
            _ = sigint.recv() => info!("SIGINT received"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("install Ctrl+C handler");
        info!("Ctrl+C received");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_resolves_after_trigger() {
        let shutdown = GatewayShutdown::new(5);
        let token = shutdown.token();
        assert!(!token.is_stopped());

        shutdown.trigger();
        assert!(token.is_stopped());
        // Resolves immediately and repeatedly once tripped
        token.stopped().await;
        token.stopped().await;
    }

    #[tokio::test]
    async fn drain_completes_once_sessions_release_their_guards() {
        let shutdown = GatewayShutdown::new(5);
        let handle = shutdown.handle();

        // A connection task: waits for the stop flag, runs its cleanup,
        // and only then releases its guard
        let connection = tokio::spawn({
            let guard = handle.drain.clone();
            let stop = handle.stop.clone();
            async move {
                stop.stopped().await;
                drop(guard);
            }
        });
        drop(handle);

        shutdown.trigger();
        assert!(shutdown.wait_drained().await);
        connection.await.unwrap();
    }

    #[tokio::test]
    async fn drain_gives_up_when_a_session_hangs() {
        let shutdown = GatewayShutdown::new(0);
        let stuck = shutdown.handle();

        shutdown.trigger();
        assert!(!shutdown.wait_drained().await);
        drop(stuck);
    }

    #[tokio::test]
    async fn wait_drained_implies_trigger() {
        let shutdown = GatewayShutdown::new(5);
        let token = shutdown.token();

        // No explicit trigger: the drain stage trips the flag itself
        assert!(shutdown.wait_drained().await);
        assert!(token.is_stopped());
    }
}
