//! OCPP 1.6 WebSocket server
//!
//! Accepts charge-point connections at `ws://<host>:<port>/…/{charge_point_id}`.
//! The final URL path segment is the charge point id. Each connection gets
//! one reader task that processes frames serially (per-CP ordering) and one
//! writer task draining the session's outbound channel.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::application::commands::CommandService;
use crate::application::coordinator::TransactionCoordinator;
use crate::application::discovery::{discover_connectors, DiscoveryTiming};
use crate::application::handlers::{handle_disconnect, HandlerContext, OcppDispatcher};
use crate::application::session::{
    Outbound, Session, SharedSessionRegistry, CLOSE_CODE_NORMAL, CLOSE_CODE_POLICY,
};
use crate::application::telemetry::MeterPublisher;
use crate::infrastructure::cache::CacheGateway;
use crate::infrastructure::storage::StorageGateway;
use crate::support::shutdown::{ShutdownHandle, StopToken};

/// OCPP 1.6 WebSocket subprotocol
const OCPP_SUBPROTOCOL: &str = "ocpp1.6";

/// Grace period before probing a freshly connected, unknown charge point,
/// so its BootNotification and spontaneous status reports come first.
const LAZY_DISCOVERY_DELAY: Duration = Duration::from_secs(10);

/// Shared collaborators every connection needs.
pub struct GatewayCore {
    pub storage: Arc<dyn StorageGateway>,
    pub cache: Arc<dyn CacheGateway>,
    pub coordinator: Arc<TransactionCoordinator>,
    pub publisher: Arc<dyn MeterPublisher>,
    /// Heartbeat interval handed to stations at boot (seconds)
    pub heartbeat_interval: u32,
    /// Default timeout for outbound CALLs
    pub call_timeout: Duration,
}

/// OCPP WebSocket server
pub struct OcppServer {
    addr: String,
    registry: SharedSessionRegistry,
    core: Arc<GatewayCore>,
    shutdown: Option<ShutdownHandle>,
}

impl OcppServer {
    pub fn new(addr: String, registry: SharedSessionRegistry, core: Arc<GatewayCore>) -> Self {
        Self {
            addr,
            registry,
            core,
            shutdown: None,
        }
    }

    /// Wire the server into the gateway shutdown sequence: the stop token
    /// quiesces the accept and reader loops, and each connection holds a
    /// drain guard until its cleanup has run.
    pub fn with_shutdown(mut self, handle: ShutdownHandle) -> Self {
        self.shutdown = Some(handle);
        self
    }

    /// Start the WebSocket server
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.addr).await?;

        info!("OCPP 1.6 central system listening on ws://{}", self.addr);
        info!(
            "   Charge points connect to: ws://{}/{{charge_point_id}}",
            self.addr
        );

        match self.shutdown {
            Some(ref handle) => self.run_with_shutdown(listener, handle.stop.clone()).await,
            None => self.run_loop(listener).await,
        }
    }

    async fn run_loop(
        &self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        while let Ok((stream, addr)) = listener.accept().await {
            self.spawn_connection(stream, addr);
        }
        Ok(())
    }

    async fn run_with_shutdown(
        &self,
        listener: TcpListener,
        stop: StopToken,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => self.spawn_connection(stream, addr),
                        Err(e) => error!("Failed to accept connection: {}", e),
                    }
                }
                _ = stop.stopped() => {
                    info!("WebSocket server stopped accepting connections");
                    self.registry.close_all("server shutdown");
                    return Ok(());
                }
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let registry = self.registry.clone();
        let core = self.core.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, registry, core, shutdown).await {
                error!("Connection error from {}: {}", addr, e);
            }
        });
    }
}

/// Extract the charge point id: the final non-empty URL path segment.
fn extract_charge_point_id(path: &str) -> Option<String> {
    let id = path.trim_end_matches('/').rsplit('/').next()?;
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

fn close_message(code: u16, reason: &str) -> Message {
    Message::Close(Some(CloseFrame {
        code: CloseCode::from(code),
        reason: reason.to_string().into(),
    }))
}

/// Handle a single WebSocket connection end to end.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    registry: SharedSessionRegistry,
    core: Arc<GatewayCore>,
    shutdown: Option<ShutdownHandle>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("New connection from: {}", addr);

    let mut charge_point_id: Option<String> = None;

    let ws_stream = tokio_tungstenite::accept_hdr_async(
        stream,
        |req: &Request, mut response: Response| {
            let path = req.uri().path();
            debug!("WebSocket handshake from {}, path: {}", addr, path);

            let requested_protocols = req
                .headers()
                .get("Sec-WebSocket-Protocol")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");

            // Echo the OCPP 1.6 subprotocol when the station offers it;
            // stations that omit the header are accepted as-is.
            let offers_ocpp16 = requested_protocols
                .split(',')
                .map(|s| s.trim())
                .any(|p| p == OCPP_SUBPROTOCOL);
            if offers_ocpp16 {
                response
                    .headers_mut()
                    .insert("Sec-WebSocket-Protocol", OCPP_SUBPROTOCOL.parse().unwrap());
            } else if !requested_protocols.is_empty() {
                warn!(
                    "Client at {} offered unknown subprotocols: {}",
                    addr, requested_protocols
                );
            }

            charge_point_id = extract_charge_point_id(path);
            Ok(response)
        },
    )
    .await?;

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // No id in the path: policy close after the upgrade completes
    let Some(charge_point_id) = charge_point_id else {
        warn!("Connection from {} has no charge point id in path, closing", addr);
        let _ = ws_sender
            .send(close_message(CLOSE_CODE_POLICY, "missing charge point id"))
            .await;
        return Ok(());
    };

    info!(
        charge_point_id = charge_point_id.as_str(),
        remote_addr = %addr,
        "Charge point connected"
    );

    // The drain stage of gateway shutdown waits for this guard, which
    // drops only after the cleanup at the bottom of this function
    let _drain = shutdown.as_ref().map(|h| h.drain.clone());

    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    let session = Arc::new(Session::new(
        charge_point_id.clone(),
        tx,
        core.heartbeat_interval,
        core.call_timeout,
    ));

    // Supersede any existing session before this one becomes visible
    registry.register(session.clone());

    // Reload known connector state so a reconnect resumes where it left off
    match core.storage.list_connectors(&charge_point_id).await {
        Ok(connectors) => {
            for connector in connectors {
                session.connectors.insert(connector.connector_id, connector);
            }
        }
        Err(e) => warn!(
            charge_point_id = charge_point_id.as_str(),
            error = %e,
            "Failed to load connector state"
        ),
    }

    if let Err(e) = core
        .storage
        .set_charge_point_online(&charge_point_id, true, Utc::now())
        .await
    {
        warn!(
            charge_point_id = charge_point_id.as_str(),
            error = %e,
            "Failed to mark charge point online"
        );
    }

    // A charge point with no known connectors gets a lazy discovery pass
    // once it has had a moment to boot
    if session.connectors.is_empty() {
        spawn_lazy_discovery(registry.clone(), core.clone(), session.clone());
    }

    let dispatcher = OcppDispatcher::new(HandlerContext {
        session: session.clone(),
        storage: core.storage.clone(),
        cache: core.cache.clone(),
        coordinator: core.coordinator.clone(),
        publisher: core.publisher.clone(),
        heartbeat_interval: core.heartbeat_interval,
    });

    // ── Writer task: drain the session's outbound channel ──
    let cp_id_send = charge_point_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let (message, closing) = match msg {
                Outbound::Text(text) => {
                    debug!(charge_point_id = cp_id_send.as_str(), frame = text.as_str(), "->");
                    (Message::Text(text), false)
                }
                Outbound::Ping => (Message::Ping(Vec::new()), false),
                Outbound::Close { code, reason } => (close_message(code, &reason), true),
            };
            if let Err(e) = ws_sender.send(message).await {
                error!(charge_point_id = cp_id_send.as_str(), error = %e, "Send error");
                break;
            }
            if closing {
                break;
            }
        }
    });

    // ── Reader loop: frames processed serially, in arrival order ──
    loop {
        let msg = if let Some(ref handle) = shutdown {
            tokio::select! {
                msg = ws_receiver.next() => msg,
                _ = handle.stop.stopped() => {
                    info!(
                        charge_point_id = charge_point_id.as_str(),
                        "Closing connection for server shutdown"
                    );
                    session.close(CLOSE_CODE_NORMAL, "server shutdown");
                    break;
                }
            }
        } else {
            ws_receiver.next().await
        };

        match msg {
            Some(Ok(Message::Text(text))) => {
                debug!(
                    charge_point_id = charge_point_id.as_str(),
                    frame = text.as_str(),
                    "<-"
                );
                session.touch();
                if let Some(response) = dispatcher.handle(&text).await {
                    if session.send_text(response).is_err() {
                        break;
                    }
                }
            }
            Some(Ok(Message::Ping(_))) => {
                // tungstenite queues the pong; the station is clearly alive
                session.touch();
            }
            Some(Ok(Message::Pong(_))) => {
                session.pong_received();
            }
            Some(Ok(Message::Close(frame))) => {
                info!(
                    charge_point_id = charge_point_id.as_str(),
                    frame = ?frame,
                    "Close frame received"
                );
                break;
            }
            Some(Ok(Message::Binary(data))) => {
                warn!(
                    charge_point_id = charge_point_id.as_str(),
                    bytes = data.len(),
                    "Binary message ignored"
                );
            }
            Some(Ok(Message::Frame(_))) => {}
            Some(Err(e)) => {
                error!(charge_point_id = charge_point_id.as_str(), error = %e, "WebSocket error");
                break;
            }
            None => break,
        }
    }

    // ── Cleanup ────────────────────────────────────────────
    // Fail pending waiters regardless; run disconnect side effects only if
    // this session is still the registered one (a superseded connection
    // must not mark the new session's charge point offline).
    session.close(CLOSE_CODE_NORMAL, "connection closed");
    let was_current = registry.remove_if_current(&session);
    if was_current {
        handle_disconnect(dispatcher.context()).await;
    }
    writer.abort();

    info!(
        charge_point_id = charge_point_id.as_str(),
        superseded = !was_current,
        "Charge point disconnected"
    );

    Ok(())
}

/// Discover connectors for a station the gateway knows nothing about yet.
/// Skipped if the session was superseded or traffic already revealed a
/// connector by the time the grace period elapses.
fn spawn_lazy_discovery(
    registry: SharedSessionRegistry,
    core: Arc<GatewayCore>,
    session: Arc<Session>,
) {
    tokio::spawn(async move {
        tokio::time::sleep(LAZY_DISCOVERY_DELAY).await;

        let still_current = registry
            .get(&session.charge_point_id)
            .map_or(false, |current| Arc::ptr_eq(&current, &session));
        if !still_current || !session.connectors.is_empty() {
            return;
        }

        let charge_point_id = session.charge_point_id.clone();
        let commands = CommandService::new(registry, core.coordinator.clone());
        match discover_connectors(
            &commands,
            &core.storage,
            &charge_point_id,
            &DiscoveryTiming::default(),
        )
        .await
        {
            Ok(report) => info!(
                charge_point_id = charge_point_id.as_str(),
                method = report.metadata.discovery_method.as_str(),
                discovered = report.metadata.discovered_count,
                "Lazy connector discovery finished"
            ),
            Err(e) => warn!(
                charge_point_id = charge_point_id.as_str(),
                error = %e,
                "Lazy connector discovery failed"
            ),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_final_path_segment() {
        assert_eq!(extract_charge_point_id("/CP001").as_deref(), Some("CP001"));
        assert_eq!(extract_charge_point_id("/ocpp/CP001").as_deref(), Some("CP001"));
        assert_eq!(
            extract_charge_point_id("/ocpp/v16/STATION-7/").as_deref(),
            Some("STATION-7")
        );
        assert_eq!(extract_charge_point_id("/"), None);
        assert_eq!(extract_charge_point_id(""), None);
    }
}
