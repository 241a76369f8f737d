//! Per-transfer child session: confirms the migrated endpoint with the
//! client, then drives a `SenderEngine` reading the requested file.

use std::net::SocketAddr;
use std::time::Duration;

use xtransport::config::{CHILD_ACK_WAIT_MS, MAX_RETRANSMIT};
use xtransport::handshake::{child_confirm_session, child_reject};
use xtransport::transport::{Datagram, LossyTransport, UdpTransport};
use xtransport::{Result, SenderEngine, SessionParams};

/// Binds a fresh ephemeral socket, confirms migration with the client,
/// and streams `filename` to them. Runs to completion or gives up after
/// `MAX_RETRANSMIT` unanswered confirmation attempts.
pub async fn run(client_addr: SocketAddr, filename: String, params: SessionParams, error_rate: f64) {
    if let Err(e) = run_inner(client_addr, &filename, params, error_rate).await {
        log::error!("session for {client_addr} ({filename}) failed: {e}");
    }
}

async fn run_inner(
    client_addr: SocketAddr,
    filename: &str,
    params: SessionParams,
    error_rate: f64,
) -> Result<()> {
    let bind_addr = "0.0.0.0:0".parse().unwrap();
    let udp = UdpTransport::bind(bind_addr).await?;
    let transport = LossyTransport::new(udp, error_rate);

    log::info!("child session for {client_addr} bound to {}", transport.local_addr()?);

    let file = match tokio::fs::File::open(filename).await {
        Ok(file) => file,
        Err(_) => {
            log::info!("'{filename}' not found; rejecting {client_addr} from migrated endpoint");
            child_reject(&transport, client_addr).await?;
            return Ok(());
        }
    };

    let wait = Duration::from_millis(CHILD_ACK_WAIT_MS);
    let mut confirmed = false;
    for attempt in 0..MAX_RETRANSMIT {
        if child_confirm_session(&transport, client_addr, wait).await? {
            confirmed = true;
            break;
        }
        log::debug!("migration ack attempt {attempt} from {client_addr} unanswered");
    }
    if !confirmed {
        log::warn!("client {client_addr} never acknowledged migration; abandoning session");
        return Ok(());
    }

    let mut engine = SenderEngine::new(&transport, client_addr, file, params);
    let stats = engine.run().await?;

    log::info!(
        "session for {client_addr} complete: {} bytes sent, {} frames, {} retransmits, {} srej replays",
        stats.bytes_sent,
        stats.frames_sent,
        stats.retransmits,
        stats.srej_replays
    );
    Ok(())
}
