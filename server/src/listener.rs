//! Parent listener: the single well-known socket that accepts FILENAME
//! requests and spawns a per-transfer child session for each one.

use std::net::SocketAddr;

use xtransport::config::MAX_FRAME_SIZE;
use xtransport::handshake::{child_reject, decode_filename_request};
use xtransport::transport::{Datagram, LossyTransport, UdpTransport};
use xtransport::{Result, SessionParams};

use crate::session;

/// Every syntactically valid FILENAME request is forked to its own child
/// session regardless of whether the file exists; the child (bound to its
/// own fresh ephemeral endpoint) is what decides accept or reject, per the
/// handshake's own design — the client's recorded session endpoint should
/// always be the migrated one, never the well-known listener.

pub async fn run(port: u16, error_rate: f64) -> Result<()> {
    let bind_addr: SocketAddr = format!("0.0.0.0:{port}").parse().unwrap();
    let udp = UdpTransport::bind(bind_addr).await?;
    let local_addr = udp.local_addr()?;
    let transport = LossyTransport::new(udp, error_rate);

    log::info!("listening on {local_addr}");

    let mut buf = vec![0u8; MAX_FRAME_SIZE];
    loop {
        let Some((n, from)) = transport.recv(&mut buf, std::time::Duration::from_secs(3600)).await? else {
            continue;
        };

        let request = match decode_filename_request(&buf[..n]) {
            Ok(request) => request,
            Err(e) => {
                log::debug!("ignoring malformed handshake datagram from {from}: {e}");
                continue;
            }
        };

        let params = SessionParams::new(request.window_size, request.buffer_size);
        if params.validate().is_err() {
            log::debug!("rejecting {from}: invalid session parameters");
            child_reject(&transport, from).await?;
            continue;
        }

        log::info!("forking session for '{}' from {from}", request.name);
        tokio::spawn(session::run(from, request.name.clone(), params, error_rate));
    }
}
