//! Client-side session orchestration: resolve a handshake, then drive a
//! `ReceiverEngine` writing into the requested local file.

use xtransport::handshake::client_handshake;
use xtransport::{Error, LossyTransport, Result, SessionParams, UdpTransport};

use crate::cli::Cli;

/// Runs one end-to-end download: handshake, then reliable receive into
/// `cli.to_filename`.
pub async fn run(cli: Cli) -> Result<()> {
    let params = SessionParams::new(cli.window_size, cli.buffer_size);
    params.validate()?;

    let bind_addr = "0.0.0.0:0".parse().unwrap();
    let udp = UdpTransport::bind(bind_addr).await?;
    let transport = LossyTransport::new(udp, cli.error_rate);

    log::info!(
        "requesting '{}' from {} (window={}, buffer={})",
        cli.from_filename,
        cli.remote_addr,
        cli.window_size,
        cli.buffer_size
    );

    let outcome = match client_handshake(&transport, cli.remote_addr, &cli.from_filename, params).await {
        Ok(outcome) => outcome,
        Err(Error::FileNotFound) => {
            log::error!("server reports '{}' does not exist", cli.from_filename);
            return Err(Error::FileNotFound);
        }
        Err(e) => return Err(e),
    };

    log::info!("session established at {}", outcome.session_addr);

    let file = tokio::fs::File::create(&cli.to_filename).await?;
    let mut engine = xtransport::ReceiverEngine::new(&transport, outcome.session_addr, file, outcome.params);
    let stats = engine.run().await?;

    log::info!(
        "transfer complete: {} bytes written, {} frames received, {} out of order, {} duplicates",
        stats.bytes_written,
        stats.frames_received,
        stats.out_of_order,
        stats.duplicates
    );
    Ok(())
}
