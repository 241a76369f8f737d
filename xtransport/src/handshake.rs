//! Session establishment: the FILENAME / FILENAME_RESP exchange that
//! negotiates a file name, window size, and buffer size, and migrates
//! the client onto a fresh per-session endpoint.

use std::net::SocketAddr;
use std::time::Duration;

use crate::config::{
    SessionParams, FILE_NOT_FOUND_RETRIES, HANDSHAKE_TIMEOUT_MS, INIT_RETRY_LIMIT, MAX_FRAME_SIZE,
};
use crate::core::{Frame, FrameFlag, FilenameInit};
use crate::error::{Error, Result};
use crate::transport::Datagram;

/// Result of a successful client handshake: the session endpoint to send
/// data to and receive acknowledgements from for the rest of the transfer.
pub struct HandshakeOutcome {
    pub session_addr: SocketAddr,
    pub params: SessionParams,
}

/// Runs the client side of the handshake against `parent_addr`: sends a
/// FILENAME frame requesting `filename` with the given session
/// parameters, retrying up to `INIT_RETRY_LIMIT` times, until a
/// FILENAME_RESP arrives. On success, re-sends the FILENAME frame once
/// more to the newly observed session endpoint so the child session has
/// the datagram it's waiting for as proof the client saw the migration.
pub async fn client_handshake<T: Datagram>(
    transport: &T,
    parent_addr: SocketAddr,
    filename: &str,
    params: SessionParams,
) -> Result<HandshakeOutcome> {
    params.validate()?;
    let init = FilenameInit::new(filename, params.window_size, params.buffer_size);
    let request = Frame::new(0, FrameFlag::Filename, init.encode()?).encode();

    let mut buf = vec![0u8; MAX_FRAME_SIZE];
    let timeout = Duration::from_millis(HANDSHAKE_TIMEOUT_MS);

    for attempt in 0..INIT_RETRY_LIMIT {
        log::debug!("handshake attempt {attempt} to {parent_addr}");
        transport.send_to(&request, parent_addr).await?;

        let Some((n, session_addr)) = transport.recv(&mut buf, timeout).await? else {
            continue;
        };
        let Ok(reply) = Frame::decode(&buf[..n]) else {
            continue;
        };
        if reply.flag != FrameFlag::FilenameResp {
            continue;
        }
        if reply.payload == b"File not found" {
            return Err(Error::FileNotFound);
        }
        if reply.payload != b"OK" {
            continue;
        }

        log::info!("handshake accepted, session migrated to {session_addr}");
        transport.send_to(&request, session_addr).await?;
        return Ok(HandshakeOutcome {
            session_addr,
            params,
        });
    }

    Err(Error::HandshakeFailed)
}

/// Decodes an inbound datagram at the parent listener as a FILENAME
/// request, if it is one.
pub fn decode_filename_request(bytes: &[u8]) -> Result<FilenameInit> {
    let frame = Frame::decode(bytes)?;
    if frame.flag != FrameFlag::Filename {
        return Err(Error::InvalidState);
    }
    FilenameInit::decode(&frame.payload)
}

/// Server-side child session confirmation: replies "OK" from the child's
/// own ephemeral socket and waits for the client's migration-ack
/// datagram (any datagram from `client_addr`). Performs one
/// confirm-and-wait round trip; the caller controls the retry budget.
pub async fn child_confirm_session<T: Datagram>(
    transport: &T,
    client_addr: SocketAddr,
    wait: Duration,
) -> Result<bool> {
    let reply = Frame::new(0, FrameFlag::FilenameResp, b"OK".to_vec()).encode();
    transport.send_to(&reply, client_addr).await?;

    let mut buf = vec![0u8; MAX_FRAME_SIZE];
    match transport.recv(&mut buf, wait).await? {
        Some((_, from)) if from == client_addr => Ok(true),
        _ => Ok(false),
    }
}

/// Server-side rejection: informs the client the requested file does
/// not exist, repeating `FILE_NOT_FOUND_RETRIES` times since this
/// reply, unlike "OK", is never itself acknowledged. No session is
/// established; the parent socket is reused.
pub async fn child_reject<T: Datagram>(transport: &T, client_addr: SocketAddr) -> Result<()> {
    let reply = Frame::new(0, FrameFlag::FilenameResp, b"File not found".to_vec()).encode();
    for _ in 0..FILE_NOT_FOUND_RETRIES {
        transport.send_to(&reply, client_addr).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackTransport;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[tokio::test]
    async fn client_handshake_succeeds_against_an_immediate_ok() {
        let (client, parent) = LoopbackTransport::pair(addr(10), addr(11));
        let params = SessionParams::new(4, 1400);

        let server_task = tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_FRAME_SIZE];
            let (n, from) = parent
                .recv(&mut buf, Duration::from_secs(1))
                .await
                .unwrap()
                .unwrap();
            let req = decode_filename_request(&buf[..n]).unwrap();
            assert_eq!(req.name, "report.pdf");

            let confirmed = child_confirm_session(&parent, from, Duration::from_millis(500))
                .await
                .unwrap();
            assert!(confirmed);
        });

        let outcome = client_handshake(&client, addr(11), "report.pdf", params)
            .await
            .unwrap();
        assert_eq!(outcome.session_addr, addr(11));
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn client_handshake_surfaces_file_not_found() {
        let (client, parent) = LoopbackTransport::pair(addr(12), addr(13));
        let params = SessionParams::new(4, 1400);

        tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_FRAME_SIZE];
            let (n, from) = parent
                .recv(&mut buf, Duration::from_secs(1))
                .await
                .unwrap()
                .unwrap();
            let _ = decode_filename_request(&buf[..n]).unwrap();
            child_reject(&parent, from).await.unwrap();
        });

        let result = client_handshake(&client, addr(13), "missing.pdf", params).await;
        assert!(matches!(result, Err(Error::FileNotFound)));
    }

    #[tokio::test]
    async fn decode_filename_request_rejects_wrong_flag() {
        let frame = Frame::rr(0).encode();
        assert!(matches!(
            decode_filename_request(&frame),
            Err(Error::InvalidState)
        ));
    }
}
