//! The sliding-window sender: fills the window from a `Source`, retires
//! acknowledged frames on RR, replays on SREJ, and recovers from silence
//! with timeout-driven retransmission.

use std::net::SocketAddr;
use std::time::Duration;

use crate::buffer::{ReplayBuffer, SendWindow};
use crate::config::{
    SessionParams, EOF_ACCEPT_ANY_FROM_ATTEMPT, EOF_GIVE_UP_AFTER_ATTEMPT, HEADER_SIZE,
    MAX_FRAME_SIZE, MAX_RETRANSMIT, SENDER_DEADLOCK_TIMEOUTS, STALL_LIMIT, WINDOW_FULL_POLL_MS,
};
use crate::core::{Frame, FrameFlag};
use crate::error::Result;
use crate::io::Source;
use crate::transport::Datagram;

/// Running totals surfaced once a transfer completes, for logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct SenderStats {
    pub frames_sent: u64,
    pub retransmits: u64,
    pub srej_replays: u64,
    pub bytes_sent: u64,
}

/// Drives one outbound file transfer over an already-established session.
pub struct SenderEngine<'a, T, S> {
    transport: &'a T,
    peer_addr: SocketAddr,
    source: S,
    params: SessionParams,
    window: SendWindow,
    replay: ReplayBuffer,
    base: u32,
    next_seq: u32,
    eof_reached: bool,
    last_base: u32,
    stall_rounds: u32,
    dup_rr_value: Option<u32>,
    dup_rr_count: u32,
    stats: SenderStats,
}

impl<'a, T: Datagram, S: Source> SenderEngine<'a, T, S> {
    pub fn new(transport: &'a T, peer_addr: SocketAddr, source: S, params: SessionParams) -> Self {
        Self {
            transport,
            peer_addr,
            source,
            window: SendWindow::new(params.window_size),
            replay: ReplayBuffer::new(params.replay_capacity_packets(), params.buffer_size as usize),
            params,
            base: 0,
            next_seq: 0,
            eof_reached: false,
            last_base: 0,
            stall_rounds: 0,
            dup_rr_value: None,
            dup_rr_count: 0,
            stats: SenderStats::default(),
        }
    }

    fn window_has_room(&self) -> bool {
        self.next_seq.wrapping_sub(self.base) < self.params.window_size
    }

    async fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        let encoded = frame.encode();
        self.transport.send_to(&encoded, self.peer_addr).await?;
        self.stats.frames_sent += 1;
        Ok(())
    }

    /// Reads one chunk from the source and, if non-empty, sends it as a
    /// new DATA frame; returns `false` once the source is exhausted. After
    /// sending, drains any control frame already waiting without blocking.
    async fn fill_one(&mut self) -> Result<bool> {
        let mut buf = vec![0u8; self.params.buffer_size as usize];
        let n = self.source.read_chunk(&mut buf).await?;
        if n == 0 {
            self.eof_reached = true;
            return Ok(false);
        }
        buf.truncate(n);
        let seq = self.next_seq;
        let frame = Frame::data(seq, buf.clone());
        let encoded = frame.encode();
        self.window.insert(seq, encoded.clone(), FrameFlag::Data);
        self.replay.write(seq, &buf);
        self.transport.send_to(&encoded, self.peer_addr).await?;
        self.stats.frames_sent += 1;
        self.stats.bytes_sent += buf.len() as u64;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.drain_pending_control().await?;
        Ok(true)
    }

    /// Non-blockingly processes one control frame if one is already
    /// waiting on the transport, without stalling the fill loop.
    async fn drain_pending_control(&mut self) -> Result<()> {
        let mut buf = vec![0u8; MAX_FRAME_SIZE];
        if let Some((n, from)) = self.transport.recv(&mut buf, Duration::from_millis(0)).await? {
            if from == self.peer_addr {
                if let Ok(frame) = Frame::decode(&buf[..n]) {
                    self.process_control(frame).await?;
                }
            }
        }
        Ok(())
    }

    /// Marks `[base, value]` acknowledged and advances `base` past the
    /// acknowledged run. Returns whether `base` moved.
    fn apply_rr(&mut self, value: u32) -> bool {
        let old_base = self.base;
        let target = value.wrapping_add(1);
        // value is stale or out of range; nothing to retire.
        if target == old_base || self.next_seq.wrapping_sub(old_base) == 0 {
            return false;
        }
        let mut seq = old_base;
        while seq != target && seq != self.next_seq {
            self.window.acknowledge(seq);
            self.window.clear(seq);
            seq = seq.wrapping_add(1);
        }
        self.base = seq;
        self.base != old_base
    }

    /// Replays the frame for `seq`, reconstructed from the live window's
    /// stored payload (tagged `window_hit_flag`) if still present, or
    /// otherwise from the replay buffer (tagged `fallback_flag`) once its
    /// window record has already been retired.
    async fn replay_seq(
        &mut self,
        seq: u32,
        window_hit_flag: FrameFlag,
        fallback_flag: FrameFlag,
    ) -> Result<()> {
        if let Some(entry) = self.window.get_mut(seq) {
            entry.retransmit_count += 1;
            let payload = entry.frame[HEADER_SIZE..].to_vec();
            let encoded = Frame::new(seq, window_hit_flag, payload).encode();
            self.transport.send_to(&encoded, self.peer_addr).await?;
            self.stats.frames_sent += 1;
            self.stats.retransmits += 1;
            return Ok(());
        }
        if let Some(payload) = self.replay.read(seq) {
            let frame = Frame::new(seq, fallback_flag, payload.to_vec());
            let encoded = frame.encode();
            self.transport.send_to(&encoded, self.peer_addr).await?;
            self.stats.frames_sent += 1;
            self.stats.retransmits += 1;
        }
        Ok(())
    }

    async fn handle_srej(&mut self, value: u32) -> Result<()> {
        self.stats.srej_replays += 1;
        self.replay_seq(value, FrameFlag::ResentSrej, FrameFlag::ResentTimeout)
            .await
    }

    async fn handle_rr(&mut self, value: u32) -> Result<()> {
        let moved = self.apply_rr(value);
        if moved {
            self.dup_rr_value = None;
            self.dup_rr_count = 0;
            return Ok(());
        }
        if self.dup_rr_value == Some(value) {
            self.dup_rr_count += 1;
        } else {
            self.dup_rr_value = Some(value);
            self.dup_rr_count = 1;
        }
        if self.dup_rr_count >= 3 {
            // Fast-retransmit hint: three duplicate RRs for the same
            // value signal the receiver is missing base's successor.
            self.dup_rr_count = 0;
            self.replay_seq(value.wrapping_add(1), FrameFlag::ResentTimeout, FrameFlag::ResentTimeout)
                .await?;
        }
        Ok(())
    }

    /// Handles one received control frame. Non-control frames are ignored.
    async fn process_control(&mut self, frame: Frame) -> Result<()> {
        match frame.flag {
            FrameFlag::Rr => {
                if let Some(value) = frame.acked_value() {
                    self.handle_rr(value).await?;
                }
            }
            FrameFlag::Srej => {
                if let Some(value) = frame.acked_value() {
                    self.handle_srej(value).await?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn on_timeout(&mut self) -> Result<()> {
        if self.base == self.next_seq {
            return Ok(());
        }
        let base = self.base;
        let forced = self
            .window
            .get(base)
            .map(|e| e.retransmit_count >= MAX_RETRANSMIT)
            .unwrap_or(false);

        if self.last_base == self.base {
            self.stall_rounds += 1;
        } else {
            self.stall_rounds = 0;
            self.last_base = self.base;
        }

        if forced || self.stall_rounds >= SENDER_DEADLOCK_TIMEOUTS {
            log::debug!("forcing base {base} forward after repeated timeouts");
            self.window.clear(base);
            self.base = base.wrapping_add(1);
            self.stall_rounds = 0;
            return Ok(());
        }

        self.replay_seq(base, FrameFlag::ResentTimeout, FrameFlag::ResentTimeout)
            .await
    }

    /// Runs the transfer to completion: fills the window, drains control
    /// frames, recovers from timeouts, and closes out with an EOF
    /// retry loop once the source is exhausted and the window drains.
    pub async fn run(&mut self) -> Result<SenderStats> {
        let mut buf = vec![0u8; MAX_FRAME_SIZE];
        // Tracks wait iterations (not just genuine poll timeouts) with an
        // unmoved base, per §4.3 step 2's deadlock breaker: the fill loop
        // below always leaves the window full or eof_reached set, so the
        // poll here is always the blocking WINDOW_FULL_POLL_MS wait — it
        // can return `Some` over and over (a trickle of undecodable
        // datagrams, say) without base ever advancing. This counter forces
        // a timeout regardless of what poll reports once that's gone on
        // for STALL_LIMIT consecutive iterations.
        let mut wait_last_base = self.base;
        let mut wait_stall_rounds = 0u32;

        loop {
            while !self.eof_reached && self.window_has_room() {
                self.fill_one().await?;
            }

            if self.eof_reached && self.base == self.next_seq {
                break;
            }

            if self.base == wait_last_base {
                wait_stall_rounds += 1;
            } else {
                wait_last_base = self.base;
                wait_stall_rounds = 0;
            }

            if wait_stall_rounds >= STALL_LIMIT {
                log::debug!(
                    "base {} unmoved for {wait_stall_rounds} wait iterations; forcing timeout",
                    self.base
                );
                wait_stall_rounds = 0;
                self.on_timeout().await?;
                continue;
            }

            let poll_timeout = Duration::from_millis(WINDOW_FULL_POLL_MS);
            match self.transport.recv(&mut buf, poll_timeout).await? {
                Some((n, from)) if from == self.peer_addr => {
                    if let Ok(frame) = Frame::decode(&buf[..n]) {
                        self.process_control(frame).await?;
                    }
                }
                Some(_) => {}
                None => self.on_timeout().await?,
            }
        }

        self.terminate(&mut buf).await?;
        Ok(self.stats)
    }

    /// Sends a terminal EOF frame and retries until an RR for it is seen,
    /// accepting any valid RR once attempts grow stale, and giving up
    /// unilaterally if the far end never responds at all.
    async fn terminate(&mut self, buf: &mut [u8]) -> Result<()> {
        let eof_seq = self.next_seq;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let eof = Frame::eof(eof_seq);
            self.send_frame(&eof).await?;

            if attempt > EOF_GIVE_UP_AFTER_ATTEMPT {
                log::warn!("giving up waiting for EOF acknowledgement after {attempt} attempts");
                return Ok(());
            }

            let timeout = Duration::from_millis(WINDOW_FULL_POLL_MS);
            match self.transport.recv(buf, timeout).await? {
                Some((n, from)) if from == self.peer_addr => {
                    if let Ok(frame) = Frame::decode(&buf[..n]) {
                        if frame.flag == FrameFlag::Rr {
                            let accept_any = attempt >= EOF_ACCEPT_ANY_FROM_ATTEMPT;
                            match frame.acked_value() {
                                Some(value) if accept_any || seq_ge(value, eof_seq.wrapping_sub(1)) => {
                                    log::info!("EOF acknowledged (seq {value}) after {attempt} attempts");
                                    return Ok(());
                                }
                                _ => continue,
                            }
                        }
                    }
                }
                _ => continue,
            }
        }
    }
}

/// Sequence-number comparison tolerant of a single `u32` wraparound:
/// true if `a` is `b` or comes after it.
fn seq_ge(a: u32, b: u32) -> bool {
    a == b || a.wrapping_sub(b) < u32::MAX / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackTransport;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[tokio::test]
    async fn small_file_transfers_and_sends_eof() {
        let (sender_t, receiver_t) = LoopbackTransport::pair(addr(20), addr(21));
        let params = SessionParams::new(4, 8);
        let source = std::io::Cursor::new(b"hello world".to_vec());

        let mut engine = SenderEngine::new(&sender_t, addr(21), source, params);

        let receiver_task = tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_FRAME_SIZE];
            let mut received = Vec::new();
            loop {
                let (n, from) = receiver_t
                    .recv(&mut buf, Duration::from_secs(1))
                    .await
                    .unwrap()
                    .unwrap();
                let frame = Frame::decode(&buf[..n]).unwrap();
                if frame.flag == FrameFlag::Eof {
                    let rr = Frame::rr(frame.seq).encode();
                    receiver_t.send_to(&rr, from).await.unwrap();
                    break;
                }
                received.push((frame.seq, frame.payload.clone()));
                let rr = Frame::rr(frame.seq).encode();
                receiver_t.send_to(&rr, from).await.unwrap();
            }
            received
        });

        let stats = engine.run().await.unwrap();
        let received = receiver_task.await.unwrap();
        assert!(stats.frames_sent >= received.len() as u64);

        let mut reassembled = Vec::new();
        for (_, payload) in received {
            reassembled.extend_from_slice(&payload);
        }
        assert_eq!(reassembled, b"hello world");
    }

    #[test]
    fn window_size_matches_negotiated_params() {
        let params = SessionParams::new(2, 8);
        let window = SendWindow::new(params.window_size);
        assert_eq!(window.window_size(), 2);
    }

    /// A peer that never acknowledges anything: every `recv` immediately
    /// hands back the same undecodable frame instead of ever blocking or
    /// returning `None`, simulating a steady trickle of corrupt datagrams.
    struct GarbageTransport {
        peer: SocketAddr,
        garbage: Vec<u8>,
    }

    impl GarbageTransport {
        fn new(peer: SocketAddr) -> Self {
            let mut garbage = Frame::data(0, vec![1, 2, 3]).encode();
            let last = garbage.len() - 1;
            garbage[last] ^= 0xff;
            Self { peer, garbage }
        }
    }

    impl Datagram for GarbageTransport {
        async fn send_to(&self, _buf: &[u8], _target: SocketAddr) -> Result<()> {
            Ok(())
        }

        async fn recv(
            &self,
            buf: &mut [u8],
            _timeout: Duration,
        ) -> Result<Option<(usize, SocketAddr)>> {
            let n = self.garbage.len().min(buf.len());
            buf[..n].copy_from_slice(&self.garbage[..n]);
            Ok(Some((n, self.peer)))
        }

        fn local_addr(&self) -> Result<SocketAddr> {
            Ok(self.peer)
        }
    }

    #[tokio::test]
    async fn stalled_base_forces_progress_despite_constant_undecodable_traffic() {
        // Regression test: a real poll timeout (recv returning `None`)
        // never happens here — every `recv` call returns `Some` with a
        // frame that fails its checksum. Without the wait-loop stall
        // breaker this would spin forever with `base` stuck at 0.
        let peer = addr(60);
        let transport = GarbageTransport::new(peer);
        let params = SessionParams::new(2, 4);
        let source = std::io::Cursor::new(b"helloworld".to_vec());
        let mut engine = SenderEngine::new(&transport, peer, source, params);

        let result = tokio::time::timeout(Duration::from_secs(10), engine.run()).await;
        let stats = result
            .expect("sender must make progress instead of stalling forever")
            .unwrap();
        assert!(stats.retransmits > 0);
    }
}
