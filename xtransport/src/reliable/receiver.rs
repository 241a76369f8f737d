//! The in-order receiver: accepts DATA frames from a session endpoint,
//! delivers bytes to a `Sink` strictly in sequence order, and drives
//! recovery (SREJ on a detected gap, RR on everything else) purely from
//! what it has seen — it never retransmits anything itself.

use std::net::SocketAddr;
use std::time::Duration;

use crate::buffer::ReorderBuffer;
use crate::config::{SessionParams, DATA_TIMEOUT_MS, MAX_FRAME_SIZE, RECEIVER_MAX_CONSECUTIVE_TIMEOUTS};
use crate::core::{Frame, FrameFlag};
use crate::error::Result;
use crate::io::Sink;
use crate::transport::Datagram;

/// Running totals surfaced once a transfer completes, for logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReceiverStats {
    pub frames_received: u64,
    pub bytes_written: u64,
    pub out_of_order: u64,
    pub duplicates: u64,
}

/// Drives one inbound file transfer over an already-established session.
pub struct ReceiverEngine<'a, T, K> {
    transport: &'a T,
    peer_addr: SocketAddr,
    sink: K,
    params: SessionParams,
    reorder: ReorderBuffer,
    expected_seq: u32,
    highest_received_seq: Option<u32>,
    consecutive_timeouts: u32,
    stats: ReceiverStats,
}

impl<'a, T: Datagram, K: Sink> ReceiverEngine<'a, T, K> {
    pub fn new(transport: &'a T, peer_addr: SocketAddr, sink: K, params: SessionParams) -> Self {
        Self {
            transport,
            peer_addr,
            sink,
            reorder: ReorderBuffer::new(params.window_size),
            params,
            expected_seq: 0,
            highest_received_seq: None,
            consecutive_timeouts: 0,
            stats: ReceiverStats::default(),
        }
    }

    async fn send_rr(&self, value: u32) -> Result<()> {
        let rr = Frame::rr(value).encode();
        self.transport.send_to(&rr, self.peer_addr).await
    }

    async fn send_srej(&self, value: u32) -> Result<()> {
        let srej = Frame::srej(value).encode();
        self.transport.send_to(&srej, self.peer_addr).await
    }

    /// Delivers `expected_seq` and then drains any already-buffered
    /// frames that have become deliverable as a result.
    async fn deliver_in_order(&mut self, payload: Vec<u8>) -> Result<()> {
        self.stats.bytes_written += payload.len() as u64;
        self.sink.write_chunk(&payload).await?;
        self.expected_seq = self.expected_seq.wrapping_add(1);
        while let Some(buffered) = self.reorder.take(self.expected_seq) {
            self.stats.bytes_written += buffered.len() as u64;
            self.sink.write_chunk(&buffered).await?;
            self.expected_seq = self.expected_seq.wrapping_add(1);
        }
        Ok(())
    }

    /// Handles one decoded frame: in-order delivery, out-of-order
    /// buffering with an SREJ for the gap, or a duplicate re-ack.
    async fn on_data_frame(&mut self, frame: Frame) -> Result<()> {
        self.stats.frames_received += 1;
        self.highest_received_seq = Some(match self.highest_received_seq {
            Some(h) if seq_gt(h, frame.seq) => h,
            _ => frame.seq,
        });

        if frame.seq == self.expected_seq {
            self.deliver_in_order(frame.payload).await?;
            self.send_rr(self.expected_seq.wrapping_sub(1)).await?;
        } else if seq_gt(frame.seq, self.expected_seq) {
            self.stats.out_of_order += 1;
            self.reorder.insert(frame.seq, frame.payload);
            self.send_srej(self.expected_seq).await?;
        } else {
            self.stats.duplicates += 1;
            self.send_rr(self.expected_seq.wrapping_sub(1)).await?;
        }
        Ok(())
    }

    async fn on_eof(&mut self, payload: Vec<u8>) -> Result<()> {
        if !payload.is_empty() {
            self.stats.bytes_written += payload.len() as u64;
            self.sink.write_chunk(&payload).await?;
        }
        log::info!("received EOF at seq {}, {} bytes delivered", self.expected_seq, self.stats.bytes_written);
        let ack = if self.expected_seq == 0 { 0 } else { self.expected_seq - 1 };
        for _ in 0..3 {
            self.send_rr(ack).await?;
        }
        Ok(())
    }

    async fn on_timeout(&mut self) -> Result<bool> {
        self.consecutive_timeouts += 1;
        if self.consecutive_timeouts >= RECEIVER_MAX_CONSECUTIVE_TIMEOUTS {
            log::warn!("giving up after {} consecutive timeouts", self.consecutive_timeouts);
            let gap = self.highest_received_seq.map(|h| h.wrapping_add(1)).unwrap_or(self.expected_seq);
            self.send_srej(gap).await?;
            return Ok(false);
        }
        if let Some(highest) = self.highest_received_seq {
            self.send_rr(highest).await?;
        }
        Ok(true)
    }

    /// Runs the transfer to completion, writing bytes to the sink
    /// strictly in order. Returns once an EOF frame has been received
    /// and acknowledged, or the timeout budget is exhausted.
    pub async fn run(&mut self) -> Result<ReceiverStats> {
        let mut buf = vec![0u8; MAX_FRAME_SIZE];
        let timeout = Duration::from_millis(DATA_TIMEOUT_MS);

        loop {
            match self.transport.recv(&mut buf, timeout).await? {
                Some((n, from)) if from == self.peer_addr => {
                    self.consecutive_timeouts = 0;
                    let Ok(frame) = Frame::decode(&buf[..n]) else {
                        self.send_srej(self.expected_seq).await?;
                        continue;
                    };
                    if frame.flag == FrameFlag::Eof {
                        self.on_eof(frame.payload).await?;
                        return Ok(self.stats);
                    }
                    if frame.flag.carries_data() {
                        self.on_data_frame(frame).await?;
                    }
                }
                Some(_) => {}
                None => {
                    if !self.on_timeout().await? {
                        return Ok(self.stats);
                    }
                }
            }
        }
    }
}

/// Sequence-number comparison tolerant of a single `u32` wraparound: `a`
/// is considered greater than `b` if the forward distance from `b` to
/// `a` is shorter than the reverse distance.
fn seq_gt(a: u32, b: u32) -> bool {
    a != b && a.wrapping_sub(b) < u32::MAX / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackTransport;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    struct VecSink(Vec<u8>);
    impl Sink for VecSink {
        async fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
            self.0.extend_from_slice(data);
            Ok(())
        }
    }

    #[tokio::test]
    async fn in_order_frames_are_delivered_and_acked() {
        let (receiver_t, sender_t) = LoopbackTransport::pair(addr(30), addr(31));
        let params = SessionParams::new(4, 8);
        let sink = VecSink(Vec::new());
        let mut engine = ReceiverEngine::new(&receiver_t, addr(31), sink, params);

        tokio::spawn(async move {
            let f0 = Frame::data(0, b"hello".to_vec()).encode();
            sender_t.send_to(&f0, addr(30)).await.unwrap();

            let mut buf = vec![0u8; MAX_FRAME_SIZE];
            let _ = sender_t
                .recv(&mut buf, Duration::from_millis(200))
                .await
                .unwrap();

            let eof = Frame::eof(1).encode();
            sender_t.send_to(&eof, addr(30)).await.unwrap();
        });

        let stats = engine.run().await.unwrap();
        assert_eq!(engine.sink.0, b"hello");
        assert_eq!(stats.frames_received, 1);
    }

    #[tokio::test]
    async fn out_of_order_frame_buffers_and_drains_on_gap_fill() {
        let (receiver_t, sender_t) = LoopbackTransport::pair(addr(32), addr(33));
        let params = SessionParams::new(4, 8);
        let sink = VecSink(Vec::new());
        let mut engine = ReceiverEngine::new(&receiver_t, addr(33), sink, params);

        tokio::spawn(async move {
            let f1 = Frame::data(1, b"world".to_vec()).encode();
            sender_t.send_to(&f1, addr(32)).await.unwrap();

            let mut buf = vec![0u8; MAX_FRAME_SIZE];
            let _ = sender_t
                .recv(&mut buf, Duration::from_millis(200))
                .await
                .unwrap();

            let f0 = Frame::data(0, b"hello".to_vec()).encode();
            sender_t.send_to(&f0, addr(32)).await.unwrap();

            let _ = sender_t
                .recv(&mut buf, Duration::from_millis(200))
                .await
                .unwrap();

            let eof = Frame::eof(2).encode();
            sender_t.send_to(&eof, addr(32)).await.unwrap();
        });

        let stats = engine.run().await.unwrap();
        assert_eq!(engine.sink.0, b"helloworld");
        assert!(stats.out_of_order >= 1);
    }

    #[test]
    fn seq_gt_handles_wraparound() {
        assert!(seq_gt(1, 0));
        assert!(!seq_gt(0, 1));
        assert!(seq_gt(0, u32::MAX));
        assert!(!seq_gt(u32::MAX, 0));
    }

    // End-to-end pairings of a live `SenderEngine` against a live
    // `ReceiverEngine`, exercising the full protocol rather than either
    // engine's reaction to hand-crafted frames.

    use crate::reliable::SenderEngine;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Drops the first DATA frame matching `target_seq`, then passes
    /// everything else through untouched.
    struct DropOnce<T> {
        inner: T,
        target_seq: u32,
        dropped: AtomicBool,
    }

    impl<T: crate::transport::Datagram> crate::transport::Datagram for DropOnce<T> {
        async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<()> {
            if !self.dropped.load(Ordering::SeqCst) {
                if let Ok(frame) = Frame::decode(buf) {
                    if frame.flag == FrameFlag::Data && frame.seq == self.target_seq {
                        self.dropped.store(true, Ordering::SeqCst);
                        return Ok(());
                    }
                }
            }
            self.inner.send_to(buf, target).await
        }

        async fn recv(
            &self,
            buf: &mut [u8],
            timeout: Duration,
        ) -> Result<Option<(usize, SocketAddr)>> {
            self.inner.recv(buf, timeout).await
        }

        fn local_addr(&self) -> Result<SocketAddr> {
            self.inner.local_addr()
        }
    }

    #[tokio::test]
    async fn clean_small_file_round_trips_through_sender_and_receiver() {
        let (sender_t, receiver_t) = LoopbackTransport::pair(addr(50), addr(51));
        let params = SessionParams::new(5, 1000);
        let data = vec![7u8; 900];
        let source = std::io::Cursor::new(data.clone());
        let sink = VecSink(Vec::new());

        let mut sender = SenderEngine::new(&sender_t, addr(51), source, params);
        let mut receiver = ReceiverEngine::new(&receiver_t, addr(50), sink, params);

        let (sender_result, receiver_result) = tokio::join!(sender.run(), receiver.run());
        let sender_stats = sender_result.unwrap();
        let receiver_stats = receiver_result.unwrap();

        assert_eq!(receiver.sink.0, data);
        assert_eq!(sender_stats.frames_sent, 2); // one DATA frame, one EOF
        assert_eq!(receiver_stats.frames_received, 1);
    }

    #[tokio::test]
    async fn zero_byte_source_yields_empty_sink_and_no_data_frames() {
        let (sender_t, receiver_t) = LoopbackTransport::pair(addr(52), addr(53));
        let params = SessionParams::new(4, 100);
        let source = std::io::Cursor::new(Vec::<u8>::new());
        let sink = VecSink(Vec::new());

        let mut sender = SenderEngine::new(&sender_t, addr(53), source, params);
        let mut receiver = ReceiverEngine::new(&receiver_t, addr(52), sink, params);

        let (sender_result, receiver_result) = tokio::join!(sender.run(), receiver.run());
        let receiver_stats = receiver_result.unwrap();
        sender_result.unwrap();

        assert!(receiver.sink.0.is_empty());
        assert_eq!(receiver_stats.frames_received, 0);
    }

    #[tokio::test]
    async fn mid_stream_drop_is_recovered_by_srej() {
        let (sender_raw, receiver_t) = LoopbackTransport::pair(addr(54), addr(55));
        let sender_t = DropOnce {
            inner: sender_raw,
            target_seq: 2,
            dropped: AtomicBool::new(false),
        };
        let params = SessionParams::new(10, 100);
        let data: Vec<u8> = (0..1000u32).map(|b| b as u8).collect();
        let source = std::io::Cursor::new(data.clone());
        let sink = VecSink(Vec::new());

        let mut sender = SenderEngine::new(&sender_t, addr(55), source, params);
        let mut receiver = ReceiverEngine::new(&receiver_t, addr(54), sink, params);

        let (sender_result, receiver_result) = tokio::join!(sender.run(), receiver.run());
        sender_result.unwrap();
        let receiver_stats = receiver_result.unwrap();

        assert_eq!(receiver.sink.0, data);
        assert!(receiver_stats.out_of_order >= 1);
    }
}
