//! Frame definition and serialization for the transport protocol.
//!
//! A frame is the only unit of transmission in the protocol: a 7-byte
//! header followed by 0..=1400 payload bytes.
//!
//! ```text
//! 0                   1                   2                   3
//! 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         Sequence Number                       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           Checksum           |     Flag      |   Payload...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use super::checksum::internet_checksum;
use crate::config::{HEADER_SIZE, MAX_FRAME_SIZE};
use crate::error::{Error, Result};

/// The 8-bit frame kind carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFlag {
    /// Receive-ready: cumulative acknowledgement.
    Rr = 5,
    /// Selective reject: request retransmission of one sequence number.
    Srej = 6,
    /// Client-to-server filename request (handshake).
    Filename = 8,
    /// Server-to-client filename response (handshake).
    FilenameResp = 9,
    /// End of file.
    Eof = 10,
    /// Ordinary data segment.
    Data = 16,
    /// Data segment re-sent in response to an SREJ.
    ResentSrej = 17,
    /// Data segment re-sent after a retransmit timeout.
    ResentTimeout = 18,
}

impl FrameFlag {
    fn try_from_u8(value: u8) -> Option<Self> {
        match value {
            5 => Some(FrameFlag::Rr),
            6 => Some(FrameFlag::Srej),
            8 => Some(FrameFlag::Filename),
            9 => Some(FrameFlag::FilenameResp),
            10 => Some(FrameFlag::Eof),
            16 => Some(FrameFlag::Data),
            17 => Some(FrameFlag::ResentSrej),
            18 => Some(FrameFlag::ResentTimeout),
            _ => None,
        }
    }

    /// True for the three flags that carry a data payload delivered to the sink.
    pub fn carries_data(&self) -> bool {
        matches!(
            self,
            FrameFlag::Data | FrameFlag::ResentSrej | FrameFlag::ResentTimeout
        )
    }
}

/// A single protocol datagram: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub seq: u32,
    pub flag: FrameFlag,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(seq: u32, flag: FrameFlag, payload: Vec<u8>) -> Self {
        Self { seq, flag, payload }
    }

    pub fn data(seq: u32, payload: Vec<u8>) -> Self {
        Self::new(seq, FrameFlag::Data, payload)
    }

    /// Builds an RR or SREJ frame, duplicating `value` into both the
    /// header `seq` field and the first four payload bytes.
    fn control(flag: FrameFlag, value: u32) -> Self {
        Self::new(value, flag, value.to_be_bytes().to_vec())
    }

    pub fn rr(value: u32) -> Self {
        Self::control(FrameFlag::Rr, value)
    }

    pub fn srej(value: u32) -> Self {
        Self::control(FrameFlag::Srej, value)
    }

    pub fn eof(seq: u32) -> Self {
        Self::new(seq, FrameFlag::Eof, Vec::new())
    }

    /// For RR/SREJ frames, returns the carried value if the header `seq`
    /// and the duplicated payload value agree; `None` otherwise (either
    /// wrong flag, short payload, or the two values disagree).
    pub fn acked_value(&self) -> Option<u32> {
        if !matches!(self.flag, FrameFlag::Rr | FrameFlag::Srej) {
            return None;
        }
        if self.payload.len() < 4 {
            return None;
        }
        let payload_value = u32::from_be_bytes(self.payload[0..4].try_into().unwrap());
        if payload_value != self.seq {
            return None;
        }
        Some(self.seq)
    }

    /// Encodes the frame to wire bytes: header with checksum field zeroed,
    /// payload appended, then the Internet checksum computed and written
    /// back into the checksum field.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&self.seq.to_be_bytes());
        buf.extend_from_slice(&[0, 0]);
        buf.push(self.flag as u8);
        buf.extend_from_slice(&self.payload);
        let checksum = internet_checksum(&buf);
        buf[4..6].copy_from_slice(&checksum.to_be_bytes());
        buf
    }

    /// Decodes wire bytes into a frame, verifying length, checksum, and flag.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE || bytes.len() > MAX_FRAME_SIZE {
            return Err(Error::CorruptFrame);
        }
        let seq = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
        let received_checksum = u16::from_be_bytes([bytes[4], bytes[5]]);
        let flag_byte = bytes[6];

        let mut verify_buf = bytes.to_vec();
        verify_buf[4] = 0;
        verify_buf[5] = 0;
        if internet_checksum(&verify_buf) != received_checksum {
            return Err(Error::CorruptFrame);
        }

        let flag = FrameFlag::try_from_u8(flag_byte).ok_or(Error::CorruptFrame)?;
        Ok(Frame {
            seq,
            flag,
            payload: bytes[HEADER_SIZE..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_data_frame() {
        let frame = Frame::data(42, b"hello world".to_vec());
        let encoded = frame.encode();
        assert!(encoded.len() <= MAX_FRAME_SIZE);
        let decoded = Frame::decode(&encoded).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn round_trip_empty_payload() {
        let frame = Frame::eof(7);
        let encoded = frame.encode();
        assert_eq!(encoded.len(), HEADER_SIZE);
        let decoded = Frame::decode(&encoded).unwrap();
        assert_eq!(decoded.flag, FrameFlag::Eof);
        assert_eq!(decoded.seq, 7);
    }

    #[test]
    fn rr_carries_duplicated_ack_value() {
        let frame = Frame::rr(99);
        let encoded = frame.encode();
        let decoded = Frame::decode(&encoded).unwrap();
        assert_eq!(decoded.acked_value(), Some(99));
    }

    #[test]
    fn corrupted_byte_is_rejected() {
        let frame = Frame::data(1, b"payload".to_vec());
        let mut encoded = frame.encode();
        let last = encoded.len() - 1;
        encoded[last] ^= 0xff;
        assert!(matches!(Frame::decode(&encoded), Err(Error::CorruptFrame)));
    }

    #[test]
    fn too_short_is_rejected() {
        assert!(matches!(Frame::decode(&[1, 2, 3]), Err(Error::CorruptFrame)));
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let mut frame = Frame::data(1, Vec::new()).encode();
        frame[6] = 200;
        // Recompute checksum around the tampered flag so only the flag,
        // not the checksum, is under test.
        frame[4] = 0;
        frame[5] = 0;
        let checksum = internet_checksum(&frame);
        frame[4..6].copy_from_slice(&checksum.to_be_bytes());
        assert!(matches!(Frame::decode(&frame), Err(Error::CorruptFrame)));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let oversized = vec![0u8; MAX_FRAME_SIZE + 1];
        assert!(matches!(Frame::decode(&oversized), Err(Error::CorruptFrame)));
    }
}
