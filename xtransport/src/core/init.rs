//! The filename init payload carried by FILENAME frames.

use crate::config::{INIT_PAYLOAD_SIZE, MAX_DATA_SIZE, NAME_FIELD_SIZE};
use crate::error::{Error, Result};

/// The requested filename plus the client's chosen window and buffer size,
/// encoded as a fixed 109-byte layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameInit {
    pub name: String,
    pub window_size: u32,
    pub buffer_size: u32,
}

impl FilenameInit {
    pub fn new(name: impl Into<String>, window_size: u32, buffer_size: u32) -> Self {
        Self {
            name: name.into(),
            window_size,
            buffer_size,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.name.is_empty() || self.name.len() >= NAME_FIELD_SIZE || !self.name.is_ascii() {
            return Err(Error::InvalidInit);
        }
        let mut buf = vec![0u8; INIT_PAYLOAD_SIZE];
        buf[..self.name.len()].copy_from_slice(self.name.as_bytes());
        buf[NAME_FIELD_SIZE..NAME_FIELD_SIZE + 4].copy_from_slice(&self.window_size.to_be_bytes());
        buf[NAME_FIELD_SIZE + 4..NAME_FIELD_SIZE + 8]
            .copy_from_slice(&self.buffer_size.to_be_bytes());
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < INIT_PAYLOAD_SIZE {
            return Err(Error::InvalidInit);
        }
        let name_field = &bytes[..NAME_FIELD_SIZE];
        let name_end = name_field.iter().position(|&b| b == 0).unwrap_or(NAME_FIELD_SIZE);
        if name_end == 0 {
            return Err(Error::InvalidInit);
        }
        let name = std::str::from_utf8(&name_field[..name_end])
            .map_err(|_| Error::InvalidInit)?
            .to_owned();

        let window_size =
            u32::from_be_bytes(bytes[NAME_FIELD_SIZE..NAME_FIELD_SIZE + 4].try_into().unwrap());
        let buffer_size = u32::from_be_bytes(
            bytes[NAME_FIELD_SIZE + 4..NAME_FIELD_SIZE + 8]
                .try_into()
                .unwrap(),
        );

        if window_size == 0 || window_size >= (1 << 30) {
            return Err(Error::InvalidInit);
        }
        if buffer_size == 0 || buffer_size as usize > MAX_DATA_SIZE {
            return Err(Error::InvalidInit);
        }

        Ok(Self {
            name,
            window_size,
            buffer_size,
        })
    }
}
