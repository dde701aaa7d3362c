//! Packet framing.

use byteorder::{BigEndian, ByteOrder};

use super::{BlockSize, Checksum};
use crate::error::{Error, Result};

/// One framed YMODEM block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    mark: u8,
    seq: u8,
    payload: Vec<u8>,
}

impl Packet {
    /// Data packet. `chunk` is zero-padded to the block size.
    pub fn data(block_size: BlockSize, seq: u8, chunk: &[u8]) -> Self {
        let len = block_size.len();
        let mut payload = Vec::with_capacity(len);
        payload.extend_from_slice(&chunk[..chunk.len().min(len)]);
        payload.resize(len, 0x00);
        Self {
            mark: block_size.mark(),
            seq,
            payload,
        }
    }

    /// File header packet: `name\0length ` at sequence 0.
    pub fn header(block_size: BlockSize, name: &str, length: usize) -> Result<Self> {
        let text = format!("{name}\0{length} ");
        if text.len() > block_size.len() {
            return Err(Error::HeaderTooLong {
                name: name.to_string(),
                block_size: block_size.len(),
            });
        }
        Ok(Self::data(block_size, 0, text.as_bytes()))
    }

    /// Empty header that closes a batch.
    pub fn end_of_batch(block_size: BlockSize) -> Self {
        Self::data(block_size, 0, b"\x000 ")
    }

    /// Start-of-block marker.
    pub fn mark(&self) -> u8 {
        self.mark
    }

    /// Sequence number.
    pub fn seq(&self) -> u8 {
        self.seq
    }

    /// One's complement of the sequence number.
    pub fn seq_complement(&self) -> u8 {
        !self.seq
    }

    /// Padded payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Wire bytes.
    pub fn encode(&self, checksum: Checksum) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 + self.payload.len() + 2);
        out.push(self.mark);
        out.push(self.seq);
        out.push(self.seq_complement());
        out.extend_from_slice(&self.payload);

        let mut trailer = [0u8; 2];
        if checksum == Checksum::Crc16 {
            BigEndian::write_u16(&mut trailer, crc16_xmodem(&self.payload));
        }
        out.extend_from_slice(&trailer);
        out
    }
}

/// CRC-16/XMODEM (polynomial 0x1021, initial value 0).
pub fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}
