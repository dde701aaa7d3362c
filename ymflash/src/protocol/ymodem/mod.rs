//! YMODEM firmware transfer.
//!
//! This is the simplified YMODEM dialect spoken by the serial bootloader of
//! Particle-style devices. A batch looks like this on the wire:
//!
//! ```text
//! host                                  device
//!  | -- 'f' (command mode only) ---------> |
//!  | <--------------- 'C' or ready prompt  |
//!  | -- header(seq 0, "name\0len ") -----> |
//!  | <------------------------- ACK 'C'    |
//!  | -- data(seq 1..) -------------------> |   one packet in flight
//!  | <------------------------------ ACK   |
//!  | -- EOT -----------------------------> |
//!  | <------------------------------ ACK   |
//!  |        ... next file ...              |
//!  | -- header(seq 0, "\00 ") -----------> |   end of batch
//!  | <------------------------------ ACK   |
//! ```
//!
//! Packet format:
//!
//! ```text
//! +------+-----+------+-------------------+----------+
//! | MARK | SEQ | ~SEQ | PAYLOAD (128/1024)| CHECKSUM |
//! +------+-----+------+-------------------+----------+
//! | 1    | 1   | 1    | block size        | 2        |
//! +------+-----+------+-------------------+----------+
//! ```
//!
//! The checksum field is two zero bytes unless [`Checksum::Crc16`] is
//! selected. Rejected packets are never retransmitted: a NAK, a cancel or
//! an unknown reply ends the whole batch.
//!
//! [`Transfer`] is the protocol state machine and performs no I/O;
//! [`YmodemSender`] drives it over a [`Transport`](crate::port::Transport).

mod packet;
mod response;
mod sender;
mod transfer;

use std::time::Duration;

use crate::error::{Error, Result};

pub use packet::{Packet, crc16_xmodem};
pub use response::{Response, classify};
pub use sender::{YmodemSender, send_files};
pub use transfer::{Action, FileImage, Transfer, TransferEvent, TransferState};

/// YMODEM control characters.
pub mod control {
    /// Start of a 128-byte block.
    pub const SOH: u8 = 0x01;
    /// Start of a 1024-byte block.
    pub const STX: u8 = 0x02;
    /// End of transmission.
    pub const EOT: u8 = 0x04;
    /// Acknowledge.
    pub const ACK: u8 = 0x06;
    /// Negative acknowledge.
    pub const NAK: u8 = 0x15;
    /// Cancel. Only meaningful twice in a row.
    pub const CAN: u8 = 0x18;
    /// CRC16 mode request.
    pub const CRC16: u8 = b'C';
    /// Abort key understood by the bootloader prompt.
    pub const ABORT1: u8 = b'A';
    /// Abort key understood by the bootloader prompt (lower case).
    pub const ABORT2: u8 = b'a';

    /// Sequence written to the device when the host gives up.
    pub const CANCEL_SEQUENCE: [u8; 2] = [CAN, CAN];

    /// Mnemonic for a control byte, for logs.
    pub fn name(byte: u8) -> Option<&'static str> {
        Some(match byte {
            SOH => "SOH",
            STX => "STX",
            EOT => "EOT",
            ACK => "ACK",
            NAK => "NAK",
            CAN => "CA",
            CRC16 => "CRC16",
            ABORT1 => "ABORT1",
            ABORT2 => "ABORT2",
            _ => return None,
        })
    }
}

/// Render a received fragment for trace output.
///
/// Short fragments are almost always control bytes, so they are shown by name.
pub(crate) fn describe(bytes: &[u8]) -> String {
    if bytes.len() <= 2 {
        bytes
            .iter()
            .map(|&b| control::name(b).map_or_else(|| format!("0x{b:02X}"), str::to_string))
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        format!("{bytes:02X?} {:?}", String::from_utf8_lossy(bytes))
    }
}

/// Payload length of every packet in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockSize {
    /// 128-byte blocks, framed with SOH.
    #[default]
    Standard,
    /// 1024-byte blocks, framed with STX.
    OneK,
}

impl BlockSize {
    /// Start-of-block marker for this size.
    pub fn mark(self) -> u8 {
        match self {
            Self::Standard => control::SOH,
            Self::OneK => control::STX,
        }
    }

    /// Payload length in bytes.
    pub fn len(self) -> usize {
        match self {
            Self::Standard => 128,
            Self::OneK => 1024,
        }
    }
}

impl TryFrom<usize> for BlockSize {
    type Error = Error;

    fn try_from(len: usize) -> Result<Self> {
        match len {
            128 => Ok(Self::Standard),
            1024 => Ok(Self::OneK),
            other => Err(Error::InvalidBlockSize(other)),
        }
    }
}

/// Content of the two trailing checksum bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Checksum {
    /// Two zero bytes, which is what the bootloader expects.
    #[default]
    Zeroed,
    /// CRC-16/XMODEM of the payload, big-endian.
    Crc16,
}

/// Name written into each file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderName {
    /// The same name for every file.
    Fixed(String),
    /// Each file's own name.
    FileName,
}

impl Default for HeaderName {
    fn default() -> Self {
        Self::Fixed(DEFAULT_HEADER_NAME.to_string())
    }
}

/// Header name the bootloader is sent unless told otherwise.
pub const DEFAULT_HEADER_NAME: &str = "binary";

/// YMODEM session options.
#[derive(Debug, Clone)]
pub struct YmodemConfig {
    /// Payload length.
    pub block_size: BlockSize,
    /// Whether the device is already waiting for a transfer. When false the
    /// trigger byte is written first.
    pub listening_mode: bool,
    /// Checksum field content.
    pub checksum: Checksum,
    /// How long to wait for the device to request the transfer.
    pub handshake_timeout: Duration,
    /// How long to wait for each acknowledgement.
    pub packet_timeout: Duration,
    /// Read poll interval of the driver.
    pub poll_interval: Duration,
    /// Byte that puts a device in command mode into receive mode.
    pub trigger_byte: u8,
    /// Text printed by a listening device when it is ready.
    pub ready_prompt: String,
    /// Name carried by header packets.
    pub header_name: HeaderName,
}

/// Ready prompt printed by the bootloader in listening mode.
pub const READY_PROMPT: &str = "Waiting for the binary file to be sent ... (press 'a' to abort)";

impl Default for YmodemConfig {
    fn default() -> Self {
        Self {
            block_size: BlockSize::Standard,
            listening_mode: true,
            checksum: Checksum::Zeroed,
            handshake_timeout: Duration::from_millis(5000),
            packet_timeout: Duration::from_millis(10000),
            poll_interval: Duration::from_millis(20),
            trigger_byte: b'f',
            ready_prompt: READY_PROMPT.to_string(),
            header_name: HeaderName::default(),
        }
    }
}

impl YmodemConfig {
    /// Set the block size.
    #[must_use]
    pub fn with_block_size(mut self, block_size: BlockSize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set listening mode.
    #[must_use]
    pub fn with_listening_mode(mut self, listening: bool) -> Self {
        self.listening_mode = listening;
        self
    }

    /// Set the checksum mode.
    #[must_use]
    pub fn with_checksum(mut self, checksum: Checksum) -> Self {
        self.checksum = checksum;
        self
    }

    /// Set the handshake timeout.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the per-packet acknowledgement timeout.
    #[must_use]
    pub fn with_packet_timeout(mut self, timeout: Duration) -> Self {
        self.packet_timeout = timeout;
        self
    }

    /// Set the header name.
    #[must_use]
    pub fn with_header_name(mut self, header_name: HeaderName) -> Self {
        self.header_name = header_name;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_size_try_from() {
        assert_eq!(BlockSize::try_from(128).unwrap(), BlockSize::Standard);
        assert_eq!(BlockSize::try_from(1024).unwrap(), BlockSize::OneK);
        assert!(matches!(
            BlockSize::try_from(512),
            Err(Error::InvalidBlockSize(512))
        ));
    }

    #[test]
    fn test_block_size_selects_mark() {
        assert_eq!(BlockSize::Standard.mark(), control::SOH);
        assert_eq!(BlockSize::OneK.mark(), control::STX);
    }

    #[test]
    fn test_default_config() {
        let config = YmodemConfig::default();
        assert_eq!(config.block_size, BlockSize::Standard);
        assert!(config.listening_mode);
        assert_eq!(config.checksum, Checksum::Zeroed);
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.packet_timeout, Duration::from_secs(10));
        assert_eq!(config.trigger_byte, b'f');
        assert_eq!(config.header_name, HeaderName::Fixed("binary".to_string()));
    }

    #[test]
    fn test_describe_short_fragments_by_name() {
        assert_eq!(describe(&[control::ACK, control::CRC16]), "ACK CRC16");
        assert_eq!(describe(&[0x7E]), "0x7E");
        assert!(describe(b"hello").contains("hello"));
    }
}
