//! Error types for ymflash.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for ymflash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for ymflash operations.
///
/// Every transfer failure is terminal for the whole batch; nothing here is
/// retried by the library.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (transport or file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Neither a CRC16 request nor the ready prompt arrived in time.
    #[error("no response from device")]
    HandshakeTimeout,

    /// A file header (or the end-of-batch header) was answered with anything but ACK.
    #[error("file header not acknowledged (device replied {response})")]
    HeaderRejected {
        /// Rendering of the bytes the device sent back.
        response: String,
    },

    /// No acknowledgement arrived for a packet within the packet timeout.
    #[error("timed out waiting for acknowledgement of packet {seq}")]
    PacketTimeout {
        /// Sequence number of the unacknowledged packet.
        seq: u8,
    },

    /// The receiver answered a packet with NAK.
    #[error("packet {seq} rejected by device")]
    PacketRejected {
        /// Sequence number of the rejected packet.
        seq: u8,
    },

    /// The receiver sent two consecutive CAN bytes.
    #[error("Transfer cancelled")]
    TransferCancelled,

    /// The receiver answered with a byte that is not a valid response.
    #[error("unknown message: 0x{0:02X}")]
    UnknownResponse(u8),

    /// An input file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    SourceFileUnreadable {
        /// Path of the offending file.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: io::Error,
    },

    /// Block size other than 128 or 1024.
    #[error("invalid block size {0} (expected 128 or 1024)")]
    InvalidBlockSize(usize),

    /// The header text does not fit in a single block.
    #[error("file header for '{name}' does not fit in a {block_size}-byte block")]
    HeaderTooLong {
        /// File name that was being encoded.
        name: String,
        /// Block size in use.
        block_size: usize,
    },

    /// A transfer was requested without any file.
    #[error("no files to send")]
    NoFiles,

    /// A trigger was registered with an empty prompt.
    #[error("prompt must be specified")]
    EmptyPrompt,

    /// The port is already open by another session.
    #[error("port {0} is already open")]
    AlreadyOpen(String),

    /// The port is not open.
    #[error("port is closed")]
    PortClosed,

    /// Timed out waiting for device output.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Device not found on any serial port.
    #[error("Device not found")]
    DeviceNotFound,

    /// The device asked for a value the caller did not supply.
    #[error("device asked for {0} but none was supplied")]
    MissingCredential(&'static str),

    /// The device replied with text that could not be interpreted.
    #[error("unexpected reply from device: {0}")]
    UnexpectedReply(String),

    /// Invalid transfer state for the requested operation.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Whether the error came from a response deadline expiring.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::HandshakeTimeout | Self::PacketTimeout { .. } | Self::Timeout(_)
        )
    }
}
