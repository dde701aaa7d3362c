//! Wire protocols spoken to devices.

pub mod ymodem;

pub use ymodem::{
    BlockSize, Checksum, FileImage, HeaderName, Transfer, TransferEvent, YmodemConfig, YmodemSender,
    send_files,
};
