//! # ymflash
//!
//! Serial firmware transfer and console interaction for Particle-style
//! devices.
//!
//! This crate provides:
//!
//! - A YMODEM batch sender for the device's serial bootloader
//! - A debounced chunker that regroups fragmented serial reads
//! - A prompt trigger matcher for scripted console dialogues
//! - Device identification, MAC address query, claim code and Wi-Fi
//!   credential entry built on the above
//! - Serial port discovery
//!
//! ## Features
//!
//! - `native` (default): Serial port support via the `serialport` crate
//! - `serde`: Serialization support for data types
//!
//! ## Example
//!
//! ```rust,no_run
//! use ymflash::{NativePort, SerialConfig, YmodemConfig, send_files};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut port = NativePort::new(SerialConfig::new("/dev/ttyACM0", 28800));
//!     send_files(&mut port, &["firmware.bin"], YmodemConfig::default())?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod device;
pub mod error;
pub mod interact;
pub mod port;
pub mod protocol;
pub mod stream;
pub mod text;

#[cfg(test)]
mod testing;

#[cfg(feature = "native")]
pub use {device::auto_detect_port, port::NativePort};
pub use {
    clock::{Clock, ManualClock, SystemClock},
    device::{DetectedPort, DeviceKind, detect_ports, format_port_list, select_port},
    error::{Error, Result},
    interact::{
        Cipher, DeviceIdentity, InteractOptions, Security, WifiCredentials, configure_wifi,
        identify, issue_command, mac_address, set_claim_code,
    },
    port::{SerialConfig, Transport},
    protocol::{
        BlockSize, Checksum, FileImage, HeaderName, Transfer, TransferEvent, YmodemConfig,
        YmodemSender, send_files,
    },
    stream::{ChunkReader, DebouncedChunker, Responder, ResponseLog, TriggerMatcher},
    text::{clean_text, drain_utf8_lossy},
};
