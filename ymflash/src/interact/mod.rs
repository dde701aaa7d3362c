//! Interactive serial exchanges with a device in listening mode.
//!
//! Each exchange writes a single-letter command and reads the debounced
//! reply. The port is opened if needed and always closed afterwards, so
//! exchanges can be chained freely with YMODEM transfers on the same port.

mod claim;
mod identify;
mod mac;
mod wifi;

use std::time::Duration;

use log::debug;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::port::Transport;
use crate::stream::{ChunkReader, DEFAULT_QUIET_PERIOD, DebouncedChunker};

pub use claim::set_claim_code;
pub use identify::{DeviceIdentity, identify, parse_device_id, parse_firmware_version};
pub use mac::{mac_address, parse_mac_address};
pub use wifi::{Cipher, Security, WifiCredentials, configure_wifi};

/// Timing of interactive exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractOptions {
    /// Silence that ends one burst of device output.
    pub quiet_period: Duration,
    /// How long the device may stay silent before the exchange fails.
    pub idle_timeout: Duration,
}

impl Default for InteractOptions {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_QUIET_PERIOD,
            idle_timeout: Duration::from_millis(5000),
        }
    }
}

/// Send `command` and return the device's reply as text.
pub fn issue_command<T, C>(
    port: &mut T,
    clock: &C,
    command: &str,
    options: &InteractOptions,
) -> Result<String>
where
    T: Transport + ?Sized,
    C: Clock,
{
    if !port.is_open() {
        port.open()?;
    }
    let outcome = exchange(port, clock, command, options);
    port.close();
    outcome
}

fn exchange<T, C>(port: &mut T, clock: &C, command: &str, options: &InteractOptions) -> Result<String>
where
    T: Transport + ?Sized,
    C: Clock,
{
    debug!("Issuing serial command {command:?}");
    port.send(command.as_bytes())?;

    let chunker = DebouncedChunker::new(clock, options.quiet_period);
    let mut reader = ChunkReader::new(port, chunker);
    match reader.next_chunk(Some(options.idle_timeout))? {
        Some(chunk) => Ok(String::from_utf8_lossy(&chunk).into_owned()),
        None => Err(Error::Timeout(format!(
            "no reply to serial command {command:?}"
        ))),
    }
}
