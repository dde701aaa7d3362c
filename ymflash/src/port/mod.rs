//! Transport abstraction for serial communication.
//!
//! The protocol layers (YMODEM engine, trigger matcher, chunked reader) only
//! see the [`Transport`] trait. The native implementation over the
//! `serialport` crate lives in [`native`].
//!
//! ```text
//! +---------------------------------------+
//! |  ymodem engine | trigger | commands   |
//! +---------------------------------------+
//!                    |
//!                    v
//! +---------------------------------------+
//! |  Transport trait (open/send/drain/..) |
//! +---------------------------------------+
//!          |                    |
//!          v                    v
//! +-----------------+  +------------------+
//! | NativePort      |  | test transports  |
//! | (serialport)    |  |                  |
//! +-----------------+  +------------------+
//! ```
//!
//! Reads follow `std::io::Read` with a short poll timeout: "no data yet" is
//! reported as `TimedOut`, `WouldBlock` or `Ok(0)`, which [`read_some`]
//! normalises to `Ok(0)`.

#[cfg(feature = "native")]
pub mod native;

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Serial port configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyACM0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read poll timeout.
    pub timeout: Duration,
    /// Data bits (typically 8).
    pub data_bits: DataBits,
    /// Parity (typically None).
    pub parity: Parity,
    /// Stop bits (typically One).
    pub stop_bits: StopBits,
    /// Flow control (typically None).
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 9600,
            timeout: Duration::from_millis(20),
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the read poll timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Number of data bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataBits {
    /// 7 data bits.
    Seven,
    /// 8 data bits.
    #[default]
    Eight,
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    /// No parity.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    /// 1 stop bit.
    #[default]
    One,
    /// 2 stop bits.
    Two,
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowControl {
    /// No flow control.
    #[default]
    None,
    /// Hardware flow control (RTS/CTS).
    Hardware,
    /// Software flow control (XON/XOFF).
    Software,
}

/// Duplex byte channel to a device.
///
/// A transport is owned by exactly one session (engine or trigger matcher)
/// at a time. Opening it twice is a programming error and reported as
/// [`Error::AlreadyOpen`](crate::Error::AlreadyOpen).
pub trait Transport: Read + Write + Send {
    /// Open the underlying channel.
    fn open(&mut self) -> Result<()>;

    /// Whether the channel is open.
    fn is_open(&self) -> bool;

    /// Discard input received but not yet read.
    fn flush_input(&mut self) -> Result<()>;

    /// Block until everything written has left the host.
    fn drain(&mut self) -> Result<()>;

    /// Close the channel. Safe to call when it was never opened.
    fn close(&mut self);

    /// Port name/path, for diagnostics.
    fn name(&self) -> &str;

    /// Set how long a single read waits for data.
    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Sequenced write: discard stale input, write, then wait for drain.
    ///
    /// Flushing first keeps bytes already in flight from being taken as the
    /// answer to what is written now.
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.flush_input()?;
        self.write_all(bytes)?;
        self.drain()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn flush_input(&mut self) -> Result<()> {
        (**self).flush_input()
    }

    fn drain(&mut self) -> Result<()> {
        (**self).drain()
    }

    fn close(&mut self) {
        (**self).close();
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        (**self).set_timeout(timeout)
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes)
    }
}

/// Read whatever is available, treating "nothing within the poll timeout" as `Ok(0)`.
pub fn read_some<T: Transport + ?Sized>(port: &mut T, buf: &mut [u8]) -> Result<usize> {
    match port.read(buf) {
        Ok(n) => Ok(n),
        Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(0),
        Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
        Err(e) => Err(e.into()),
    }
}

#[cfg(feature = "native")]
pub use native::NativePort;
