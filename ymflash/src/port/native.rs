//! Native serial transport using the `serialport` crate.
//!
//! The OS handle is created in [`Transport::open`], not at construction, so a
//! `NativePort` can be handed to a session before the device is opened, and
//! closing it is just dropping the handle.

use {
    crate::{
        error::{Error, Result},
        port::{DataBits, FlowControl, Parity, SerialConfig, StopBits, Transport},
    },
    log::{debug, trace},
    serialport::ClearBuffer,
    std::{
        io::{Read, Write},
        time::Duration,
    },
};

/// Serial port transport for Linux, macOS and Windows.
pub struct NativePort {
    port: Option<Box<dyn serialport::SerialPort>>,
    config: SerialConfig,
}

impl NativePort {
    /// Prepare a port; nothing is opened yet.
    pub fn new(config: SerialConfig) -> Self {
        Self { port: None, config }
    }

    /// Prepare and immediately open a port.
    pub fn open_with(config: SerialConfig) -> Result<Self> {
        let mut port = Self::new(config);
        port.open()?;
        Ok(port)
    }

    /// Configuration this port was created with.
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    fn handle(&mut self) -> std::io::Result<&mut Box<dyn serialport::SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "port closed"))
    }
}

impl Transport for NativePort {
    fn open(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Err(Error::AlreadyOpen(self.config.port_name.clone()));
        }

        debug!(
            "Opening {} at {} baud",
            self.config.port_name, self.config.baud_rate
        );
        let port = serialport::new(&self.config.port_name, self.config.baud_rate)
            .timeout(self.config.timeout)
            .data_bits(self.config.data_bits.into())
            .parity(self.config.parity.into())
            .stop_bits(self.config.stop_bits.into())
            .flow_control(self.config.flow_control.into())
            .open()?;

        self.port = Some(port);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn flush_input(&mut self) -> Result<()> {
        match self.port {
            Some(ref mut p) => {
                p.clear(ClearBuffer::Input)?;
                Ok(())
            },
            None => Err(Error::PortClosed),
        }
    }

    fn drain(&mut self) -> Result<()> {
        // serialport's flush waits for the OS output queue to empty (tcdrain on Unix).
        self.handle()?.flush()?;
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            trace!("Closed {}", self.config.port_name);
        }
    }

    fn name(&self) -> &str {
        &self.config.port_name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        if let Some(ref mut p) = self.port {
            p.set_timeout(timeout)?;
        }
        self.config.timeout = timeout;
        Ok(())
    }
}

impl Read for NativePort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.handle()?.read(buf)
    }
}

impl Write for NativePort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.handle()?.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.handle()?.flush()
    }
}

impl Drop for NativePort {
    fn drop(&mut self) {
        self.close();
    }
}

// Type conversions from our types to serialport types

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Seven => Self::Seven,
            DataBits::Eight => Self::Eight,
        }
    }
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => Self::None,
            Parity::Odd => Self::Odd,
            Parity::Even => Self::Even,
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => Self::One,
            StopBits::Two => Self::Two,
        }
    }
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => Self::None,
            FlowControl::Hardware => Self::Hardware,
            FlowControl::Software => Self::Software,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_port_is_not_open() {
        let port = NativePort::new(SerialConfig::new("/dev/ttyACM0", 28800));
        assert!(!port.is_open());
        assert_eq!(port.name(), "/dev/ttyACM0");
        assert_eq!(port.config().baud_rate, 28800);
    }

    #[test]
    fn test_io_on_closed_port_fails() {
        let mut port = NativePort::new(SerialConfig::new("/dev/ttyACM0", 9600));
        let mut buf = [0u8; 4];
        assert!(port.read(&mut buf).is_err());
        assert!(port.write(b"x").is_err());
        assert!(matches!(port.flush_input(), Err(Error::PortClosed)));
        assert!(port.drain().is_err());
    }

    #[test]
    fn test_close_before_open_is_harmless() {
        let mut port = NativePort::new(SerialConfig::new("/dev/ttyACM0", 9600));
        port.close();
        port.close();
        assert!(!port.is_open());
    }

    #[test]
    fn test_set_timeout_on_closed_port_is_remembered() {
        let mut port = NativePort::new(SerialConfig::new("/dev/ttyACM0", 9600));
        port.set_timeout(Duration::from_millis(75)).unwrap();
        assert_eq!(port.config().timeout, Duration::from_millis(75));
    }

    #[test]
    fn test_open_missing_device_fails() {
        let mut port = NativePort::new(SerialConfig::new("/dev/ymflash-does-not-exist", 9600));
        assert!(port.open().is_err());
        assert!(!port.is_open());
    }
}
