//! Serial device discovery and classification.
//!
//! Particle devices enumerate as USB CDC ports with their own vendor ID and
//! a per-platform product ID. Boards behind a generic USB-UART bridge are
//! recognised by the bridge instead.

use crate::error::{Error, Result};

#[cfg(feature = "native")]
use log::{debug, info, trace};

/// Known USB device kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceKind {
    /// Particle (or Spark) device in serial mode.
    Particle,
    /// CH340/CH341 USB-to-Serial converter.
    Ch340,
    /// Silicon Labs CP210x USB-to-Serial converter.
    Cp210x,
    /// FTDI FT232/FT2232/FT4232 USB-to-Serial converter.
    Ftdi,
    /// Prolific PL2303 USB-to-Serial converter.
    Prolific,
    /// Unknown device.
    Unknown,
}

/// Particle platforms by USB serial-mode VID/PID.
const PARTICLE_SERIAL_DEVICES: &[(u16, u16, &str)] = &[
    (0x1D50, 0x607D, "Core"),
    (0x2B04, 0xC006, "Photon"),
    (0x2B04, 0xC008, "P1"),
    (0x2B04, 0xC00A, "Electron"),
    (0x2B04, 0xC00C, "Argon"),
    (0x2B04, 0xC00D, "Boron"),
    (0x2B04, 0xC00E, "Xenon"),
    (0x2B04, 0xC016, "A SoM"),
    (0x2B04, 0xC017, "B SoM"),
    (0x2B04, 0xC018, "X SoM"),
    (0x2B04, 0xC058, "Duo"),
];

/// Particle's USB vendor ID.
pub const PARTICLE_VID: u16 = 0x2B04;

/// Known USB VID/PID pairs for common USB-to-UART bridges.
const KNOWN_BRIDGES: &[(u16, &[u16], DeviceKind)] = &[
    (
        0x1A86,
        &[0x7523, 0x7522, 0x5523, 0x5512, 0x55D4],
        DeviceKind::Ch340,
    ),
    (0x10C4, &[0xEA60, 0xEA70, 0xEA71, 0xEA63], DeviceKind::Cp210x),
    (
        0x0403,
        &[0x6001, 0x6010, 0x6011, 0x6014, 0x6015],
        DeviceKind::Ftdi,
    ),
    (0x067B, &[0x2303, 0x23A3, 0x23C3, 0x23D3], DeviceKind::Prolific),
];

impl DeviceKind {
    /// Classify a USB VID/PID pair.
    #[must_use]
    pub fn from_vid_pid(vid: u16, pid: u16) -> Self {
        if vid == PARTICLE_VID || particle_platform(vid, pid).is_some() {
            return Self::Particle;
        }
        for (known_vid, pids, device) in KNOWN_BRIDGES {
            if vid == *known_vid && pids.contains(&pid) {
                return *device;
            }
        }
        Self::Unknown
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Particle => "Particle",
            Self::Ch340 => "CH340/CH341",
            Self::Cp210x => "CP210x",
            Self::Ftdi => "FTDI",
            Self::Prolific => "PL2303",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether the kind was recognised.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Platform name of a Particle device in serial mode.
pub fn particle_platform(vid: u16, pid: u16) -> Option<&'static str> {
    PARTICLE_SERIAL_DEVICES
        .iter()
        .find(|(v, p, _)| *v == vid && *p == pid)
        .map(|(_, _, name)| *name)
}

/// A serial port found on the host.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DetectedPort {
    /// Port name/path (e.g., "/dev/ttyACM0" or "COM3").
    pub name: String,
    /// Classified device kind.
    pub device: DeviceKind,
    /// Particle platform, when recognised.
    pub platform: Option<&'static str>,
    /// USB Vendor ID (if available).
    pub vid: Option<u16>,
    /// USB Product ID (if available).
    pub pid: Option<u16>,
    /// Device manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Device product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial: Option<String>,
}

impl DetectedPort {
    fn unclassified(name: String) -> Self {
        Self {
            name,
            device: DeviceKind::Unknown,
            platform: None,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
            serial: None,
        }
    }

    /// Whether this port is a Particle device.
    pub fn is_particle(&self) -> bool {
        self.device == DeviceKind::Particle
    }
}

/// Enumerate serial ports with USB metadata.
#[cfg(feature = "native")]
pub fn detect_ports() -> Vec<DetectedPort> {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            debug!("Failed to enumerate serial ports: {e}");
            return Vec::new();
        },
    };

    ports
        .into_iter()
        .map(|port_info| {
            let mut detected = DetectedPort::unclassified(port_info.port_name);
            if let serialport::SerialPortType::UsbPort(usb) = port_info.port_type {
                detected.vid = Some(usb.vid);
                detected.pid = Some(usb.pid);
                detected.device = DeviceKind::from_vid_pid(usb.vid, usb.pid);
                detected.platform = particle_platform(usb.vid, usb.pid);
                detected.manufacturer = usb.manufacturer;
                detected.product = usb.product;
                detected.serial = usb.serial_number;

                trace!(
                    "Found USB port: {} (VID: {:04X}, PID: {:04X}, Device: {:?})",
                    detected.name, usb.vid, usb.pid, detected.device
                );
            }
            detected
        })
        .collect()
}

/// Enumerate serial ports (no native support compiled in).
#[cfg(not(feature = "native"))]
pub fn detect_ports() -> Vec<DetectedPort> {
    Vec::new()
}

/// Pick the most likely port: a Particle device, then a known bridge, then
/// whatever comes first.
pub fn select_port(ports: &[DetectedPort]) -> Result<DetectedPort> {
    ports
        .iter()
        .find(|p| p.is_particle())
        .or_else(|| ports.iter().find(|p| p.device.is_known()))
        .or_else(|| ports.first())
        .cloned()
        .ok_or(Error::DeviceNotFound)
}

/// Auto-detect a single port.
#[cfg(feature = "native")]
pub fn auto_detect_port() -> Result<DetectedPort> {
    let port = select_port(&detect_ports())?;
    match (port.device, port.platform) {
        (DeviceKind::Particle, Some(platform)) => {
            info!("Auto-detected {platform}: {}", port.name);
        },
        (DeviceKind::Unknown, _) => info!("Using first available port: {}", port.name),
        (kind, _) => info!("Auto-detected {} device: {}", kind.name(), port.name),
    }
    Ok(port)
}

/// Format detected ports for display, one line each.
pub fn format_port_list(ports: &[DetectedPort]) -> Vec<String> {
    ports
        .iter()
        .map(|port| {
            let device_info = match (port.platform, port.device, port.vid, port.pid) {
                (Some(platform), ..) => format!(" [{platform}]"),
                (None, kind, ..) if kind.is_known() => format!(" [{}]", kind.name()),
                (None, _, Some(vid), Some(pid)) => format!(" [VID:{vid:04X} PID:{pid:04X}]"),
                _ => String::new(),
            };
            let product_info = port
                .product
                .as_ref()
                .map(|p| format!(" - {p}"))
                .unwrap_or_default();
            format!("{}{device_info}{product_info}", port.name)
        })
        .collect()
}
