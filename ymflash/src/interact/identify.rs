//! Device identification.

use log::debug;

use super::{InteractOptions, issue_command};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::port::Transport;

/// What a device reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceIdentity {
    /// Device ID.
    pub id: String,
    /// Cellular modem IMEI, if reported.
    pub imei: Option<String>,
    /// SIM ICCID, if reported.
    pub iccid: Option<String>,
    /// System firmware version, if the device answered.
    pub firmware_version: Option<String>,
}

/// Ask the device for its ID and system firmware version.
///
/// A device that does not answer the version query is still identified.
pub fn identify<T, C>(port: &mut T, clock: &C, options: &InteractOptions) -> Result<DeviceIdentity>
where
    T: Transport + ?Sized,
    C: Clock,
{
    let reply = issue_command(port, clock, "i", options)?;
    let mut identity =
        parse_device_id(&reply).ok_or_else(|| Error::UnexpectedReply(reply.trim().to_string()))?;

    identity.firmware_version = match issue_command(port, clock, "v", options) {
        Ok(reply) => parse_firmware_version(&reply),
        Err(e) if e.is_timeout() => {
            debug!("No firmware version reply: {e}");
            None
        },
        Err(e) => return Err(e),
    };

    Ok(identity)
}

/// Parse the reply to the `i` command.
///
/// Wi-Fi devices print `Your device id is <id>` (older ones say `core`).
/// Cellular devices print the bare 24-digit hex ID followed by `IMEI:` and
/// `ICCID:` fields.
pub fn parse_device_id(text: &str) -> Option<DeviceIdentity> {
    for marker in ["Your device id is", "Your core id is"] {
        if let Some(id) = word_after(text, marker) {
            return Some(DeviceIdentity {
                id: id.to_string(),
                ..DeviceIdentity::default()
            });
        }
    }

    let id = text
        .split_whitespace()
        .find(|token| token.len() == 24 && token.chars().all(|c| c.is_ascii_hexdigit()))?;

    Some(DeviceIdentity {
        id: id.to_string(),
        imei: word_after(text, "IMEI:").map(str::to_string),
        iccid: word_after(text, "ICCID:").map(str::to_string),
        firmware_version: None,
    })
}

/// Parse the reply to the `v` command.
pub fn parse_firmware_version(text: &str) -> Option<String> {
    let start = text.find("system firmware version:")? + "system firmware version:".len();
    let rest = &text[start..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let version: String = rest
        .trim_start()
        .chars()
        .take_while(|&c| is_word(c) || c == '.')
        .collect();
    (!version.is_empty()).then_some(version)
}

/// The run of word characters following `marker` and some whitespace.
fn word_after<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    let end = rest.find(|c: char| !is_word(c)).unwrap_or(rest.len());
    (end > 0).then(|| &rest[..end])
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
