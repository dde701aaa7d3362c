//! Device identification command.

use anyhow::{Context, Result};
use console::style;
use ymflash::{DeviceIdentity, SystemClock, identify};

use crate::Cli;
use crate::config::Config;
use crate::serial::prepare_port;

/// Baud rate of the device's serial console.
pub(crate) const CONSOLE_BAUD: u32 = 9600;

/// Human-readable report of an identity, one field per line.
pub(crate) fn format_identity(identity: &DeviceIdentity) -> Vec<String> {
    let mut lines = vec![format!("Device ID: {}", identity.id)];
    if let Some(imei) = &identity.imei {
        lines.push(format!("IMEI: {imei}"));
    }
    if let Some(iccid) = &identity.iccid {
        lines.push(format!("ICCID: {iccid}"));
    }
    if let Some(version) = &identity.firmware_version {
        lines.push(format!("System firmware version: {version}"));
    }
    lines
}

/// Identify command implementation.
pub(crate) fn cmd_identify(cli: &Cli, config: &mut Config, json: bool) -> Result<()> {
    let mut port = prepare_port(cli, config, CONSOLE_BAUD)?;
    let identity = identify(&mut port, &SystemClock, &config.interact_options())
        .context("Could not identify the device; is it in listening mode?")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&identity)?);
        return Ok(());
    }

    let mut lines = format_identity(&identity).into_iter();
    if let Some(first) = lines.next() {
        println!("{}", style(first).bold());
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_identity_skips_missing_fields() {
        let identity = DeviceIdentity {
            id: "0123456789abcdef01234567".into(),
            firmware_version: Some("1.5.2".into()),
            ..DeviceIdentity::default()
        };
        assert_eq!(
            format_identity(&identity),
            vec![
                "Device ID: 0123456789abcdef01234567".to_string(),
                "System firmware version: 1.5.2".to_string(),
            ]
        );
    }

    #[test]
    fn test_identity_json_shape() {
        let identity = DeviceIdentity {
            id: "3a001d000647343232363230".into(),
            imei: Some("352753090123456".into()),
            iccid: None,
            firmware_version: None,
        };
        let value = serde_json::to_value(&identity).unwrap();
        assert_eq!(value["id"], "3a001d000647343232363230");
        assert_eq!(value["imei"], "352753090123456");
        assert!(value["iccid"].is_null());
    }
}
