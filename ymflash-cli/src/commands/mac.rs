//! MAC address command.

use anyhow::{Context, Result};
use serde_json::json;
use ymflash::{SystemClock, mac_address};

use super::identify::CONSOLE_BAUD;
use crate::Cli;
use crate::config::Config;
use crate::serial::prepare_port;

fn mac_json(mac: &str) -> serde_json::Value {
    json!({ "mac": mac })
}

/// MAC command implementation.
pub(crate) fn cmd_mac(cli: &Cli, config: &mut Config, json: bool) -> Result<()> {
    let mut port = prepare_port(cli, config, CONSOLE_BAUD)?;
    let mac = mac_address(&mut port, &SystemClock, &config.interact_options())
        .context("Could not read the MAC address; is the device in listening mode?")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&mac_json(&mac))?);
    } else {
        println!("{mac}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_json_shape() {
        let value = mac_json("6c:0b:84:12:34:56");
        assert_eq!(value["mac"], "6c:0b:84:12:34:56");
    }
}
