//! Port listing command.

use console::style;
use serde_json::json;
use ymflash::{DetectedPort, detect_ports, select_port};

/// JSON rendering of detected ports.
pub(crate) fn ports_json(ports: &[DetectedPort]) -> serde_json::Value {
    ports
        .iter()
        .map(|p| {
            json!({
                "name": p.name,
                "device": p.device.name(),
                "known": p.device.is_known(),
                "platform": p.platform,
                "vid": p.vid,
                "pid": p.pid,
                "manufacturer": p.manufacturer,
                "product": p.product,
                "serial": p.serial,
            })
        })
        .collect()
}

/// List ports command implementation.
pub(crate) fn cmd_list_ports(json: bool) {
    let detected = detect_ports();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&ports_json(&detected)).unwrap_or_default()
        );
        return;
    }

    eprintln!("{}", style("Serial ports").bold().underlined());

    if detected.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return;
    }

    for port in &detected {
        let label = match (port.platform, port.device.is_known()) {
            (Some(platform), _) => format!(" [{}]", style(platform).yellow()),
            (None, true) => format!(" [{}]", style(port.device.name()).yellow()),
            (None, false) => String::new(),
        };
        let vid_pid = match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => format!(" ({vid:04X}:{pid:04X})"),
            _ => String::new(),
        };
        let product = port
            .product
            .as_deref()
            .map(|p| format!(" - {}", style(p).dim()))
            .unwrap_or_default();

        eprintln!(
            "  {} {}{label}{vid_pid}{product}",
            style("•").green(),
            style(&port.name).cyan()
        );
    }

    if let Ok(best) = select_port(&detected) {
        eprintln!(
            "\n{} Auto-detected: {}",
            style("→").green().bold(),
            style(&best.name).cyan().bold()
        );
    }
}
