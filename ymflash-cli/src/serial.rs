//! Serial port selection.
//!
//! An explicit `--port` wins, then the configured port. Otherwise ports are
//! detected: a single Particle device is used directly, several candidates
//! are offered in a `dialoguer` menu, and non-interactive runs fail with a
//! usage error instead of prompting.

use std::cmp::Ordering;
use std::io::IsTerminal;

use anyhow::Result;
use console::style;
use dialoguer::{Confirm, Error as DialoguerError, Select, theme::ColorfulTheme};
use log::{debug, error, info};
use ymflash::{DetectedPort, NativePort, SerialConfig, detect_ports, format_port_list};

use crate::config::Config;
use crate::{Cli, CliError};

/// Options for serial port selection.
#[derive(Debug, Clone, Default)]
pub struct SerialOptions {
    /// Explicit port specified via CLI.
    pub port: Option<String>,
    /// Fail instead of prompting.
    pub non_interactive: bool,
}

/// Outcome of port selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedPort {
    /// Port name/path.
    pub name: String,
    /// Whether the user picked it from a prompt.
    pub prompted: bool,
}

impl SelectedPort {
    fn given(name: &str) -> Self {
        Self {
            name: name.to_string(),
            prompted: false,
        }
    }
}

fn usage_err(message: &str) -> anyhow::Error {
    CliError::Usage(message.to_string()).into()
}

/// Ports worth offering: Particle devices if any, else recognised bridges,
/// else everything.
fn candidates(ports: Vec<DetectedPort>) -> Vec<DetectedPort> {
    let particle: Vec<DetectedPort> = ports.iter().filter(|p| p.is_particle()).cloned().collect();
    if !particle.is_empty() {
        return particle;
    }
    let known: Vec<DetectedPort> = ports
        .iter()
        .filter(|p| p.device.is_known())
        .cloned()
        .collect();
    if known.is_empty() { ports } else { known }
}

fn select_non_interactive_port(candidates: Vec<DetectedPort>) -> Result<SelectedPort> {
    match candidates.len().cmp(&1) {
        Ordering::Equal => Ok(SelectedPort::given(&candidates[0].name)),
        Ordering::Greater => Err(usage_err(
            "multiple serial ports found; pick one with --port",
        )),
        Ordering::Less => Err(usage_err("no serial ports available")),
    }
}

/// Select a serial port interactively or automatically.
pub fn select_serial_port(options: &SerialOptions, config: &Config) -> Result<SelectedPort> {
    if let Some(name) = &options.port {
        return Ok(SelectedPort::given(name));
    }

    if let Some(name) = &config.port.serial {
        debug!("Using port from config: {name}");
        return Ok(SelectedPort::given(name));
    }

    let ports = detect_ports();
    if ports.is_empty() {
        return Err(usage_err("no serial ports found; is the device plugged in?"));
    }

    let candidates = candidates(ports);
    if options.non_interactive {
        return select_non_interactive_port(candidates);
    }

    match candidates.len().cmp(&1) {
        Ordering::Greater => {
            ensure_interactive_terminal()?;
            select_port_interactive(&candidates)
        },
        Ordering::Equal if candidates[0].is_particle() => {
            let port = &candidates[0];
            info!(
                "Auto-selected port: {} [{}]",
                port.name,
                port.platform.unwrap_or(port.device.name())
            );
            Ok(SelectedPort::given(&port.name))
        },
        Ordering::Equal => {
            ensure_interactive_terminal()?;
            confirm_single_port(&candidates[0])
        },
        Ordering::Less => Err(usage_err("no serial ports available")),
    }
}

fn ensure_interactive_terminal() -> Result<()> {
    if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() {
        Ok(())
    } else {
        Err(usage_err(
            "port selection needs an interactive terminal; pass --port",
        ))
    }
}

fn map_prompt_error(err: DialoguerError) -> anyhow::Error {
    match err {
        DialoguerError::IO(io_err) if io_err.kind() == std::io::ErrorKind::Interrupted => {
            CliError::Cancelled("port selection cancelled".to_string()).into()
        },
        DialoguerError::IO(io_err) => usage_err(&format!("prompt failed: {io_err}")),
    }
}

fn select_port_interactive(ports: &[DetectedPort]) -> Result<SelectedPort> {
    eprintln!(
        "{} Found {} serial ports",
        style("ℹ").blue(),
        ports.len()
    );

    let term_width = console::Term::stderr().size().1 as usize;
    let max_item_width = term_width.saturating_sub(4);
    let labels: Vec<String> = format_port_list(ports)
        .into_iter()
        .map(|label| console::truncate_str(&label, max_item_width, "\u{2026}").into_owned())
        .collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a serial port")
        .items(&labels)
        .default(0)
        .interact_opt()
        .map_err(map_prompt_error)?;

    match selection.and_then(|index| ports.get(index)) {
        Some(port) => Ok(SelectedPort {
            name: port.name.clone(),
            prompted: true,
        }),
        None => Err(CliError::Cancelled("port selection cancelled".to_string()).into()),
    }
}

fn confirm_single_port(port: &DetectedPort) -> Result<SelectedPort> {
    let label = format_port_list(std::slice::from_ref(port)).join("");
    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Use {label}?"))
        .default(true)
        .interact_opt()
        .map_err(map_prompt_error)?
        .unwrap_or(false);

    if confirmed {
        Ok(SelectedPort {
            name: port.name.clone(),
            prompted: true,
        })
    } else {
        Err(CliError::Cancelled("port selection cancelled".to_string()).into())
    }
}

/// Offer to store a prompted choice as the preferred port.
pub fn ask_remember_port(port: &SelectedPort, config: &mut Config) -> Result<()> {
    if !port.prompted || config.port.serial.as_deref() == Some(port.name.as_str()) {
        return Ok(());
    }

    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Remember this port for next time?")
        .default(false)
        .interact_opt()
        .map_err(map_prompt_error)?
        .unwrap_or(false);

    if confirmed {
        if let Err(e) = config.remember_port(&port.name) {
            error!("Failed to save port configuration: {e}");
        }
    }
    Ok(())
}

/// Baud rate: command line, then config, then the command's default.
pub fn resolve_baud(cli_baud: Option<u32>, config: &Config, default: u32) -> u32 {
    cli_baud.or(config.port.baud).unwrap_or(default)
}

/// Pick a port and prepare it at the resolved baud rate. Nothing is opened.
pub fn prepare_port(cli: &Cli, config: &mut Config, default_baud: u32) -> Result<NativePort> {
    let options = SerialOptions {
        port: cli.port.clone(),
        non_interactive: cli.non_interactive,
    };
    let selected = select_serial_port(&options, config)?;
    if !cli.non_interactive {
        ask_remember_port(&selected, config)?;
    }

    let baud = resolve_baud(cli.baud, config, default_baud);
    if !cli.quiet {
        eprintln!(
            "{} Using {} at {baud} baud",
            style("🔌").cyan(),
            style(&selected.name).green()
        );
    }
    Ok(NativePort::new(SerialConfig::new(selected.name, baud)))
}

#[cfg(test)]
mod tests {
    use ymflash::DeviceKind;

    use super::*;

    fn port(name: &str, vid: u16, pid: u16) -> DetectedPort {
        DetectedPort {
            name: name.to_string(),
            device: DeviceKind::from_vid_pid(vid, pid),
            platform: ymflash::device::particle_platform(vid, pid),
            vid: Some(vid),
            pid: Some(pid),
            manufacturer: None,
            product: None,
            serial: None,
        }
    }

    #[test]
    fn test_explicit_port_wins() {
        let options = SerialOptions {
            port: Some("/dev/ttyACM3".to_string()),
            non_interactive: true,
        };
        let mut config = Config::default();
        config.port.serial = Some("/dev/ttyACM0".to_string());

        let selected = select_serial_port(&options, &config).unwrap();
        assert_eq!(selected, SelectedPort::given("/dev/ttyACM3"));
    }

    #[test]
    fn test_config_port_used_without_flag() {
        let mut config = Config::default();
        config.port.serial = Some("/dev/ttyACM0".to_string());

        let selected = select_serial_port(&SerialOptions::default(), &config).unwrap();
        assert_eq!(selected.name, "/dev/ttyACM0");
        assert!(!selected.prompted);
    }

    #[test]
    fn test_candidates_prefer_particle_then_bridges() {
        let all = vec![
            port("/dev/ttyS0", 0x1234, 0x5678),
            port("/dev/ttyUSB0", 0x1A86, 0x7523),
            port("/dev/ttyACM0", 0x2B04, 0xC006),
        ];
        let names = |ports: Vec<DetectedPort>| -> Vec<String> {
            ports.into_iter().map(|p| p.name).collect()
        };

        assert_eq!(names(candidates(all.clone())), vec!["/dev/ttyACM0"]);
        assert_eq!(names(candidates(all[..2].to_vec())), vec!["/dev/ttyUSB0"]);
        assert_eq!(names(candidates(all[..1].to_vec())), vec!["/dev/ttyS0"]);
    }

    #[test]
    fn test_non_interactive_needs_exactly_one_candidate() {
        let one = vec![port("/dev/ttyACM0", 0x2B04, 0xC00A)];
        assert_eq!(select_non_interactive_port(one).unwrap().name, "/dev/ttyACM0");

        let two = vec![
            port("/dev/ttyACM0", 0x2B04, 0xC00A),
            port("/dev/ttyACM1", 0x2B04, 0xC00D),
        ];
        let err = select_non_interactive_port(two).unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::Usage(m)) if m.contains("multiple")));

        let err = select_non_interactive_port(Vec::new()).unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::Usage(_))));
    }

    #[test]
    fn test_resolve_baud() {
        let mut config = Config::default();
        assert_eq!(resolve_baud(None, &config, 28800), 28800);
        config.port.baud = Some(9600);
        assert_eq!(resolve_baud(None, &config, 28800), 9600);
        assert_eq!(resolve_baud(Some(115200), &config, 28800), 115200);
    }

    #[test]
    fn test_remember_skipped_for_unprompted_port() {
        let mut config = Config::default();
        ask_remember_port(&SelectedPort::given("/dev/ttyACM0"), &mut config).unwrap();
        assert!(config.port.serial.is_none());
    }
}
