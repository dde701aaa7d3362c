//! ymflash CLI - YMODEM flashing and serial setup for Particle-style devices.
//!
//! ## Features
//!
//! - Send firmware files over the serial bootloader (YMODEM)
//! - Read the device ID and system firmware version
//! - Store Wi-Fi credentials and claim codes through the serial console
//! - Read the Wi-Fi MAC address
//! - Watch device output
//! - Shell completion generation
//! - Environment variable and config file support

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use log::debug;
use ymflash::{BlockSize, Cipher, Security};

mod commands;
mod config;
mod serial;

use config::Config;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Check if progress bars and colors should be used.
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Failures that map to a specific exit code.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// The invocation or environment is wrong; exit code 2.
    #[error("{0}")]
    Usage(String),
    /// The user backed out of a prompt.
    #[error("{0}")]
    Cancelled(String),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => 2,
            Self::Cancelled(_) => 130,
        }
    }
}

/// ymflash - serial YMODEM flashing and device setup.
///
/// Environment variables:
///   YMFLASH_PORT         - Default serial port
///   YMFLASH_BAUD         - Default baud rate
///   YMFLASH_BLOCK_SIZE   - Default YMODEM block size (128 or 1024)
#[derive(Parser)]
#[command(name = "ymflash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "YMFLASH_PORT")]
    pub(crate) port: Option<String>,

    /// Baud rate (default depends on the command).
    #[arg(short, long, global = true, env = "YMFLASH_BAUD")]
    pub(crate) baud: Option<u32>,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    pub(crate) config_path: Option<PathBuf>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    pub(crate) quiet: bool,

    /// Fail instead of prompting.
    #[arg(long, global = true)]
    pub(crate) non_interactive: bool,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Send files to a device in listening mode over YMODEM.
    Send {
        /// Files to send, in order.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// YMODEM block size.
        #[arg(long, value_parser = parse_block_size, env = "YMFLASH_BLOCK_SIZE")]
        block_size: Option<BlockSize>,

        /// The device is already in listening mode (default).
        #[arg(long, conflicts_with = "command_mode")]
        listening: bool,

        /// Ask the device to enter the bootloader first by writing 'f'.
        #[arg(long)]
        command_mode: bool,

        /// Write CRC-16 checksums instead of zero bytes.
        #[arg(long)]
        crc16: bool,

        /// Put each file's name in its header instead of "binary".
        #[arg(long)]
        file_names: bool,
    },

    /// Print the device ID and system firmware version.
    Identify {
        /// Output as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Print the device's Wi-Fi MAC address.
    Mac {
        /// Output as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Store a claim code on the device.
    Claim {
        /// 63-character claim code.
        #[arg(env = "YMFLASH_CLAIM_CODE", hide_env_values = true)]
        code: String,
    },

    /// Store Wi-Fi credentials on the device.
    Wifi {
        /// Network name.
        #[arg(long)]
        ssid: Option<String>,

        /// Security type.
        #[arg(long, value_enum)]
        security: Option<SecurityArg>,

        /// Cipher, if the device asks for one.
        #[arg(long, value_enum)]
        cipher: Option<CipherArg>,

        /// Passphrase.
        #[arg(long, env = "YMFLASH_WIFI_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Print device output as it arrives.
    Monitor {
        /// Also end a chunk when this text is received.
        #[arg(long)]
        terminator: Option<String>,
    },

    /// List available serial ports.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Security types accepted on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum SecurityArg {
    /// Open network.
    Unsecured,
    /// WEP.
    Wep,
    /// WPA personal.
    Wpa,
    /// WPA2 personal.
    Wpa2,
}

impl From<SecurityArg> for Security {
    fn from(arg: SecurityArg) -> Self {
        match arg {
            SecurityArg::Unsecured => Self::Unsecured,
            SecurityArg::Wep => Self::Wep,
            SecurityArg::Wpa => Self::Wpa,
            SecurityArg::Wpa2 => Self::Wpa2,
        }
    }
}

/// Ciphers accepted on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum CipherArg {
    /// AES.
    Aes,
    /// TKIP.
    Tkip,
    /// AES and TKIP.
    AesTkip,
}

impl From<CipherArg> for Cipher {
    fn from(arg: CipherArg) -> Self {
        match arg {
            CipherArg::Aes => Self::Aes,
            CipherArg::Tkip => Self::Tkip,
            CipherArg::AesTkip => Self::AesTkip,
        }
    }
}

/// Parse a block size given in bytes.
fn parse_block_size(s: &str) -> Result<BlockSize, String> {
    let bytes: usize = s
        .trim()
        .parse()
        .map_err(|e| format!("Invalid block size: {e}"))?;
    BlockSize::try_from(bytes).map_err(|e| e.to_string())
}

fn init_logging(cli: &Cli) {
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config = match cli.config_path {
        Some(ref path) => Config::load_from_path(path)?,
        None => Config::load(),
    };

    match &cli.command {
        Commands::Send {
            files,
            block_size,
            listening,
            command_mode,
            crc16,
            file_names,
        } => {
            let options = commands::send::SendOptions {
                block_size: *block_size,
                listening_mode: if *command_mode {
                    Some(false)
                } else if *listening {
                    Some(true)
                } else {
                    None
                },
                crc16: *crc16,
                file_names: *file_names,
            };
            commands::send::cmd_send(cli, &mut config, files, &options)
        },
        Commands::Identify { json } => commands::identify::cmd_identify(cli, &mut config, *json),
        Commands::Mac { json } => commands::mac::cmd_mac(cli, &mut config, *json),
        Commands::Claim { code } => commands::claim::cmd_claim(cli, &mut config, code),
        Commands::Wifi {
            ssid,
            security,
            cipher,
            password,
        } => {
            let args = commands::wifi::WifiArgs {
                ssid: ssid.clone(),
                security: security.map(Security::from),
                cipher: cipher.map(Cipher::from),
                password: password.clone(),
            };
            commands::wifi::cmd_wifi(cli, &mut config, args)
        },
        Commands::Monitor { terminator } => {
            commands::monitor::cmd_monitor(cli, &mut config, terminator.as_deref())
        },
        Commands::ListPorts { json } => {
            commands::ports::cmd_list_ports(*json);
            Ok(())
        },
        Commands::Completions { shell } => {
            commands::completions::cmd_completions(*shell);
            Ok(())
        },
    }
}

fn main() -> ExitCode {
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);
    if std::env::var_os("NO_COLOR").is_some() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();
    init_logging(&cli);
    debug!(
        "ymflash v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", style("Error:").red().bold());
            let code = err
                .downcast_ref::<CliError>()
                .map_or(1, CliError::exit_code);
            ExitCode::from(code)
        },
    }
}
