//! Wi-Fi setup command.

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, Password, Select, theme::ColorfulTheme};
use ymflash::{Cipher, Security, SystemClock, WifiCredentials, configure_wifi};

use super::identify::CONSOLE_BAUD;
use crate::config::Config;
use crate::serial::prepare_port;
use crate::{Cli, CliError};

/// Values given on the command line; anything missing is prompted for.
#[derive(Debug, Clone, Default)]
pub(crate) struct WifiArgs {
    pub(crate) ssid: Option<String>,
    pub(crate) security: Option<Security>,
    pub(crate) cipher: Option<Cipher>,
    pub(crate) password: Option<String>,
}

const SECURITY_CHOICES: [Security; 4] = [
    Security::Wpa2,
    Security::Wpa,
    Security::Wep,
    Security::Unsecured,
];

const CIPHER_CHOICES: [Cipher; 3] = [Cipher::Aes, Cipher::Tkip, Cipher::AesTkip];

/// Whether a network with this security needs a passphrase.
fn needs_password(security: Security) -> bool {
    security != Security::Unsecured
}

/// Whether the device will ask for a cipher.
fn needs_cipher(security: Security) -> bool {
    matches!(security, Security::Wpa | Security::Wpa2)
}

/// Credentials from arguments alone, for non-interactive runs.
fn credentials_from_args(args: WifiArgs) -> Result<WifiCredentials> {
    let ssid = args
        .ssid
        .ok_or_else(|| CliError::Usage("--ssid is required with --non-interactive".into()))?;
    let security = args.security.unwrap_or_default();
    if needs_password(security) && args.password.is_none() {
        return Err(CliError::Usage(format!("--password is required for {security} networks")).into());
    }
    Ok(WifiCredentials {
        ssid,
        security,
        cipher: args.cipher.unwrap_or_default(),
        password: args.password,
    })
}

/// Fill in missing values with prompts.
fn prompt_credentials(args: WifiArgs) -> Result<WifiCredentials> {
    let theme = ColorfulTheme::default();

    let ssid = match args.ssid {
        Some(ssid) => ssid,
        None => Input::with_theme(&theme)
            .with_prompt("SSID")
            .interact_text()?,
    };

    let security = match args.security {
        Some(security) => security,
        None => {
            let labels: Vec<String> = SECURITY_CHOICES.iter().map(ToString::to_string).collect();
            let index = Select::with_theme(&theme)
                .with_prompt("Security type")
                .items(&labels)
                .default(0)
                .interact()?;
            SECURITY_CHOICES[index]
        },
    };

    let cipher = match args.cipher {
        Some(cipher) => cipher,
        None if needs_cipher(security) => {
            let labels: Vec<String> = CIPHER_CHOICES.iter().map(ToString::to_string).collect();
            let index = Select::with_theme(&theme)
                .with_prompt("Cipher")
                .items(&labels)
                .default(0)
                .interact()?;
            CIPHER_CHOICES[index]
        },
        None => Cipher::default(),
    };

    let password = match args.password {
        Some(password) => Some(password),
        None if needs_password(security) => Some(
            Password::with_theme(&theme)
                .with_prompt("Password")
                .interact()?,
        ),
        None => None,
    };

    Ok(WifiCredentials {
        ssid,
        security,
        cipher,
        password,
    })
}

/// Wi-Fi command implementation.
pub(crate) fn cmd_wifi(cli: &Cli, config: &mut Config, args: WifiArgs) -> Result<()> {
    let credentials = if cli.non_interactive {
        credentials_from_args(args)?
    } else {
        prompt_credentials(args)?
    };

    let mut port = prepare_port(cli, config, CONSOLE_BAUD)?;
    if !cli.quiet {
        eprintln!(
            "{} Sending credentials for '{}' ({})",
            style("📡").cyan(),
            credentials.ssid,
            credentials.security
        );
    }

    configure_wifi(&mut port, &SystemClock, &credentials, &config.interact_options())
        .context("Wi-Fi setup failed; is the device in listening mode?")?;

    if !cli.quiet {
        eprintln!("{} Credentials stored", style("✓").green().bold());
    }
    Ok(())
}
