//! Claim code command.

use anyhow::{Context, Result};
use console::style;
use ymflash::{SystemClock, set_claim_code};

use super::identify::CONSOLE_BAUD;
use crate::Cli;
use crate::config::Config;
use crate::serial::prepare_port;

/// Claim command implementation.
pub(crate) fn cmd_claim(cli: &Cli, config: &mut Config, code: &str) -> Result<()> {
    let mut port = prepare_port(cli, config, CONSOLE_BAUD)?;
    set_claim_code(&mut port, &SystemClock, code, &config.interact_options())
        .context("Could not set the claim code; is the device in listening mode?")?;

    if !cli.quiet {
        eprintln!("{} Claim code set", style("✓").green());
    }
    Ok(())
}
