//! YMODEM send command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use ymflash::{BlockSize, Checksum, HeaderName, TransferEvent, YmodemConfig, YmodemSender};

use crate::config::Config;
use crate::serial::prepare_port;
use crate::{Cli, use_fancy_output};

/// Baud rate the serial bootloader listens at.
pub(crate) const BOOTLOADER_BAUD: u32 = 28800;

/// Command-line overrides for a transfer.
#[derive(Debug, Clone, Default)]
pub(crate) struct SendOptions {
    pub(crate) block_size: Option<BlockSize>,
    pub(crate) listening_mode: Option<bool>,
    pub(crate) crc16: bool,
    pub(crate) file_names: bool,
}

/// Build the session config: command line, then config file, then defaults.
pub(crate) fn ymodem_config(options: &SendOptions, config: &Config) -> Result<YmodemConfig> {
    let block_size = match options.block_size {
        Some(size) => size,
        None => config.block_size()?.unwrap_or_default(),
    };
    let listening = options
        .listening_mode
        .or(config.transfer.listening_mode)
        .unwrap_or(true);
    let checksum = if options.crc16 {
        Checksum::Crc16
    } else {
        config.transfer.checksum.unwrap_or_default()
    };

    let header_name = if options.file_names || config.transfer.file_names.unwrap_or(false) {
        HeaderName::FileName
    } else {
        HeaderName::default()
    };

    Ok(YmodemConfig::default()
        .with_block_size(block_size)
        .with_listening_mode(listening)
        .with_checksum(checksum)
        .with_header_name(header_name))
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet || !use_fancy_output() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    #[allow(clippy::unwrap_used)] // Static template string
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb
}

/// Apply one transfer event to the progress bar.
fn track(pb: &ProgressBar, event: &TransferEvent) {
    match event {
        TransferEvent::HandshakeComplete => pb.set_message("device ready"),
        TransferEvent::FileStarted { name, size, .. } => {
            pb.reset();
            pb.set_length(*size as u64);
            pb.set_message(name.clone());
        },
        TransferEvent::PacketAcknowledged { sent, .. } => pb.set_position(*sent as u64),
        TransferEvent::FileCompleted { name, .. } => {
            pb.println(format!("{} {name}", style("✓").green()));
        },
        TransferEvent::BatchCompleted => pb.finish_and_clear(),
    }
}

/// Send command implementation.
pub(crate) fn cmd_send(
    cli: &Cli,
    config: &mut Config,
    files: &[PathBuf],
    options: &SendOptions,
) -> Result<()> {
    let ymodem = ymodem_config(options, config)?;
    let mut port = prepare_port(cli, config, BOOTLOADER_BAUD)?;

    if !cli.quiet {
        eprintln!(
            "{} Sending {} file(s) in {}-byte blocks",
            style("📦").cyan(),
            files.len(),
            ymodem.block_size.len()
        );
        if ymodem.listening_mode {
            eprintln!("{} Waiting for the device", style("⏳").yellow());
        }
    }

    let pb = progress_bar(cli.quiet);
    YmodemSender::new(&mut port, ymodem)
        .send_with_progress(files, |event| track(&pb, event))
        .context("Transfer failed")?;
    pb.finish_and_clear();

    if !cli.quiet {
        eprintln!("\n{} Transfer complete", style("🎉").green().bold());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_bootloader() {
        let config = ymodem_config(&SendOptions::default(), &Config::default()).unwrap();
        assert_eq!(config.block_size, BlockSize::Standard);
        assert!(config.listening_mode);
        assert_eq!(config.checksum, Checksum::Zeroed);
        assert_eq!(config.header_name, HeaderName::Fixed("binary".into()));
    }

    #[test]
    fn test_file_names_from_flag_or_config() {
        let options = SendOptions {
            file_names: true,
            ..SendOptions::default()
        };
        let config = ymodem_config(&options, &Config::default()).unwrap();
        assert_eq!(config.header_name, HeaderName::FileName);

        let mut file = Config::default();
        file.transfer.file_names = Some(true);
        let config = ymodem_config(&SendOptions::default(), &file).unwrap();
        assert_eq!(config.header_name, HeaderName::FileName);
    }

    #[test]
    fn test_config_file_applies_without_flags() {
        let mut file = Config::default();
        file.transfer.block_size = Some(1024);
        file.transfer.listening_mode = Some(false);
        file.transfer.checksum = Some(Checksum::Crc16);

        let config = ymodem_config(&SendOptions::default(), &file).unwrap();
        assert_eq!(config.block_size, BlockSize::OneK);
        assert!(!config.listening_mode);
        assert_eq!(config.checksum, Checksum::Crc16);
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = Config::default();
        file.transfer.block_size = Some(1024);
        file.transfer.listening_mode = Some(false);

        let options = SendOptions {
            block_size: Some(BlockSize::Standard),
            listening_mode: Some(true),
            crc16: true,
            file_names: false,
        };
        let config = ymodem_config(&options, &file).unwrap();
        assert_eq!(config.block_size, BlockSize::Standard);
        assert!(config.listening_mode);
        assert_eq!(config.checksum, Checksum::Crc16);
    }

    #[test]
    fn test_bad_block_size_in_config_fails() {
        let mut file = Config::default();
        file.transfer.block_size = Some(64);
        assert!(ymodem_config(&SendOptions::default(), &file).is_err());
    }

    #[test]
    fn test_track_follows_file_progress() {
        let pb = ProgressBar::hidden();
        track(
            &pb,
            &TransferEvent::FileStarted {
                index: 0,
                name: "fw.bin".into(),
                size: 300,
            },
        );
        assert_eq!(pb.length(), Some(300));
        track(
            &pb,
            &TransferEvent::PacketAcknowledged {
                index: 0,
                seq: 2,
                sent: 256,
                total: 300,
            },
        );
        assert_eq!(pb.position(), 256);
    }
}
