//! Serial monitor command.

use std::io::{self, Write as _};

use anyhow::{Context, Result};
use console::style;
use ymflash::{
    ChunkReader, DebouncedChunker, SystemClock, Transport, clean_text, drain_utf8_lossy,
};

use super::identify::CONSOLE_BAUD;
use crate::Cli;
use crate::config::Config;
use crate::serial::prepare_port;

/// Turn a chunk into printable text.
///
/// A multi-byte character split across chunks is held in `pending` until
/// the rest arrives.
pub(crate) fn render_chunk(pending: &mut Vec<u8>, chunk: &[u8]) -> String {
    pending.extend_from_slice(chunk);
    clean_text(&drain_utf8_lossy(pending))
}

/// Monitor command implementation. Runs until interrupted.
pub(crate) fn cmd_monitor(cli: &Cli, config: &mut Config, terminator: Option<&str>) -> Result<()> {
    let mut port = prepare_port(cli, config, CONSOLE_BAUD)?;
    port.open()
        .with_context(|| format!("Failed to open {}", port.name()))?;

    if !cli.quiet {
        eprintln!("{}", style("Press Ctrl+C to exit").dim());
    }

    let quiet_period = config.interact_options().quiet_period;
    let chunker = match terminator {
        Some(t) => DebouncedChunker::with_terminator(SystemClock, quiet_period, t.as_bytes()),
        None => DebouncedChunker::new(SystemClock, quiet_period),
    };
    let mut reader = ChunkReader::new(&mut port, chunker);

    let mut pending = Vec::new();
    let mut stdout = io::stdout();
    while let Some(chunk) = reader.next_chunk(None).context("Serial read failed")? {
        let text = render_chunk(&mut pending, &chunk);
        stdout.write_all(text.as_bytes())?;
        stdout.flush()?;
    }
    Ok(())
}
