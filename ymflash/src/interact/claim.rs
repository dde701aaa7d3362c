//! Claim code entry.

use log::{debug, info};

use super::InteractOptions;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::port::Transport;
use crate::stream::{ChunkReader, DebouncedChunker, ResponseLog, TriggerMatcher};

const CLAIM_PROMPT: &str = "Enter 63-digit claim code: ";
const CLAIM_CONFIRMATION: &str = "Claim code set to: ";

/// Store a claim code on a device in listening mode.
///
/// Writes `C`, answers the prompt with the code and waits for the device to
/// echo it back. The code is never logged. The port is closed afterwards.
pub fn set_claim_code<T, C>(
    port: &mut T,
    clock: &C,
    code: &str,
    options: &InteractOptions,
) -> Result<()>
where
    T: Transport,
    C: Clock,
{
    if code.trim().is_empty() {
        return Err(Error::MissingCredential("claim code"));
    }

    if !port.is_open() {
        port.open()?;
    }
    let outcome = claim_exchange(port, clock, code, options);
    port.close();
    if outcome.is_ok() {
        info!("Claim code set");
    }
    outcome
}

fn claim_exchange<T, C>(port: &mut T, clock: &C, code: &str, options: &InteractOptions) -> Result<()>
where
    T: Transport,
    C: Clock,
{
    let mut matcher = TriggerMatcher::new();

    let answer = format!("{code}\n");
    matcher.register(CLAIM_PROMPT, move |r| r.respond(&answer))?;
    matcher.register(&format!("{CLAIM_CONFIRMATION}{code}"), |r| {
        debug!("Device confirmed claim code");
        r.stop();
        Ok(())
    })?;

    matcher.start(ResponseLog::Silent);
    port.send(b"C")?;

    let chunker = DebouncedChunker::new(clock, options.quiet_period);
    let mut reader = ChunkReader::new(port, chunker);
    matcher.run(&mut reader, options.idle_timeout)
}
