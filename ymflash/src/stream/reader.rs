//! Pull debounced chunks out of a transport.

use std::time::Duration;

use log::trace;

use super::chunker::DebouncedChunker;
use crate::clock::Clock;
use crate::error::Result;
use crate::port::{Transport, read_some};

/// Reads a transport through a [`DebouncedChunker`].
pub struct ChunkReader<'a, T: Transport + ?Sized, C: Clock> {
    port: &'a mut T,
    chunker: DebouncedChunker<C>,
}

impl<'a, T: Transport + ?Sized, C: Clock> ChunkReader<'a, T, C> {
    /// Wrap an open port.
    pub fn new(port: &'a mut T, chunker: DebouncedChunker<C>) -> Self {
        Self { port, chunker }
    }

    /// Next chunk of device output.
    ///
    /// With a `timeout`, returns `Ok(None)` once it elapses with nothing
    /// received. Bytes that arrived before the timeout are still delivered
    /// when their quiet period ends.
    pub fn next_chunk(&mut self, timeout: Option<Duration>) -> Result<Option<Vec<u8>>> {
        let deadline = timeout.map(|t| self.chunker.clock().deadline(t));
        let mut buf = [0u8; 256];

        loop {
            if let Some(chunk) = self.chunker.poll() {
                return Ok(Some(chunk));
            }

            let n = read_some(&mut *self.port, &mut buf)?;
            if n > 0 {
                trace!("<- {:?}", String::from_utf8_lossy(&buf[..n]));
                if let Some(chunk) = self.chunker.push(&buf[..n]) {
                    return Ok(Some(chunk));
                }
                continue;
            }

            let timed_out = deadline.is_some_and(|d| self.chunker.clock().expired(d));
            if timed_out && self.chunker.is_empty() {
                return Ok(None);
            }
        }
    }

    /// The wrapped port, for writing replies.
    pub fn port_mut(&mut self) -> &mut T {
        &mut *self.port
    }

    /// Stop reading and return anything still buffered.
    pub fn finish(mut self) -> Option<Vec<u8>> {
        self.chunker.flush()
    }
}
