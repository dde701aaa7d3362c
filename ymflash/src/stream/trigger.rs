//! Prompt-driven responses to device output.
//!
//! A [`TriggerMatcher`] watches the device output for registered prompts and
//! runs the matching handler, which may answer through a [`Responder`].
//! Prompts may arrive split across any number of reads; bytes after a
//! matched prompt carry over to the next receipt.

use std::time::Duration;

use log::{debug, info};

use super::reader::ChunkReader;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::port::Transport;

/// Whether answers written by handlers are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseLog {
    /// Log every answer at info level.
    Logged,
    /// Never log answers (they may be credentials).
    Silent,
}

/// Handle given to a trigger handler.
pub struct Responder<'p> {
    port: &'p mut dyn Transport,
    log: ResponseLog,
    stop: bool,
}

impl<'p> Responder<'p> {
    fn new(port: &'p mut dyn Transport, log: ResponseLog) -> Self {
        Self {
            port,
            log,
            stop: false,
        }
    }

    /// Write `text` to the device (flush input, write, drain).
    /// Empty text writes nothing.
    pub fn respond(&mut self, text: &str) -> Result<()> {
        self.respond_then(text, || {})
    }

    /// Like [`respond`](Self::respond), then run `done` once the text has
    /// been drained. `done` does not run for empty text.
    pub fn respond_then<F: FnOnce()>(&mut self, text: &str, done: F) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.port.send(text.as_bytes())?;
        if self.log == ResponseLog::Logged {
            info!("{}", text.trim_end());
        }
        done();
        Ok(())
    }

    /// Stop the matcher after this handler returns.
    pub fn stop(&mut self) {
        self.stop = true;
    }
}

type Handler<'h> = Box<dyn FnMut(&mut Responder<'_>) -> Result<()> + 'h>;

enum Scan {
    Full { start: usize, index: usize },
    Partial { start: usize },
}

/// Matches registered prompts against device output.
pub struct TriggerMatcher<'h> {
    triggers: Vec<(Vec<u8>, Handler<'h>)>,
    residual: Vec<u8>,
    log: Option<ResponseLog>,
}

impl Default for TriggerMatcher<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'h> TriggerMatcher<'h> {
    /// Matcher with no prompts, stopped.
    pub fn new() -> Self {
        Self {
            triggers: Vec::new(),
            residual: Vec::new(),
            log: None,
        }
    }

    /// Register `handler` for `prompt`, replacing any handler already
    /// registered for it. Unmatched output seen so far is discarded.
    pub fn register<F>(&mut self, prompt: &str, handler: F) -> Result<()>
    where
        F: FnMut(&mut Responder<'_>) -> Result<()> + 'h,
    {
        if prompt.is_empty() {
            return Err(Error::EmptyPrompt);
        }

        let prompt = prompt.as_bytes().to_vec();
        let handler: Handler<'h> = Box::new(handler);
        match self.triggers.iter_mut().find(|(p, _)| *p == prompt) {
            Some(slot) => slot.1 = handler,
            None => self.triggers.push((prompt, handler)),
        }
        self.residual.clear();
        Ok(())
    }

    /// Start matching.
    pub fn start(&mut self, log: ResponseLog) {
        self.log = Some(log);
    }

    /// Stop matching. Later input is ignored. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.log.take().is_some() {
            debug!("Trigger matcher stopped");
        }
    }

    /// Whether the matcher is started.
    pub fn is_started(&self) -> bool {
        self.log.is_some()
    }

    /// Feed one receipt of device output.
    ///
    /// At most one handler runs per receipt: the prompt that starts
    /// leftmost wins, ties going to the earliest registered. Returns whether
    /// a handler ran.
    pub fn feed(&mut self, port: &mut dyn Transport, data: &[u8]) -> Result<bool> {
        let Some(log) = self.log else {
            return Ok(false);
        };
        self.residual.extend_from_slice(data);

        match self.scan() {
            None => {
                self.residual.clear();
                Ok(false)
            },
            Some(Scan::Partial { start }) => {
                self.residual.drain(..start);
                Ok(false)
            },
            Some(Scan::Full { start, index }) => {
                let (prompt, handler) = &mut self.triggers[index];
                self.residual.drain(..start + prompt.len());
                debug!("Matched prompt {:?}", String::from_utf8_lossy(prompt));

                let mut responder = Responder::new(port, log);
                handler(&mut responder)?;
                if responder.stop {
                    self.stop();
                }
                Ok(true)
            },
        }
    }

    /// Feed chunks from `reader` until a handler stops the matcher.
    ///
    /// Fails with [`Error::Timeout`] if the device stays silent for
    /// `idle_timeout`; every chunk restarts it.
    pub fn run<T, C>(&mut self, reader: &mut ChunkReader<'_, T, C>, idle_timeout: Duration) -> Result<()>
    where
        T: Transport,
        C: Clock,
    {
        while self.is_started() {
            match reader.next_chunk(Some(idle_timeout))? {
                Some(chunk) => {
                    self.feed(reader.port_mut(), &chunk)?;
                },
                None => {
                    self.stop();
                    return Err(Error::Timeout(format!(
                        "device went quiet for {} ms",
                        idle_timeout.as_millis()
                    )));
                },
            }
        }
        Ok(())
    }

    fn scan(&self) -> Option<Scan> {
        for start in 0..self.residual.len() {
            let rest = &self.residual[start..];
            for (index, (prompt, _)) in self.triggers.iter().enumerate() {
                if rest.starts_with(prompt) {
                    return Some(Scan::Full { start, index });
                }
                if prompt.starts_with(rest) {
                    return Some(Scan::Partial { start });
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::clock::ManualClock;
    use crate::stream::DebouncedChunker;
    use crate::testing::{MockTransport, Op};

    fn open_port() -> MockTransport {
        let mut port = MockTransport::new();
        port.open().unwrap();
        port
    }

    #[test]
    fn test_empty_prompt_is_rejected() {
        let mut matcher = TriggerMatcher::new();
        assert!(matches!(
            matcher.register("", |_| Ok(())),
            Err(Error::EmptyPrompt)
        ));
    }

    #[test]
    fn test_prompt_at_start_fires() {
        let fired = Cell::new(0);
        let mut port = open_port();
        let mut matcher = TriggerMatcher::new();
        matcher
            .register("SSID: ", |_| {
                fired.set(fired.get() + 1);
                Ok(())
            })
            .unwrap();
        matcher.start(ResponseLog::Logged);

        assert!(matcher.feed(&mut port, b"SSID: ").unwrap());
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_prompt_split_across_receipts_fires_once() {
        let fired = Cell::new(0);
        let mut port = open_port();
        let mut matcher = TriggerMatcher::new();
        matcher
            .register("SSID: ", |_| {
                fired.set(fired.get() + 1);
                Ok(())
            })
            .unwrap();
        matcher.start(ResponseLog::Logged);

        assert!(!matcher.feed(&mut port, b"SS").unwrap());
        assert_eq!(fired.get(), 0);
        assert!(matcher.feed(&mut port, b"ID: ").unwrap());
        assert_eq!(fired.get(), 1);
        assert!(!matcher.feed(&mut port, b"\r\n").unwrap());
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_non_matching_output_does_not_fire() {
        let fired = Cell::new(false);
        let mut port = open_port();
        let mut matcher = TriggerMatcher::new();
        matcher
            .register("SSID: ", |_| {
                fired.set(true);
                Ok(())
            })
            .unwrap();
        matcher.start(ResponseLog::Logged);

        assert!(!matcher.feed(&mut port, b"ASDF: ").unwrap());
        assert!(!fired.get());
    }

    #[test]
    fn test_prompt_after_noise_fires() {
        let fired = Cell::new(false);
        let mut port = open_port();
        let mut matcher = TriggerMatcher::new();
        matcher
            .register("SSID: ", |_| {
                fired.set(true);
                Ok(())
            })
            .unwrap();
        matcher.start(ResponseLog::Logged);

        assert!(matcher.feed(&mut port, b"\r\nscanning...\r\nSSID: ").unwrap());
        assert!(fired.get());
    }

    #[test]
    fn test_response_is_flushed_written_and_drained() {
        let done = Cell::new(false);
        let mut port = open_port();
        let mut matcher = TriggerMatcher::new();
        matcher
            .register("SSID: ", |r| r.respond_then("particle\n", || done.set(true)))
            .unwrap();
        matcher.start(ResponseLog::Silent);
        matcher.feed(&mut port, b"SSID: ").unwrap();

        assert!(done.get());
        assert_eq!(
            &port.ops()[1..],
            &[
                Op::FlushInput,
                Op::Write(b"particle\n".to_vec()),
                Op::Drain
            ]
        );
    }

    #[test]
    fn test_empty_response_writes_nothing() {
        let done = Cell::new(false);
        let mut port = open_port();
        let mut matcher = TriggerMatcher::new();
        matcher
            .register("SSID: ", |r| r.respond_then("", || done.set(true)))
            .unwrap();
        matcher.start(ResponseLog::Logged);
        matcher.feed(&mut port, b"SSID: ").unwrap();

        assert!(!done.get());
        assert!(port.writes().is_empty());
    }

    #[test]
    fn test_leftmost_prompt_wins_and_remainder_carries_over() {
        let order = RefCell::new(Vec::new());
        let mut port = open_port();
        let mut matcher = TriggerMatcher::new();
        matcher
            .register("Password: ", |_| {
                order.borrow_mut().push("password");
                Ok(())
            })
            .unwrap();
        matcher
            .register("SSID: ", |_| {
                order.borrow_mut().push("ssid");
                Ok(())
            })
            .unwrap();
        matcher.start(ResponseLog::Logged);

        assert!(matcher.feed(&mut port, b"SSID: Password: ").unwrap());
        assert!(matcher.feed(&mut port, b"").unwrap());
        assert_eq!(*order.borrow(), vec!["ssid", "password"]);
    }

    #[test]
    fn test_register_replaces_handler() {
        let which = Cell::new(0);
        let mut port = open_port();
        let mut matcher = TriggerMatcher::new();
        matcher
            .register("SSID: ", |_| {
                which.set(1);
                Ok(())
            })
            .unwrap();
        matcher
            .register("SSID: ", |_| {
                which.set(2);
                Ok(())
            })
            .unwrap();
        matcher.start(ResponseLog::Logged);
        matcher.feed(&mut port, b"SSID: ").unwrap();

        assert_eq!(which.get(), 2);
    }

    #[test]
    fn test_stop_is_idempotent_and_detaches() {
        let fired = Cell::new(false);
        let mut port = open_port();
        let mut matcher = TriggerMatcher::new();
        matcher
            .register("SSID: ", |_| {
                fired.set(true);
                Ok(())
            })
            .unwrap();

        assert!(!matcher.feed(&mut port, b"SSID: ").unwrap());
        matcher.start(ResponseLog::Logged);
        matcher.stop();
        matcher.stop();
        assert!(!matcher.is_started());
        assert!(!matcher.feed(&mut port, b"SSID: ").unwrap());
        assert!(!fired.get());
    }

    #[test]
    fn test_handler_error_propagates() {
        let mut port = open_port();
        let mut matcher = TriggerMatcher::new();
        matcher
            .register("Password: ", |_| Err(Error::MissingCredential("password")))
            .unwrap();
        matcher.start(ResponseLog::Silent);

        assert!(matches!(
            matcher.feed(&mut port, b"Password: "),
            Err(Error::MissingCredential("password"))
        ));
    }

    #[test]
    fn test_run_until_handler_stops() {
        let clock = ManualClock::new();
        let mut port = MockTransport::new()
            .with_clock(&clock)
            .reply(&[b"Done."]);
        port.open().unwrap();
        port.push_incoming(b"Name: ");

        let mut matcher = TriggerMatcher::new();
        matcher.register("Name: ", |r| r.respond("photon\n")).unwrap();
        matcher
            .register("Done.", |r| {
                r.stop();
                Ok(())
            })
            .unwrap();
        matcher.start(ResponseLog::Logged);

        let chunker = DebouncedChunker::new(&clock, Duration::from_millis(250));
        let mut reader = ChunkReader::new(&mut port, chunker);
        matcher.run(&mut reader, Duration::from_secs(5)).unwrap();

        assert!(!matcher.is_started());
        assert_eq!(port.writes(), vec![b"photon\n".to_vec()]);
    }

    #[test]
    fn test_run_times_out_on_silence() {
        let clock = ManualClock::new();
        let mut port = MockTransport::new().with_clock(&clock);
        port.open().unwrap();

        let mut matcher = TriggerMatcher::new();
        matcher.register("SSID: ", |_| Ok(())).unwrap();
        matcher.start(ResponseLog::Logged);

        let chunker = DebouncedChunker::new(&clock, Duration::from_millis(250));
        let mut reader = ChunkReader::new(&mut port, chunker);
        let err = matcher.run(&mut reader, Duration::from_secs(3)).unwrap_err();

        assert!(err.is_timeout());
        assert!(!matcher.is_started());
    }
}
