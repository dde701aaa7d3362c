//! Scripted in-memory transport for unit tests.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::time::Duration;

use log::LevelFilter;

use crate::clock::ManualClock;
use crate::error::{Error, Result};
use crate::port::Transport;

/// Route log output through the test harness.
pub(crate) fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Trace)
        .is_test(true)
        .try_init();
}

/// One recorded transport operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Op {
    Open,
    FlushInput,
    Write(Vec<u8>),
    Drain,
    Close,
}

/// Transport whose device side is a script.
///
/// Each write releases the next scripted reply (a list of fragments, each
/// delivered by a separate read). When nothing is readable, a read advances
/// the attached [`ManualClock`] by `idle_step` and reports a timeout.
pub(crate) struct MockTransport {
    open: bool,
    ops: Vec<Op>,
    on_open: Vec<Vec<u8>>,
    replies: VecDeque<Vec<Vec<u8>>>,
    incoming: VecDeque<Vec<u8>>,
    clock: Option<ManualClock>,
    idle_step: Duration,
    fail_writes_after: Option<usize>,
    writes_seen: usize,
    fail_open: bool,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self {
            open: false,
            ops: Vec::new(),
            on_open: Vec::new(),
            replies: VecDeque::new(),
            incoming: VecDeque::new(),
            clock: None,
            idle_step: Duration::from_millis(10),
            fail_writes_after: None,
            writes_seen: 0,
            fail_open: false,
        }
    }

    /// Advance `clock` whenever a read finds nothing.
    pub(crate) fn with_clock(mut self, clock: &ManualClock) -> Self {
        self.clock = Some(clock.clone());
        self
    }

    /// Fragments readable right after `open`.
    pub(crate) fn on_open(mut self, fragments: &[&[u8]]) -> Self {
        self.on_open = fragments.iter().map(|f| f.to_vec()).collect();
        self
    }

    /// Reply released by the next unanswered write.
    pub(crate) fn reply(mut self, fragments: &[&[u8]]) -> Self {
        self.replies
            .push_back(fragments.iter().map(|f| f.to_vec()).collect());
        self
    }

    /// Reply `count` times with the same single fragment.
    pub(crate) fn reply_repeat(mut self, fragment: &[u8], count: usize) -> Self {
        for _ in 0..count {
            self.replies.push_back(vec![fragment.to_vec()]);
        }
        self
    }

    /// Make every write after the first `count` fail.
    pub(crate) fn fail_writes_after(mut self, count: usize) -> Self {
        self.fail_writes_after = Some(count);
        self
    }

    /// Make `open` fail as if the device were missing.
    pub(crate) fn fail_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Make bytes readable immediately.
    pub(crate) fn push_incoming(&mut self, fragment: &[u8]) {
        self.incoming.push_back(fragment.to_vec());
    }

    pub(crate) fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Payloads of every write, in order.
    pub(crate) fn writes(&self) -> Vec<Vec<u8>> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Write(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn closed(&self) -> bool {
        self.ops.last() == Some(&Op::Close) && !self.open
    }
}

impl Transport for MockTransport {
    fn open(&mut self) -> Result<()> {
        if self.open {
            return Err(Error::AlreadyOpen("mock".into()));
        }
        if self.fail_open {
            return Err(Error::Io(io::Error::new(io::ErrorKind::NotFound, "no such device")));
        }
        self.open = true;
        self.ops.push(Op::Open);
        self.incoming.extend(self.on_open.drain(..));
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn flush_input(&mut self) -> Result<()> {
        if !self.open {
            return Err(Error::PortClosed);
        }
        self.ops.push(Op::FlushInput);
        self.incoming.clear();
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        if !self.open {
            return Err(Error::PortClosed);
        }
        self.ops.push(Op::Drain);
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.ops.push(Op::Close);
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn set_timeout(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}

impl Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "port closed"));
        }
        match self.incoming.pop_front() {
            Some(mut fragment) => {
                let n = fragment.len().min(buf.len());
                buf[..n].copy_from_slice(&fragment[..n]);
                if n < fragment.len() {
                    self.incoming.push_front(fragment.split_off(n));
                }
                Ok(n)
            },
            None => {
                if let Some(clock) = &self.clock {
                    clock.advance(self.idle_step);
                }
                Err(io::Error::new(io::ErrorKind::TimedOut, "no data"))
            },
        }
    }
}

impl Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "port closed"));
        }
        if self
            .fail_writes_after
            .is_some_and(|limit| self.writes_seen >= limit)
        {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        self.writes_seen += 1;
        self.ops.push(Op::Write(buf.to_vec()));
        if let Some(reply) = self.replies.pop_front() {
            self.incoming.extend(reply);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
