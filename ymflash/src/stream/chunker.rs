//! Debounced grouping of bursty serial output.

use std::time::{Duration, Instant};

use crate::clock::Clock;

/// Quiet period used when none is configured.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(250);

/// Groups received bytes into chunks separated by a quiet period.
///
/// Every [`push`](Self::push) restarts the quiet timer. The buffer is emitted
/// as one chunk once the timer expires ([`poll`](Self::poll)), immediately
/// when the optional terminator shows up, or on [`flush`](Self::flush).
/// Emitting always cancels the timer.
#[derive(Debug)]
pub struct DebouncedChunker<C: Clock> {
    clock: C,
    quiet_period: Duration,
    terminator: Option<Vec<u8>>,
    buffer: Vec<u8>,
    deadline: Option<Instant>,
}

impl<C: Clock> DebouncedChunker<C> {
    /// Chunker that emits only after a quiet period.
    pub fn new(clock: C, quiet_period: Duration) -> Self {
        Self {
            clock,
            quiet_period,
            terminator: None,
            buffer: Vec::new(),
            deadline: None,
        }
    }

    /// Chunker that also emits as soon as `terminator` has been received.
    /// An empty terminator disables early emission.
    pub fn with_terminator(clock: C, quiet_period: Duration, terminator: impl Into<Vec<u8>>) -> Self {
        let terminator = terminator.into();
        let mut chunker = Self::new(clock, quiet_period);
        chunker.terminator = (!terminator.is_empty()).then_some(terminator);
        chunker
    }

    /// Quiet period.
    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Time source driving the timer.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Add received bytes. Returns a chunk if the terminator completed one.
    pub fn push(&mut self, data: &[u8]) -> Option<Vec<u8>> {
        if data.is_empty() {
            return None;
        }
        self.buffer.extend_from_slice(data);

        if let Some(terminator) = &self.terminator {
            // Only the tail that could contain a new occurrence needs scanning.
            let from = self
                .buffer
                .len()
                .saturating_sub(data.len() + terminator.len() - 1);
            if contains(&self.buffer[from..], terminator) {
                return self.take();
            }
        }

        self.deadline = Some(self.clock.deadline(self.quiet_period));
        None
    }

    /// Emit the buffer if the quiet period has elapsed.
    pub fn poll(&mut self) -> Option<Vec<u8>> {
        match self.deadline {
            Some(deadline) if self.clock.expired(deadline) => self.take(),
            _ => None,
        }
    }

    /// Emit whatever is buffered, bypassing the timer.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        self.take()
    }

    /// Drop buffered bytes and the pending timer.
    pub fn cancel(&mut self) {
        self.buffer.clear();
        self.deadline = None;
    }

    /// When the pending timer fires, if one is running.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn take(&mut self) -> Option<Vec<u8>> {
        self.deadline = None;
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const QUIET: Duration = Duration::from_millis(250);

    #[test]
    fn test_bursts_within_quiet_period_form_one_chunk() {
        let clock = ManualClock::new();
        let mut chunker = DebouncedChunker::new(&clock, QUIET);

        assert_eq!(chunker.push(b"abc"), None);
        clock.advance(Duration::from_millis(200));
        assert_eq!(chunker.poll(), None);

        assert_eq!(chunker.push(b"def"), None);
        clock.advance(Duration::from_millis(200));
        assert_eq!(chunker.poll(), None);

        clock.advance(Duration::from_millis(50));
        assert_eq!(chunker.poll(), Some(b"abcdef".to_vec()));
        assert_eq!(chunker.poll(), None);
        assert!(chunker.is_empty());
    }

    #[test]
    fn test_timer_restarts_on_every_push() {
        let clock = ManualClock::new();
        let mut chunker = DebouncedChunker::new(&clock, QUIET);

        chunker.push(b"a");
        let first = chunker.next_deadline().unwrap();
        clock.advance(Duration::from_millis(100));
        chunker.push(b"b");
        assert_eq!(
            chunker.next_deadline().unwrap() - first,
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_flush_bypasses_timer() {
        let clock = ManualClock::new();
        let mut chunker = DebouncedChunker::new(&clock, QUIET);

        chunker.push(b"partial");
        assert_eq!(chunker.flush(), Some(b"partial".to_vec()));
        assert_eq!(chunker.next_deadline(), None);
        assert_eq!(chunker.flush(), None);
    }

    #[test]
    fn test_terminator_emits_early_and_cancels_timer() {
        let clock = ManualClock::new();
        let mut chunker = DebouncedChunker::with_terminator(&clock, Duration::from_secs(5), "arnie");

        assert_eq!(chunker.push(b"abc"), None);
        assert!(chunker.next_deadline().is_some());

        assert_eq!(chunker.push(b"defarnie"), Some(b"abcdefarnie".to_vec()));
        assert_eq!(chunker.next_deadline(), None);

        clock.advance(Duration::from_secs(10));
        assert_eq!(chunker.poll(), None);
    }

    #[test]
    fn test_terminator_split_across_pushes() {
        let clock = ManualClock::new();
        let mut chunker = DebouncedChunker::with_terminator(&clock, QUIET, "\r\n");

        assert_eq!(chunker.push(b"version 1.2\r"), None);
        assert_eq!(chunker.push(b"\n"), Some(b"version 1.2\r\n".to_vec()));
    }

    #[test]
    fn test_without_terminator_waits_for_quiet_period() {
        let clock = ManualClock::new();
        let mut chunker = DebouncedChunker::with_terminator(&clock, QUIET, "arnie");

        chunker.push(b"abc");
        chunker.push(b"def");
        clock.advance(QUIET);
        assert_eq!(chunker.poll(), Some(b"abcdef".to_vec()));
    }

    #[test]
    fn test_cancel_discards() {
        let clock = ManualClock::new();
        let mut chunker = DebouncedChunker::new(&clock, QUIET);

        chunker.push(b"noise");
        chunker.cancel();
        clock.advance(QUIET);
        assert_eq!(chunker.poll(), None);
        assert!(chunker.is_empty());
    }
}
