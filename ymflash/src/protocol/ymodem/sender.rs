//! Blocking driver for [`Transfer`].

use std::path::Path;
use std::time::Instant;

use log::{debug, warn};

use super::transfer::{Action, FileImage, Transfer, TransferEvent};
use super::{YmodemConfig, control};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::port::{Transport, read_some};

/// Sends batches of files over a transport.
///
/// The sender owns the port for the duration of a batch: it opens it, and
/// closes it again whatever the outcome. On failure the cancel sequence is
/// written first, best-effort.
pub struct YmodemSender<'a, T: Transport + ?Sized, C: Clock = SystemClock> {
    port: &'a mut T,
    clock: C,
    config: YmodemConfig,
    opened: bool,
}

impl<'a, T: Transport + ?Sized> YmodemSender<'a, T, SystemClock> {
    /// Create a sender using the system clock.
    pub fn new(port: &'a mut T, config: YmodemConfig) -> Self {
        Self::with_clock(port, config, SystemClock)
    }
}

impl<'a, T: Transport + ?Sized, C: Clock> YmodemSender<'a, T, C> {
    /// Create a sender with an explicit time source.
    pub fn with_clock(port: &'a mut T, config: YmodemConfig, clock: C) -> Self {
        Self {
            port,
            clock,
            config,
            opened: false,
        }
    }

    /// Send files in order.
    pub fn send<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<()> {
        self.send_with_progress(paths, |_| {})
    }

    /// Send files in order, reporting progress.
    ///
    /// Every file is read before the port is opened, so an unreadable input
    /// never leaves the device half-way through a batch.
    pub fn send_with_progress<P, F>(&mut self, paths: &[P], progress: F) -> Result<()>
    where
        P: AsRef<Path>,
        F: FnMut(&TransferEvent),
    {
        let images = paths
            .iter()
            .map(|p| FileImage::from_path(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.send_images(images, progress)
    }

    /// Send in-memory images in order.
    pub fn send_images<F>(&mut self, images: Vec<FileImage>, mut progress: F) -> Result<()>
    where
        F: FnMut(&TransferEvent),
    {
        let mut transfer = Transfer::new(self.config.clone(), images)?;
        let outcome = self.run(&mut transfer, &mut progress);
        self.teardown(outcome.is_err());
        outcome
    }

    fn run<F>(&mut self, transfer: &mut Transfer, progress: &mut F) -> Result<()>
    where
        F: FnMut(&TransferEvent),
    {
        if let Err(e) = self.port.open() {
            if !matches!(e, Error::AlreadyOpen(_)) {
                self.port.close();
            }
            return Err(transfer.on_transport_error(e));
        }
        self.opened = true;
        if let Err(e) = self.port.set_timeout(self.config.poll_interval) {
            return Err(transfer.on_transport_error(e));
        }

        let mut action = transfer.start()?;
        let mut deadline = self.clock.now();
        loop {
            for event in transfer.take_events() {
                progress(&event);
            }

            match action {
                Action::Close => return Ok(()),
                Action::Transmit { bytes, timeout } => {
                    if let Err(e) = self.port.send(&bytes) {
                        return Err(transfer.on_transport_error(e));
                    }
                    deadline = self.clock.deadline(timeout);
                },
                Action::Await {
                    timeout: Some(timeout),
                } => deadline = self.clock.deadline(timeout),
                Action::Await { timeout: None } => {},
            }

            action = self.next_action(transfer, deadline)?;
        }
    }

    fn next_action(&mut self, transfer: &mut Transfer, deadline: Instant) -> Result<Action> {
        let mut buf = [0u8; 256];
        loop {
            if self.clock.expired(deadline) {
                return transfer.on_timeout();
            }
            let n = match read_some(&mut *self.port, &mut buf) {
                Ok(n) => n,
                Err(e) => return Err(transfer.on_transport_error(e)),
            };
            if n > 0 {
                return transfer.on_bytes(&buf[..n]);
            }
        }
    }

    fn teardown(&mut self, failed: bool) {
        if !self.opened {
            return;
        }
        self.opened = false;

        if failed && self.port.is_open() {
            debug!("Sending cancel sequence");
            let cancelled = self
                .port
                .write_all(&control::CANCEL_SEQUENCE)
                .map_err(Error::from)
                .and_then(|()| self.port.drain());
            if let Err(e) = cancelled {
                warn!("Could not send cancel sequence: {e}");
            }
        }
        self.port.close();
    }
}

/// Send files with the system clock.
pub fn send_files<T, P>(port: &mut T, paths: &[P], config: YmodemConfig) -> Result<()>
where
    T: Transport + ?Sized,
    P: AsRef<Path>,
{
    YmodemSender::new(port, config).send(paths)
}
