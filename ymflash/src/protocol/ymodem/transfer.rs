//! The YMODEM sender state machine.
//!
//! [`Transfer`] owns the whole batch and performs no I/O. Its driver feeds
//! it received bytes and expired deadlines and carries out the returned
//! [`Action`]. Every error it returns is terminal and leaves it in
//! [`TransferState::Failed`].

use std::fs;
use std::path::Path;
use std::time::Duration;

use log::{debug, trace};

use super::packet::Packet;
use super::response::{Response, classify};
use super::{HeaderName, YmodemConfig, control, describe};
use crate::error::{Error, Result};

/// A file loaded into memory, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileImage {
    /// File name, written into the header when [`HeaderName::FileName`]
    /// is configured.
    pub name: String,
    /// File content.
    pub data: Vec<u8>,
}

impl FileImage {
    /// Create an image from memory.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Read a regular file. Its name is the base name of `path`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let unreadable = |source| Error::SourceFileUnreadable {
            path: path.to_path_buf(),
            source,
        };

        let metadata = fs::metadata(path).map_err(unreadable)?;
        if !metadata.is_file() {
            return Err(unreadable(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }
        let data = fs::read(path).map_err(unreadable)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self { name, data })
    }
}

/// Where the transfer stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Not started.
    Idle,
    /// Waiting for a CRC16 request or the ready prompt.
    AwaitingHandshake,
    /// A header packet was sent.
    AwaitingHeaderAck,
    /// A data packet was sent.
    AwaitingPacketAck,
    /// EOT was sent.
    AwaitingEotAck,
    /// The end-of-batch header was acknowledged.
    Closing,
    /// A terminal error occurred.
    Failed,
}

/// What the driver must do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send `bytes` (flush input, write, drain), then wait for a reply until
    /// `timeout` from now.
    Transmit {
        /// Wire bytes.
        bytes: Vec<u8>,
        /// Reply deadline, measured from the end of the write.
        timeout: Duration,
    },
    /// Keep reading. `Some` starts a new deadline, `None` keeps the current one.
    Await {
        /// New deadline, if any.
        timeout: Option<Duration>,
    },
    /// The batch completed; close the port.
    Close,
}

/// Progress notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    /// The device accepted the session.
    HandshakeComplete,
    /// A file header is about to be sent.
    FileStarted {
        /// Position in the batch.
        index: usize,
        /// File name.
        name: String,
        /// File length in bytes.
        size: usize,
    },
    /// A data packet was acknowledged.
    PacketAcknowledged {
        /// Position in the batch.
        index: usize,
        /// Sequence number of the packet.
        seq: u8,
        /// File bytes delivered so far.
        sent: usize,
        /// File length in bytes.
        total: usize,
    },
    /// EOT for a file was acknowledged.
    FileCompleted {
        /// Position in the batch.
        index: usize,
        /// File name.
        name: String,
    },
    /// The end-of-batch header was acknowledged.
    BatchCompleted,
}

/// State machine for one batch of files.
#[derive(Debug)]
pub struct Transfer {
    config: YmodemConfig,
    files: Vec<FileImage>,
    state: TransferState,
    file_index: usize,
    offset: usize,
    seq: u8,
    ending: bool,
    response: Vec<u8>,
    handshake_text: String,
    events: Vec<TransferEvent>,
}

impl Transfer {
    /// Prepare a batch. Every header is checked here so that nothing is sent
    /// for a batch that cannot complete.
    pub fn new(config: YmodemConfig, files: Vec<FileImage>) -> Result<Self> {
        if files.is_empty() {
            return Err(Error::NoFiles);
        }
        for file in &files {
            Packet::header(config.block_size, header_name(&config, file), file.data.len())?;
        }

        Ok(Self {
            config,
            files,
            state: TransferState::Idle,
            file_index: 0,
            offset: 0,
            seq: 0,
            ending: false,
            response: Vec::new(),
            handshake_text: String::new(),
            events: Vec::new(),
        })
    }

    /// Current state.
    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Session options.
    pub fn config(&self) -> &YmodemConfig {
        &self.config
    }

    /// Files in the batch.
    pub fn files(&self) -> &[FileImage] {
        &self.files
    }

    /// Sequence number of the packet in flight.
    pub fn seq(&self) -> u8 {
        self.seq
    }

    /// Whether the end-of-batch header is the packet in flight.
    pub fn is_ending(&self) -> bool {
        self.ending
    }

    /// Drain the progress events produced so far.
    pub fn take_events(&mut self) -> Vec<TransferEvent> {
        std::mem::take(&mut self.events)
    }

    /// Begin the handshake. Call once, right after the port is opened.
    pub fn start(&mut self) -> Result<Action> {
        if self.state != TransferState::Idle {
            return Err(self.fail(Error::Protocol("transfer already started".into())));
        }

        self.state = TransferState::AwaitingHandshake;
        let timeout = self.config.handshake_timeout;
        if self.config.listening_mode {
            debug!("Waiting for device to request the transfer");
            Ok(Action::Await {
                timeout: Some(timeout),
            })
        } else {
            debug!("Asking device to receive (trigger 0x{:02X})", self.config.trigger_byte);
            Ok(Action::Transmit {
                bytes: vec![self.config.trigger_byte],
                timeout,
            })
        }
    }

    /// Feed bytes received from the device.
    pub fn on_bytes(&mut self, data: &[u8]) -> Result<Action> {
        trace!("<- {}", describe(data));
        let result = self.step(data);
        result.map_err(|e| self.fail(e))
    }

    /// The current deadline expired.
    pub fn on_timeout(&mut self) -> Result<Action> {
        let err = match self.state {
            TransferState::AwaitingHandshake => Error::HandshakeTimeout,
            TransferState::AwaitingHeaderAck
            | TransferState::AwaitingPacketAck
            | TransferState::AwaitingEotAck => Error::PacketTimeout { seq: self.seq },
            state => Error::Protocol(format!("timeout in state {state:?}")),
        };
        Err(self.fail(err))
    }

    /// The transport failed underneath the transfer.
    pub fn on_transport_error(&mut self, err: Error) -> Error {
        self.fail(err)
    }

    fn fail(&mut self, err: Error) -> Error {
        debug!("Transfer failed in state {:?}: {err}", self.state);
        self.state = TransferState::Failed;
        err
    }

    fn step(&mut self, data: &[u8]) -> Result<Action> {
        match self.state {
            TransferState::AwaitingHandshake => self.on_handshake_bytes(data),
            TransferState::AwaitingHeaderAck
            | TransferState::AwaitingPacketAck
            | TransferState::AwaitingEotAck => {
                self.response.extend_from_slice(data);
                let expect_crc = self.state == TransferState::AwaitingHeaderAck && !self.ending;
                match classify(&self.response, expect_crc) {
                    None => Ok(Action::Await { timeout: None }),
                    Some(response) => {
                        self.response.clear();
                        self.on_response(response)
                    },
                }
            },
            state => Err(Error::Protocol(format!("unexpected data in state {state:?}"))),
        }
    }

    fn on_handshake_bytes(&mut self, data: &[u8]) -> Result<Action> {
        self.handshake_text.push_str(&String::from_utf8_lossy(data));
        let requested = data.first() == Some(&control::CRC16);
        let prompted = self.handshake_text.contains(&self.config.ready_prompt);
        if !requested && !prompted {
            return Ok(Action::Await { timeout: None });
        }

        debug!("Handshake complete");
        self.handshake_text.clear();
        self.events.push(TransferEvent::HandshakeComplete);
        self.begin_file(0)
    }

    fn on_response(&mut self, response: Response) -> Result<Action> {
        match (self.state, response) {
            (TransferState::AwaitingHeaderAck, Response::Ack) if self.ending => {
                debug!("End of batch acknowledged");
                self.state = TransferState::Closing;
                self.events.push(TransferEvent::BatchCompleted);
                Ok(Action::Close)
            },
            (TransferState::AwaitingHeaderAck, Response::Ack) => {
                self.seq = 1;
                Ok(self.next_data())
            },
            (TransferState::AwaitingHeaderAck, other) => Err(Error::HeaderRejected {
                response: other.label(),
            }),
            (TransferState::AwaitingPacketAck, Response::Ack) => {
                let total = self.files[self.file_index].data.len();
                self.offset = (self.offset + self.config.block_size.len()).min(total);
                self.events.push(TransferEvent::PacketAcknowledged {
                    index: self.file_index,
                    seq: self.seq,
                    sent: self.offset,
                    total,
                });
                self.seq = self.seq.wrapping_add(1);
                Ok(self.next_data())
            },
            (TransferState::AwaitingEotAck, Response::Ack) => {
                let name = self.files[self.file_index].name.clone();
                debug!("File '{name}' complete");
                self.events.push(TransferEvent::FileCompleted {
                    index: self.file_index,
                    name,
                });
                if self.file_index + 1 < self.files.len() {
                    self.begin_file(self.file_index + 1)
                } else {
                    Ok(self.end_batch())
                }
            },
            (_, Response::Nak) => Err(Error::PacketRejected { seq: self.seq }),
            (_, Response::Cancel) => Err(Error::TransferCancelled),
            (_, Response::CrcRequest) => Err(Error::UnknownResponse(control::CRC16)),
            (_, Response::Unknown(byte)) => Err(Error::UnknownResponse(byte)),
            (_, Response::Ack) => Err(Error::Protocol(format!(
                "acknowledgement in state {:?}",
                self.state
            ))),
        }
    }

    fn begin_file(&mut self, index: usize) -> Result<Action> {
        self.file_index = index;
        self.offset = 0;
        self.seq = 0;
        self.ending = false;

        let file = &self.files[index];
        debug!("Sending file '{}' ({} bytes)", file.name, file.data.len());
        self.events.push(TransferEvent::FileStarted {
            index,
            name: file.name.clone(),
            size: file.data.len(),
        });

        let packet = Packet::header(
            self.config.block_size,
            header_name(&self.config, file),
            file.data.len(),
        )?;
        self.state = TransferState::AwaitingHeaderAck;
        Ok(self.transmit(&packet))
    }

    fn next_data(&mut self) -> Action {
        let data = &self.files[self.file_index].data;
        if self.offset >= data.len() {
            trace!("-> EOT");
            self.state = TransferState::AwaitingEotAck;
            return Action::Transmit {
                bytes: vec![control::EOT],
                timeout: self.config.packet_timeout,
            };
        }

        let end = (self.offset + self.config.block_size.len()).min(data.len());
        let packet = Packet::data(self.config.block_size, self.seq, &data[self.offset..end]);
        self.state = TransferState::AwaitingPacketAck;
        self.transmit(&packet)
    }

    fn end_batch(&mut self) -> Action {
        debug!("Closing batch");
        self.seq = 0;
        self.ending = true;
        self.state = TransferState::AwaitingHeaderAck;
        self.transmit(&Packet::end_of_batch(self.config.block_size))
    }

    fn transmit(&self, packet: &Packet) -> Action {
        trace!(
            "-> {} seq {} ({} byte payload)",
            describe(&[packet.mark()]),
            packet.seq(),
            packet.payload().len()
        );
        Action::Transmit {
            bytes: packet.encode(self.config.checksum),
            timeout: self.config.packet_timeout,
        }
    }
}

fn header_name<'a>(config: &'a YmodemConfig, file: &'a FileImage) -> &'a str {
    match &config.header_name {
        HeaderName::Fixed(name) => name,
        HeaderName::FileName => &file.name,
    }
}
