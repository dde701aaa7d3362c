//! Classification of device replies.

use super::control::{ACK, CAN, CRC16, NAK};

/// A complete reply from the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Packet accepted.
    Ack,
    /// Packet rejected.
    Nak,
    /// Two consecutive CAN bytes.
    Cancel,
    /// Receiver asks for (another) CRC16 transfer.
    CrcRequest,
    /// Anything else; carries the offending byte.
    Unknown(u8),
}

impl Response {
    /// Short label for diagnostics.
    pub fn label(self) -> String {
        match self {
            Self::Ack => "ACK".into(),
            Self::Nak => "NAK".into(),
            Self::Cancel => "CA CA".into(),
            Self::CrcRequest => "CRC16".into(),
            Self::Unknown(b) => format!("0x{b:02X}"),
        }
    }
}

/// Classify the bytes received since the last write.
///
/// Returns `None` while the reply is still incomplete. A lone CAN waits for a
/// second byte. When `expect_crc_after_ack` is set (the reply to a file
/// header), a lone ACK also waits for the CRC16 byte that follows it.
pub fn classify(buf: &[u8], expect_crc_after_ack: bool) -> Option<Response> {
    let first = *buf.first()?;
    match first {
        ACK if expect_crc_after_ack && buf.len() < 2 => None,
        ACK => Some(Response::Ack),
        CAN => match buf.get(1) {
            None => None,
            Some(&CAN) => Some(Response::Cancel),
            Some(&other) => Some(Response::Unknown(other)),
        },
        NAK => Some(Response::Nak),
        CRC16 => Some(Response::CrcRequest),
        other => Some(Response::Unknown(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_incomplete() {
        assert_eq!(classify(&[], false), None);
        assert_eq!(classify(&[], true), None);
    }

    #[test]
    fn test_ack() {
        assert_eq!(classify(&[ACK], false), Some(Response::Ack));
        assert_eq!(classify(&[ACK, CRC16], false), Some(Response::Ack));
    }

    #[test]
    fn test_header_ack_waits_for_crc_byte() {
        assert_eq!(classify(&[ACK], true), None);
        assert_eq!(classify(&[ACK, CRC16], true), Some(Response::Ack));
    }

    #[test]
    fn test_cancel_needs_two_bytes() {
        assert_eq!(classify(&[CAN], false), None);
        assert_eq!(classify(&[CAN, CAN], false), Some(Response::Cancel));
        assert_eq!(classify(&[CAN, 0x33], false), Some(Response::Unknown(0x33)));
    }

    #[test]
    fn test_nak_crc_and_noise() {
        assert_eq!(classify(&[NAK], false), Some(Response::Nak));
        assert_eq!(classify(&[CRC16], false), Some(Response::CrcRequest));
        assert_eq!(classify(b"xyz", false), Some(Response::Unknown(b'x')));
    }
}
