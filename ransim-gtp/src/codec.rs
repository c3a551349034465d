//! GTP-U header encoding/decoding
//!
//! 3GPP TS 29.281. The simulator only exchanges G-PDU messages with an
//! optional sequence number; extension header chains are not produced.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// GTP-U protocol version (always 1)
pub const GTP_VERSION: u8 = 1;

/// GTP-U message types used by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GtpMessageType {
    /// Echo Request
    EchoRequest = 1,
    /// Echo Response
    EchoResponse = 2,
    /// End Marker
    EndMarker = 254,
    /// G-PDU (user data)
    GPdu = 255,
}

impl GtpMessageType {
    /// Converts a wire value to a message type.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::EchoRequest),
            2 => Some(Self::EchoResponse),
            254 => Some(Self::EndMarker),
            255 => Some(Self::GPdu),
            _ => None,
        }
    }
}

/// GTP-U codec errors.
#[derive(Debug, Error)]
pub enum GtpError {
    /// Input shorter than the mandatory header
    #[error("truncated GTP-U header")]
    Truncated,
    /// Version field is not 1
    #[error("unsupported GTP version {0}")]
    UnsupportedVersion(u8),
    /// Unknown message type
    #[error("unknown GTP-U message type {0}")]
    UnknownMessageType(u8),
    /// Declared payload length disagrees with the buffer
    #[error("inconsistent GTP-U length field")]
    BadLength,
}

/// A GTP-U message header with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GtpHeader {
    /// Message type
    pub message_type: GtpMessageType,
    /// Tunnel Endpoint Identifier
    pub teid: u32,
    /// Optional sequence number
    pub sequence_number: Option<u16>,
    /// Payload (the T-PDU for G-PDU messages)
    pub payload: Bytes,
}

impl GtpHeader {
    /// Creates a G-PDU message carrying user data.
    pub fn g_pdu(teid: u32, payload: Bytes) -> Self {
        Self {
            message_type: GtpMessageType::GPdu,
            teid,
            sequence_number: None,
            payload,
        }
    }

    /// Sets the sequence number flag and value.
    pub fn with_sequence_number(mut self, sn: u16) -> Self {
        self.sequence_number = Some(sn);
        self
    }

    /// Encodes the message to its wire form.
    pub fn encode(&self) -> Bytes {
        let opt_len = if self.sequence_number.is_some() { 4 } else { 0 };
        let length = (self.payload.len() + opt_len) as u16;

        let mut buf = BytesMut::with_capacity(8 + opt_len + self.payload.len());
        let s_flag = u8::from(self.sequence_number.is_some());
        // version(3) | PT(1) | reserved(1) | E(1) | S(1) | PN(1)
        buf.put_u8((GTP_VERSION << 5) | (1 << 4) | (s_flag << 1));
        buf.put_u8(self.message_type as u8);
        buf.put_u16(length);
        buf.put_u32(self.teid);
        if let Some(sn) = self.sequence_number {
            buf.put_u16(sn);
            buf.put_u8(0); // N-PDU number
            buf.put_u8(0); // next extension header type
        }
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Decodes a message from its wire form.
    pub fn decode(data: &[u8]) -> Result<Self, GtpError> {
        if data.len() < 8 {
            return Err(GtpError::Truncated);
        }
        let mut buf = data;
        let flags = buf.get_u8();
        let version = flags >> 5;
        if version != GTP_VERSION {
            return Err(GtpError::UnsupportedVersion(version));
        }
        let has_opt = flags & 0x07 != 0;

        let message_type_raw = buf.get_u8();
        let message_type = GtpMessageType::from_u8(message_type_raw)
            .ok_or(GtpError::UnknownMessageType(message_type_raw))?;
        let length = buf.get_u16() as usize;
        let teid = buf.get_u32();

        if buf.remaining() < length {
            return Err(GtpError::BadLength);
        }

        let (sequence_number, payload) = if has_opt {
            if length < 4 {
                return Err(GtpError::BadLength);
            }
            let sn = buf.get_u16();
            buf.advance(2); // N-PDU number + next extension header type
            let sn = if flags & 0x02 != 0 { Some(sn) } else { None };
            (sn, Bytes::copy_from_slice(&buf[..length - 4]))
        } else {
            (None, Bytes::copy_from_slice(&buf[..length]))
        };

        Ok(Self {
            message_type,
            teid,
            sequence_number,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_g_pdu_round_trip() {
        let header = GtpHeader::g_pdu(0x1234_5678, Bytes::from_static(b"user data"));
        let encoded = header.encode();
        let decoded = GtpHeader::decode(&encoded).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_g_pdu_with_sequence_number() {
        let header = GtpHeader::g_pdu(1, Bytes::from_static(&[0x45, 0x00])).with_sequence_number(7);
        let decoded = GtpHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded.sequence_number, Some(7));
        assert_eq!(decoded.payload.as_ref(), &[0x45, 0x00]);
    }

    #[test]
    fn test_truncated_rejected() {
        assert!(matches!(
            GtpHeader::decode(&[0x30, 0xff, 0x00]),
            Err(GtpError::Truncated)
        ));
    }

    #[test]
    fn test_bad_version_rejected() {
        let header = GtpHeader::g_pdu(1, Bytes::new());
        let mut bytes = header.encode().to_vec();
        bytes[0] = 0x50; // version 2
        assert!(matches!(
            GtpHeader::decode(&bytes),
            Err(GtpError::UnsupportedVersion(2))
        ));
    }
}
