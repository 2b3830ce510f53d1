//! Request and reply messages.
//!
//! Decoding borrows from the frame and never trusts the header's size
//! field; lengths come from the explicit size byte.

use {
    super::{
        CMD_FLASH_READ, CMD_FLASH_WRITE, HEADER_LEN, MessageId, REPLY_FIXED_LEN,
        REPLY_FLASH_READ, REPLY_FLASH_WRITE, REQUEST_FIXED_LEN,
    },
    crate::error::{Error, Result},
    byteorder::{ByteOrder, LittleEndian},
};

fn ensure_len(frame: &[u8], expected: usize) -> Result<()> {
    if frame.len() < expected {
        return Err(Error::Truncated {
            expected,
            actual: frame.len(),
        });
    }
    Ok(())
}

/// Transport header preceding every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Header {
    /// Message identifier.
    pub id: u16,
    /// Payload size as announced by the sender (informational).
    pub size: u16,
}

impl Header {
    /// Parse the header from the start of a frame.
    pub fn parse(frame: &[u8]) -> Result<Self> {
        ensure_len(frame, HEADER_LEN)?;
        Ok(Self {
            id: LittleEndian::read_u16(&frame[0..2]),
            size: LittleEndian::read_u16(&frame[2..4]),
        })
    }

    fn write(self, buf: &mut [u8]) {
        LittleEndian::write_u16(&mut buf[0..2], self.id);
        LittleEndian::write_u16(&mut buf[2..4], self.size);
    }
}

/// Fields shared by both requests: address, size, timestamp.
fn parse_request_fields(frame: &[u8]) -> Result<(u32, u8, u32)> {
    ensure_len(frame, REQUEST_FIXED_LEN)?;
    let address = LittleEndian::read_u32(&frame[4..8]);
    let size = frame[8];
    let timestamp = LittleEndian::read_u32(&frame[12..16]);
    Ok((address, size, timestamp))
}

/// Flash read request (`0x542B`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReadRequest {
    /// Start address.
    pub address: u32,
    /// Number of bytes requested.
    pub size: u8,
    /// Session timestamp echoed from the transport.
    pub timestamp: u32,
}

impl ReadRequest {
    /// Create a read request.
    pub fn new(address: u32, size: u8, timestamp: u32) -> Self {
        Self {
            address,
            size,
            timestamp,
        }
    }

    /// Decode from a raw frame. The header id is not checked.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let (address, size, timestamp) = parse_request_fields(frame)?;
        Ok(Self {
            address,
            size,
            timestamp,
        })
    }

    /// Encode into a 16-byte frame.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; REQUEST_FIXED_LEN];
        #[allow(clippy::cast_possible_truncation)] // 12
        let size = (REQUEST_FIXED_LEN - HEADER_LEN) as u16;
        Header {
            id: CMD_FLASH_READ,
            size,
        }
        .write(&mut buf);
        LittleEndian::write_u32(&mut buf[4..8], self.address);
        buf[8] = self.size;
        LittleEndian::write_u32(&mut buf[12..16], self.timestamp);
        buf
    }
}

/// Flash read reply (`0x542C`).
///
/// The wire format has no status field. A rejected read still carries
/// `size` bytes of data, all zero.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReadReply {
    /// Echoed start address.
    pub address: u32,
    /// Echoed size.
    pub size: u8,
    /// Data bytes, `size` long.
    pub data: Vec<u8>,
}

impl ReadReply {
    /// A reply for `request` with a zero-filled data block.
    pub fn zeroed(request: &ReadRequest) -> Self {
        Self {
            address: request.address,
            size: request.size,
            data: vec![0u8; usize::from(request.size)],
        }
    }

    /// Total number of bytes on the wire.
    pub fn wire_len(&self) -> usize {
        REPLY_FIXED_LEN + usize::from(self.size)
    }

    /// Decode from a raw frame.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len(frame, REPLY_FIXED_LEN)?;
        let header = Header::parse(frame)?;
        if header.id != REPLY_FLASH_READ {
            return Err(Error::UnexpectedReply {
                expected: REPLY_FLASH_READ,
                actual: header.id,
            });
        }
        let address = LittleEndian::read_u32(&frame[4..8]);
        let size = frame[8];
        let end = REPLY_FIXED_LEN + usize::from(size);
        ensure_len(frame, end)?;
        Ok(Self {
            address,
            size,
            data: frame[REPLY_FIXED_LEN..end].to_vec(),
        })
    }

    /// Encode into `size + 12` bytes. Data is zero-padded or cut to `size`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.wire_len()];
        Header {
            id: REPLY_FLASH_READ,
            size: u16::from(self.size) + 8,
        }
        .write(&mut buf);
        LittleEndian::write_u32(&mut buf[4..8], self.address);
        buf[8] = self.size;
        let n = self.data.len().min(usize::from(self.size));
        buf[REPLY_FIXED_LEN..REPLY_FIXED_LEN + n].copy_from_slice(&self.data[..n]);
        buf
    }
}

/// Flash write request (`0x5438`).
///
/// `data` is whatever trailing bytes the frame actually carried, up to
/// `size`. Use [`WriteRequest::is_complete`] before trusting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct WriteRequest<'a> {
    /// Start address.
    pub address: u32,
    /// Declared payload size.
    pub size: u8,
    /// Session timestamp echoed from the transport.
    pub timestamp: u32,
    /// Payload bytes.
    pub data: &'a [u8],
}

impl<'a> WriteRequest<'a> {
    /// Create a write request whose size field matches `data`.
    pub fn new(address: u32, data: &'a [u8], timestamp: u32) -> Result<Self> {
        let size = u8::try_from(data.len()).map_err(|_| {
            Error::InvalidLength(format!("{} bytes does not fit the size field", data.len()))
        })?;
        Ok(Self {
            address,
            size,
            timestamp,
            data,
        })
    }

    /// Decode from a raw frame. The header id is not checked.
    pub fn decode(frame: &'a [u8]) -> Result<Self> {
        let (address, size, timestamp) = parse_request_fields(frame)?;
        let available = frame.len() - REQUEST_FIXED_LEN;
        let take = available.min(usize::from(size));
        Ok(Self {
            address,
            size,
            timestamp,
            data: &frame[REQUEST_FIXED_LEN..REQUEST_FIXED_LEN + take],
        })
    }

    /// Whether the frame carried all `size` payload bytes.
    pub fn is_complete(&self) -> bool {
        self.data.len() == usize::from(self.size)
    }

    /// Encode into `16 + data.len()` bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; REQUEST_FIXED_LEN + self.data.len()];
        #[allow(clippy::cast_possible_truncation)] // size byte caps data at 255
        let size = (buf.len() - HEADER_LEN) as u16;
        Header {
            id: CMD_FLASH_WRITE,
            size,
        }
        .write(&mut buf);
        LittleEndian::write_u32(&mut buf[4..8], self.address);
        buf[8] = self.size;
        LittleEndian::write_u32(&mut buf[12..16], self.timestamp);
        buf[REQUEST_FIXED_LEN..].copy_from_slice(self.data);
        buf
    }
}

/// Outcome byte of a write reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum WriteStatus {
    /// Data was programmed.
    Ok = 0,
    /// Request was rejected or the flash failed.
    Error = 1,
}

impl From<u8> for WriteStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Ok,
            _ => Self::Error,
        }
    }
}

/// Flash write reply (`0x5439`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct WriteReply {
    /// Echoed start address.
    pub address: u32,
    /// Outcome.
    pub status: WriteStatus,
}

impl WriteReply {
    /// Fixed length on the wire.
    pub const WIRE_LEN: usize = REPLY_FIXED_LEN;

    /// Decode from a raw frame.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len(frame, Self::WIRE_LEN)?;
        let header = Header::parse(frame)?;
        if header.id != REPLY_FLASH_WRITE {
            return Err(Error::UnexpectedReply {
                expected: REPLY_FLASH_WRITE,
                actual: header.id,
            });
        }
        Ok(Self {
            address: LittleEndian::read_u32(&frame[4..8]),
            status: WriteStatus::from(frame[8]),
        })
    }

    /// Encode into 12 bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::WIRE_LEN];
        #[allow(clippy::cast_possible_truncation)] // 8
        let size = (Self::WIRE_LEN - HEADER_LEN) as u16;
        Header {
            id: REPLY_FLASH_WRITE,
            size,
        }
        .write(&mut buf);
        LittleEndian::write_u32(&mut buf[4..8], self.address);
        buf[8] = self.status as u8;
        buf
    }
}

/// Any flash message, decoded by its header id.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Message<'a> {
    /// `0x542B`.
    ReadRequest(ReadRequest),
    /// `0x542C`.
    ReadReply(ReadReply),
    /// `0x5438`.
    WriteRequest(WriteRequest<'a>),
    /// `0x5439`.
    WriteReply(WriteReply),
}

impl<'a> Message<'a> {
    /// Decode any of the four flash messages.
    pub fn decode(frame: &'a [u8]) -> Result<Self> {
        let header = Header::parse(frame)?;
        match MessageId::from_u16(header.id) {
            Some(MessageId::FlashRead) => Ok(Self::ReadRequest(ReadRequest::decode(frame)?)),
            Some(MessageId::FlashReadReply) => Ok(Self::ReadReply(ReadReply::decode(frame)?)),
            Some(MessageId::FlashWrite) => Ok(Self::WriteRequest(WriteRequest::decode(frame)?)),
            Some(MessageId::FlashWriteReply) => Ok(Self::WriteReply(WriteReply::decode(frame)?)),
            None => Err(Error::UnknownId(header.id)),
        }
    }

    /// Identifier of this message.
    pub fn id(&self) -> u16 {
        match self {
            Self::ReadRequest(_) => CMD_FLASH_READ,
            Self::ReadReply(_) => REPLY_FLASH_READ,
            Self::WriteRequest(_) => CMD_FLASH_WRITE,
            Self::WriteReply(_) => REPLY_FLASH_WRITE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_request_layout() {
        let frame = ReadRequest::new(0x0012_3456, 64, 0xAABB_CCDD).encode();
        assert_eq!(frame.len(), 16);
        assert_eq!(&frame[0..2], &[0x2B, 0x54]);
        assert_eq!(&frame[2..4], &[12, 0]);
        assert_eq!(&frame[4..8], &[0x56, 0x34, 0x12, 0x00]);
        assert_eq!(frame[8], 64);
        assert_eq!(&frame[9..12], &[0, 0, 0]);
        assert_eq!(&frame[12..16], &[0xDD, 0xCC, 0xBB, 0xAA]);
    }

    #[test]
    fn test_read_request_decode_ignores_padding() {
        let mut frame = ReadRequest::new(0x1000, 8, 7).encode();
        frame[9..12].copy_from_slice(&[0xFF, 0xFF, 0xFF]);
        let req = ReadRequest::decode(&frame).unwrap();
        assert_eq!(req, ReadRequest::new(0x1000, 8, 7));
    }

    #[test]
    fn test_read_request_decode_truncated() {
        let frame = ReadRequest::new(0, 1, 0).encode();
        let err = ReadRequest::decode(&frame[..15]).unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated {
                expected: 16,
                actual: 15
            }
        ));
    }

    #[test]
    fn test_read_reply_oversized_request() {
        let req = ReadRequest::new(0, 200, 0);
        let reply = ReadReply::zeroed(&req);
        let frame = reply.encode();
        assert_eq!(frame.len(), 212);
        assert_eq!(u16::from_le_bytes([frame[2], frame[3]]), 208);
        assert_eq!(frame[8], 200);
        assert!(frame[12..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_read_reply_decode() {
        let reply = ReadReply {
            address: 0x1000,
            size: 4,
            data: vec![1, 2, 3, 4],
        };
        let frame = reply.encode();
        assert_eq!(&frame[0..2], &[0x2C, 0x54]);
        assert_eq!(ReadReply::decode(&frame).unwrap(), reply);
    }

    #[test]
    fn test_read_reply_decode_short_data() {
        let reply = ReadReply {
            address: 0,
            size: 8,
            data: vec![0; 8],
        };
        let frame = reply.encode();
        assert!(matches!(
            ReadReply::decode(&frame[..15]),
            Err(Error::Truncated { expected: 20, .. })
        ));
    }

    #[test]
    fn test_read_reply_decode_wrong_id() {
        let frame = WriteReply {
            address: 0,
            status: WriteStatus::Ok,
        }
        .encode();
        assert!(matches!(
            ReadReply::decode(&frame),
            Err(Error::UnexpectedReply {
                expected: 0x542C,
                actual: 0x5439
            })
        ));
    }

    #[test]
    fn test_write_request_layout() {
        let data = [0x11u8; 8];
        let frame = WriteRequest::new(0x2000, &data, 5).unwrap().encode();
        assert_eq!(frame.len(), 24);
        assert_eq!(&frame[0..2], &[0x38, 0x54]);
        assert_eq!(u16::from_le_bytes([frame[2], frame[3]]), 20);
        assert_eq!(frame[8], 8);
        assert_eq!(&frame[16..], &data);
    }

    #[test]
    fn test_write_request_new_too_long() {
        let data = vec![0u8; 256];
        assert!(matches!(
            WriteRequest::new(0, &data, 0),
            Err(Error::InvalidLength(_))
        ));
    }

    #[test]
    fn test_write_request_decode_incomplete() {
        let data = [0xA5u8; 16];
        let frame = WriteRequest::new(0, &data, 1).unwrap().encode();
        let req = WriteRequest::decode(&frame[..20]).unwrap();
        assert_eq!(req.size, 16);
        assert_eq!(req.data.len(), 4);
        assert!(!req.is_complete());

        let req = WriteRequest::decode(&frame).unwrap();
        assert!(req.is_complete());
        assert_eq!(req.data, &data);
    }

    #[test]
    fn test_write_request_decode_ignores_extra_bytes() {
        let data = [1u8; 8];
        let mut frame = WriteRequest::new(0, &data, 1).unwrap().encode();
        frame.extend_from_slice(&[0xEE; 4]);
        let req = WriteRequest::decode(&frame).unwrap();
        assert_eq!(req.data, &data);
    }

    #[test]
    fn test_write_reply_layout() {
        let frame = WriteReply {
            address: 0x1000,
            status: WriteStatus::Error,
        }
        .encode();
        assert_eq!(
            frame,
            vec![0x39, 0x54, 8, 0, 0x00, 0x10, 0x00, 0x00, 1, 0, 0, 0]
        );
    }

    #[test]
    fn test_write_status_from_u8() {
        assert_eq!(WriteStatus::from(0), WriteStatus::Ok);
        assert_eq!(WriteStatus::from(1), WriteStatus::Error);
        assert_eq!(WriteStatus::from(0x7F), WriteStatus::Error);
    }

    #[test]
    fn test_message_decode_dispatch() {
        let frame = ReadRequest::new(4, 4, 4).encode();
        let msg = Message::decode(&frame).unwrap();
        assert_eq!(msg.id(), CMD_FLASH_READ);
        assert!(matches!(msg, Message::ReadRequest(_)));

        let frame = WriteReply {
            address: 4,
            status: WriteStatus::Ok,
        }
        .encode();
        assert!(matches!(
            Message::decode(&frame).unwrap(),
            Message::WriteReply(_)
        ));
    }

    #[test]
    fn test_message_decode_unknown_id() {
        let frame = [0x14, 0x05, 0x04, 0x00, 0, 0, 0, 0];
        assert!(matches!(
            Message::decode(&frame),
            Err(Error::UnknownId(0x0514))
        ));
    }

    #[test]
    fn test_header_parse_too_short() {
        assert!(Header::parse(&[0x2B, 0x54, 0x0C]).is_err());
    }
}
