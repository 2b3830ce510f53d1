//! Wire format of the flash commands.
//!
//! Every message starts with the transport's 4-byte header, followed by a
//! fixed block of little-endian fields:
//!
//! ```text
//! +--------+--------+-----------+------+-------+-----------+----------+
//! |   ID   |  Size  |  Address  | Size | Pad   | Timestamp |   Data   |
//! +--------+--------+-----------+------+-------+-----------+----------+
//! | 2 bytes| 2 bytes|  4 bytes  |  1   |  3    |  4 bytes  | variable |
//! +--------+--------+-----------+------+-------+-----------+----------+
//! ```
//!
//! Replies drop the timestamp; the write reply replaces the size byte with
//! a status byte and carries no data.

pub mod message;

pub use message::{Header, Message, ReadReply, ReadRequest, WriteReply, WriteRequest, WriteStatus};

/// Flash read request identifier.
pub const CMD_FLASH_READ: u16 = 0x542B;

/// Flash read reply identifier.
pub const REPLY_FLASH_READ: u16 = 0x542C;

/// Flash write request identifier.
pub const CMD_FLASH_WRITE: u16 = 0x5438;

/// Flash write reply identifier.
pub const REPLY_FLASH_WRITE: u16 = 0x5439;

/// Largest payload a single read or write may carry.
pub const MAX_DATA_SIZE: usize = 128;

/// Size of the exposed flash address space (2 MiB).
pub const FLASH_SIZE: u32 = 0x0020_0000;

/// Write payloads must be a multiple of this many bytes.
pub const WRITE_ALIGN: usize = 8;

/// Transport header length (id + size).
pub const HEADER_LEN: usize = 4;

/// Length of a request up to and including the timestamp.
pub const REQUEST_FIXED_LEN: usize = 16;

/// Length of a reply up to the start of the data.
pub const REPLY_FIXED_LEN: usize = 12;

/// Message identifiers handled by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u16)]
pub enum MessageId {
    /// Host asks for a block of flash.
    FlashRead = CMD_FLASH_READ,
    /// Device returns a block of flash.
    FlashReadReply = REPLY_FLASH_READ,
    /// Host programs a block of flash.
    FlashWrite = CMD_FLASH_WRITE,
    /// Device reports the write outcome.
    FlashWriteReply = REPLY_FLASH_WRITE,
}

impl MessageId {
    /// Map a raw header id to a known message.
    pub fn from_u16(id: u16) -> Option<Self> {
        match id {
            CMD_FLASH_READ => Some(Self::FlashRead),
            REPLY_FLASH_READ => Some(Self::FlashReadReply),
            CMD_FLASH_WRITE => Some(Self::FlashWrite),
            REPLY_FLASH_WRITE => Some(Self::FlashWriteReply),
            _ => None,
        }
    }

    /// Whether this id travels from host to device.
    pub fn is_request(self) -> bool {
        matches!(self, Self::FlashRead | Self::FlashWrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_from_u16() {
        assert_eq!(MessageId::from_u16(0x542B), Some(MessageId::FlashRead));
        assert_eq!(MessageId::from_u16(0x542C), Some(MessageId::FlashReadReply));
        assert_eq!(MessageId::from_u16(0x5438), Some(MessageId::FlashWrite));
        assert_eq!(MessageId::from_u16(0x5439), Some(MessageId::FlashWriteReply));
        assert_eq!(MessageId::from_u16(0x0514), None);
    }

    #[test]
    fn test_message_id_direction() {
        assert!(MessageId::FlashRead.is_request());
        assert!(MessageId::FlashWrite.is_request());
        assert!(!MessageId::FlashReadReply.is_request());
        assert!(!MessageId::FlashWriteReply.is_request());
    }

    #[test]
    fn test_constants() {
        assert_eq!(FLASH_SIZE, 2 * 1024 * 1024);
        assert_eq!(MAX_DATA_SIZE, 128);
        assert_eq!(REQUEST_FIXED_LEN, HEADER_LEN + 12);
        assert_eq!(REPLY_FIXED_LEN, HEADER_LEN + 8);
    }
}
