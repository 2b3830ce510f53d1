//! # uvflash
//!
//! Raw SPI flash access for a handheld radio over its serial command
//! channel.
//!
//! The radio's serial transport (UART or USB virtual COM port) already
//! frames commands and tracks a per-port session timestamp. This crate adds
//! two commands on top of it:
//!
//! - `0x542B` / `0x542C`: read up to 128 bytes from anywhere in the 2 MiB
//!   flash
//! - `0x5438` / `0x5439`: program up to 128 bytes (a multiple of 8),
//!   erasing sectors as needed
//!
//! Both commands must echo the port's current session timestamp or they
//! are dropped without a reply.
//!
//! ## Layout
//!
//! - [`protocol`]: wire format of requests and replies
//! - [`flash`]: the [`SpiFlash`] driver trait and an in-memory NOR model
//! - [`context`]: session timestamps and countdown timers owned by the
//!   rest of the firmware
//! - [`handler`]: validation and dispatch, the device side
//! - [`host`]: a client that speaks the protocol, the host side
//! - [`emulator`]: all of the device side in memory, for tools and tests
//!
//! ## Features
//!
//! - `serde`: Serialization support for configuration and message types
//!
//! ## Example
//!
//! ```rust
//! use uvflash::{DeviceConfig, Emulator, FlashClient, MemoryFlash, Port, WriteStatus};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut radio = Emulator::new(MemoryFlash::new(), &DeviceConfig::default())?;
//!     radio.open_session(Port::Uart, 0x1234_5678);
//!
//!     let mut client = FlashClient::new(&mut radio, Port::Uart, 0x1234_5678);
//!     let reply = client.write(0x1000, &[1, 2, 3, 4, 5, 6, 7, 8])?;
//!     assert_eq!(reply.status, WriteStatus::Ok);
//!
//!     let reply = client.read(0x1000, 8)?;
//!     assert_eq!(reply.data, vec![1, 2, 3, 4, 5, 6, 7, 8]);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod emulator;
pub mod error;
pub mod flash;
pub mod handler;
pub mod host;
pub mod protocol;
pub mod transport;

// Re-exports for convenience
pub use {
    context::{DeviceConfig, DeviceContext, DeviceState, INACTIVITY_TICKS, Port},
    emulator::Emulator,
    error::{Error, Result},
    flash::{MemoryFlash, SpiFlash, WriteMode},
    handler::FlashCommandHandler,
    host::{FlashClient, Link},
    protocol::{
        CMD_FLASH_READ, CMD_FLASH_WRITE, FLASH_SIZE, MAX_DATA_SIZE, Message, MessageId,
        REPLY_FLASH_READ, REPLY_FLASH_WRITE, ReadReply, ReadRequest, WriteReply, WriteRequest,
        WriteStatus,
    },
    transport::{ReplyLog, ReplySink},
};
