//! SPI NOR flash device abstraction.
//!
//! The command handlers only need three things from the flash driver:
//! its capacity, a buffered read, and a buffered program that may erase
//! the sectors it touches. [`SpiFlash`] captures exactly that so the
//! handlers can run against real hardware or [`MemoryFlash`].

pub mod memory;

pub use memory::MemoryFlash;

use crate::error::{Error, Result};

/// Erase granularity of the 2 MiB part.
pub const SECTOR_SIZE: usize = 4096;

/// Value of an erased byte.
pub const ERASED: u8 = 0xFF;

/// How a buffered write treats existing contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Erase the containing sector(s) as needed, preserving bytes outside
    /// the written range.
    #[default]
    Overwrite,
    /// Program on top of the current contents without erasing.
    Append,
}

/// A byte-addressable SPI NOR flash.
pub trait SpiFlash {
    /// Device capacity in bytes.
    fn capacity(&self) -> u32;

    /// Read `buf.len()` bytes starting at `address`.
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()>;

    /// Program `data` starting at `address`.
    fn write(&mut self, address: u32, data: &[u8], mode: WriteMode) -> Result<()>;
}

impl<F: SpiFlash + ?Sized> SpiFlash for &mut F {
    fn capacity(&self) -> u32 {
        (**self).capacity()
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        (**self).read(address, buf)
    }

    fn write(&mut self, address: u32, data: &[u8], mode: WriteMode) -> Result<()> {
        (**self).write(address, data, mode)
    }
}

/// Check that `address..address + len` lies inside a device of `capacity`
/// bytes and return it as a `usize` range.
pub fn check_range(address: u32, len: usize, capacity: u32) -> Result<std::ops::Range<usize>> {
    let start = address as usize;
    match start.checked_add(len) {
        Some(end) if end <= capacity as usize => Ok(start..end),
        _ => Err(Error::AddressOutOfRange {
            address,
            len,
            capacity,
        }),
    }
}
