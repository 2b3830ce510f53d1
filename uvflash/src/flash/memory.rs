//! In-memory NOR flash model.
//!
//! Behaves like the radio's 2 MiB part closely enough to test the command
//! handlers: erased bytes read `0xFF`, programming can only clear bits,
//! and only whole 4 KiB sectors can be erased.

use {
    super::{ERASED, SECTOR_SIZE, SpiFlash, WriteMode, check_range},
    crate::{
        error::{Error, Result},
        protocol::FLASH_SIZE,
    },
    log::trace,
};

/// RAM-backed flash device.
#[derive(Debug, Clone)]
pub struct MemoryFlash {
    data: Vec<u8>,
    sector_erases: u64,
}

impl Default for MemoryFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFlash {
    /// A fully erased 2 MiB device.
    pub fn new() -> Self {
        Self::erased(FLASH_SIZE as usize)
    }

    /// A fully erased device of `capacity` bytes.
    ///
    /// `capacity` is capped at 2 MiB and rounded up to a whole number of
    /// sectors.
    pub fn with_capacity(capacity: u32) -> Self {
        let capacity = capacity.min(FLASH_SIZE) as usize;
        Self::erased(capacity.div_ceil(SECTOR_SIZE) * SECTOR_SIZE)
    }

    fn erased(len: usize) -> Self {
        Self {
            data: vec![ERASED; len],
            sector_erases: 0,
        }
    }

    /// Wrap a raw 2 MiB image.
    pub fn from_image(image: Vec<u8>) -> Result<Self> {
        if image.len() != FLASH_SIZE as usize {
            return Err(Error::InvalidImage(format!(
                "expected {FLASH_SIZE} bytes, got {}",
                image.len()
            )));
        }
        Ok(Self {
            data: image,
            sector_erases: 0,
        })
    }

    /// Raw contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the device and return its contents.
    pub fn into_image(self) -> Vec<u8> {
        self.data
    }

    /// Number of sector erases performed since creation.
    pub fn sector_erases(&self) -> u64 {
        self.sector_erases
    }

    fn erase_sector(&mut self, index: usize) {
        let start = index * SECTOR_SIZE;
        self.data[start..start + SECTOR_SIZE].fill(ERASED);
        self.sector_erases += 1;
        trace!("Erased sector {index} @ {start:#08x}");
    }

    /// Program without erasing: bits can only go from 1 to 0.
    fn program(&mut self, start: usize, data: &[u8]) {
        for (cell, &byte) in self.data[start..start + data.len()].iter_mut().zip(data) {
            *cell &= byte;
        }
    }
}

impl SpiFlash for MemoryFlash {
    #[allow(clippy::cast_possible_truncation)] // constructors keep len <= 2 MiB
    fn capacity(&self) -> u32 {
        self.data.len() as u32
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        let range = check_range(address, buf.len(), self.capacity())?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8], mode: WriteMode) -> Result<()> {
        let range = check_range(address, data.len(), self.capacity())?;
        if data.is_empty() {
            return Ok(());
        }

        if mode == WriteMode::Append {
            self.program(range.start, data);
            return Ok(());
        }

        let first = range.start / SECTOR_SIZE;
        let last = (range.end - 1) / SECTOR_SIZE;
        for sector in first..=last {
            let sector_start = sector * SECTOR_SIZE;
            let lo = range.start.max(sector_start);
            let hi = range.end.min(sector_start + SECTOR_SIZE);
            let chunk = &data[lo - range.start..hi - range.start];

            let needs_erase = self.data[lo..hi]
                .iter()
                .zip(chunk)
                .any(|(&old, &new)| old & new != new);

            if needs_erase {
                let mut merged = self.data[sector_start..sector_start + SECTOR_SIZE].to_vec();
                merged[lo - sector_start..hi - sector_start].copy_from_slice(chunk);
                self.erase_sector(sector);
                self.program(sector_start, &merged);
            } else {
                self.program(lo, chunk);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_erased() {
        let flash = MemoryFlash::new();
        assert_eq!(flash.capacity(), FLASH_SIZE);
        assert!(flash.as_bytes().iter().all(|&b| b == ERASED));
        assert_eq!(flash.sector_erases(), 0);
    }

    #[test]
    fn test_with_capacity_rounds_to_sector() {
        let flash = MemoryFlash::with_capacity(5000);
        assert_eq!(flash.capacity() as usize, 2 * SECTOR_SIZE);
    }

    #[test]
    fn test_with_capacity_capped_at_flash_size() {
        assert_eq!(MemoryFlash::with_capacity(u32::MAX).capacity(), FLASH_SIZE);
        assert_eq!(MemoryFlash::with_capacity(FLASH_SIZE + 1).capacity(), FLASH_SIZE);
    }

    #[test]
    fn test_from_image_wrong_size() {
        assert!(matches!(
            MemoryFlash::from_image(vec![0; 1024]),
            Err(Error::InvalidImage(_))
        ));
    }

    #[test]
    fn test_read_out_of_range() {
        let mut flash = MemoryFlash::with_capacity(SECTOR_SIZE as u32);
        let mut buf = [0u8; 8];
        assert!(flash.read(SECTOR_SIZE as u32 - 4, &mut buf).is_err());
        assert!(flash.read(0, &mut buf).is_ok());
    }

    #[test]
    fn test_append_only_clears_bits() {
        let mut flash = MemoryFlash::with_capacity(SECTOR_SIZE as u32);
        flash.write(0, &[0x0F], WriteMode::Append).unwrap();
        flash.write(0, &[0xF3], WriteMode::Append).unwrap();
        let mut buf = [0u8; 1];
        flash.read(0, &mut buf).unwrap();
        assert_eq!(buf, [0x03]);
        assert_eq!(flash.sector_erases(), 0);
    }

    #[test]
    fn test_overwrite_on_erased_skips_erase() {
        let mut flash = MemoryFlash::with_capacity(SECTOR_SIZE as u32);
        flash.write(16, &[1, 2, 3, 4], WriteMode::Overwrite).unwrap();
        assert_eq!(flash.sector_erases(), 0);
        assert_eq!(&flash.as_bytes()[16..20], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_overwrite_preserves_rest_of_sector() {
        let mut flash = MemoryFlash::with_capacity(SECTOR_SIZE as u32);
        flash.write(0, &[0x11; 8], WriteMode::Overwrite).unwrap();
        flash.write(8, &[0x22; 8], WriteMode::Overwrite).unwrap();
        flash.write(0, &[0xAA; 8], WriteMode::Overwrite).unwrap();

        assert_eq!(flash.sector_erases(), 1);
        assert_eq!(&flash.as_bytes()[0..8], &[0xAA; 8]);
        assert_eq!(&flash.as_bytes()[8..16], &[0x22; 8]);
        assert_eq!(flash.as_bytes()[16], ERASED);
    }

    #[test]
    fn test_overwrite_across_sector_boundary() {
        let mut flash = MemoryFlash::with_capacity(2 * SECTOR_SIZE as u32);
        let addr = SECTOR_SIZE as u32 - 4;
        flash.write(addr, &[0; 8], WriteMode::Overwrite).unwrap();
        flash.write(addr, &[1, 2, 3, 4, 5, 6, 7, 8], WriteMode::Overwrite).unwrap();

        assert_eq!(flash.sector_erases(), 2);
        let mut buf = [0u8; 8];
        flash.read(addr, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_write_past_end_rejected() {
        let mut flash = MemoryFlash::with_capacity(SECTOR_SIZE as u32);
        let before = flash.as_bytes().to_vec();
        assert!(
            flash
                .write(SECTOR_SIZE as u32 - 4, &[0; 8], WriteMode::Overwrite)
                .is_err()
        );
        assert_eq!(flash.as_bytes(), before.as_slice());
    }
}
