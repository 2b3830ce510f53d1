//! Host-side client for the flash commands.
//!
//! [`FlashClient`] builds requests carrying the session timestamp, sends
//! them over a [`Link`] and decodes the replies. Region helpers split
//! large transfers into command-sized chunks.

use {
    crate::{
        context::Port,
        error::{Error, Result},
        flash::{ERASED, check_range},
        protocol::{
            CMD_FLASH_READ, CMD_FLASH_WRITE, FLASH_SIZE, MAX_DATA_SIZE, ReadReply, ReadRequest,
            WRITE_ALIGN, WriteReply, WriteRequest, WriteStatus,
        },
    },
    log::{debug, trace},
};

/// A request/reply channel to a device.
pub trait Link {
    /// Send `frame` as command `command_id` on `port` and return the raw
    /// reply, or `None` if the device stayed silent.
    fn exchange(&mut self, port: Port, command_id: u16, frame: &[u8]) -> Option<Vec<u8>>;
}

impl<L: Link + ?Sized> Link for &mut L {
    fn exchange(&mut self, port: Port, command_id: u16, frame: &[u8]) -> Option<Vec<u8>> {
        (**self).exchange(port, command_id, frame)
    }
}

/// Progress callback: `(bytes_done, bytes_total)`.
pub type Progress<'a> = &'a mut dyn FnMut(usize, usize);

/// Issues flash commands over a [`Link`].
#[derive(Debug)]
pub struct FlashClient<L> {
    link: L,
    port: Port,
    timestamp: u32,
}

impl<L: Link> FlashClient<L> {
    /// Create a client talking on `port` with the given session timestamp.
    pub fn new(link: L, port: Port, timestamp: u32) -> Self {
        Self {
            link,
            port,
            timestamp,
        }
    }

    /// Port used for requests.
    pub fn port(&self) -> Port {
        self.port
    }

    /// Session timestamp echoed in requests.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Change the session timestamp (after the transport renegotiates it).
    pub fn set_timestamp(&mut self, timestamp: u32) {
        self.timestamp = timestamp;
    }

    /// The underlying link.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// The underlying link, mutably.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Consume the client and return the link.
    pub fn into_link(self) -> L {
        self.link
    }

    /// Send one read command.
    ///
    /// The request is sent as given, even if the device will reject it.
    pub fn read(&mut self, address: u32, size: u8) -> Result<ReadReply> {
        let frame = ReadRequest::new(address, size, self.timestamp).encode();
        trace!("Read request: {frame:02X?}");
        let reply = self
            .link
            .exchange(self.port, CMD_FLASH_READ, &frame)
            .ok_or(Error::NoReply)?;
        ReadReply::decode(&reply)
    }

    /// Send one write command.
    pub fn write(&mut self, address: u32, data: &[u8]) -> Result<WriteReply> {
        let frame = WriteRequest::new(address, data, self.timestamp)?.encode();
        trace!("Write request: {frame:02X?}");
        let reply = self
            .link
            .exchange(self.port, CMD_FLASH_WRITE, &frame)
            .ok_or(Error::NoReply)?;
        WriteReply::decode(&reply)
    }

    /// Read `len` bytes starting at `address` in 128-byte chunks.
    pub fn read_region(
        &mut self,
        address: u32,
        len: usize,
        progress: Progress<'_>,
    ) -> Result<Vec<u8>> {
        check_range(address, len, FLASH_SIZE)?;
        let mut out = Vec::with_capacity(len);
        let mut offset = 0usize;
        progress(0, len);
        while offset < len {
            let chunk = (len - offset).min(MAX_DATA_SIZE);
            #[allow(clippy::cast_possible_truncation)] // offset < 2 MiB, chunk <= 128
            let (chunk_addr, chunk_len) = (address + offset as u32, chunk as u8);
            let reply = self.read(chunk_addr, chunk_len)?;
            if reply.address != chunk_addr || reply.size != chunk_len {
                return Err(Error::InvalidLength(format!(
                    "reply echoed {:#08x}+{}, requested {chunk_addr:#08x}+{chunk}",
                    reply.address, reply.size
                )));
            }
            out.extend_from_slice(&reply.data);
            offset += chunk;
            progress(offset, len);
        }
        debug!("Read {len} bytes @ {address:#08x}");
        Ok(out)
    }

    /// Write `data` starting at `address` in 128-byte chunks.
    ///
    /// `address` must be 8-byte aligned. A final partial chunk is padded
    /// with `0xFF` up to the next multiple of 8.
    pub fn write_region(&mut self, address: u32, data: &[u8], progress: Progress<'_>) -> Result<()> {
        if address as usize % WRITE_ALIGN != 0 {
            return Err(Error::InvalidLength(format!(
                "address {address:#08x} is not {WRITE_ALIGN}-byte aligned"
            )));
        }
        let padded_len = data.len().div_ceil(WRITE_ALIGN) * WRITE_ALIGN;
        check_range(address, padded_len, FLASH_SIZE)?;

        let total = data.len();
        progress(0, total);
        let mut chunk_buf = [ERASED; MAX_DATA_SIZE];
        for (i, chunk) in data.chunks(MAX_DATA_SIZE).enumerate() {
            let padded = chunk.len().div_ceil(WRITE_ALIGN) * WRITE_ALIGN;
            chunk_buf[..chunk.len()].copy_from_slice(chunk);
            chunk_buf[chunk.len()..padded].fill(ERASED);

            #[allow(clippy::cast_possible_truncation)] // bounded by FLASH_SIZE
            let chunk_addr = address + (i * MAX_DATA_SIZE) as u32;
            let reply = self.write(chunk_addr, &chunk_buf[..padded])?;
            if reply.status != WriteStatus::Ok {
                return Err(Error::Rejected {
                    address: reply.address,
                });
            }
            progress((i * MAX_DATA_SIZE + chunk.len()).min(total), total);
        }
        debug!("Wrote {total} bytes @ {address:#08x}");
        Ok(())
    }
}
