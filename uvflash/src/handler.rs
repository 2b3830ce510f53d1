//! Flash read/write command handlers.
//!
//! ## Processing
//!
//! ```text
//! transport ──(port, id, frame)──> process()
//!                                    │
//!                   ┌────────────────┴───────────────┐
//!                0x542B                           0x5438
//!                   │                                │
//!              accept()  ── port unknown/disabled, timestamp stale ──> drop
//!                   │                                │
//!       validate address/size              validate address/size/align
//!                   │                                │
//!           flash.read()                     flash.write(Overwrite)
//!                   │                                │
//!        reply 0x542C (size + 12)          reply 0x5439 (12 bytes)
//! ```
//!
//! Dropped commands produce no reply at all. A rejected write still gets
//! a reply with status 1; a rejected read gets a zero-filled reply of the
//! requested size because the read reply has no status field.

use {
    crate::{
        context::{DeviceContext, Port},
        flash::{SpiFlash, WriteMode},
        protocol::{
            CMD_FLASH_READ, CMD_FLASH_WRITE, FLASH_SIZE, MAX_DATA_SIZE, ReadReply, ReadRequest,
            WRITE_ALIGN, WriteReply, WriteRequest, WriteStatus,
        },
        transport::ReplySink,
    },
    log::{debug, error, trace, warn},
};

/// Dispatches flash commands to their handlers.
///
/// Owns (or mutably borrows) the flash device, the firmware context and
/// the reply sink for as long as it lives, so commands are processed one
/// at a time.
#[derive(Debug)]
pub struct FlashCommandHandler<F, C, S> {
    flash: F,
    context: C,
    sink: S,
}

impl<F, C, S> FlashCommandHandler<F, C, S>
where
    F: SpiFlash,
    C: DeviceContext,
    S: ReplySink,
{
    /// Create a handler.
    pub fn new(flash: F, context: C, sink: S) -> Self {
        Self {
            flash,
            context,
            sink,
        }
    }

    /// Handle a frame if it is a flash command.
    ///
    /// `port` is the transport's raw port number and `frame` the full
    /// received frame including its header. Returns `false` for command
    /// ids this handler does not own, leaving them to other handlers.
    pub fn process(&mut self, port: u32, command_id: u16, frame: &[u8]) -> bool {
        match command_id {
            CMD_FLASH_READ => {
                self.handle_read(port, frame);
                true
            },
            CMD_FLASH_WRITE => {
                self.handle_write(port, frame);
                true
            },
            _ => false,
        }
    }

    /// Resolve the port and check the echoed timestamp.
    ///
    /// On success the inactivity and tuner countdowns are restarted,
    /// before the payload is looked at.
    fn accept(&mut self, port: u32, timestamp: u32) -> Option<Port> {
        let Some(resolved) = Port::from_raw(port) else {
            debug!("Dropping flash command from unknown port {port}");
            return None;
        };
        let Some(expected) = self.context.port_timestamp(resolved) else {
            debug!("Dropping flash command from disabled port {resolved}");
            return None;
        };
        if timestamp != expected {
            debug!(
                "Dropping flash command on {resolved}: timestamp {timestamp:#010x}, expected {expected:#010x}"
            );
            return None;
        }

        self.context.reset_inactivity_timer();
        self.context.reset_tuner_timer();
        Some(resolved)
    }

    fn handle_read(&mut self, port: u32, frame: &[u8]) {
        let request = match ReadRequest::decode(frame) {
            Ok(request) => request,
            Err(e) => {
                debug!("Dropping flash read: {e}");
                return;
            },
        };
        let Some(port) = self.accept(port, request.timestamp) else {
            return;
        };

        let mut reply = ReadReply::zeroed(&request);
        let size = usize::from(request.size);

        if request.address < FLASH_SIZE && size > 0 && size <= MAX_DATA_SIZE {
            // Bytes past the end of the device stay zero.
            let limit = FLASH_SIZE.min(self.flash.capacity());
            let available = limit.saturating_sub(request.address) as usize;
            let len = size.min(available);
            match self.flash.read(request.address, &mut reply.data[..len]) {
                Ok(()) => debug!("Flash read {len} bytes @ {:#08x}", request.address),
                Err(e) => {
                    error!("Flash read @ {:#08x} failed: {e}", request.address);
                    reply.data.fill(0);
                },
            }
        } else {
            warn!(
                "Rejected flash read @ {:#08x} size {}: replying with zeros",
                request.address, request.size
            );
        }

        let bytes = reply.encode();
        trace!("Read reply: {bytes:02X?}");
        self.sink.send_reply(port, &bytes);
    }

    fn handle_write(&mut self, port: u32, frame: &[u8]) {
        let request = match WriteRequest::decode(frame) {
            Ok(request) => request,
            Err(e) => {
                debug!("Dropping flash write: {e}");
                return;
            },
        };
        let Some(port) = self.accept(port, request.timestamp) else {
            return;
        };

        let status = self.program(&request);
        let reply = WriteReply {
            address: request.address,
            status,
        };
        self.sink.send_reply(port, &reply.encode());
    }

    fn program(&mut self, request: &WriteRequest<'_>) -> WriteStatus {
        let size = usize::from(request.size);
        let address = request.address;

        if address >= FLASH_SIZE || size == 0 || size > MAX_DATA_SIZE || size % WRITE_ALIGN != 0 {
            warn!("Rejected flash write @ {address:#08x} size {size}");
            return WriteStatus::Error;
        }
        if !request.is_complete() {
            warn!(
                "Rejected flash write @ {address:#08x}: frame carries {} of {size} data bytes",
                request.data.len()
            );
            return WriteStatus::Error;
        }
        let limit = FLASH_SIZE.min(self.flash.capacity());
        if address as usize + size > limit as usize {
            warn!("Rejected flash write @ {address:#08x} size {size}: crosses end of flash");
            return WriteStatus::Error;
        }

        match self.flash.write(address, request.data, WriteMode::Overwrite) {
            Ok(()) => {
                debug!("Flash wrote {size} bytes @ {address:#08x}");
                WriteStatus::Ok
            },
            Err(e) => {
                error!("Flash write @ {address:#08x} failed: {e}");
                WriteStatus::Error
            },
        }
    }

    /// The flash device.
    pub fn flash(&self) -> &F {
        &self.flash
    }

    /// The flash device, mutably.
    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// The firmware context.
    pub fn context(&self) -> &C {
        &self.context
    }

    /// The firmware context, mutably.
    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// The reply sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// The reply sink, mutably.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Take the handler apart.
    pub fn into_parts(self) -> (F, C, S) {
        (self.flash, self.context, self.sink)
    }
}
