//! A whole radio in memory: flash, firmware state and command handler.
//!
//! Implements [`Link`] so a [`FlashClient`](crate::host::FlashClient) can
//! drive it exactly like a device on a serial cable.

use {
    crate::{
        context::{DeviceConfig, DeviceState, Port},
        error::Result,
        flash::MemoryFlash,
        handler::FlashCommandHandler,
        host::Link,
        transport::ReplyLog,
    },
    log::debug,
};

/// Emulated radio.
#[derive(Debug)]
pub struct Emulator {
    handler: FlashCommandHandler<MemoryFlash, DeviceState, ReplyLog>,
}

impl Emulator {
    /// Emulate a radio with the given flash contents and configuration.
    pub fn new(flash: MemoryFlash, config: &DeviceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            handler: FlashCommandHandler::new(flash, DeviceState::new(config), ReplyLog::new()),
        })
    }

    /// Model the transport's session handshake on `port`.
    pub fn open_session(&mut self, port: Port, timestamp: u32) {
        self.handler.context_mut().set_timestamp(port, timestamp);
    }

    /// Firmware state.
    pub fn state(&self) -> &DeviceState {
        self.handler.context()
    }

    /// Firmware state, mutably.
    pub fn state_mut(&mut self) -> &mut DeviceState {
        self.handler.context_mut()
    }

    /// Flash contents.
    pub fn flash(&self) -> &MemoryFlash {
        self.handler.flash()
    }

    /// Every reply sent so far.
    pub fn replies(&self) -> &ReplyLog {
        self.handler.sink()
    }

    /// Feed a raw frame to the command handler, as the transport would.
    pub fn process(&mut self, port: u32, command_id: u16, frame: &[u8]) -> bool {
        self.handler.process(port, command_id, frame)
    }

    /// Shut down and return the flash.
    pub fn into_flash(self) -> MemoryFlash {
        self.handler.into_parts().0
    }
}

impl Link for Emulator {
    fn exchange(&mut self, port: Port, command_id: u16, frame: &[u8]) -> Option<Vec<u8>> {
        let before = self.handler.sink().len();
        if !self.handler.process(port.raw(), command_id, frame) {
            debug!("Emulator ignored command {command_id:#06x}");
            return None;
        }
        if self.handler.sink().len() == before {
            return None;
        }
        self.handler.sink_mut().take_last().map(|(_, reply)| reply)
    }
}
