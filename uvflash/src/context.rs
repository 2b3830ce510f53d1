//! State the handlers borrow from the rest of the firmware.
//!
//! The transport owns one session timestamp per serial port, and the UI
//! owns the countdowns that the flash commands reset. Both are reached
//! through [`DeviceContext`] so the handlers never touch globals.

use {
    crate::error::{Error, Result},
    log::debug,
    std::fmt,
};

/// Inactivity countdown reload value: 12 ticks of 500 ms.
pub const INACTIVITY_TICKS: u16 = 12;

/// Serial port a command arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[repr(u32)]
pub enum Port {
    /// Physical UART.
    Uart = 0,
    /// USB virtual COM port.
    Vcp = 1,
}

impl Port {
    /// All ports, in raw-number order.
    pub const ALL: [Port; 2] = [Port::Uart, Port::Vcp];

    /// Map the transport's raw port number.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Uart),
            1 => Some(Self::Vcp),
            _ => None,
        }
    }

    /// Raw port number used by the transport.
    pub fn raw(self) -> u32 {
        self as u32
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uart => f.write_str("uart"),
            Self::Vcp => f.write_str("vcp"),
        }
    }
}

impl std::str::FromStr for Port {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uart" | "0" => Ok(Self::Uart),
            "vcp" | "usb" | "1" => Ok(Self::Vcp),
            other => Err(Error::Config(format!("unknown port '{other}'"))),
        }
    }
}

/// Which optional parts of the firmware are present.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceConfig {
    /// Ports that accept commands.
    pub ports: Vec<Port>,
    /// Reload value of the tuner countdown, if a tuner is fitted.
    pub tuner_countdown: Option<u16>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            ports: Port::ALL.to_vec(),
            tuner_countdown: None,
        }
    }
}

impl DeviceConfig {
    /// Reject configurations that could never accept a command.
    pub fn validate(&self) -> Result<()> {
        if self.ports.is_empty() {
            return Err(Error::Config("no ports enabled".to_string()));
        }
        Ok(())
    }
}

/// Firmware state consulted and updated by the flash commands.
pub trait DeviceContext {
    /// Current session timestamp of `port`, or `None` if the port is not
    /// available in this build.
    fn port_timestamp(&self, port: Port) -> Option<u32>;

    /// Restart the serial-config inactivity countdown.
    fn reset_inactivity_timer(&mut self);

    /// Restart the tuner countdown. No-op without a tuner.
    fn reset_tuner_timer(&mut self);
}

impl<C: DeviceContext + ?Sized> DeviceContext for &mut C {
    fn port_timestamp(&self, port: Port) -> Option<u32> {
        (**self).port_timestamp(port)
    }

    fn reset_inactivity_timer(&mut self) {
        (**self).reset_inactivity_timer();
    }

    fn reset_tuner_timer(&mut self) {
        (**self).reset_tuner_timer();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Countdown {
    remaining: u16,
    reload: u16,
}

/// Concrete [`DeviceContext`] built from a [`DeviceConfig`].
#[derive(Debug, Clone)]
pub struct DeviceState {
    timestamps: [Option<u32>; 2],
    inactivity: u16,
    tuner: Option<Countdown>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new(&DeviceConfig::default())
    }
}

impl DeviceState {
    /// Enabled ports start with timestamp 0; disabled ports have none.
    pub fn new(config: &DeviceConfig) -> Self {
        let mut timestamps = [None; 2];
        for port in &config.ports {
            timestamps[port.index()] = Some(0);
        }
        Self {
            timestamps,
            inactivity: 0,
            tuner: config.tuner_countdown.map(|reload| Countdown {
                remaining: 0,
                reload,
            }),
        }
    }

    /// Record the session timestamp the transport negotiated on `port`.
    ///
    /// Ignored for ports that are not enabled.
    pub fn set_timestamp(&mut self, port: Port, timestamp: u32) {
        match &mut self.timestamps[port.index()] {
            Some(slot) => {
                *slot = timestamp;
                debug!("Session timestamp on {port} set to {timestamp:#010x}");
            },
            None => debug!("Ignoring timestamp for disabled port {port}"),
        }
    }

    /// Whether `port` accepts commands.
    pub fn is_enabled(&self, port: Port) -> bool {
        self.timestamps[port.index()].is_some()
    }

    /// Remaining inactivity ticks.
    pub fn inactivity_countdown(&self) -> u16 {
        self.inactivity
    }

    /// Remaining tuner ticks, if a tuner is fitted.
    pub fn tuner_countdown(&self) -> Option<u16> {
        self.tuner.map(|t| t.remaining)
    }

    /// Advance the 500 ms timer by one tick.
    pub fn tick(&mut self) {
        self.inactivity = self.inactivity.saturating_sub(1);
        if let Some(tuner) = &mut self.tuner {
            tuner.remaining = tuner.remaining.saturating_sub(1);
        }
    }
}

impl DeviceContext for DeviceState {
    fn port_timestamp(&self, port: Port) -> Option<u32> {
        self.timestamps[port.index()]
    }

    fn reset_inactivity_timer(&mut self) {
        self.inactivity = INACTIVITY_TICKS;
    }

    fn reset_tuner_timer(&mut self) {
        if let Some(tuner) = &mut self.tuner {
            tuner.remaining = tuner.reload;
        }
    }
}
