//! Flash image files and the emulated radio built on them.

use anyhow::{Context, Result};
use console::style;
use log::{debug, info};
use std::fs;
use uvflash::{Emulator, FLASH_SIZE, MemoryFlash};

use crate::{CliError, Session};

/// Init command implementation.
pub(crate) fn cmd_init(session: &Session, force: bool) -> Result<()> {
    if session.image.exists() && !force {
        return Err(CliError::Usage(format!(
            "{} already exists (use --force to overwrite)",
            session.image.display()
        ))
        .into());
    }

    let flash = MemoryFlash::new();
    fs::write(&session.image, flash.as_bytes())
        .with_context(|| format!("Failed to write {}", session.image.display()))?;

    if !session.quiet {
        eprintln!(
            "{} Created erased {} KiB image {}",
            style("✓").green(),
            FLASH_SIZE / 1024,
            session.image.display()
        );
    }
    Ok(())
}

/// Load the image and bring up an emulated radio with an open session.
pub(crate) fn open_emulator(session: &Session) -> Result<Emulator> {
    let image = fs::read(&session.image).with_context(|| {
        format!(
            "Failed to read image {} (run `uvflash init` first?)",
            session.image.display()
        )
    })?;
    let flash = MemoryFlash::from_image(image)
        .with_context(|| format!("Bad image {}", session.image.display()))?;

    let device = session.config.device_config();
    let mut emulator = Emulator::new(flash, &device).context("Invalid device configuration")?;
    if !emulator.state().is_enabled(session.port) {
        return Err(CliError::Usage(format!(
            "port {} is not enabled in the device configuration",
            session.port
        ))
        .into());
    }
    emulator.open_session(session.port, session.timestamp);
    debug!(
        "Emulator ready: ports {:?}, tuner {:?}",
        device.ports, device.tuner_countdown
    );
    Ok(emulator)
}

/// Write the emulator's flash back to the image file.
pub(crate) fn save_image(session: &Session, emulator: Emulator) -> Result<()> {
    let flash = emulator.into_flash();
    info!(
        "Saving image ({} sector erases)",
        flash.sector_erases()
    );
    fs::write(&session.image, flash.as_bytes())
        .with_context(|| format!("Failed to write {}", session.image.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::PathBuf;
    use uvflash::Port;

    fn session(image: PathBuf) -> Session {
        Session {
            image,
            port: Port::Uart,
            timestamp: 3,
            quiet: true,
            config: Config::default(),
        }
    }

    #[test]
    fn test_init_creates_erased_image() {
        let dir = tempfile::tempdir().unwrap();
        let s = session(dir.path().join("img.bin"));
        cmd_init(&s, false).unwrap();
        let bytes = fs::read(&s.image).unwrap();
        assert_eq!(bytes.len(), FLASH_SIZE as usize);
        assert!(bytes.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let s = session(dir.path().join("img.bin"));
        fs::write(&s.image, b"keep").unwrap();
        let err = cmd_init(&s, false).unwrap_err();
        assert!(err.downcast_ref::<CliError>().is_some());
        assert_eq!(fs::read(&s.image).unwrap(), b"keep");

        cmd_init(&s, true).unwrap();
        assert_eq!(fs::read(&s.image).unwrap().len(), FLASH_SIZE as usize);
    }

    #[test]
    fn test_open_emulator_rejects_short_image() {
        let dir = tempfile::tempdir().unwrap();
        let s = session(dir.path().join("img.bin"));
        fs::write(&s.image, [0u8; 16]).unwrap();
        assert!(open_emulator(&s).is_err());
    }

    #[test]
    fn test_open_emulator_disabled_port() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path().join("img.bin"));
        cmd_init(&s, false).unwrap();
        s.config.device.ports = Some(vec![Port::Vcp]);
        let err = open_emulator(&s).unwrap_err();
        assert!(err.downcast_ref::<CliError>().is_some());
    }

    #[test]
    fn test_open_emulator_sets_session_timestamp() {
        use uvflash::DeviceContext;

        let dir = tempfile::tempdir().unwrap();
        let s = session(dir.path().join("img.bin"));
        cmd_init(&s, false).unwrap();
        let emu = open_emulator(&s).unwrap();
        assert_eq!(emu.state().port_timestamp(Port::Uart), Some(3));
    }
}
