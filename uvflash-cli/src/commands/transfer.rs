//! Read, write, dump and load command implementations.

use anyhow::{Context, Result, bail};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use uvflash::{FlashClient, MAX_DATA_SIZE, ReadReply, WriteStatus};

use super::image::{open_emulator, save_image};
use crate::{CliError, Session, use_fancy_output};

fn progress_bar(session: &Session, total: usize, msg: &'static str) -> ProgressBar {
    if session.quiet || !use_fancy_output() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    #[allow(clippy::unwrap_used)] // Static template string
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_message(msg);
    pb
}

/// Format bytes as a classic 16-per-line hex dump.
pub(crate) fn hexdump(address: u32, data: &[u8]) -> String {
    let mut out = String::new();
    for (i, line) in data.chunks(16).enumerate() {
        #[allow(clippy::cast_possible_truncation)] // bounded by flash size
        let line_addr = address.wrapping_add((i * 16) as u32);
        let _ = write!(out, "{line_addr:08x}  ");
        for col in 0..16 {
            match line.get(col) {
                Some(b) => {
                    let _ = write!(out, "{b:02x} ");
                },
                None => out.push_str("   "),
            }
            if col == 7 {
                out.push(' ');
            }
        }
        out.push('|');
        out.extend(line.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push_str("|\n");
    }
    out
}

fn print_read_reply(reply: &ReadReply, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(reply)?);
    } else {
        println!("address: {:#08x}", reply.address);
        println!("size:    {}", reply.size);
        print!("{}", hexdump(reply.address, &reply.data));
    }
    Ok(())
}

/// Read command implementation.
pub(crate) fn cmd_read(session: &Session, address: u32, size: u8, json: bool) -> Result<()> {
    let mut emulator = open_emulator(session)?;
    let mut client = FlashClient::new(&mut emulator, session.port, session.timestamp);
    let reply = client.read(address, size)?;

    if size == 0 || usize::from(size) > MAX_DATA_SIZE || address >= uvflash::FLASH_SIZE {
        warn!("Device rejects this read; the reply data is zero-filled");
    }
    print_read_reply(&reply, json)
}

/// Write command implementation.
pub(crate) fn cmd_write(session: &Session, address: u32, data: &[u8], json: bool) -> Result<()> {
    let mut emulator = open_emulator(session)?;
    let mut client = FlashClient::new(&mut emulator, session.port, session.timestamp);
    let reply = client.write(address, data)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reply)?);
    } else {
        println!("address: {:#08x}", reply.address);
        println!("status:  {}", reply.status as u8);
    }

    if reply.status != WriteStatus::Ok {
        bail!(
            "Device rejected write of {} bytes at {address:#08x} (size must be 8-128 and a multiple of 8)",
            data.len()
        );
    }
    save_image(session, emulator)?;
    if !session.quiet {
        eprintln!(
            "{} Wrote {} bytes @ {address:#08x}",
            style("✓").green(),
            data.len()
        );
    }
    Ok(())
}

/// Dump command implementation.
pub(crate) fn cmd_dump(
    session: &Session,
    address: u32,
    length: usize,
    output: Option<&Path>,
) -> Result<()> {
    if length == 0 {
        return Err(CliError::Usage("length must be greater than zero".to_string()).into());
    }
    let mut emulator = open_emulator(session)?;
    let mut client = FlashClient::new(&mut emulator, session.port, session.timestamp);

    let pb = progress_bar(session, length, "reading");
    let data = client.read_region(address, length, &mut |done, _| pb.set_position(done as u64));
    pb.finish_and_clear();
    let data = data?;

    match output {
        Some(path) => {
            fs::write(path, &data)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !session.quiet {
                eprintln!(
                    "{} Dumped {length} bytes @ {address:#08x} to {}",
                    style("✓").green(),
                    path.display()
                );
            }
        },
        None => print!("{}", hexdump(address, &data)),
    }
    Ok(())
}

/// Load command implementation.
pub(crate) fn cmd_load(session: &Session, file: &Path, address: u32) -> Result<()> {
    if address % 8 != 0 {
        return Err(CliError::Usage(format!("address {address:#08x} is not 8-byte aligned")).into());
    }
    let data = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    if data.is_empty() {
        return Err(CliError::Usage(format!("{} is empty", file.display())).into());
    }

    let mut emulator = open_emulator(session)?;
    let mut client = FlashClient::new(&mut emulator, session.port, session.timestamp);

    let pb = progress_bar(session, data.len(), "writing");
    let result = client.write_region(address, &data, &mut |done, _| pb.set_position(done as u64));
    pb.finish_and_clear();
    result.with_context(|| format!("Failed to load {}", file.display()))?;

    save_image(session, emulator)?;
    if !session.quiet {
        eprintln!(
            "{} Loaded {} bytes @ {address:#08x} from {}",
            style("✓").green(),
            data.len(),
            file.display()
        );
    }
    Ok(())
}
