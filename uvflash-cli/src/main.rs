//! uvflash CLI - exercise the radio's SPI flash commands against an image.
//!
//! ## Features
//!
//! - Create an erased 2 MiB flash image
//! - Send single read/write commands and show the raw replies
//! - Dump or load whole regions in 128-byte commands
//! - Decode captured request/reply frames
//! - Configuration file and environment variable support

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use uvflash::Port;

mod commands;
mod config;

use config::{Config, DEFAULT_IMAGE};

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Check if progress bars and colors should be used.
pub(crate) fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Errors with a dedicated exit code.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Bad arguments that clap could not catch.
    #[error("{0}")]
    Usage(String),
}

/// uvflash - read and write radio SPI flash through its serial commands.
///
/// Environment variables:
///   UVFLASH_IMAGE      - Flash image file (default: uvflash.bin)
///   UVFLASH_PORT       - Port to send commands on (uart, vcp)
///   UVFLASH_TIMESTAMP  - Session timestamp (default: 0)
#[derive(Parser)]
#[command(name = "uvflash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Flash image file backing the emulated radio.
    #[arg(short, long, global = true, env = "UVFLASH_IMAGE")]
    image: Option<PathBuf>,

    /// Port to send commands on (uart, vcp).
    #[arg(short, long, global = true, env = "UVFLASH_PORT", value_parser = parse_port)]
    port: Option<Port>,

    /// Session timestamp echoed in every request.
    #[arg(short, long, global = true, env = "UVFLASH_TIMESTAMP", value_parser = parse_u32)]
    timestamp: Option<u32>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Create an erased (0xFF) 2 MiB flash image.
    Init {
        /// Overwrite an existing image.
        #[arg(long)]
        force: bool,
    },

    /// Send one flash read command.
    Read {
        /// Start address.
        #[arg(short, long, value_parser = parse_u32)]
        address: u32,

        /// Number of bytes (1-128; other values are sent as-is).
        #[arg(short, long)]
        size: u8,

        /// Output the reply as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Send one flash write command.
    Write {
        /// Start address.
        #[arg(short, long, value_parser = parse_u32)]
        address: u32,

        /// Data as hex (e.g. "0102030405060708").
        #[arg(short, long, value_parser = parse_hex_bytes)]
        data: HexBytes,

        /// Output the reply as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Read a region of any length.
    Dump {
        /// Start address.
        #[arg(short, long, value_parser = parse_u32)]
        address: u32,

        /// Number of bytes.
        #[arg(short, long, value_parser = parse_usize)]
        length: usize,

        /// Write the data to a file instead of printing a hex dump.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a file into flash.
    Load {
        /// File to write.
        file: PathBuf,

        /// Start address (8-byte aligned).
        #[arg(short, long, value_parser = parse_u32)]
        address: u32,
    },

    /// Decode a captured request or reply frame.
    Decode {
        /// Frame bytes as hex.
        #[arg(value_parser = parse_hex_bytes)]
        frame: HexBytes,

        /// Output the message as JSON to stdout.
        #[arg(long)]
        json: bool,
    },
}

/// Bytes parsed from a hex argument.
#[derive(Clone, Debug, PartialEq, Eq)]
struct HexBytes(Vec<u8>);

/// Parse a number in decimal or hex (0x prefix, underscores allowed).
fn parse_u32(s: &str) -> Result<u32, String> {
    let s: String = s.trim().chars().filter(|c| *c != '_').collect();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex number: {e}"))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {e}"))
    }
}

fn parse_port(s: &str) -> Result<Port, String> {
    s.parse::<Port>().map_err(|e| e.to_string())
}

fn parse_usize(s: &str) -> Result<usize, String> {
    parse_u32(s).map(|v| v as usize)
}

/// Parse hex bytes, ignoring whitespace, ':' and '-' separators.
fn parse_hex_bytes(s: &str) -> Result<HexBytes, String> {
    let digits: Vec<u8> = s
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':' && *b != b'-')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(format!("Odd number of hex digits in '{s}'"));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let text = std::str::from_utf8(pair).map_err(|e| e.to_string())?;
            u8::from_str_radix(text, 16).map_err(|_| format!("Invalid hex byte '{text}'"))
        })
        .collect::<Result<Vec<u8>, String>>()
        .map(HexBytes)
}

/// Session settings after merging flags, environment and config.
pub(crate) struct Session {
    pub(crate) image: PathBuf,
    pub(crate) port: Port,
    pub(crate) timestamp: u32,
    pub(crate) quiet: bool,
    pub(crate) config: Config,
}

impl Session {
    fn resolve(cli: &Cli, config: Config) -> Self {
        let image = cli
            .image
            .clone()
            .or_else(|| config.session.image.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE));
        let port = cli
            .port
            .or(config.session.port)
            .unwrap_or(Port::Uart);
        let timestamp = cli.timestamp.or(config.session.timestamp).unwrap_or(0);
        Self {
            image,
            port,
            timestamp,
            quiet: cli.quiet,
            config,
        }
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<CliError>().is_some() {
        2
    } else {
        1
    }
}

fn main() {
    let cli = Cli::parse();

    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "uvflash v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    if let Err(err) = run(&cli) {
        eprintln!("Error: {err:#}");
        std::process::exit(exit_code(&err));
    }
}

fn run(cli: &Cli) -> Result<()> {
    // Load configuration
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };
    let session = Session::resolve(cli, config);
    debug!(
        "Image {}, port {}, timestamp {:#010x}",
        session.image.display(),
        session.port,
        session.timestamp
    );

    match &cli.command {
        Commands::Init { force } => commands::image::cmd_init(&session, *force),
        Commands::Read {
            address,
            size,
            json,
        } => commands::transfer::cmd_read(&session, *address, *size, *json),
        Commands::Write {
            address,
            data,
            json,
        } => commands::transfer::cmd_write(&session, *address, &data.0, *json),
        Commands::Dump {
            address,
            length,
            output,
        } => commands::transfer::cmd_dump(&session, *address, *length, output.as_deref()),
        Commands::Load { file, address } => commands::transfer::cmd_load(&session, file, *address),
        Commands::Decode { frame, json } => commands::decode::cmd_decode(&frame.0, *json),
    }
}
