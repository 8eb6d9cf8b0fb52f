//! zwrite CLI - upload ROM images to a serial EEPROM writer.
//!
//! ## Features
//!
//! - Upload ROM files over a serial link
//! - Synthesize and upload repeating fill patterns
//! - Optional post-upload checksum verification
//! - Serial port auto-detection
//! - Environment variable support

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use std::env;
use std::path::PathBuf;
use zwrite::{
    DEVICE_CAPACITY, Image, NativePort, SerialConfig, TransferOptions, TransferReport, Uploader,
    Verify, auto_detect_port, detect_ports,
};

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

/// Check if animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(std::sync::atomic::Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// zwrite - upload ROM images to a serial EEPROM writer.
///
/// Environment variables:
///   ZWRITE_PORT   - Default serial port
///   ZWRITE_BAUD   - Default baud rate (default: 115200)
#[derive(Parser)]
#[command(name = "zwrite")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "ZWRITE_PORT")]
    port: Option<String>,

    /// Baud rate for the serial link.
    #[arg(
        short,
        long,
        global = true,
        default_value = "115200",
        env = "ZWRITE_BAUD"
    )]
    baud: u32,

    /// Verbose output level (-v, -vv, -vvv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// A fill pattern as raw bytes. Spelled as an alias so clap's derive
/// treats the field as one value parsed by `parse_hex_pattern`, not as
/// multiple `u8` occurrences.
type PatternBytes = Vec<u8>;

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Upload a ROM file to the device.
    Write {
        /// Path to the ROM image file.
        romfile: PathBuf,

        /// Target start address (hex, 0x prefix optional).
        #[arg(short, long, default_value = "0", value_parser = parse_hex_u32)]
        address: u32,

        /// Truncate the image to this many bytes before uploading.
        #[arg(long)]
        length: Option<usize>,

        /// Encoded characters per protocol line.
        #[arg(long, default_value_t = zwrite::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Ask the device to re-read the written range and report checksums.
        #[arg(short, long)]
        check: bool,

        /// Fail unless the device's checksum report matches the local
        /// digests (implies --check).
        #[arg(long)]
        strict: bool,
    },

    /// Upload a repeating fill pattern instead of a file.
    Fill {
        /// Pattern bytes as a hex string (e.g. "ff" or "dead_beef").
        #[arg(long, value_parser = parse_hex_pattern)]
        pattern: PatternBytes,

        /// Number of bytes to write (default: device capacity minus the
        /// start address).
        #[arg(long)]
        length: Option<usize>,

        /// Target start address (hex, 0x prefix optional).
        #[arg(short, long, default_value = "0", value_parser = parse_hex_u32)]
        address: u32,

        /// Encoded characters per protocol line.
        #[arg(long, default_value_t = zwrite::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Ask the device to re-read the written range and report checksums.
        #[arg(short, long)]
        check: bool,

        /// Fail unless the device's checksum report matches the local
        /// digests (implies --check).
        #[arg(long)]
        strict: bool,
    },

    /// List available serial ports.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },
}

/// Parse hexadecimal address (supports 0x prefix and underscores).
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    let s: String = s.chars().filter(|c| *c != '_').collect();
    u32::from_str_radix(&s, 16).map_err(|e| format!("Invalid hex address: {e}"))
}

/// Parse a fill pattern given as a hex string, e.g. "ff" or "de_ad_be_ef".
fn parse_hex_pattern(s: &str) -> Result<Vec<u8>, String> {
    let s = s.trim();
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    let digits: Vec<char> = s.chars().filter(|c| *c != '_' && *c != ' ').collect();

    if digits.is_empty() {
        return Err("Pattern must contain at least one byte".to_string());
    }
    if digits.len() % 2 != 0 {
        return Err(format!(
            "Pattern has an odd number of hex digits: '{}'",
            digits.iter().collect::<String>()
        ));
    }

    digits
        .chunks(2)
        .map(|pair| {
            let pair: String = pair.iter().collect();
            u8::from_str_radix(&pair, 16).map_err(|e| format!("Invalid hex byte '{pair}': {e}"))
        })
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, std::sync::atomic::Ordering::Relaxed);
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
        "zwrite v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    match &cli.command {
        Commands::Write {
            romfile,
            address,
            length,
            chunk_size,
            check,
            strict,
        } => {
            let mut image = Image::from_file(romfile)
                .with_context(|| format!("Failed to read ROM file: {}", romfile.display()))?;
            if let Some(limit) = length {
                image = image.truncated(*limit);
            }
            if !cli.quiet {
                eprintln!(
                    "{} Loaded {} ({} bytes)",
                    style("•").cyan(),
                    style(romfile.display()).cyan(),
                    image.len()
                );
            }
            cmd_upload(
                &cli,
                &image,
                *address,
                *chunk_size,
                verify_mode(*check, *strict),
            )?;
        },
        Commands::Fill {
            pattern,
            length,
            address,
            chunk_size,
            check,
            strict,
        } => {
            let length =
                length.unwrap_or_else(|| DEVICE_CAPACITY.saturating_sub(*address as usize));
            let image = Image::fill(pattern, length).context("Invalid fill parameters")?;
            if !cli.quiet {
                eprintln!(
                    "{} Synthesized {}-byte fill from a {}-byte pattern",
                    style("•").cyan(),
                    image.len(),
                    pattern.len()
                );
            }
            cmd_upload(
                &cli,
                &image,
                *address,
                *chunk_size,
                verify_mode(*check, *strict),
            )?;
        },
        Commands::ListPorts { json } => {
            cmd_list_ports(*json);
        },
    }

    Ok(())
}

/// Map the check/strict flags onto a verification mode.
fn verify_mode(check: bool, strict: bool) -> Verify {
    if strict {
        Verify::Strict
    } else if check {
        Verify::Report
    } else {
        Verify::Skip
    }
}

/// Serial port from CLI args or auto-detection.
fn get_port(cli: &Cli) -> Result<String> {
    if let Some(ref port) = cli.port {
        return Ok(port.clone());
    }
    let detected = auto_detect_port().context(
        "No serial port specified and auto-detection failed.\n\
         Connect the EEPROM writer or pass --port explicitly.",
    )?;
    Ok(detected.name)
}

/// Drive one upload and report the outcome.
fn cmd_upload(
    cli: &Cli,
    image: &Image,
    address: u32,
    chunk_size: usize,
    verify: Verify,
) -> Result<()> {
    let port_name = get_port(cli)?;
    if !cli.quiet {
        eprintln!(
            "{} Using port {} at {} baud",
            style("•").cyan(),
            style(&port_name).cyan(),
            cli.baud
        );
        eprintln!("{} Waiting for the device to boot...", style("⏳").yellow());
    }

    let port = NativePort::open(&SerialConfig::new(&port_name, cli.baud))?;

    let pb = if cli.quiet || !use_fancy_output() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::no_length();
        #[allow(clippy::unwrap_used)] // Static template string
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb
    };

    let options = TransferOptions {
        address,
        chunk_size,
        verify,
    };
    let report = Uploader::new(port, options).upload(image, |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    })?;

    pb.finish_and_clear();
    print_report(cli, image, &report);
    Ok(())
}

/// Summarize a finished transfer on stderr.
fn print_report(cli: &Cli, image: &Image, report: &TransferReport) {
    if cli.quiet {
        return;
    }

    eprintln!(
        "{} Sent {} chunks ({} image bytes)",
        style("✓").green(),
        report.chunks_sent,
        image.len()
    );
    eprintln!("{} Device: {}", style("✓").green(), report.completion);

    if let Some(ref verification) = report.verification {
        eprintln!(
            "{} Expected: BYTES {} XOR {} ADLER32 {}",
            style("•").cyan(),
            image.len(),
            verification.expected.xor_hex(),
            verification.expected.adler_hex()
        );
        for line in &verification.device_report {
            eprintln!("{} Device:   {}", style("•").cyan(), line);
        }
    }

    eprintln!("\n{} Upload complete", style("🎉").green().bold());
}

/// List ports command implementation.
fn cmd_list_ports(json: bool) {
    let detected = detect_ports();

    if json {
        let ports: Vec<serde_json::Value> = detected
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "device": p.device.name(),
                    "known": p.device.is_known(),
                    "vid": p.vid,
                    "pid": p.pid,
                    "manufacturer": p.manufacturer,
                    "product": p.product,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&ports).unwrap_or_default()
        );
        return;
    }

    eprintln!("{}", style("Available serial ports").bold().underlined());

    if detected.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return;
    }

    for port in &detected {
        let device_type = if port.device.is_known() {
            format!(" [{}]", style(port.device.name()).yellow())
        } else {
            String::new()
        };

        let vid_pid = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            format!(" ({vid:04X}:{pid:04X})")
        } else {
            String::new()
        };

        let product = port.product.as_deref().unwrap_or("");
        eprintln!(
            "  {} {}{}{}{}",
            style("•").green(),
            style(&port.name).cyan(),
            device_type,
            vid_pid,
            if product.is_empty() {
                String::new()
            } else {
                format!(" - {}", style(product).dim())
            }
        );
    }

    if let Ok(auto_port) = auto_detect_port() {
        eprintln!(
            "\n{} Would auto-select: {}",
            style("→").green().bold(),
            style(&auto_port.name).cyan().bold()
        );
    }
}
