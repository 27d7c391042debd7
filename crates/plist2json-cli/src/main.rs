//! `plist2json` CLI: convert a property list to JSON.
//!
//! ## Usage
//!
//! ```sh
//! # Any plist format on stdin, compact JSON on stdout
//! plist2json < Info.plist
//!
//! # From file to file, pretty-printed
//! plist2json -i Info.plist -o info.json --pretty
//!
//! # Force the input format instead of sniffing it
//! plist2json --format openstep < Localizable.strings
//!
//! # Emit Data/Date as {"__type":...,"value":...} objects
//! plist2json --tagged < prefs.plist
//! ```
//!
//! On failure nothing is written to stdout, a diagnostic goes to stderr and
//! the exit status is non-zero.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use plist2json_core::{ConvertOptions, EncodeOptions, Format, ScalarStyle};
use std::io::{self, Read, Write};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "plist2json",
    version,
    about = "Convert a property list (binary, XML or OpenStep) to JSON"
)]
struct Cli {
    /// Input file (reads from stdin if omitted)
    #[arg(short, long)]
    input: Option<String>,

    /// Output file (writes to stdout if omitted)
    #[arg(short, long)]
    output: Option<String>,

    /// Input format
    #[arg(short, long, value_enum, default_value_t = InputFormat::Auto)]
    format: InputFormat,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Write data and dates as {"__type": ..., "value": ...} objects
    #[arg(long)]
    tagged: bool,

    /// Increase log verbosity on stderr (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    /// Detect from the leading bytes
    Auto,
    Binary,
    Xml,
    Openstep,
}

impl InputFormat {
    fn to_format(self) -> Option<Format> {
        match self {
            InputFormat::Auto => None,
            InputFormat::Binary => Some(Format::Binary),
            InputFormat::Xml => Some(Format::Xml),
            InputFormat::Openstep => Some(Format::OpenStep),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = ConvertOptions {
        format: cli.format.to_format(),
        encode: EncodeOptions {
            pretty: cli.pretty,
            scalars: if cli.tagged {
                ScalarStyle::Tagged
            } else {
                ScalarStyle::Plain
            },
        },
    };

    let input = read_input(cli.input.as_deref())?;
    tracing::info!(bytes = input.len(), "read input");

    let json = plist2json_core::convert_with(&input, &options)
        .context("Failed to convert property list to JSON")?;

    write_output(cli.output.as_deref(), &json)?;
    tracing::info!(bytes = json.len(), "wrote JSON");
    Ok(())
}

/// Log to stderr; `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn read_input(path: Option<&str>) -> Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path).with_context(|| format!("Failed to read file: {}", path)),
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(content.as_bytes())
                .and_then(|()| stdout.flush())
                .context("Failed to write to stdout")?;
        }
    }
    Ok(())
}
