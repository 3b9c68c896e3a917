//! `ab-eip-cli` - reads or writes a single tag against an EtherNet/IP
//! gateway from the command line.
//!
//! ## Architecture
//!
//! 1. **Parse arguments**: CLI flags become a tag attribute string.
//! 2. **Initialize logging**: structured diagnostics on stderr, plain
//!    colorized status on stdout.
//! 3. **Create the tag**: resolves (or reuses) a session, then hands the
//!    tag to the background I/O Handler thread.
//! 4. **Run the operation**: issues a read or write and polls for
//!    completion up to `--timeout-ms`.
//! 5. **Report the result**: prints the bytes read, or confirms the write,
//!    exiting non-zero on error or timeout.

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, prelude::*, Layer};

use ab_eip::cli::{Args, Operation};
use ab_eip::tag::Tag;

mod logging;
use logging::ColorizedFormatter;

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    // The guard must outlive the program for file-backed logging to flush.
    let guard;
    let detailed_log_layer;
    match args.log_file.as_deref() {
        Some("stderr") | None => {
            detailed_log_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_filter(log_level)
                .boxed();
            guard = None;
        }
        Some(path_str) => {
            let log_path = std::path::Path::new(path_str);
            let log_dir = log_path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let log_filename = log_path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("ab-eip.log"));
            let file_appender = tracing_appender::rolling::daily(log_dir, log_filename);
            let (non_blocking_writer, file_guard) = tracing_appender::non_blocking(file_appender);
            detailed_log_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking_writer)
                .with_ansi(false)
                .with_filter(log_level)
                .boxed();
            guard = Some(file_guard);
        }
    }

    let stdout_log = if !args.quiet {
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .event_format(ColorizedFormatter)
                .with_filter(log_level),
        )
    } else {
        None
    };

    tracing_subscriber::registry().with(detailed_log_layer).with(stdout_log).init();
    let _log_guard = guard;

    info!(gateway = %args.gateway, cpu = %args.cpu, name = %args.name, "opening tag");

    let tag = Tag::create(&args.to_attr_string()).map_err(|e| anyhow!("failed to create tag: {e}"))?;

    match args.operation {
        Operation::Read => {
            tag.read_with_timeout(args.timeout_ms).map_err(|e| anyhow!("read failed: {e}"))?;
            let bytes = tag.with_buffer(|b| b.to_vec());
            println!("{}", hex_dump(&bytes));
        }
        Operation::Write => {
            let data = args.write_bytes().map_err(|e| anyhow!(e))?;
            tag.with_buffer_mut(|b| {
                if b.len() < data.len() {
                    b.resize(data.len(), 0);
                }
                b[..data.len()].copy_from_slice(&data);
            });
            tag.write_with_timeout(args.timeout_ms).map_err(|e| anyhow!("write failed: {e}"))?;
            info!("write completed");
        }
    }

    Ok(())
}

fn hex_dump(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ")
}
