//! Command-line argument parsing for the `ab-eip-cli` demo binary: enough
//! of a tag attribute string to open a session, read or write a tag, and
//! print the result.

use clap::{
    builder::styling::{AnsiColor, Styles},
    Parser, ValueEnum,
};

/// Defines the styles for the help message to replicate clap v3's appearance.
fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default())
        .usage(AnsiColor::Yellow.on_default())
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// `ab-eip-cli` - a minimal command-line client for reading and writing
/// tags on Allen-Bradley/Rockwell and Omron PLCs over EtherNet/IP.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None, styles = styles())]
pub struct Args {
    /// Gateway hostname or IPv4 address.
    #[arg(short, long)]
    pub gateway: String,

    /// Gateway TCP port.
    #[arg(long, default_value_t = 44818)]
    pub gateway_port: u16,

    /// CIP connection path, e.g. "1,0" for a backplane slot.
    #[arg(long)]
    pub path: Option<String>,

    /// PLC family: plc5, slc, micrologix, controllogix, micro800, omron-njnx, logix-pccc.
    #[arg(long)]
    pub cpu: String,

    /// Tag name (CIP) or PCCC logical address.
    #[arg(long)]
    pub name: String,

    /// Bytes per element.
    #[arg(long)]
    pub elem_size: Option<u32>,

    /// Number of elements.
    #[arg(long, default_value_t = 1)]
    pub elem_count: u32,

    /// Operation to perform.
    #[arg(long, value_enum, default_value_t = Operation::Read)]
    pub operation: Operation,

    /// Hex-encoded bytes to write (required for `--operation write`).
    #[arg(long)]
    pub write_data: Option<String>,

    /// Poll timeout in milliseconds before giving up on the operation.
    #[arg(long, default_value_t = 5000)]
    pub timeout_ms: u64,

    /// Write detailed diagnostics to this file instead of stderr (rotated
    /// daily). Pass "stderr" to force stderr even with other defaults.
    #[arg(long, help_heading = "Output and Logging")]
    pub log_file: Option<String>,

    /// Silence informational output on stdout; only diagnostics on stderr.
    #[arg(short = 'q', long, help_heading = "Output and Logging")]
    pub quiet: bool,

    /// Increase diagnostic log verbosity on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, help_heading = "Output and Logging")]
    pub verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Operation {
    Read,
    Write,
}

impl Args {
    /// Reconstructs the `key=value&...` tag attribute string this library's
    /// [`crate::tag::Tag::create`] expects.
    pub fn to_attr_string(&self) -> String {
        let mut parts = vec![
            "protocol=ab_eip".to_string(),
            format!("gateway={}", self.gateway),
            format!("gateway_port={}", self.gateway_port),
            format!("cpu={}", self.cpu),
            format!("name={}", self.name),
            format!("elem_count={}", self.elem_count),
        ];
        if let Some(path) = &self.path {
            parts.push(format!("path={path}"));
        }
        if let Some(elem_size) = self.elem_size {
            parts.push(format!("elem_size={elem_size}"));
        }
        parts.join("&")
    }

    /// Decodes `--write-data` into raw bytes, if an operation needs them.
    pub fn write_bytes(&self) -> Result<Vec<u8>, String> {
        let hex = self
            .write_data
            .as_deref()
            .ok_or_else(|| "--write-data is required for --operation write".to_string())?;
        decode_hex(hex)
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, String> {
    let s = s.trim();
    if s.len() % 2 != 0 {
        return Err("hex string must have an even number of digits".to_string());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| format!("{e}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_hex_pairs() {
        assert_eq!(decode_hex("0a1b").unwrap(), vec![0x0A, 0x1B]);
    }

    #[test]
    fn odd_length_hex_is_rejected() {
        assert!(decode_hex("0a1").is_err());
    }

    #[test]
    fn attr_string_includes_optional_fields() {
        let args = Args {
            gateway: "10.1.2.3".into(),
            gateway_port: 44818,
            path: Some("1,0".into()),
            cpu: "lgx".into(),
            name: "MyTag".into(),
            elem_size: Some(4),
            elem_count: 1,
            operation: Operation::Read,
            write_data: None,
            timeout_ms: 5000,
            log_file: None,
            quiet: false,
            verbose: 0,
        };
        let attrs = args.to_attr_string();
        assert!(attrs.contains("gateway=10.1.2.3"));
        assert!(attrs.contains("path=1,0"));
        assert!(attrs.contains("elem_size=4"));
    }
}
