//! `cip_encode_path`: comma-separated route string -> CIP path segment bytes.
//!
//! Grounded on `cip_encode_path_old`/`match_dhp_node` in
//! `src/protocols/ab/cip.c`: split on commas, try a DH+ triple first, then
//! an extended IP-address segment, then a plain numeric hop.

use super::PlcFamily;
use crate::error::{PlcError, PlcResult};

const MAX_CONN_PATH: usize = 255;

/// Result of parsing a connection-path string: the encoded bytes (already
/// zero-padded to an even length) and, when a DH+ triple was the terminal
/// segment, the destination node address for the PCCC layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPath {
    pub bytes: Vec<u8>,
    pub dhp_dest_node: Option<u8>,
}

impl EncodedPath {
    /// Path length in 16-bit words, as CIP request-path-size fields require.
    pub fn word_count(&self) -> u8 {
        (self.bytes.len() / 2) as u8
    }
}

enum Segment {
    Numeric(u8),
    Ip { port_byte: u8, octets: [u8; 4] },
    Dhp { port: u8, src: u8, dest: u8 },
}

fn parse_dhp(token: &str) -> Option<(u8, u8, u8)> {
    let mut parts = token.split(':');
    let channel = parts.next()?;
    let port = match channel {
        "A" | "a" | "2" => 1u8,
        "B" | "b" | "3" => 2u8,
        _ => return None,
    };
    let src: u8 = parts.next()?.parse().ok()?;
    let dest: u8 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((port, src, dest))
}

fn parse_ip_segment(token: &str) -> PlcResult<Option<(u8, [u8; 4])>> {
    let Some((head, rest)) = token.split_once(',') else {
        return Ok(None);
    };
    let port_byte = match head {
        "18" => 18u8,
        "19" => 19u8,
        _ => return Ok(None),
    };
    let dot_count = rest.matches('.').count();
    if dot_count != 3 {
        return Err(PlcError::BadParam(format!(
            "extended IP path segment '{token}' must contain exactly three dots"
        )));
    }
    let mut octets = [0u8; 4];
    for (i, part) in rest.split('.').enumerate() {
        octets[i] = part
            .parse::<u16>()
            .ok()
            .filter(|v| *v <= 255)
            .ok_or_else(|| PlcError::BadParam(format!("invalid IPv4 octet '{part}' in path")))?
            as u8;
    }
    Ok(Some((port_byte, octets)))
}

fn parse_segment(token: &str) -> PlcResult<Segment> {
    if let Some((port, src, dest)) = parse_dhp(token) {
        return Ok(Segment::Dhp { port, src, dest });
    }
    if let Some((port_byte, octets)) = parse_ip_segment(token)? {
        return Ok(Segment::Ip { port_byte, octets });
    }
    let hop: u8 = token
        .trim()
        .parse()
        .map_err(|_| PlcError::BadParam(format!("unrecognized path token '{token}'")))?;
    if hop > 15 {
        return Err(PlcError::OutOfBounds);
    }
    Ok(Segment::Numeric(hop))
}

/// Parses a CIP connection path string and appends the routing suffix
/// appropriate to `family`/`needs_connection`. See SPEC_FULL.md §4.1.
pub fn cip_encode_path(
    path: Option<&str>,
    needs_connection: bool,
    family: PlcFamily,
) -> PlcResult<EncodedPath> {
    let mut out = Vec::new();
    let mut dhp_dest_node = None;
    let mut saw_dhp = false;

    let tokens: Vec<&str> = match path {
        Some(p) if !p.is_empty() => p.split(',').collect(),
        _ => Vec::new(),
    };

    for (idx, token) in tokens.iter().enumerate() {
        if saw_dhp {
            return Err(PlcError::BadParam(
                "DH+ route segment must be the last token in the path".into(),
            ));
        }
        match parse_segment(token)? {
            Segment::Numeric(hop) => out.push(hop),
            Segment::Ip { port_byte, octets } => {
                let literal = format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3]);
                let mut literal_bytes = literal.into_bytes();
                if literal_bytes.len() % 2 != 0 {
                    literal_bytes.push(0);
                }
                out.push(port_byte);
                out.push(literal_bytes.len() as u8);
                out.extend_from_slice(&literal_bytes);
            }
            Segment::Dhp { port, dest, .. } => {
                saw_dhp = true;
                dhp_dest_node = Some(dest);
                let _ = port;
            }
        }
        if out.len() > MAX_CONN_PATH {
            return Err(PlcError::TooLarge);
        }
        let _ = idx;
    }

    if saw_dhp && matches!(family, PlcFamily::Plc5 | PlcFamily::Slc | PlcFamily::MicroLogix) {
        let port = tokens
            .last()
            .and_then(|t| parse_dhp(t))
            .map(|(p, _, _)| p)
            .unwrap_or(1);
        out.extend_from_slice(&[0x20, 0xA6, 0x24, port, 0x2C, 0x01]);
    } else if needs_connection || family.requires_cip_connection() {
        out.extend_from_slice(&[0x20, 0x02, 0x24, 0x01]);
    }

    if out.len() % 2 != 0 {
        out.push(0);
    }
    if out.len() > MAX_CONN_PATH {
        return Err(PlcError::TooLarge);
    }

    Ok(EncodedPath {
        bytes: out,
        dhp_dest_node,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_hops_encode_one_byte_each() {
        let p = cip_encode_path(Some("1,0"), true, PlcFamily::ControlLogix).unwrap();
        assert_eq!(p.bytes, vec![1, 0, 0x20, 0x02, 0x24, 0x01]);
        assert_eq!(p.word_count() as usize, p.bytes.len() / 2);
    }

    #[test]
    fn hop_over_15_is_out_of_bounds() {
        let err = cip_encode_path(Some("16"), false, PlcFamily::ControlLogix).unwrap_err();
        assert_eq!(err, PlcError::OutOfBounds);
    }

    #[test]
    fn dhp_triple_as_only_segment() {
        let p = cip_encode_path(Some("A:1:2"), false, PlcFamily::Plc5).unwrap();
        assert_eq!(p.dhp_dest_node, Some(2));
        assert_eq!(p.bytes, vec![0x20, 0xA6, 0x24, 1, 0x2C, 0x01]);
    }

    #[test]
    fn dhp_triple_must_be_terminal() {
        let err = cip_encode_path(Some("A:1:2,3"), false, PlcFamily::Plc5).unwrap_err();
        assert!(matches!(err, PlcError::BadParam(_)));
    }

    #[test]
    fn extended_ip_segment_requires_three_dots() {
        let err = cip_encode_path(Some("18,10.1.2"), false, PlcFamily::ControlLogix).unwrap_err();
        assert!(matches!(err, PlcError::BadParam(_)));
    }

    #[test]
    fn extended_ip_segment_pads_to_even_length() {
        let p = cip_encode_path(Some("18,10.1.2.3"), false, PlcFamily::Micro800).unwrap();
        // "10.1.2.3" is 8 chars (even) -> no padding needed.
        assert_eq!(&p.bytes[0..2], &[18, 8]);
        assert_eq!(&p.bytes[2..10], b"10.1.2.3");
    }

    #[test]
    fn no_connection_needed_appends_nothing() {
        let p = cip_encode_path(Some("1,0"), false, PlcFamily::Plc5).unwrap();
        assert_eq!(p.bytes, vec![1, 0]);
    }

    #[test]
    fn empty_path_for_micro800_still_gets_routing_suffix() {
        let p = cip_encode_path(None, false, PlcFamily::Micro800).unwrap();
        assert_eq!(p.bytes, vec![0x20, 0x02, 0x24, 0x01]);
    }
}
