//! `cip_encode_tag_name`: CIP symbolic tag name grammar -> path segment bytes.
//!
//! ```text
//! tag      ::= symseg (tagseg)* (bitseg)?
//! tagseg   ::= '.' symseg | '[' numseg (',' numseg){0..2} ']'
//! bitseg   ::= '.' INT          (final only; 0..255)
//! symseg   ::= [A-Za-z_:] [A-Za-z0-9_:]*
//! numseg   ::= INT              (>= 0)
//! ```

use crate::error::{PlcError, PlcResult};

/// Result of encoding a CIP symbolic tag name: the path bytes (including
/// the leading word-count byte) and an optional trailing bit index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTagName {
    pub bytes: Vec<u8>,
    pub bit: Option<u8>,
}

fn is_symseg_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':'
}

fn is_symseg_cont(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ':'
}

fn encode_symseg(name: &str, out: &mut Vec<u8>) {
    let mut bytes = name.as_bytes().to_vec();
    out.push(0x91);
    out.push(bytes.len() as u8);
    out.append(&mut bytes);
    if out.len() % 2 != 0 {
        out.push(0);
    }
}

fn encode_numseg(v: u32, out: &mut Vec<u8>) {
    if v < 256 {
        out.push(0x28);
        out.push(v as u8);
    } else if v < 65536 {
        out.push(0x29);
        out.push(0x00);
        out.extend_from_slice(&(v as u16).to_le_bytes());
    } else {
        out.push(0x2A);
        out.push(0x00);
        out.extend_from_slice(&v.to_le_bytes());
    }
}

/// Encodes a CIP symbolic tag name into a length-prefixed path segment
/// sequence. See SPEC_FULL.md §4.1.
pub fn cip_encode_tag_name(name: &str) -> PlcResult<EncodedTagName> {
    let chars: Vec<char> = name.chars().collect();
    let mut i = 0usize;
    let mut body = Vec::new();
    let mut bit = None;

    // Leading symseg is mandatory.
    if i >= chars.len() || !is_symseg_start(chars[i]) {
        return Err(PlcError::BadParam(format!(
            "tag name '{name}' must start with a symbolic segment"
        )));
    }
    let start = i;
    i += 1;
    while i < chars.len() && is_symseg_cont(chars[i]) {
        i += 1;
    }
    encode_symseg(&chars[start..i].iter().collect::<String>(), &mut body);

    while i < chars.len() {
        match chars[i] {
            '.' => {
                i += 1;
                // Could be a symseg or a trailing bitseg (all digits, final).
                let seg_start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                if i > seg_start && i == chars.len() {
                    // All-digit run to end of string: trailing bit segment.
                    let value: u32 = chars[seg_start..i]
                        .iter()
                        .collect::<String>()
                        .parse()
                        .map_err(|_| PlcError::BadParam("malformed bit segment".into()))?;
                    if value > 255 {
                        return Err(PlcError::OutOfBounds);
                    }
                    bit = Some(value as u8);
                    break;
                }
                // Not a terminal all-digit run: must be a symbolic segment.
                i = seg_start;
                if i >= chars.len() || !is_symseg_start(chars[i]) {
                    return Err(PlcError::BadParam(format!(
                        "expected symbolic segment after '.' in '{name}'"
                    )));
                }
                let sym_start = i;
                i += 1;
                while i < chars.len() && is_symseg_cont(chars[i]) {
                    i += 1;
                }
                encode_symseg(&chars[sym_start..i].iter().collect::<String>(), &mut body);
            }
            '[' => {
                i += 1;
                let mut count = 0;
                loop {
                    let num_start = i;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                    if i == num_start {
                        return Err(PlcError::BadParam(format!(
                            "expected numeric index in '{name}'"
                        )));
                    }
                    let value: u32 = chars[num_start..i]
                        .iter()
                        .collect::<String>()
                        .parse()
                        .map_err(|_| PlcError::BadParam("malformed numeric index".into()))?;
                    encode_numseg(value, &mut body);
                    count += 1;
                    if count > 3 {
                        return Err(PlcError::BadParam(
                            "at most 3 numeric indices are allowed per bracket group".into(),
                        ));
                    }
                    if i < chars.len() && chars[i] == ',' {
                        i += 1;
                        continue;
                    }
                    break;
                }
                if i >= chars.len() || chars[i] != ']' {
                    return Err(PlcError::BadParam(format!(
                        "unterminated '[' in tag name '{name}'"
                    )));
                }
                i += 1;
            }
            other => {
                return Err(PlcError::BadParam(format!(
                    "unexpected character '{other}' in tag name '{name}'"
                )));
            }
        }
    }

    let word_count = ((body.len() + 1) / 2) as u8;
    let mut bytes = vec![word_count];
    bytes.extend(body);

    Ok(EncodedTagName { bytes, bit })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_symbolic_name() {
        let enc = cip_encode_tag_name("MyDINT").unwrap();
        // 0x91 6 'M' 'y' 'D' 'I' 'N' 'T' 0x00(pad)
        assert_eq!(&enc.bytes[1..], &[0x91, 6, b'M', b'y', b'D', b'I', b'N', b'T', 0x00]);
        assert_eq!(enc.bytes[0], (enc.bytes.len() as u8 - 1) / 2);
        assert_eq!(enc.bit, None);
    }

    #[test]
    fn array_index_and_member_access() {
        let enc = cip_encode_tag_name("Arr[2].Field").unwrap();
        assert!(enc.bytes.len() > 1);
        assert_eq!(enc.bit, None);
    }

    #[test]
    fn trailing_bit_segment_is_not_emitted_in_path() {
        let plain = cip_encode_tag_name("MyDINT").unwrap();
        let bitted = cip_encode_tag_name("MyDINT.3").unwrap();
        assert_eq!(plain.bytes, bitted.bytes);
        assert_eq!(bitted.bit, Some(3));
    }

    #[test]
    fn multi_dim_array_index() {
        let enc = cip_encode_tag_name("Arr[1,2,3]").unwrap();
        // three 0x28 numeric segments, 2 bytes each = 6 bytes body.
        assert_eq!(enc.bytes.len() - 1, 6);
    }

    #[test]
    fn too_many_indices_rejected() {
        let err = cip_encode_tag_name("Arr[1,2,3,4]").unwrap_err();
        assert!(matches!(err, PlcError::BadParam(_)));
    }

    #[test]
    fn encoding_is_pure_function_of_name() {
        let a = cip_encode_tag_name("Foo.Bar[5]").unwrap();
        let b = cip_encode_tag_name("Foo.Bar[5]").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn name_must_start_with_symbol() {
        let err = cip_encode_tag_name("1Bad").unwrap_err();
        assert!(matches!(err, PlcError::BadParam(_)));
    }
}
