//! `parse_pccc_logical_address` and its two serialisers, `plc5_encode_address`
//! and `slc_encode_address`.
//!
//! Grounded on `src/protocols/ab/pccc.c`: `parse_pccc_file_type`,
//! `parse_pccc_file_num`, `parse_pccc_elem_num`,
//! `parse_pccc_subelem_mnemonic` (the `sub_element_lookup[]` table),
//! `parse_pccc_bit_num`, `encode_data`, `plc5_encode_address`,
//! `slc_encode_address`.

use crate::error::{PlcError, PlcResult};

/// PCCC data-table file type, with its classic DF1 wire type code (used by
/// [`slc_encode_address`]) and fixed element size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcccFileType {
    Ascii,
    Bit,
    BlockTransfer,
    Counter,
    Bcd,
    Float,
    Input,
    LongInt,
    Message,
    Int,
    Output,
    Pid,
    Control,
    Status,
    Sfc,
    String,
    Timer,
}

impl PcccFileType {
    /// Element size in bytes, as fixed by the file type (before any
    /// mnemonic sub-element override).
    fn default_element_size(self) -> u32 {
        use PcccFileType::*;
        match self {
            Ascii => 1,
            Bit => 2,
            BlockTransfer => 12,
            Counter => 6,
            Bcd => 2,
            Float => 4,
            Input => 2,
            LongInt => 4,
            Message => 112,
            Int => 2,
            Output => 2,
            Pid => 164,
            Control => 6,
            Status => 2,
            Sfc => 6,
            String => 84,
            Timer => 6,
        }
    }

    /// Classic DF1/PCCC wire type code. `BlockTransfer` and `Sfc` have no
    /// code in the retrieved source (their mapping in
    /// `encode_file_type` is commented out with no value assigned) and are
    /// represented as 0, which correctly fails [`slc_encode_address`]'s
    /// "file type zero" check rather than inventing a code.
    fn wire_code(self) -> u8 {
        use PcccFileType::*;
        match self {
            Ascii => 0x8e,
            Bit => 0x85,
            BlockTransfer => 0x00,
            Counter => 0x87,
            Bcd => 0x8f,
            Float => 0x8a,
            Input => 0x8c,
            LongInt => 0x91,
            Message => 0x92,
            Int => 0x89,
            Output => 0x8b,
            Pid => 0x93,
            Control => 0x88,
            Status => 0x84,
            Sfc => 0x00,
            String => 0x8d,
            Timer => 0x86,
        }
    }
}

/// Which layer a tag's bit index applies to, per Design Notes open
/// question 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitAddress {
    Cip(u8),
    Pccc(u8),
}

/// A fully parsed PCCC logical address: `N7:0`, `T4:5.ACC`, `F8:10/3`, etc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcccAddress {
    pub file_type: PcccFileType,
    pub file: u32,
    pub element: u32,
    pub sub_element: Option<u32>,
    pub element_size_bytes: u32,
    pub bit: Option<u8>,
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn advance(&mut self, n: usize) {
        self.rest = &self.rest[n..];
    }

    fn take_digits(&mut self) -> PlcResult<Option<u32>> {
        let digit_count = self.rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digit_count == 0 {
            return Ok(None);
        }
        let (digits, rest) = self.rest.split_at(digit_count);
        self.rest = rest;
        digits
            .parse::<u32>()
            .map(Some)
            .map_err(|_| PlcError::BadParam(format!("malformed number '{digits}'")))
    }
}

fn parse_file_type(cur: &mut Cursor) -> PlcResult<PcccFileType> {
    let c0 = cur
        .peek()
        .ok_or_else(|| PlcError::BadParam("empty PCCC address".into()))?;
    let upper = c0.to_ascii_uppercase();
    let c1 = cur.rest.chars().nth(1).map(|c| c.to_ascii_uppercase());

    let (file_type, consumed) = match upper {
        'A' => (PcccFileType::Ascii, 1),
        'B' => {
            if c1.map(|c| c.is_ascii_digit()).unwrap_or(false) {
                (PcccFileType::Bit, 1)
            } else if c1 == Some('T') {
                (PcccFileType::BlockTransfer, 2)
            } else {
                return Err(PlcError::BadParam(format!("unknown file type near '{}'", cur.rest)));
            }
        }
        'C' => (PcccFileType::Counter, 1),
        'D' => (PcccFileType::Bcd, 1),
        'F' => (PcccFileType::Float, 1),
        'I' => (PcccFileType::Input, 1),
        'L' => (PcccFileType::LongInt, 1),
        'M' if c1 == Some('G') => (PcccFileType::Message, 2),
        'N' => (PcccFileType::Int, 1),
        'O' => (PcccFileType::Output, 1),
        'P' if c1 == Some('D') => (PcccFileType::Pid, 2),
        'R' => (PcccFileType::Control, 1),
        'S' => {
            if c1.map(|c| c.is_ascii_digit()).unwrap_or(false) {
                (PcccFileType::Status, 1)
            } else if c1 == Some('C') {
                (PcccFileType::Sfc, 2)
            } else if c1 == Some('T') {
                (PcccFileType::String, 2)
            } else {
                return Err(PlcError::BadParam(format!("unknown file type near '{}'", cur.rest)));
            }
        }
        'T' => (PcccFileType::Timer, 1),
        _ => {
            return Err(PlcError::BadParam(format!(
                "bad format or unsupported logical address '{}'",
                cur.rest
            )))
        }
    };
    cur.advance(consumed);
    Ok(file_type)
}

fn parse_file_num(cur: &mut Cursor) -> PlcResult<u32> {
    cur.take_digits()?
        .ok_or_else(|| PlcError::BadParam("expected data-table file number".into()))
}

fn parse_elem_num(cur: &mut Cursor) -> PlcResult<u32> {
    if cur.peek() != Some(':') {
        return Err(PlcError::BadParam("expected ':' before element number".into()));
    }
    cur.advance(1);
    cur.take_digits()?
        .ok_or_else(|| PlcError::BadParam("expected data-table element number".into()))
}

struct SubElemEntry {
    file_type: PcccFileType,
    field_name: &'static str,
    element_size_bytes: u32,
    sub_element: u32,
    bit: Option<u8>,
}

macro_rules! se {
    ($ft:expr, $name:expr, $size:expr, $sub:expr, $bit:expr) => {
        SubElemEntry {
            file_type: $ft,
            field_name: $name,
            element_size_bytes: $size,
            sub_element: $sub,
            bit: $bit,
        }
    };
}

/// Transcribed verbatim from `sub_element_lookup[]` in `pccc.c`, including
/// its two internal oddities: PID's `do` mnemonic appears twice (bit
/// positions 6 and 2 — lookup matches the first entry by linear scan order,
/// same as the source), and PID's `addr`/`tie` mnemonics share sub-element
/// offset 48.
static SUB_ELEMENT_LOOKUP: &[SubElemEntry] = {
    use PcccFileType::*;
    &[
        se!(BlockTransfer, "con", 2, 0, None),
        se!(BlockTransfer, "rlen", 2, 1, None),
        se!(BlockTransfer, "dlen", 2, 2, None),
        se!(BlockTransfer, "df", 2, 3, None),
        se!(BlockTransfer, "elem", 2, 4, None),
        se!(BlockTransfer, "rgs", 2, 5, None),
        se!(Control, "con", 2, 0, None),
        se!(Control, "len", 2, 1, None),
        se!(Control, "pos", 2, 2, None),
        se!(Counter, "con", 2, 0, None),
        se!(Counter, "cu", 2, 0, Some(15)),
        se!(Counter, "cd", 2, 0, Some(14)),
        se!(Counter, "dn", 2, 0, Some(13)),
        se!(Counter, "ov", 2, 0, Some(12)),
        se!(Counter, "un", 2, 0, Some(11)),
        se!(Counter, "pre", 2, 1, None),
        se!(Counter, "acc", 2, 2, None),
        se!(Message, "con", 2, 0, None),
        se!(Message, "nr", 2, 0, Some(9)),
        se!(Message, "to", 2, 0, Some(8)),
        se!(Message, "en", 2, 0, Some(7)),
        se!(Message, "st", 2, 0, Some(6)),
        se!(Message, "dn", 2, 0, Some(5)),
        se!(Message, "er", 2, 0, Some(4)),
        se!(Message, "co", 2, 0, Some(3)),
        se!(Message, "ew", 2, 0, Some(2)),
        se!(Message, "err", 2, 1, None),
        se!(Message, "rlen", 2, 2, None),
        se!(Message, "dlen", 2, 3, None),
        se!(Message, "data", 104, 4, None),
        se!(Pid, "con", 2, 0, None),
        se!(Pid, "en", 2, 0, Some(15)),
        se!(Pid, "ct", 2, 0, Some(9)),
        se!(Pid, "cl", 2, 0, Some(8)),
        se!(Pid, "pvt", 2, 0, Some(7)),
        se!(Pid, "do", 2, 0, Some(6)),
        se!(Pid, "swm", 2, 0, Some(4)),
        se!(Pid, "do", 2, 0, Some(2)),
        se!(Pid, "mo", 2, 0, Some(1)),
        se!(Pid, "pe", 2, 0, Some(0)),
        se!(Pid, "ini", 2, 1, Some(12)),
        se!(Pid, "spor", 2, 1, Some(11)),
        se!(Pid, "oll", 2, 1, Some(10)),
        se!(Pid, "olh", 2, 1, Some(9)),
        se!(Pid, "ewd", 2, 1, Some(8)),
        se!(Pid, "dvna", 2, 1, Some(3)),
        se!(Pid, "dvpa", 2, 1, Some(2)),
        se!(Pid, "pvla", 2, 1, Some(1)),
        se!(Pid, "pvha", 2, 1, Some(0)),
        se!(Pid, "sp", 4, 2, None),
        se!(Pid, "kp", 4, 4, None),
        se!(Pid, "ki", 4, 6, None),
        se!(Pid, "kd", 4, 8, None),
        se!(Pid, "bias", 4, 10, None),
        se!(Pid, "maxs", 4, 12, None),
        se!(Pid, "mins", 4, 14, None),
        se!(Pid, "db", 4, 16, None),
        se!(Pid, "so", 4, 18, None),
        se!(Pid, "maxo", 4, 20, None),
        se!(Pid, "mino", 4, 22, None),
        se!(Pid, "upd", 4, 24, None),
        se!(Pid, "pv", 4, 26, None),
        se!(Pid, "err", 4, 28, None),
        se!(Pid, "out", 4, 30, None),
        se!(Pid, "pvh", 4, 32, None),
        se!(Pid, "pvl", 4, 34, None),
        se!(Pid, "dvp", 4, 36, None),
        se!(Pid, "dvn", 4, 38, None),
        se!(Pid, "pvdb", 4, 40, None),
        se!(Pid, "dvdb", 4, 42, None),
        se!(Pid, "maxi", 4, 44, None),
        se!(Pid, "mini", 4, 46, None),
        se!(Pid, "tie", 4, 48, None),
        se!(Pid, "addr", 8, 48, None),
        se!(Pid, "data", 56, 52, None),
        se!(String, "len", 2, 0, None),
        se!(String, "data", 82, 1, None),
        se!(Sfc, "con", 2, 0, None),
        se!(Sfc, "sa", 2, 0, Some(15)),
        se!(Sfc, "fs", 2, 0, Some(14)),
        se!(Sfc, "ls", 2, 0, Some(13)),
        se!(Sfc, "ov", 2, 0, Some(12)),
        se!(Sfc, "er", 2, 0, Some(11)),
        se!(Sfc, "dn", 2, 0, Some(10)),
        se!(Sfc, "pre", 2, 1, None),
        se!(Sfc, "tim", 2, 2, None),
        se!(Timer, "con", 2, 0, None),
        se!(Timer, "en", 2, 0, Some(15)),
        se!(Timer, "tt", 2, 0, Some(14)),
        se!(Timer, "dn", 2, 0, Some(13)),
        se!(Timer, "pre", 2, 1, None),
        se!(Timer, "acc", 2, 2, None),
    ]
};

/// `(sub_element, element_size_bytes, bit)` resolved from a `.mnemonic`
/// suffix, or `None` if there was no mnemonic (end of string or a `/bitnum`
/// follows instead).
fn parse_subelem_mnemonic(
    cur: &mut Cursor,
    file_type: PcccFileType,
) -> PlcResult<Option<(u32, u32, Option<u8>)>> {
    match cur.peek() {
        None => Ok(None),
        Some('/') => Ok(None),
        Some('.') => {
            cur.advance(1);
            let remaining = cur.rest;
            for entry in SUB_ELEMENT_LOOKUP {
                if entry.file_type == file_type
                    && remaining.len() >= entry.field_name.len()
                    && remaining[..entry.field_name.len()].eq_ignore_ascii_case(entry.field_name)
                {
                    cur.advance(entry.field_name.len());
                    return Ok(Some((entry.sub_element, entry.element_size_bytes, entry.bit)));
                }
            }
            Err(PlcError::BadParam(format!(
                "unsupported field mnemonic '{remaining}' for this file type"
            )))
        }
        Some(_) => Err(PlcError::BadParam("bad subelement field in logical address".into())),
    }
}

fn parse_bit_num(cur: &mut Cursor, element_size_bytes: u32) -> PlcResult<Option<u8>> {
    match cur.peek() {
        None => Ok(None),
        Some('/') => {
            if element_size_bytes != 2 {
                return Err(PlcError::BadParam(
                    "single bit selection only works on word-sized data".into(),
                ));
            }
            cur.advance(1);
            let value = cur
                .take_digits()?
                .ok_or_else(|| PlcError::BadParam("expected bit number after '/'".into()))?;
            if value > 15 {
                return Err(PlcError::OutOfBounds);
            }
            Ok(Some(value as u8))
        }
        Some(_) => Err(PlcError::BadParam("bad bit number in logical address".into())),
    }
}

/// Parses a PCCC logical address string, e.g. `N7:0`, `T4:5.ACC`, `F8:10/3`.
pub fn parse_pccc_logical_address(address: &str) -> PlcResult<PcccAddress> {
    let mut cur = Cursor { rest: address };
    let file_type = parse_file_type(&mut cur)?;
    let file = parse_file_num(&mut cur)?;
    let element = parse_elem_num(&mut cur)?;

    let mnemonic = parse_subelem_mnemonic(&mut cur, file_type)?;
    let (sub_element, element_size_bytes, mnemonic_bit) = match mnemonic {
        Some((sub, size, bit)) => (Some(sub), size, bit),
        None => (None, file_type.default_element_size(), None),
    };

    let bit = match mnemonic_bit {
        Some(b) => Some(b),
        None => parse_bit_num(&mut cur, element_size_bytes)?,
    };

    if !cur.rest.is_empty() {
        return Err(PlcError::BadParam(format!(
            "unexpected trailing characters '{}' in PCCC address",
            cur.rest
        )));
    }

    Ok(PcccAddress {
        file_type,
        file,
        element,
        sub_element,
        element_size_bytes,
        bit,
    })
}

fn encode_data(value: u32, out: &mut Vec<u8>) -> PlcResult<()> {
    if value > 0xFFFF {
        return Err(PlcError::TooLarge);
    }
    if value <= 254 {
        out.push(value as u8);
    } else {
        out.push(0xFF);
        out.extend_from_slice(&(value as u16).to_le_bytes());
    }
    Ok(())
}

/// PLC-5 "level-encoded" address form.
pub fn plc5_encode_address(address: &PcccAddress) -> PlcResult<Vec<u8>> {
    let mut level_byte = 0x06u8;
    let mut body = Vec::new();
    encode_data(address.file, &mut body)?;
    encode_data(address.element, &mut body)?;
    if let Some(sub) = address.sub_element {
        level_byte |= 0x08;
        encode_data(sub, &mut body)?;
    }
    let mut out = vec![level_byte];
    out.append(&mut body);
    Ok(out)
}

/// SLC/MicroLogix "typed-logical" address form.
pub fn slc_encode_address(address: &PcccAddress) -> PlcResult<Vec<u8>> {
    let code = address.file_type.wire_code();
    if code == 0 {
        return Err(PlcError::BadParam(
            "this file type has no SLC typed-logical wire code".into(),
        ));
    }
    let mut out = Vec::new();
    encode_data(address.file, &mut out)?;
    encode_data(code as u32, &mut out)?;
    encode_data(address.element, &mut out)?;
    encode_data(address.sub_element.unwrap_or(0), &mut out)?;
    Ok(out)
}

/// Two's-complement sum-of-bytes checksum used by DH+-bridged PCCC frames.
pub fn pccc_calculate_bcc(data: &[u8]) -> u8 {
    let sum: i32 = data.iter().map(|&b| b as i32).sum();
    (-sum) as u8
}

#[rustfmt::skip]
static CRC16_TABLE: [u16; 256] = [
    0x0000, 0xC0C1, 0xC181, 0x0140, 0xC301, 0x03C0, 0x0280, 0xC241,
    0xC601, 0x06C0, 0x0780, 0xC741, 0x0500, 0xC5C1, 0xC481, 0x0440,
    0xCC01, 0x0CC0, 0x0D80, 0xCD41, 0x0F00, 0xCFC1, 0xCE81, 0x0E40,
    0x0A00, 0xCAC1, 0xCB81, 0x0B40, 0xC901, 0x09C0, 0x0880, 0xC841,
    0xD801, 0x18C0, 0x1980, 0xD941, 0x1B00, 0xDBC1, 0xDA81, 0x1A40,
    0x1E00, 0xDEC1, 0xDF81, 0x1F40, 0xDD01, 0x1DC0, 0x1C80, 0xDC41,
    0x1400, 0xD4C1, 0xD581, 0x1540, 0xD701, 0x17C0, 0x1680, 0xD641,
    0xD201, 0x12C0, 0x1380, 0xD341, 0x1100, 0xD1C1, 0xD081, 0x1040,
    0xF001, 0x30C0, 0x3180, 0xF141, 0x3300, 0xF3C1, 0xF281, 0x3240,
    0x3600, 0xF6C1, 0xF781, 0x3740, 0xF501, 0x35C0, 0x3480, 0xF441,
    0x3C00, 0xFCC1, 0xFD81, 0x3D40, 0xFF01, 0x3FC0, 0x3E80, 0xFE41,
    0xFA01, 0x3AC0, 0x3B80, 0xFB41, 0x3900, 0xF9C1, 0xF881, 0x3840,
    0x2800, 0xE8C1, 0xE981, 0x2940, 0xEB01, 0x2BC0, 0x2A80, 0xEA41,
    0xEE01, 0x2EC0, 0x2F80, 0xEF41, 0x2D00, 0xEDC1, 0xEC81, 0x2C40,
    0xE401, 0x24C0, 0x2580, 0xE541, 0x2700, 0xE7C1, 0xE681, 0x2640,
    0x2200, 0xE2C1, 0xE381, 0x2340, 0xE101, 0x21C0, 0x2080, 0xE041,
    0xA001, 0x60C0, 0x6180, 0xA141, 0x6300, 0xA3C1, 0xA281, 0x6240,
    0x6600, 0xA6C1, 0xA781, 0x6740, 0xA501, 0x65C0, 0x6480, 0xA441,
    0x6C00, 0xACC1, 0xAD81, 0x6D40, 0xAF01, 0x6FC0, 0x6E80, 0xAE41,
    0xAA01, 0x6AC0, 0x6B80, 0xAB41, 0x6900, 0xA9C1, 0xA881, 0x6840,
    0x7800, 0xB8C1, 0xB981, 0x7940, 0xBB01, 0x7BC0, 0x7A80, 0xBA41,
    0xBE01, 0x7EC0, 0x7F80, 0xBF41, 0x7D00, 0xBDC1, 0xBC81, 0x7C40,
    0xB401, 0x74C0, 0x7580, 0xB541, 0x7700, 0xB7C1, 0xB681, 0x7640,
    0x7200, 0xB2C1, 0xB381, 0x7340, 0xB101, 0x71C0, 0x7080, 0xB041,
    0x5000, 0x90C1, 0x9181, 0x5140, 0x9301, 0x53C0, 0x5280, 0x9241,
    0x9601, 0x56C0, 0x5780, 0x9741, 0x5500, 0x95C1, 0x9481, 0x5440,
    0x9C01, 0x5CC0, 0x5D80, 0x9D41, 0x5F00, 0x9FC1, 0x9E81, 0x5E40,
    0x5A00, 0x9AC1, 0x9B81, 0x5B40, 0x9901, 0x59C0, 0x5880, 0x9841,
    0x8801, 0x48C0, 0x4980, 0x8941, 0x4B00, 0x8BC1, 0x8A81, 0x4A40,
    0x4E00, 0x8EC1, 0x8F81, 0x4F40, 0x8D01, 0x4DC0, 0x4C80, 0x8C41,
    0x4400, 0x84C1, 0x8581, 0x4540, 0x8701, 0x47C0, 0x4680, 0x8641,
    0x8201, 0x42C0, 0x4380, 0x8341, 0x4100, 0x81C1, 0x8081, 0x4040,
];

/// Table-driven CRC16 used by DH+-bridged PCCC frames.
pub fn pccc_calculate_crc16(data: &[u8]) -> u16 {
    let mut running_crc: u16 = 0;
    for &byte in data {
        let running_byte = ((running_crc & 0x00FF) as u8) ^ byte;
        running_crc = (running_crc >> 8) ^ CRC16_TABLE[running_byte as usize];
    }
    running_crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_integer_address() {
        let a = parse_pccc_logical_address("N7:0").unwrap();
        assert_eq!(a.file_type, PcccFileType::Int);
        assert_eq!(a.file, 7);
        assert_eq!(a.element, 0);
        assert_eq!(a.sub_element, None);
        assert_eq!(a.element_size_bytes, 2);
    }

    #[test]
    fn parses_timer_mnemonic() {
        let a = parse_pccc_logical_address("T4:5.ACC").unwrap();
        assert_eq!(a.file_type, PcccFileType::Timer);
        assert_eq!(a.file, 4);
        assert_eq!(a.element, 5);
        assert_eq!(a.sub_element, Some(2));
        assert_eq!(a.element_size_bytes, 2);
    }

    #[test]
    fn parses_counter_bit_mnemonic() {
        let a = parse_pccc_logical_address("C5:2.DN").unwrap();
        assert_eq!(a.sub_element, Some(0));
        assert_eq!(a.bit, Some(13));
    }

    #[test]
    fn parses_explicit_bit_address() {
        let a = parse_pccc_logical_address("F8:10/3").unwrap();
        assert_eq!(a.file_type, PcccFileType::Float);
        assert_eq!(a.bit, Some(3));
    }

    #[test]
    fn bit_over_15_is_out_of_bounds() {
        let err = parse_pccc_logical_address("N7:0/16").unwrap_err();
        assert_eq!(err, PlcError::OutOfBounds);
    }

    #[test]
    fn pid_duplicate_do_mnemonic_matches_first_table_entry() {
        let a = parse_pccc_logical_address("PD3:0.do").unwrap();
        assert_eq!(a.bit, Some(6));
    }

    #[test]
    fn plc5_and_slc_round_trip_file_and_element() {
        let a = parse_pccc_logical_address("N7:300").unwrap();
        let plc5 = plc5_encode_address(&a).unwrap();
        assert_eq!(plc5[0], 0x06);
        assert_eq!(plc5[1], 0xFF); // 7 <= 254, but element 300 >= 255
        let slc = slc_encode_address(&a).unwrap();
        assert_eq!(slc[0], 7);
        assert_eq!(slc[1], PcccFileType::Int.wire_code());
    }

    #[test]
    fn slc_rejects_zero_file_type_code() {
        let a = PcccAddress {
            file_type: PcccFileType::Sfc,
            file: 1,
            element: 0,
            sub_element: None,
            element_size_bytes: 6,
            bit: None,
        };
        let err = slc_encode_address(&a).unwrap_err();
        assert!(matches!(err, PlcError::BadParam(_)));
    }

    #[test]
    fn bcc_known_vector() {
        // sum of [1,2,3] = 6, two's complement of 6 is 0xFA.
        assert_eq!(pccc_calculate_bcc(&[1, 2, 3]), 0xFA);
    }

    #[test]
    fn crc16_of_empty_is_zero() {
        assert_eq!(pccc_calculate_crc16(&[]), 0);
    }

    #[test]
    fn crc16_single_byte() {
        // running_crc starts 0; running_byte = 0 ^ 0x01 = 1; table[1] = 0xC0C1.
        assert_eq!(pccc_calculate_crc16(&[0x01]), 0xC0C1);
    }
}
