//! Error taxonomy for the PLC session layer.
//!
//! Mirrors the `PLCTAG_ERR_*` integer status codes from the original C
//! library's public header, plus the richer `{primary,secondary} -> kind`
//! table used to decode CIP general/additional status words and the PCCC
//! status byte. Every status the external interface documents is a distinct
//! `PlcError` variant so callers can match on it instead of parsing strings.

use thiserror::Error;

/// The stable, process-wide error/status taxonomy.
///
/// Numeric values are preserved from the original status code space so a
/// caller porting configuration or logging from the C library sees the same
/// numbers. `status()` returns that number; `Display` returns a short
/// description suitable for logs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlcError {
    #[error("null pointer")]
    NullPtr,
    #[error("value out of bounds")]
    OutOfBounds,
    #[error("out of memory")]
    NoMem,
    #[error("could not append to list")]
    LlAdd,
    #[error("bad parameter: {0}")]
    BadParam(String),
    #[error("create failed: {0}")]
    Create(String),
    #[error("container not empty")]
    NotEmpty,
    #[error("open failed: {0}")]
    Open(String),
    #[error("set failed")]
    Set,
    #[error("write failed: {0}")]
    Write(String),
    #[error("operation timed out")]
    Timeout,
    #[error("timed out waiting for acknowledgement")]
    TimeoutAck,
    #[error("retries exhausted")]
    Retries,
    #[error("read failed: {0}")]
    Read(String),
    #[error("malformed data: {0}")]
    BadData(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("value too long")]
    TooLong,
    #[error("close failed")]
    Close,
    #[error("operation not allowed")]
    NotAllowed,
    #[error("thread error")]
    Thread,
    #[error("no data available")]
    NoData,
    #[error("thread join failed")]
    ThreadJoin,
    #[error("thread create failed")]
    ThreadCreate,
    #[error("mutex destroy failed")]
    MutexDestroy,
    #[error("mutex unlock failed")]
    MutexUnlock,
    #[error("mutex init failed")]
    MutexInit,
    #[error("mutex lock failed")]
    MutexLock,
    #[error("not implemented")]
    NotImplemented,
    #[error("bad device: {0}")]
    BadDevice(String),
    #[error("bad gateway: {0}")]
    BadGateway(String),
    #[error("remote error: {0}")]
    RemoteErr(String),
    #[error("not found")]
    NotFound,
    #[error("aborted")]
    Abort,
    #[error("winsock error")]
    Winsock,
    #[error("bad connection: {0}")]
    BadConnection(String),
    #[error("requested data too large for the response packet")]
    TooLarge,
    #[error("device busy")]
    Busy,
    #[error("duplicate request")]
    Duplicate,
    #[error("no resources available: {0}")]
    NoResources(String),
    #[error("no matching entry: {0}")]
    NoMatch(String),
    #[error("bad status: {0}")]
    BadStatus(String),
    #[error("buffer too small: {0}")]
    TooSmall(String),
    #[error("bad reply: {0}")]
    BadReply(String),
    #[error("bad configuration: {0}")]
    BadConfig(String),
    /// Operation has been queued but has not completed; not a failure.
    #[error("pending")]
    Pending,
}

impl PlcError {
    /// The stable numeric status code, matching the original library's
    /// `PLCTAG_ERR_*`/`PLCTAG_STATUS_*` constants where one exists.
    pub fn status(&self) -> i32 {
        use PlcError::*;
        match self {
            Pending => 1,
            NullPtr => -1,
            OutOfBounds => -2,
            NoMem => -3,
            LlAdd => -4,
            BadParam(_) => -5,
            Create(_) => -6,
            NotEmpty => -7,
            Open(_) => -8,
            Set => -9,
            Write(_) => -10,
            Timeout => -11,
            TimeoutAck => -12,
            Retries => -13,
            Read(_) => -14,
            BadData(_) => -15,
            Encode(_) => -16,
            Decode(_) => -17,
            Unsupported(_) => -18,
            TooLong => -19,
            Close => -20,
            NotAllowed => -21,
            Thread => -22,
            NoData => -23,
            ThreadJoin => -24,
            ThreadCreate => -25,
            MutexDestroy => -26,
            MutexUnlock => -27,
            MutexInit => -28,
            MutexLock => -29,
            NotImplemented => -30,
            BadDevice(_) => -31,
            BadGateway(_) => -32,
            RemoteErr(_) => -33,
            NotFound => -34,
            Abort => -35,
            Winsock => -36,
            BadConnection(_) => -37,
            TooLarge => -38,
            Busy => -39,
            Duplicate => -40,
            NoResources(_) => -41,
            NoMatch(_) => -42,
            BadStatus(_) => -43,
            TooSmall(_) => -44,
            BadReply(_) => -45,
            BadConfig(_) => -46,
        }
    }
}

pub type PlcResult<T> = Result<T, PlcError>;

/// One entry of the Rockwell CIP general/additional-status decoder table.
///
/// Transcribed from `src/protocols/ab/error_codes.c`'s `error_code_table[]`.
/// `secondary` is `None` for entries that apply to a bare general status
/// with no additional status word (the common case for status codes
/// 0x00-0x29), and `Some(_)` for the Forward-Open-specific extended
/// statuses carried under general status 0x01 ("connection failure").
struct RockwellEntry {
    primary: u8,
    secondary: Option<u16>,
    kind: fn(String) -> PlcError,
    short_desc: &'static str,
}

macro_rules! rk {
    ($primary:expr, $secondary:expr, $kind:expr, $desc:expr) => {
        RockwellEntry {
            primary: $primary,
            secondary: $secondary,
            kind: $kind,
            short_desc: $desc,
        }
    };
}

/// Table of general CIP status codes with no additional status word,
/// as enumerated in `error_codes.c`'s single-primary-code rows (0x02-0x29).
/// General status 0x00 (success) and 0x06 (more data, i.e. fragmented reply
/// continuation) are intercepted by [`super::cip::ReplyHeader::ok`] before
/// reaching here and so have no entry.
static GENERAL_STATUS_TABLE: &[RockwellEntry] = &[
    rk!(0x02, None, |s| PlcError::NoResources(s), "resource unavailable for unconnected send"),
    rk!(0x03, None, PlcError::BadParam, "parameter value invalid"),
    rk!(0x04, None, PlcError::BadData, "IOI could not be deciphered or tag does not exist"),
    rk!(0x05, None, PlcError::BadParam, "path destination error"),
    rk!(0x06, None, |_| PlcError::TooLarge, "data requested would not fit in response packet"),
    rk!(0x07, None, PlcError::BadConnection, "connection lost"),
    rk!(0x08, None, PlcError::Unsupported, "unsupported service"),
    rk!(0x09, None, PlcError::BadData, "error in data segment"),
    rk!(0x0A, None, |s| PlcError::BadStatus(s), "attribute list error"),
    rk!(0x0B, None, |_| PlcError::Duplicate, "already in requested mode/state"),
    rk!(0x0C, None, |s| PlcError::BadStatus(s), "object state error"),
    rk!(0x0D, None, |_| PlcError::Duplicate, "object already exists"),
    rk!(0x0E, None, |_| PlcError::NotAllowed, "attribute not settable"),
    rk!(0x0F, None, |_| PlcError::NotAllowed, "permission denied"),
    rk!(0x10, None, |s| PlcError::BadStatus(s), "device state error"),
    rk!(0x11, None, |_| PlcError::TooLarge, "reply data too large"),
    rk!(0x12, None, |_| PlcError::NotAllowed, "fragmentation of a primitive value"),
    rk!(0x13, None, |s| PlcError::TooSmall(s), "not enough data"),
    rk!(0x14, None, PlcError::Unsupported, "attribute not supported"),
    rk!(0x15, None, |_| PlcError::TooLarge, "too much data"),
    rk!(0x16, None, |_| PlcError::NotFound, "object does not exist"),
    rk!(0x17, None, |_| PlcError::NotAllowed, "service fragmentation sequence not in progress"),
    rk!(0x18, None, |_| PlcError::NoData, "no stored attribute data"),
    rk!(0x19, None, PlcError::RemoteErr, "store operation failure"),
    rk!(0x1A, None, |_| PlcError::TooLarge, "routing failure, request packet too large"),
    rk!(0x1B, None, |_| PlcError::TooLarge, "routing failure, response packet too large"),
    rk!(0x1C, None, |_| PlcError::NoData, "missing attribute list entry data"),
    rk!(0x1D, None, PlcError::BadData, "invalid attribute value list"),
    // Not in `error_codes.c` (a Productivity-Suite-specific table); this is
    // the plain CIP-spec "embedded service error" status, returned by a
    // Multiple Service Packet reply when one or more sub-replies failed.
    rk!(0x1E, None, PlcError::RemoteErr, "embedded service error, inspect sub-replies"),
    rk!(0x20, None, PlcError::BadParam, "invalid parameter"),
    rk!(0x21, None, |_| PlcError::Duplicate, "write-once value or medium already written"),
    rk!(0x22, None, |s| PlcError::BadReply(s), "invalid reply received"),
    rk!(0x25, None, PlcError::BadParam, "key failure in path"),
    rk!(0x26, None, PlcError::BadParam, "IOI word count does not match"),
    rk!(0x27, None, PlcError::BadParam, "unexpected attribute in list"),
    rk!(0x28, None, PlcError::BadParam, "invalid member id"),
    rk!(0x29, None, |_| PlcError::NotAllowed, "member not writable"),
];

/// Extended statuses carried under general status 0x01 (connection failure)
/// and the 0xFF vendor-specific rows, both transcribed from
/// `error_codes.c`'s two-word (primary, secondary) entries.
static FORWARD_OPEN_STATUS_TABLE: &[RockwellEntry] = &[
    rk!(0x01, Some(0x0100), |_| PlcError::Duplicate, "connection in use / duplicate Forward Open"),
    rk!(0x01, Some(0x0103), PlcError::Unsupported, "transport class/trigger combination not supported"),
    rk!(0x01, Some(0x0106), |_| PlcError::NotAllowed, "owner conflict"),
    rk!(0x01, Some(0x0107), |_| PlcError::NotFound, "target connection not found"),
    rk!(0x01, Some(0x0108), PlcError::BadParam, "invalid network connection parameter"),
    rk!(0x01, Some(0x0109), PlcError::BadParam, "invalid connection size"),
    rk!(0x01, Some(0x0110), |_| PlcError::NotFound, "target for connection not configured"),
    rk!(0x01, Some(0x0111), PlcError::Unsupported, "RPI not supported"),
    rk!(0x01, Some(0x0112), PlcError::BadParam, "RPI value not acceptable"),
    rk!(0x01, Some(0x0113), |s| PlcError::NoResources(s), "out of connections"),
    rk!(0x01, Some(0x0114), |_| PlcError::NotFound, "vendor id or product code mismatch"),
    rk!(0x01, Some(0x0115), |_| PlcError::NotFound, "device type mismatch"),
    rk!(0x01, Some(0x0116), |s| PlcError::NoMatch(s), "revision mismatch"),
    rk!(0x01, Some(0x0117), PlcError::BadParam, "invalid produced or consumed application path"),
    rk!(0x01, Some(0x0118), PlcError::BadParam, "invalid or inconsistent configuration application path"),
    rk!(0x01, Some(0x0119), PlcError::Open, "non-listen-only connection not opened"),
    rk!(0x01, Some(0x011A), |s| PlcError::NoResources(s), "target object out of connections"),
    rk!(0x01, Some(0x011B), |s| PlcError::TooSmall(s), "RPI smaller than production inhibit time"),
    rk!(0x01, Some(0x011C), PlcError::Unsupported, "transport class not supported"),
    rk!(0x01, Some(0x011D), PlcError::Unsupported, "production trigger not supported"),
    rk!(0x01, Some(0x011E), PlcError::Unsupported, "direction not supported"),
    rk!(0x01, Some(0x011F), PlcError::BadParam, "invalid O->T fixed/variable flag"),
    rk!(0x01, Some(0x0120), PlcError::BadParam, "invalid T->O fixed/variable flag"),
    rk!(0x01, Some(0x0121), PlcError::BadParam, "invalid O->T network connection priority"),
    rk!(0x01, Some(0x0122), PlcError::BadParam, "invalid T->O network connection priority"),
    rk!(0x01, Some(0x0123), PlcError::BadParam, "invalid O->T network connection type"),
    rk!(0x01, Some(0x0124), PlcError::BadParam, "invalid T->O network connection type"),
    rk!(0x01, Some(0x0125), PlcError::BadParam, "invalid O->T redundant owner flag"),
    rk!(0x01, Some(0x0126), PlcError::BadParam, "invalid configuration size"),
    rk!(0x01, Some(0x0127), PlcError::BadParam, "invalid O->T size"),
    rk!(0x01, Some(0x0128), PlcError::BadParam, "invalid T->O size"),
    rk!(0x01, Some(0x0129), PlcError::BadParam, "invalid configuration application path"),
    rk!(0x01, Some(0x012A), PlcError::BadParam, "invalid consuming application path"),
    rk!(0x01, Some(0x012B), PlcError::BadParam, "invalid producing application path"),
    rk!(0x01, Some(0x012C), |_| PlcError::NotFound, "configuration symbol does not exist"),
    rk!(0x01, Some(0x012D), |_| PlcError::NotFound, "consuming symbol does not exist"),
    rk!(0x01, Some(0x012E), |_| PlcError::NotFound, "producing symbol does not exist"),
    rk!(0x01, Some(0x012F), PlcError::BadData, "inconsistent application path combination"),
    rk!(0x01, Some(0x0130), PlcError::BadData, "inconsistent consume data format"),
    rk!(0x01, Some(0x0131), PlcError::BadData, "inconsistent produce data format"),
    rk!(0x01, Some(0x0132), PlcError::Unsupported, "null Forward Open function not supported"),
    rk!(0x01, Some(0x0133), PlcError::BadParam, "connection timeout multiplier not acceptable"),
    rk!(0x01, Some(0x0203), |_| PlcError::Timeout, "connection timed out"),
    rk!(0x01, Some(0x0204), |_| PlcError::Timeout, "unconnected request timed out"),
    rk!(0x01, Some(0x0205), PlcError::BadParam, "parameter error in unconnected request service"),
    rk!(0x01, Some(0x0206), |_| PlcError::TooLarge, "message too large for Unconnected Send service"),
    rk!(0x01, Some(0x0207), |s| PlcError::BadReply(s), "unconnected acknowledge without reply"),
    rk!(0x01, Some(0x0301), |s| PlcError::NoResources(s), "no buffer memory available"),
    rk!(0x01, Some(0x0302), |s| PlcError::NoResources(s), "network bandwidth not available for data"),
    rk!(0x01, Some(0x0303), |s| PlcError::NoResources(s), "no consumed connection id filter available"),
    rk!(0x01, Some(0x0304), |s| PlcError::BadConfig(s), "not configured to send scheduled priority data"),
    rk!(0x01, Some(0x0305), |s| PlcError::NoMatch(s), "schedule signature mismatch"),
    rk!(0x01, Some(0x0306), PlcError::Unsupported, "schedule signature validation not possible"),
    rk!(0x01, Some(0x0311), PlcError::BadDevice, "port not available"),
    rk!(0x01, Some(0x0312), PlcError::BadParam, "link address not valid"),
    rk!(0x01, Some(0x0315), PlcError::BadParam, "invalid segment in connection path"),
    rk!(0x01, Some(0x0316), |s| PlcError::NoMatch(s), "Forward Close connection path mismatch"),
    rk!(0x01, Some(0x0317), PlcError::BadParam, "scheduling not specified"),
    rk!(0x01, Some(0x0318), PlcError::BadParam, "link address to self invalid"),
    rk!(0x01, Some(0x0319), |s| PlcError::NoResources(s), "secondary resource unavailable"),
    rk!(0x01, Some(0x031A), |_| PlcError::Duplicate, "rack connection already established"),
    rk!(0x01, Some(0x031B), |_| PlcError::Duplicate, "module connection already established"),
    rk!(0x01, Some(0x031C), PlcError::RemoteErr, "miscellaneous"),
    rk!(0x01, Some(0x031D), |s| PlcError::NoMatch(s), "redundant connection mismatch"),
    rk!(0x01, Some(0x031E), |s| PlcError::NoResources(s), "no more user-configurable link resources"),
    rk!(0x01, Some(0x031F), |s| PlcError::NoResources(s), "no user-configurable link consumer resources configured"),
    rk!(0x01, Some(0x0800), PlcError::BadDevice, "network link offline"),
    rk!(0x01, Some(0x0810), |_| PlcError::NoData, "no target application data available"),
    rk!(0x01, Some(0x0811), |_| PlcError::NoData, "no originator application data available"),
    rk!(0x01, Some(0x0812), PlcError::Unsupported, "node address has changed since network was scheduled"),
    rk!(0x01, Some(0x0813), PlcError::Unsupported, "not configured for off-subnet multicast"),
    rk!(0x01, Some(0x0814), PlcError::BadData, "invalid produce/consume data format"),
    rk!(0xFF, Some(0x2104), |_| PlcError::OutOfBounds, "address is out of range"),
    rk!(0xFF, Some(0x2105), |_| PlcError::OutOfBounds, "attempt to access beyond end of data object"),
    rk!(0xFF, Some(0x2107), PlcError::BadParam, "data type is invalid or not supported"),
];

/// Decodes a CIP general status byte, with an optional additional status
/// word, into the stable taxonomy. `description` carries the Rockwell
/// short description so callers get a human-readable diagnostic alongside
/// the variant. Unknown pairs fall back to `RemoteErr` carrying the raw
/// codes, matching the source's `{-1,-1,REMOTE_ERR}` fallback entry.
pub fn decode_cip_status(general_status: u8, additional_status: Option<u16>) -> PlcError {
    if let Some(secondary) = additional_status {
        if let Some(entry) = FORWARD_OPEN_STATUS_TABLE
            .iter()
            .find(|e| e.primary == general_status && e.secondary == Some(secondary))
        {
            return (entry.kind)(entry.short_desc.to_string());
        }
    }
    if let Some(entry) = GENERAL_STATUS_TABLE
        .iter()
        .find(|e| e.primary == general_status && e.secondary.is_none())
    {
        return (entry.kind)(entry.short_desc.to_string());
    }
    PlcError::RemoteErr(format!(
        "unrecognized CIP status 0x{general_status:02X} (additional=0x{:04X})",
        additional_status.unwrap_or(0)
    ))
}

/// Decodes a PCCC status byte (transcribed from `pccc.c`'s
/// `pccc_decode_error`). `0xF0` is the extended-error escape; callers
/// that have the extended error byte available should pass it as
/// `extended`.
pub fn decode_pccc_status(status: u8, extended: Option<u8>) -> PlcError {
    if status == 0x00 {
        return PlcError::RemoteErr("success (not an error)".into());
    }
    if status == 0xF0 {
        let ext = extended.unwrap_or(0);
        let desc = match ext {
            0x01 => "illegal command or format",
            0x02 => "host has a problem and will not communicate",
            0x03 => "remote node host is missing, disconnected, or shut down",
            0x04 => "host could not complete function due to hardware fault",
            0x05 => "addressing problem or memory protect rungs",
            0x06 => "function not allowed due to command protection selection",
            0x07 => "processor is in program mode",
            0x08 => "compatibility mode file missing or communication zone problem",
            0x09 => "remote node cannot buffer command",
            0x0A => "wait ACK (1775-KA buffer full)",
            0x0B => "remote node problem due to download",
            0x0C => "wait ACK (1775-KA buffer full)",
            _ => "unrecognized extended PCCC status",
        };
        return PlcError::RemoteErr(format!("extended status 0x{ext:02X}: {desc}"));
    }
    let desc = match status {
        0x01 => "DST node is out of buffer space",
        0x02 => "cannot guarantee delivery: link layer",
        0x03 => "duplicate token holder detected",
        0x04 => "local port is disconnected",
        0x05 => "application layer timed out waiting for a response",
        0x06 => "duplicate node detected",
        0x07 => "station is offline",
        0x08 => "hardware fault",
        0x10 => "illegal command or format",
        0x20 => "host has a problem and will not communicate",
        0x30 => "remote node host is missing, disconnected, or shut down",
        0x40 => "host could not complete function due to hardware fault",
        0x50 => "addressing problem or memory protect rungs",
        0x60 => "function not allowed due to command protection selection",
        0x70 => "processor is in program mode",
        0x80 => "compatibility mode file missing or communication zone problem",
        0x90 => "remote node cannot buffer command",
        0xA0 => "wait ACK (1775-KA buffer full)",
        0xB0 => "remote node problem due to download",
        0xC0 => "wait ACK (1775-KA buffer full)",
        _ => "unrecognized PCCC status",
    };
    PlcError::RemoteErr(format!("PCCC status 0x{status:02X}: {desc}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragmentation_continuation_status_decodes_as_too_large_outside_read_context() {
        // 0x06 is "data would not fit" in the generic table; within the
        // fragmented-read loop this value is intercepted before reaching
        // decode_cip_status at all (see tag.rs), so here it legitimately
        // maps to TooLarge.
        let err = decode_cip_status(0x06, None);
        assert_eq!(err, PlcError::TooLarge);
    }

    #[test]
    fn unknown_status_falls_back_to_remote_err() {
        let err = decode_cip_status(0xEE, None);
        assert!(matches!(err, PlcError::RemoteErr(_)));
    }

    #[test]
    fn forward_open_extended_status_resolves() {
        let err = decode_cip_status(0x01, Some(0x0204));
        assert_eq!(err, PlcError::Timeout);
    }

    #[test]
    fn pccc_success_status() {
        let err = decode_pccc_status(0x00, None);
        assert!(matches!(err, PlcError::RemoteErr(ref s) if s.contains("success")));
    }

    #[test]
    fn status_numbers_match_original_taxonomy() {
        assert_eq!(PlcError::Pending.status(), 1);
        assert_eq!(PlcError::Abort.status(), -35);
        assert_eq!(PlcError::Duplicate.status(), -40);
    }

    #[test]
    fn forward_open_duplicate_connection_maps_to_duplicate_not_bad_connection() {
        assert!(matches!(decode_cip_status(0x01, Some(0x0100)), PlcError::Duplicate));
    }

    #[test]
    fn forward_open_owner_conflict_maps_to_not_allowed_not_bad_connection() {
        assert!(matches!(decode_cip_status(0x01, Some(0x0106)), PlcError::NotAllowed));
    }

    #[test]
    fn forward_open_invalid_connection_parameter_maps_to_bad_param_not_unsupported() {
        assert!(matches!(decode_cip_status(0x01, Some(0x0108)), PlcError::BadParam(_)));
    }

    #[test]
    fn forward_open_rpi_not_supported_maps_to_unsupported_not_bad_param() {
        assert!(matches!(decode_cip_status(0x01, Some(0x0111)), PlcError::Unsupported(_)));
    }

    #[test]
    fn forward_open_out_of_connections_maps_to_no_resources() {
        let err = decode_cip_status(0x01, Some(0x0113));
        assert!(matches!(err, PlcError::NoResources(_)));
        assert_eq!(err.status(), -41);
    }

    #[test]
    fn attribute_list_error_maps_to_bad_status() {
        assert!(matches!(decode_cip_status(0x0A, None), PlcError::BadStatus(_)));
    }
}
