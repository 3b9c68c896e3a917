//! Textual-configuration-to-wire-bytes parsers: CIP connection paths, CIP
//! symbolic tag names, and PCCC logical file addresses.

mod cip_path;
mod pccc_address;
mod tag_name;

pub use cip_path::{cip_encode_path, EncodedPath};
pub use pccc_address::{
    parse_pccc_logical_address, plc5_encode_address, slc_encode_address, BitAddress,
    PcccAddress,
};
pub use tag_name::cip_encode_tag_name;

/// PLC family, as selected by the `cpu`/`plc` tag attribute.
///
/// Drives routing-suffix selection in [`cip_encode_path`] and request-shape
/// selection in the Tag Coordinator (CIP vs. PCCC, plain vs. connected).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlcFamily {
    Plc5,
    Slc,
    MicroLogix,
    ControlLogix,
    Micro800,
    OmronNjNx,
    LogixPccc,
}

impl PlcFamily {
    /// True for families that exchange data via the legacy PCCC command
    /// set rather than native CIP symbolic tags.
    pub fn is_pccc(self) -> bool {
        matches!(self, PlcFamily::Plc5 | PlcFamily::Slc | PlcFamily::MicroLogix)
    }

    /// True for families that require a CIP Class-3 connection
    /// (Forward Open) before they will service requests.
    pub fn requires_cip_connection(self) -> bool {
        matches!(
            self,
            PlcFamily::ControlLogix | PlcFamily::Micro800 | PlcFamily::OmronNjNx | PlcFamily::LogixPccc
        )
    }

    /// Whether Multiple-Service-Packet batching defaults on for this family
    /// when the `allow_packing` attribute is not given explicitly: off for
    /// PLC-5/SLC, on for *Logix, off by default for Omron.
    pub fn default_allow_packing(self) -> bool {
        matches!(self, PlcFamily::ControlLogix | PlcFamily::Micro800)
    }
}

impl std::str::FromStr for PlcFamily {
    type Err = crate::error::PlcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plc5" => Ok(PlcFamily::Plc5),
            "slc" | "slc500" => Ok(PlcFamily::Slc),
            "micrologix" | "mlgx" => Ok(PlcFamily::MicroLogix),
            "lgx" | "controllogix" | "compactlogix" => Ok(PlcFamily::ControlLogix),
            "micro800" | "mlgx800" => Ok(PlcFamily::Micro800),
            "omron-njnx" | "nx1p2" => Ok(PlcFamily::OmronNjNx),
            "logix-pccc" => Ok(PlcFamily::LogixPccc),
            other => Err(crate::error::PlcError::BadParam(format!(
                "unknown cpu/plc family '{other}'"
            ))),
        }
    }
}
