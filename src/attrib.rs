//! Tag attribute-string tokenizer: `key=value&key=value...` into a
//! lookup map, plus the typed [`TagConfig`] built from it per
//! SPEC_FULL.md §6.

use std::collections::HashMap;

use crate::error::{PlcError, PlcResult};
use crate::path::PlcFamily;

/// Parses a tag attribute string into a key to value map. Empty segments
/// (from a leading/trailing/doubled `&`) are ignored; a key with no `=`
/// maps to an empty string.
pub fn parse(attr_str: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for segment in attr_str.split('&') {
        if segment.is_empty() {
            continue;
        }
        match segment.split_once('=') {
            Some((k, v)) => {
                map.insert(k.to_string(), v.to_string());
            }
            None => {
                map.insert(segment.to_string(), String::new());
            }
        }
    }
    map
}

/// Optional type hint for *Logix tags, used to default `elem_size` when
/// the attribute string omits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElemType {
    Lint,
    Ulint,
    Dint,
    Udint,
    Int,
    Uint,
    Sint,
    Usint,
    Bool,
    BoolArray,
    Real,
    Lreal,
    String,
    ShortString,
}

impl ElemType {
    pub fn default_elem_size(self) -> Option<u32> {
        use ElemType::*;
        match self {
            Lint | Ulint | Lreal => Some(8),
            Dint | Udint | Real => Some(4),
            Int | Uint => Some(2),
            Sint | Usint | Bool => Some(1),
            BoolArray | String | ShortString => None,
        }
    }
}

impl std::str::FromStr for ElemType {
    type Err = PlcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use ElemType::*;
        Ok(match s {
            "lint" => Lint,
            "ulint" => Ulint,
            "dint" => Dint,
            "udint" => Udint,
            "int" => Int,
            "uint" => Uint,
            "sint" => Sint,
            "usint" => Usint,
            "bool" => Bool,
            "bool array" => BoolArray,
            "real" => Real,
            "lreal" => Lreal,
            "string" => String,
            "short string" => ShortString,
            other => return Err(PlcError::BadParam(format!("unknown elem_type '{other}'"))),
        })
    }
}

/// Fully parsed, typed tag configuration, built from the raw attribute map.
#[derive(Debug, Clone)]
pub struct TagConfig {
    pub gateway: String,
    pub gateway_port: u16,
    pub path: Option<String>,
    pub family: PlcFamily,
    pub name: String,
    pub elem_size: Option<u32>,
    pub elem_count: u32,
    pub elem_type: Option<ElemType>,
    pub read_cache_ms: u64,
    pub share_session: bool,
    pub use_connected_msg: Option<bool>,
    pub allow_packing: bool,
    pub debug: u32,
}

fn get<'a>(map: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    map.get(key).map(|s| s.as_str())
}

fn parse_bool_flag(value: &str) -> bool {
    value != "0"
}

impl TagConfig {
    pub fn from_attr_string(attr_str: &str) -> PlcResult<Self> {
        let map = parse(attr_str);

        if get(&map, "protocol").map(|p| p != "ab_eip").unwrap_or(false) {
            return Err(PlcError::Unsupported(
                "only protocol=ab_eip is supported by this library".into(),
            ));
        }

        let gateway = get(&map, "gateway")
            .ok_or_else(|| PlcError::BadParam("missing required 'gateway' attribute".into()))?
            .to_string();
        let gateway_port = match get(&map, "gateway_port") {
            Some(p) => p.parse().map_err(|_| PlcError::BadParam(format!("bad gateway_port '{p}'")))?,
            None => 44818,
        };
        let path = get(&map, "path").map(|s| s.to_string());

        let cpu_str = get(&map, "cpu").or_else(|| get(&map, "plc")).ok_or_else(|| {
            PlcError::BadParam("missing required 'cpu'/'plc' attribute".into())
        })?;
        let family: PlcFamily = cpu_str.parse()?;

        let name = get(&map, "name")
            .ok_or_else(|| PlcError::BadParam("missing required 'name' attribute".into()))?
            .to_string();

        let elem_type = get(&map, "elem_type").map(|s| s.parse()).transpose()?;
        let elem_size = match get(&map, "elem_size") {
            Some(s) => Some(s.parse().map_err(|_| PlcError::BadParam(format!("bad elem_size '{s}'")))?),
            None => elem_type.and_then(ElemType::default_elem_size),
        };
        let elem_count = match get(&map, "elem_count") {
            Some(s) => s.parse().map_err(|_| PlcError::BadParam(format!("bad elem_count '{s}'")))?,
            None => 1,
        };
        let elem_count = if family == PlcFamily::OmronNjNx && elem_count != 1 {
            tracing::warn!(
                requested = elem_count,
                "Omron NJ/NX tags only support elem_count=1; clamping"
            );
            1
        } else {
            elem_count
        };

        let read_cache_ms = match get(&map, "read_cache_ms") {
            Some(s) => s.parse().map_err(|_| PlcError::BadParam(format!("bad read_cache_ms '{s}'")))?,
            None => 0,
        };
        let share_session = get(&map, "share_session").map(parse_bool_flag).unwrap_or(true);
        let use_connected_msg = get(&map, "use_connected_msg").map(parse_bool_flag);
        let allow_packing = get(&map, "allow_packing")
            .map(parse_bool_flag)
            .unwrap_or_else(|| family.default_allow_packing());
        let debug = match get(&map, "debug") {
            Some(s) => s.parse().unwrap_or(0),
            None => 0,
        };

        Ok(Self {
            gateway,
            gateway_port,
            path,
            family,
            name,
            elem_size,
            elem_count,
            elem_type,
            read_cache_ms,
            share_session,
            use_connected_msg,
            allow_packing,
            debug,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_key_value_pairs() {
        let map = parse("protocol=ab_eip&gateway=10.1.2.3&cpu=lgx");
        assert_eq!(map.get("gateway").unwrap(), "10.1.2.3");
        assert_eq!(map.get("cpu").unwrap(), "lgx");
    }

    #[test]
    fn tag_config_defaults_port_and_elem_count() {
        let cfg = TagConfig::from_attr_string(
            "protocol=ab_eip&gateway=10.1.2.3&cpu=lgx&name=MyTag&elem_size=4",
        )
        .unwrap();
        assert_eq!(cfg.gateway_port, 44818);
        assert_eq!(cfg.elem_count, 1);
        assert_eq!(cfg.elem_size, Some(4));
    }

    #[test]
    fn elem_type_supplies_default_size() {
        let cfg = TagConfig::from_attr_string(
            "protocol=ab_eip&gateway=10.1.2.3&cpu=lgx&name=MyTag&elem_type=dint",
        )
        .unwrap();
        assert_eq!(cfg.elem_size, Some(4));
    }

    #[test]
    fn missing_gateway_is_bad_param() {
        let err = TagConfig::from_attr_string("protocol=ab_eip&cpu=lgx&name=x").unwrap_err();
        assert!(matches!(err, PlcError::BadParam(_)));
    }

    #[test]
    fn allow_packing_defaults_on_for_logix_off_for_plc5() {
        let lgx = TagConfig::from_attr_string(
            "protocol=ab_eip&gateway=10.1.2.3&cpu=lgx&name=MyTag&elem_size=4",
        )
        .unwrap();
        assert!(lgx.allow_packing);

        let plc5 = TagConfig::from_attr_string(
            "protocol=ab_eip&gateway=10.1.2.3&cpu=plc5&name=N7:0",
        )
        .unwrap();
        assert!(!plc5.allow_packing);
    }

    #[test]
    fn omron_elem_count_is_clamped_to_one() {
        let cfg = TagConfig::from_attr_string(
            "protocol=ab_eip&gateway=10.1.2.3&cpu=omron-njnx&name=MyTag&elem_size=4&elem_count=10",
        )
        .unwrap();
        assert_eq!(cfg.elem_count, 1);
    }

    #[test]
    fn rejects_other_protocols() {
        let err =
            TagConfig::from_attr_string("protocol=modbus_tcp&gateway=x&cpu=lgx&name=x").unwrap_err();
        assert!(matches!(err, PlcError::Unsupported(_)));
    }
}
