//! Attribute dictionary
//!
//! A read-only context mapping attribute names to numbers, data types and
//! enumerated values. It is built once at startup (including any values
//! defined while a virtual server is being set up) and then shared by
//! reference; nothing mutates it afterwards.

use crate::attributes::Attribute;
use crate::packet::PacketError;
use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;
use thiserror::Error;

/// Name of the internal attribute selecting an `authenticate` section.
pub const AUTH_TYPE: &str = "Auth-Type";
/// `Auth-Type = Accept`: skip authentication and accept.
pub const AUTH_TYPE_ACCEPT: u32 = 254;
/// `Auth-Type = Reject`: skip authentication and reject.
pub const AUTH_TYPE_REJECT: u32 = 4;

#[derive(Error, Debug)]
pub enum DictionaryError {
    #[error("unknown attribute {0}")]
    UnknownAttribute(String),
    #[error("attribute {0} is internal and has no wire form")]
    Internal(String),
    #[error("invalid value {value:?} for {attribute}")]
    InvalidValue { attribute: String, value: String },
    #[error("value {value} of {attribute} is already named {existing}")]
    Conflict {
        attribute: String,
        value: u32,
        existing: String,
    },
    #[error(transparent)]
    Packet(#[from] PacketError),
}

/// Data type of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    String,
    Octets,
    Integer,
    IpAddr,
    Vsa,
    Extended,
}

/// One attribute definition.
#[derive(Debug, Clone)]
pub struct AttributeDef {
    pub name: String,
    /// Wire number, or `None` for internal (control) attributes
    pub number: Option<u8>,
    pub data_type: DataType,
}

/// Enumerated values of one attribute.
#[derive(Debug, Clone, Default)]
pub struct ValueMap {
    by_name: BTreeMap<String, u32>,
    by_value: BTreeMap<u32, String>,
}

impl ValueMap {
    pub fn name_of(&self, value: u32) -> Option<&str> {
        self.by_value.get(&value).map(String::as_str)
    }

    pub fn value_of(&self, name: &str) -> Option<u32> {
        self.by_name
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    attributes: Vec<AttributeDef>,
    by_number: HashMap<u8, usize>,
    by_name: HashMap<String, usize>,
    values: HashMap<String, ValueMap>,
}

const STANDARD: &[(&str, u8, DataType)] = &[
    ("User-Name", 1, DataType::String),
    ("User-Password", 2, DataType::Octets),
    ("CHAP-Password", 3, DataType::Octets),
    ("NAS-IP-Address", 4, DataType::IpAddr),
    ("NAS-Port", 5, DataType::Integer),
    ("Service-Type", 6, DataType::Integer),
    ("Framed-Protocol", 7, DataType::Integer),
    ("Framed-IP-Address", 8, DataType::IpAddr),
    ("Filter-Id", 11, DataType::String),
    ("Framed-MTU", 12, DataType::Integer),
    ("Reply-Message", 18, DataType::String),
    ("State", 24, DataType::Octets),
    ("Class", 25, DataType::Octets),
    ("Vendor-Specific", 26, DataType::Vsa),
    ("Session-Timeout", 27, DataType::Integer),
    ("Idle-Timeout", 28, DataType::Integer),
    ("Called-Station-Id", 30, DataType::String),
    ("Calling-Station-Id", 31, DataType::String),
    ("NAS-Identifier", 32, DataType::String),
    ("Proxy-State", 33, DataType::Octets),
    ("Acct-Status-Type", 40, DataType::Integer),
    ("Acct-Delay-Time", 41, DataType::Integer),
    ("Acct-Input-Octets", 42, DataType::Integer),
    ("Acct-Output-Octets", 43, DataType::Integer),
    ("Acct-Session-Id", 44, DataType::String),
    ("Acct-Session-Time", 46, DataType::Integer),
    ("Acct-Terminate-Cause", 49, DataType::Integer),
    ("CHAP-Challenge", 60, DataType::Octets),
    ("NAS-Port-Type", 61, DataType::Integer),
    ("EAP-Message", 79, DataType::Octets),
    ("Message-Authenticator", 80, DataType::Octets),
    ("Error-Cause", 101, DataType::Integer),
    ("Extended-Attribute-1", 241, DataType::Extended),
];

const SERVICE_TYPES: &[(&str, u32)] = &[
    ("Login-User", 1),
    ("Framed-User", 2),
    ("Callback-Login-User", 3),
    ("Callback-Framed-User", 4),
    ("Outbound-User", 5),
    ("Administrative-User", 6),
    ("NAS-Prompt-User", 7),
    ("Authenticate-Only", 8),
    ("Callback-NAS-Prompt", 9),
    ("Call-Check", 10),
    ("Callback-Administrative", 11),
    ("Authorize-Only", 17),
];

const ACCT_STATUS_TYPES: &[(&str, u32)] = &[
    ("Start", 1),
    ("Stop", 2),
    ("Interim-Update", 3),
    ("Accounting-On", 7),
    ("Accounting-Off", 8),
];

const ERROR_CAUSES: &[(&str, u32)] = &[
    ("Residual-Context-Removed", 201),
    ("Invalid-EAP-Packet", 202),
    ("Unsupported-Attribute", 401),
    ("Missing-Attribute", 402),
    ("NAS-Identification-Mismatch", 403),
    ("Invalid-Request", 404),
    ("Unsupported-Service", 405),
    ("Unsupported-Extension", 406),
    ("Invalid-Attribute-Value", 407),
    ("Administratively-Prohibited", 501),
    ("Request-Not-Routable", 502),
    ("Session-Context-Not-Found", 503),
    ("Session-Context-Not-Removable", 504),
    ("Other-Proxy-Processing-Error", 505),
    ("Resources-Unavailable", 506),
    ("Request-Initiated", 507),
];

impl Dictionary {
    /// The RFC 2865/2866/5176 attributes and values the engine works with.
    pub fn standard() -> Self {
        let mut dict = Dictionary::default();
        for (name, number, data_type) in STANDARD {
            dict.add_attribute(name, Some(*number), *data_type);
        }
        dict.add_attribute(AUTH_TYPE, None, DataType::Integer);

        let builtin: [(&str, &[(&str, u32)]); 4] = [
            ("Service-Type", SERVICE_TYPES),
            ("Acct-Status-Type", ACCT_STATUS_TYPES),
            ("Error-Cause", ERROR_CAUSES),
            (AUTH_TYPE, &[("Reject", AUTH_TYPE_REJECT), ("Accept", AUTH_TYPE_ACCEPT)]),
        ];
        for (attribute, values) in builtin {
            let map = dict.values.entry(attribute.to_string()).or_default();
            for (name, value) in values {
                map.by_name.insert((*name).to_string(), *value);
                map.by_value.insert(*value, (*name).to_string());
            }
        }
        dict
    }

    fn add_attribute(&mut self, name: &str, number: Option<u8>, data_type: DataType) {
        let index = self.attributes.len();
        self.attributes.push(AttributeDef {
            name: name.to_string(),
            number,
            data_type,
        });
        if let Some(number) = number {
            self.by_number.insert(number, index);
        }
        self.by_name.insert(name.to_ascii_lowercase(), index);
    }

    pub fn attribute(&self, number: u8) -> Option<&AttributeDef> {
        self.by_number.get(&number).map(|i| &self.attributes[*i])
    }

    pub fn attribute_by_name(&self, name: &str) -> Option<&AttributeDef> {
        self.by_name
            .get(&name.to_ascii_lowercase())
            .map(|i| &self.attributes[*i])
    }

    pub fn values(&self, attribute: &str) -> Option<&ValueMap> {
        self.values.get(attribute)
    }

    /// Name of an enumerated value, e.g. `("Acct-Status-Type", 1)` gives `"Start"`.
    pub fn value_name(&self, attribute: &str, value: u32) -> Option<&str> {
        self.values(attribute)?.name_of(value)
    }

    pub fn value_of(&self, attribute: &str, name: &str) -> Option<u32> {
        self.values(attribute)?.value_of(name)
    }

    /// Define an enumerated value, allocating a number when none is given.
    ///
    /// Defining an existing name again returns its number. Used while
    /// building a virtual server, before the dictionary is shared.
    pub fn define_value(
        &mut self,
        attribute: &str,
        name: &str,
        value: Option<u32>,
    ) -> Result<u32, DictionaryError> {
        if self.attribute_by_name(attribute).is_none() {
            return Err(DictionaryError::UnknownAttribute(attribute.to_string()));
        }
        let map = self.values.entry(attribute.to_string()).or_default();
        if let Some(existing) = map.value_of(name) {
            return Ok(existing);
        }

        let value = match value {
            Some(value) => value,
            None => (1u32..)
                .find(|candidate| !map.by_value.contains_key(candidate))
                .unwrap_or_default(),
        };
        if let Some(existing) = map.by_value.get(&value) {
            return Err(DictionaryError::Conflict {
                attribute: attribute.to_string(),
                value,
                existing: existing.clone(),
            });
        }

        map.by_name.insert(name.to_string(), value);
        map.by_value.insert(value, name.to_string());
        Ok(value)
    }

    /// Build a wire attribute from its name and a textual value.
    ///
    /// Integers accept a number or an enumerated name; octets accept a
    /// `0x` hex string or plain text.
    pub fn make_attribute(&self, name: &str, value: &str) -> Result<Attribute, DictionaryError> {
        let def = self
            .attribute_by_name(name)
            .ok_or_else(|| DictionaryError::UnknownAttribute(name.to_string()))?;
        let number = def
            .number
            .ok_or_else(|| DictionaryError::Internal(def.name.clone()))?;
        let invalid = || DictionaryError::InvalidValue {
            attribute: def.name.clone(),
            value: value.to_string(),
        };

        let attribute = match def.data_type {
            DataType::String => Attribute::string(number, value)?,
            DataType::Integer => {
                let parsed = value
                    .parse::<u32>()
                    .ok()
                    .or_else(|| self.value_of(&def.name, value))
                    .ok_or_else(invalid)?;
                Attribute::integer(number, parsed)?
            }
            DataType::IpAddr => {
                let addr: Ipv4Addr = value.parse().map_err(|_| invalid())?;
                Attribute::ipv4(number, addr.octets())?
            }
            DataType::Octets | DataType::Vsa | DataType::Extended => {
                let bytes = match value.strip_prefix("0x") {
                    Some(hex) => decode_hex(hex).ok_or_else(invalid)?,
                    None => value.as_bytes().to_vec(),
                };
                Attribute::new(number, bytes)?
            }
        };
        Ok(attribute)
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_lookups() {
        let dict = Dictionary::standard();
        assert_eq!(dict.attribute(1).unwrap().name, "User-Name");
        assert_eq!(dict.attribute_by_name("proxy-state").unwrap().number, Some(33));
        assert_eq!(dict.value_name("Acct-Status-Type", 3), Some("Interim-Update"));
        assert_eq!(dict.value_of("Service-Type", "framed-user"), Some(2));
        assert_eq!(dict.value_name(AUTH_TYPE, AUTH_TYPE_ACCEPT), Some("Accept"));
        assert!(dict.attribute_by_name(AUTH_TYPE).unwrap().number.is_none());
    }

    #[test]
    fn test_define_value() {
        let mut dict = Dictionary::standard();
        let pap = dict.define_value(AUTH_TYPE, "pap", None).unwrap();
        assert_eq!(dict.define_value(AUTH_TYPE, "pap", None).unwrap(), pap);
        assert_ne!(pap, AUTH_TYPE_REJECT);
        assert_eq!(dict.value_name(AUTH_TYPE, pap), Some("pap"));

        assert!(matches!(
            dict.define_value(AUTH_TYPE, "other", Some(AUTH_TYPE_ACCEPT)),
            Err(DictionaryError::Conflict { .. })
        ));
        assert!(matches!(
            dict.define_value("No-Such-Attribute", "x", None),
            Err(DictionaryError::UnknownAttribute(_))
        ));
    }

    #[test]
    fn test_make_attribute() {
        let dict = Dictionary::standard();
        assert_eq!(
            dict.make_attribute("Acct-Status-Type", "Stop").unwrap(),
            Attribute::integer(40, 2).unwrap()
        );
        assert_eq!(
            dict.make_attribute("Session-Timeout", "3600").unwrap(),
            Attribute::integer(27, 3600).unwrap()
        );
        assert_eq!(
            dict.make_attribute("NAS-IP-Address", "10.0.0.1").unwrap().value,
            vec![10, 0, 0, 1]
        );
        assert_eq!(dict.make_attribute("Class", "0x0aff").unwrap().value, vec![0x0a, 0xff]);
        assert!(matches!(
            dict.make_attribute("Service-Type", "Sometimes"),
            Err(DictionaryError::InvalidValue { .. })
        ));
        assert!(matches!(
            dict.make_attribute(AUTH_TYPE, "Accept"),
            Err(DictionaryError::Internal(_))
        ));
    }
}
