use super::AttributeType;
use crate::packet::PacketError;

/// RADIUS Attribute structure as defined in RFC 2865 Section 5
///
/// ```text
///  0                   1                   2
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     Type      |    Length     |  Value ...
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Values are kept as raw octets. Typed interpretation lives in the
/// dictionary; the accessors here only cover the shapes the engine itself
/// reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute type (1 byte)
    pub attr_type: u8,
    /// Attribute value (0-253 bytes)
    pub value: Vec<u8>,
}

impl Attribute {
    /// Minimum attribute length (type + length fields = 2 bytes)
    pub const MIN_LENGTH: usize = 2;
    /// Maximum attribute length (255 bytes including type and length)
    pub const MAX_LENGTH: usize = 255;
    /// Maximum value length (253 bytes)
    pub const MAX_VALUE_LENGTH: usize = 253;

    pub fn new(attr_type: u8, value: Vec<u8>) -> Result<Self, PacketError> {
        if value.len() > Self::MAX_VALUE_LENGTH {
            return Err(PacketError::AttributeError(format!(
                "value of attribute {} is {} bytes (max {})",
                attr_type,
                value.len(),
                Self::MAX_VALUE_LENGTH
            )));
        }
        Ok(Attribute { attr_type, value })
    }

    /// Create a string attribute
    pub fn string(attr_type: u8, value: impl Into<String>) -> Result<Self, PacketError> {
        Self::new(attr_type, value.into().into_bytes())
    }

    /// Create an integer attribute (32-bit big-endian)
    pub fn integer(attr_type: u8, value: u32) -> Result<Self, PacketError> {
        Self::new(attr_type, value.to_be_bytes().to_vec())
    }

    /// Create an IP address attribute
    pub fn ipv4(attr_type: u8, value: [u8; 4]) -> Result<Self, PacketError> {
        Self::new(attr_type, value.to_vec())
    }

    /// Create an Extended-Attribute-1 (RFC 6929) carrying `ext_type`.
    pub fn extended(ext_type: u8, value: &[u8]) -> Result<Self, PacketError> {
        let mut body = Vec::with_capacity(value.len() + 1);
        body.push(ext_type);
        body.extend_from_slice(value);
        Self::new(AttributeType::ExtendedAttribute1.as_u8(), body)
    }

    /// Message-Authenticator placeholder. The signer fills in the digest.
    pub fn message_authenticator() -> Self {
        Attribute {
            attr_type: AttributeType::MessageAuthenticator.as_u8(),
            value: vec![0u8; 16],
        }
    }

    pub fn is(&self, attr_type: AttributeType) -> bool {
        self.attr_type == attr_type.as_u8()
    }

    /// Write type, length and value into `out`, returning the bytes written.
    ///
    /// Message-Authenticator is always written as sixteen zero octets.
    pub(crate) fn write_into(&self, out: &mut [u8]) -> Result<usize, PacketError> {
        let length = self.encoded_length();
        if length > Self::MAX_LENGTH {
            return Err(PacketError::AttributeError(format!(
                "encoded attribute {} is {} bytes",
                self.attr_type, length
            )));
        }
        if out.len() < length {
            return Err(PacketError::PacketTooLarge(length));
        }

        out[0] = self.attr_type;
        out[1] = length as u8;
        if self.is(AttributeType::MessageAuthenticator) {
            out[2..length].fill(0);
        } else {
            out[2..length].copy_from_slice(&self.value);
        }
        Ok(length)
    }

    /// Get the encoded length of this attribute
    pub fn encoded_length(&self) -> usize {
        if self.is(AttributeType::MessageAuthenticator) {
            return Self::MIN_LENGTH + 16;
        }
        Self::MIN_LENGTH + self.value.len()
    }

    /// Try to interpret value as a string
    pub fn as_string(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.value.clone())
    }

    /// Try to interpret value as an integer (32-bit big-endian)
    pub fn as_integer(&self) -> Result<u32, PacketError> {
        let bytes: [u8; 4] = self.value.as_slice().try_into().map_err(|_| {
            PacketError::AttributeError(format!(
                "expected 4 bytes for integer, got {}",
                self.value.len()
            ))
        })?;
        Ok(u32::from_be_bytes(bytes))
    }

    /// Try to interpret value as an IPv4 address
    pub fn as_ipv4(&self) -> Result<[u8; 4], PacketError> {
        self.value.as_slice().try_into().map_err(|_| {
            PacketError::AttributeError(format!(
                "expected 4 bytes for IPv4, got {}",
                self.value.len()
            ))
        })
    }

    /// Vendor id of a Vendor-Specific attribute.
    pub fn vendor_id(&self) -> Option<u32> {
        if !self.is(AttributeType::VendorSpecific) || self.value.len() < 4 {
            return None;
        }
        Some(u32::from_be_bytes([
            self.value[0],
            self.value[1],
            self.value[2],
            self.value[3],
        ]))
    }

    /// Extended type and payload of an Extended-Attribute-1.
    pub fn extended_value(&self) -> Option<(u8, &[u8])> {
        if !self.is(AttributeType::ExtendedAttribute1) {
            return None;
        }
        let (ext_type, rest) = self.value.split_first()?;
        Some((*ext_type, rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_attribute() {
        let attr = Attribute::string(1, "testuser").unwrap();
        assert_eq!(attr.attr_type, 1);
        assert_eq!(attr.as_string().unwrap(), "testuser");
    }

    #[test]
    fn test_integer_attribute() {
        let attr = Attribute::integer(6, 1234).unwrap();
        assert_eq!(attr.as_integer().unwrap(), 1234);
        assert!(Attribute::string(6, "abc").unwrap().as_integer().is_err());
    }

    #[test]
    fn test_max_value_length() {
        assert!(Attribute::new(1, vec![0u8; 253]).is_ok());
        assert!(Attribute::new(1, vec![0u8; 254]).is_err());
    }

    #[test]
    fn test_write_into() {
        let attr = Attribute::string(1, "bob").unwrap();
        let mut out = [0xffu8; 8];
        assert_eq!(attr.write_into(&mut out).unwrap(), 5);
        assert_eq!(&out[..5], &[1, 5, b'b', b'o', b'b']);

        let mut tiny = [0u8; 3];
        assert!(attr.write_into(&mut tiny).is_err());
    }

    #[test]
    fn test_message_authenticator_written_as_zeros() {
        let mut attr = Attribute::message_authenticator();
        attr.value = vec![0xaa; 16];
        let mut out = [0xffu8; 18];
        assert_eq!(attr.write_into(&mut out).unwrap(), 18);
        assert_eq!(out[1], 18);
        assert!(out[2..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_vendor_and_extended() {
        let vsa = Attribute::new(26, vec![0, 0, 0x01, 0x37, 1, 3, 7]).unwrap();
        assert_eq!(vsa.vendor_id(), Some(311));

        let ext = Attribute::extended(4, &[0, 0, 0, 1]).unwrap();
        assert_eq!(ext.attr_type, 241);
        assert_eq!(ext.extended_value(), Some((4, &[0u8, 0, 0, 1][..])));
        assert_eq!(vsa.extended_value(), None);
    }
}
