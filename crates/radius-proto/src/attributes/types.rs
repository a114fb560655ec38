/// Well-known RADIUS attribute numbers the engine refers to directly.
///
/// Everything else is looked up through the [`Dictionary`](crate::Dictionary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AttributeType {
    /// User-Name (1) - RFC 2865
    UserName = 1,
    /// User-Password (2) - RFC 2865
    UserPassword = 2,
    /// CHAP-Password (3) - RFC 2865
    ChapPassword = 3,
    /// NAS-IP-Address (4) - RFC 2865
    NasIpAddress = 4,
    /// NAS-Port (5) - RFC 2865
    NasPort = 5,
    /// Service-Type (6) - RFC 2865
    ServiceType = 6,
    /// Reply-Message (18) - RFC 2865
    ReplyMessage = 18,
    /// State (24) - RFC 2865
    State = 24,
    /// Class (25) - RFC 2865
    Class = 25,
    /// Vendor-Specific (26) - RFC 2865
    VendorSpecific = 26,
    /// Session-Timeout (27) - RFC 2865
    SessionTimeout = 27,
    /// Calling-Station-Id (31) - RFC 2865
    CallingStationId = 31,
    /// NAS-Identifier (32) - RFC 2865
    NasIdentifier = 32,
    /// Proxy-State (33) - RFC 2865
    ProxyState = 33,
    /// Acct-Status-Type (40) - RFC 2866
    AcctStatusType = 40,
    /// Acct-Session-Id (44) - RFC 2866
    AcctSessionId = 44,
    /// CHAP-Challenge (60) - RFC 2865
    ChapChallenge = 60,
    /// EAP-Message (79) - RFC 3579
    EapMessage = 79,
    /// Message-Authenticator (80) - RFC 2869
    MessageAuthenticator = 80,
    /// Error-Cause (101) - RFC 5176
    ErrorCause = 101,
    /// Extended-Attribute-1 (241) - RFC 6929
    ExtendedAttribute1 = 241,
}

impl AttributeType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(AttributeType::UserName),
            2 => Some(AttributeType::UserPassword),
            3 => Some(AttributeType::ChapPassword),
            4 => Some(AttributeType::NasIpAddress),
            5 => Some(AttributeType::NasPort),
            6 => Some(AttributeType::ServiceType),
            18 => Some(AttributeType::ReplyMessage),
            24 => Some(AttributeType::State),
            25 => Some(AttributeType::Class),
            26 => Some(AttributeType::VendorSpecific),
            27 => Some(AttributeType::SessionTimeout),
            31 => Some(AttributeType::CallingStationId),
            32 => Some(AttributeType::NasIdentifier),
            33 => Some(AttributeType::ProxyState),
            40 => Some(AttributeType::AcctStatusType),
            44 => Some(AttributeType::AcctSessionId),
            60 => Some(AttributeType::ChapChallenge),
            79 => Some(AttributeType::EapMessage),
            80 => Some(AttributeType::MessageAuthenticator),
            101 => Some(AttributeType::ErrorCause),
            241 => Some(AttributeType::ExtendedAttribute1),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Extended-Attribute-1 sub-type carrying Original-Packet-Code (RFC 7930 Section 4).
pub const ORIGINAL_PACKET_CODE: u8 = 4;

/// Error-Cause value "Invalid-Request" (RFC 5176 Section 3.6).
pub const ERROR_CAUSE_INVALID_REQUEST: u32 = 404;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for value in 0..=u8::MAX {
            if let Some(attr) = AttributeType::from_u8(value) {
                assert_eq!(attr.as_u8(), value);
            }
        }
        assert_eq!(AttributeType::from_u8(17), None);
    }
}
