use std::fmt;

/// RADIUS packet codes (RFC 2865 Section 4, RFC 2866, RFC 5176, RFC 5997, RFC 7930)
///
/// `DoNotRespond` is a processing pseudo-code. It never appears on the wire:
/// `from_u8` will not produce it and the encoder refuses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Code {
    /// Do-Not-Respond (internal only)
    DoNotRespond = 0,
    /// Access-Request (1)
    AccessRequest = 1,
    /// Access-Accept (2)
    AccessAccept = 2,
    /// Access-Reject (3)
    AccessReject = 3,
    /// Accounting-Request (4) - RFC 2866
    AccountingRequest = 4,
    /// Accounting-Response (5) - RFC 2866
    AccountingResponse = 5,
    /// Access-Challenge (11)
    AccessChallenge = 11,
    /// Status-Server (12) - RFC 5997
    StatusServer = 12,
    /// Status-Client (13) - RFC 5997
    StatusClient = 13,
    /// Disconnect-Request (40) - RFC 5176
    DisconnectRequest = 40,
    /// Disconnect-ACK (41) - RFC 5176
    DisconnectAck = 41,
    /// Disconnect-NAK (42) - RFC 5176
    DisconnectNak = 42,
    /// CoA-Request (43) - RFC 5176
    CoaRequest = 43,
    /// CoA-ACK (44) - RFC 5176
    CoaAck = 44,
    /// CoA-NAK (45) - RFC 5176
    CoaNak = 45,
    /// Protocol-Error (52) - RFC 7930
    ProtocolError = 52,
}

/// What occupies the authenticator slot while a packet is being signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorKind {
    /// The sender's random vector is the signature (Access-Request, Status-Server).
    Random,
    /// Sixteen zero octets (Accounting, CoA and Disconnect requests).
    Zero,
    /// The vector of the request being answered.
    Original,
}

impl Code {
    const WIRE: [Code; 15] = [
        Code::AccessRequest,
        Code::AccessAccept,
        Code::AccessReject,
        Code::AccountingRequest,
        Code::AccountingResponse,
        Code::AccessChallenge,
        Code::StatusServer,
        Code::StatusClient,
        Code::DisconnectRequest,
        Code::DisconnectAck,
        Code::DisconnectNak,
        Code::CoaRequest,
        Code::CoaAck,
        Code::CoaNak,
        Code::ProtocolError,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Code::AccessRequest),
            2 => Some(Code::AccessAccept),
            3 => Some(Code::AccessReject),
            4 => Some(Code::AccountingRequest),
            5 => Some(Code::AccountingResponse),
            11 => Some(Code::AccessChallenge),
            12 => Some(Code::StatusServer),
            13 => Some(Code::StatusClient),
            40 => Some(Code::DisconnectRequest),
            41 => Some(Code::DisconnectAck),
            42 => Some(Code::DisconnectNak),
            43 => Some(Code::CoaRequest),
            44 => Some(Code::CoaAck),
            45 => Some(Code::CoaNak),
            52 => Some(Code::ProtocolError),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Look a code up by its dictionary name, e.g. `"Access-Accept"`.
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case(Code::DoNotRespond.name()) {
            return Some(Code::DoNotRespond);
        }
        Self::WIRE
            .iter()
            .copied()
            .find(|code| code.name().eq_ignore_ascii_case(name))
    }

    pub fn name(self) -> &'static str {
        match self {
            Code::DoNotRespond => "Do-Not-Respond",
            Code::AccessRequest => "Access-Request",
            Code::AccessAccept => "Access-Accept",
            Code::AccessReject => "Access-Reject",
            Code::AccountingRequest => "Accounting-Request",
            Code::AccountingResponse => "Accounting-Response",
            Code::AccessChallenge => "Access-Challenge",
            Code::StatusServer => "Status-Server",
            Code::StatusClient => "Status-Client",
            Code::DisconnectRequest => "Disconnect-Request",
            Code::DisconnectAck => "Disconnect-ACK",
            Code::DisconnectNak => "Disconnect-NAK",
            Code::CoaRequest => "CoA-Request",
            Code::CoaAck => "CoA-ACK",
            Code::CoaNak => "CoA-NAK",
            Code::ProtocolError => "Protocol-Error",
        }
    }

    /// Signing rule for this code. `None` for the pseudo-code.
    pub fn vector_kind(self) -> Option<VectorKind> {
        match self {
            Code::DoNotRespond => None,
            Code::AccessRequest | Code::StatusServer => Some(VectorKind::Random),
            Code::AccountingRequest | Code::CoaRequest | Code::DisconnectRequest => {
                Some(VectorKind::Zero)
            }
            _ => Some(VectorKind::Original),
        }
    }

    /// True for codes a client sends to a server.
    pub fn is_request(self) -> bool {
        matches!(
            self,
            Code::AccessRequest
                | Code::AccountingRequest
                | Code::StatusServer
                | Code::StatusClient
                | Code::DisconnectRequest
                | Code::CoaRequest
        )
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pseudo_code_never_decoded() {
        assert_eq!(Code::from_u8(0), None);
        assert_eq!(Code::DoNotRespond.vector_kind(), None);
    }

    #[test]
    fn test_name_lookup() {
        for code in Code::WIRE {
            assert_eq!(Code::from_name(code.name()), Some(code));
            assert_eq!(Code::from_u8(code.as_u8()), Some(code));
        }
        assert_eq!(Code::from_name("coa-ack"), Some(Code::CoaAck));
        assert_eq!(Code::from_name("Do-Not-Respond"), Some(Code::DoNotRespond));
        assert_eq!(Code::from_name("Access-Maybe"), None);
    }

    #[test]
    fn test_vector_kinds() {
        assert_eq!(Code::AccessRequest.vector_kind(), Some(VectorKind::Random));
        assert_eq!(Code::StatusServer.vector_kind(), Some(VectorKind::Random));
        assert_eq!(Code::AccountingRequest.vector_kind(), Some(VectorKind::Zero));
        assert_eq!(Code::DisconnectRequest.vector_kind(), Some(VectorKind::Zero));
        assert_eq!(Code::AccessAccept.vector_kind(), Some(VectorKind::Original));
        assert_eq!(Code::ProtocolError.vector_kind(), Some(VectorKind::Original));
    }
}
