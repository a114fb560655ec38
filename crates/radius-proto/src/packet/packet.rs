use super::{Code, SocketInfo, VectorKind};
use crate::attributes::{Attribute, AttributeType};
use crate::validation::{check_structure, DecodeError, DecodeOptions, RawAttributes};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PacketError {
    #[error("Invalid packet code: {0}")]
    InvalidCode(u8),
    #[error("Malformed packet: {0}")]
    Malformed(#[from] DecodeError),
    #[error("Attribute error: {0}")]
    AttributeError(String),
    #[error("Packet too large: {0} bytes")]
    PacketTooLarge(usize),
    #[error("{0} needs the original request vector")]
    MissingOriginal(Code),
}

/// RADIUS Packet structure as defined in RFC 2865 Section 3
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     Code      |  Identifier   |            Length             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// |                         Authenticator                         |
/// |                                                               |
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  Attributes ...
/// +-+-+-+-+-+-+-+-+-+-+-+-+-
/// ```
///
/// Once a packet has wire bytes (received, or produced by [`Packet::encode`])
/// those bytes are left alone until [`Packet::invalidate`] is called.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Packet type (1 byte)
    pub code: Code,
    /// Packet identifier for matching requests/responses (1 byte)
    pub identifier: u8,
    /// Request or Response Authenticator (16 bytes)
    pub authenticator: [u8; 16],
    /// Attributes in wire order
    pub attributes: Vec<Attribute>,
    /// Where the packet came from or is going to
    pub socket: SocketInfo,
    data: Option<Vec<u8>>,
}

impl Packet {
    /// Minimum RADIUS packet size (20 bytes: 1 code + 1 id + 2 length + 16 authenticator)
    pub const MIN_PACKET_SIZE: usize = 20;
    /// Maximum RADIUS packet size (4096 bytes as per RFC 2865)
    pub const MAX_PACKET_SIZE: usize = 4096;

    pub fn new(code: Code, identifier: u8, authenticator: [u8; 16]) -> Self {
        Packet {
            code,
            identifier,
            authenticator,
            attributes: Vec::new(),
            socket: SocketInfo::synthetic(),
            data: None,
        }
    }

    pub fn add_attribute(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    /// Wire bytes, if the packet has been received or encoded.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    pub(crate) fn data_mut(&mut self) -> Option<&mut [u8]> {
        self.data.as_deref_mut()
    }

    /// Drop cached wire bytes so the next send re-encodes.
    pub fn invalidate(&mut self) {
        self.data = None;
    }

    /// Encode into a fresh buffer.
    ///
    /// The vector slot holds the packet's own authenticator for
    /// Access-Request and Status-Server, zeros for the other requests and
    /// `original` for responses. Message-Authenticator values are zeroed.
    pub fn to_bytes(&self, original: Option<&[u8; 16]>) -> Result<Vec<u8>, PacketError> {
        let mut scratch = [0u8; Self::MAX_PACKET_SIZE];
        let len = self.write_into(&mut scratch, original)?;
        Ok(scratch[..len].to_vec())
    }

    /// Encode and keep the bytes as the packet's wire image.
    pub fn encode(&mut self, original: Option<&[u8; 16]>) -> Result<&[u8], PacketError> {
        let bytes = self.to_bytes(original)?;
        Ok(self.data.insert(bytes).as_slice())
    }

    fn write_into(
        &self,
        out: &mut [u8; Self::MAX_PACKET_SIZE],
        original: Option<&[u8; 16]>,
    ) -> Result<usize, PacketError> {
        let vector = match self.code.vector_kind() {
            None => return Err(PacketError::InvalidCode(self.code.as_u8())),
            Some(VectorKind::Random) => self.authenticator,
            Some(VectorKind::Zero) => [0u8; 16],
            Some(VectorKind::Original) => {
                *original.ok_or(PacketError::MissingOriginal(self.code))?
            }
        };

        let total = self.length();
        if total > Self::MAX_PACKET_SIZE {
            return Err(PacketError::PacketTooLarge(total));
        }

        out[0] = self.code.as_u8();
        out[1] = self.identifier;
        out[2..4].copy_from_slice(&(total as u16).to_be_bytes());
        out[4..20].copy_from_slice(&vector);

        let mut offset = Self::MIN_PACKET_SIZE;
        for attr in &self.attributes {
            offset += attr.write_into(&mut out[offset..total])?;
        }
        Ok(offset)
    }

    /// Decode packet from bytes
    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        Self::decode_with(data, &DecodeOptions::default())
    }

    /// Decode with explicit structural options.
    pub fn decode_with(data: &[u8], options: &DecodeOptions) -> Result<Self, PacketError> {
        Self::from_wire(data.to_vec(), SocketInfo::synthetic(), options)
    }

    /// Take ownership of a received frame.
    ///
    /// Structural validation runs before anything is parsed, so a malformed
    /// frame never gets an attribute list.
    pub fn from_wire(
        data: Vec<u8>,
        socket: SocketInfo,
        options: &DecodeOptions,
    ) -> Result<Self, PacketError> {
        check_structure(&data, options)?;

        let code = Code::from_u8(data[0]).ok_or(PacketError::InvalidCode(data[0]))?;
        let mut authenticator = [0u8; 16];
        authenticator.copy_from_slice(&data[4..20]);

        let attributes = RawAttributes::new(&data)
            .map(|raw| Attribute {
                attr_type: raw.attr_type,
                value: raw.value.to_vec(),
            })
            .collect();

        Ok(Packet {
            code,
            identifier: data[1],
            authenticator,
            attributes,
            socket,
            data: Some(data),
        })
    }

    /// Get the length of the encoded packet
    pub fn length(&self) -> usize {
        Self::MIN_PACKET_SIZE
            + self
                .attributes
                .iter()
                .map(Attribute::encoded_length)
                .sum::<usize>()
    }

    /// Find first attribute by type
    pub fn find_attribute(&self, attr_type: u8) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.attr_type == attr_type)
    }

    /// Find all attributes by type
    pub fn find_all_attributes(&self, attr_type: u8) -> Vec<&Attribute> {
        self.attributes
            .iter()
            .filter(|a| a.attr_type == attr_type)
            .collect()
    }

    /// Remove every attribute of a type, invalidating the wire image.
    pub fn remove_attributes(&mut self, attr_type: u8) {
        self.attributes.retain(|a| a.attr_type != attr_type);
        self.invalidate();
    }

    pub fn has_message_authenticator(&self) -> bool {
        self.find_attribute(AttributeType::MessageAuthenticator.as_u8())
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_encode_decode() {
        let mut packet = Packet::new(Code::AccessRequest, 42, [1u8; 16]);
        packet.add_attribute(Attribute::string(1, "alice").unwrap());
        let encoded = packet.encode(None).unwrap().to_vec();
        let decoded = Packet::decode(&encoded).unwrap();

        assert_eq!(decoded.code, Code::AccessRequest);
        assert_eq!(decoded.identifier, 42);
        assert_eq!(decoded.authenticator, [1u8; 16]);
        assert_eq!(decoded.attributes, packet.attributes);
        assert_eq!(decoded.data(), Some(encoded.as_slice()));
    }

    #[test]
    fn test_packet_min_size() {
        let data = vec![0u8; 19];
        assert!(Packet::decode(&data).is_err());
    }

    #[test]
    fn test_vector_slot_contents() {
        let acct = Packet::new(Code::AccountingRequest, 1, [7u8; 16]);
        assert_eq!(&acct.to_bytes(None).unwrap()[4..20], &[0u8; 16]);

        let reply = Packet::new(Code::AccessAccept, 1, [7u8; 16]);
        assert!(matches!(
            reply.to_bytes(None),
            Err(PacketError::MissingOriginal(Code::AccessAccept))
        ));
        assert_eq!(&reply.to_bytes(Some(&[9u8; 16])).unwrap()[4..20], &[9u8; 16]);
    }

    #[test]
    fn test_pseudo_code_is_not_encodable() {
        let packet = Packet::new(Code::DoNotRespond, 1, [0u8; 16]);
        assert!(matches!(packet.to_bytes(None), Err(PacketError::InvalidCode(0))));
    }

    #[test]
    fn test_oversize() {
        let mut packet = Packet::new(Code::AccessRequest, 1, [0u8; 16]);
        for _ in 0..17 {
            packet.add_attribute(Attribute::new(18, vec![b'x'; 253]).unwrap());
        }
        assert_eq!(packet.length(), 20 + 17 * 255);
        assert!(matches!(
            packet.to_bytes(None),
            Err(PacketError::PacketTooLarge(4355))
        ));
    }

    #[test]
    fn test_remove_attributes_invalidates() {
        let mut packet = Packet::new(Code::AccessRequest, 1, [0u8; 16]);
        packet.add_attribute(Attribute::new(33, vec![1]).unwrap());
        packet.encode(None).unwrap();
        packet.remove_attributes(33);
        assert!(packet.data().is_none());
        assert!(packet.attributes.is_empty());
    }
}
