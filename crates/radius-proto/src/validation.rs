//! Structural validation of raw RADIUS packets
//!
//! Everything here works on the wire bytes, before any attribute is
//! allocated. A frame that fails [`check_structure`] must be dropped
//! without a reply.
//!
//! Checks, in order:
//!
//! - total length within [20, 4096]
//! - header length field equal to the number of bytes received
//! - known packet code
//! - every attribute header fits and advertises a length of at least 2
//! - attributes tile the packet exactly
//! - optional cap on the number of attributes
//! - Message-Authenticator, when present, is exactly 18 bytes
//! - EAP-Message is always accompanied by a Message-Authenticator (RFC 3579)
//! - optionally, a Message-Authenticator must be present

use crate::attributes::AttributeType;
use crate::packet::{Code, Packet};
use thiserror::Error;

/// Malformed packet taxonomy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("packet too short: {0} bytes")]
    TooShort(usize),
    #[error("packet too long: {0} bytes")]
    TooLong(usize),
    #[error("header length {declared} does not match received length {received}")]
    LengthMismatch { declared: usize, received: usize },
    #[error("unknown packet code {0}")]
    UnknownCode(u8),
    #[error("attribute header at offset {0} overflows the packet")]
    HeaderOverflow(usize),
    #[error("attribute at offset {offset} has invalid length {length}")]
    AttributeTooShort { offset: usize, length: usize },
    #[error("attribute at offset {offset} with length {length} overflows the packet")]
    AttributeOverflow { offset: usize, length: usize },
    #[error("too many attributes (max {0})")]
    TooManyAttributes(usize),
    #[error("Message-Authenticator has invalid length {0}")]
    InvalidMessageAuthenticator(usize),
    #[error("EAP-Message present without Message-Authenticator")]
    EapWithoutMessageAuthenticator,
    #[error("Message-Authenticator required but missing")]
    MissingMessageAuthenticator,
}

/// Knobs for [`check_structure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeOptions {
    /// Maximum number of attributes. Zero means unlimited.
    pub max_attributes: usize,
    /// Reject packets without a Message-Authenticator.
    pub require_message_authenticator: bool,
}

/// One attribute as it sits in the wire buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawAttribute<'a> {
    /// Offset of the type byte from the start of the packet
    pub offset: usize,
    pub attr_type: u8,
    pub value: &'a [u8],
}

/// Iterator over the attributes of a raw packet.
///
/// Stops at the first attribute whose header is truncated, whose length is
/// below 2, or which runs past the end of the buffer. It never panics, so it
/// is safe on unvalidated input.
#[derive(Debug, Clone)]
pub struct RawAttributes<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> RawAttributes<'a> {
    /// Walk the attributes of `data`, bounded by the buffer length.
    pub fn new(data: &'a [u8]) -> Self {
        RawAttributes {
            data,
            offset: Packet::MIN_PACKET_SIZE,
        }
    }
}

impl<'a> Iterator for RawAttributes<'a> {
    type Item = RawAttribute<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.offset;
        let header = self.data.get(offset..offset + 2)?;
        let length = header[1] as usize;
        if length < 2 {
            return None;
        }
        let value = self.data.get(offset + 2..offset + length)?;
        self.offset = offset + length;
        Some(RawAttribute {
            offset,
            attr_type: header[0],
            value,
        })
    }
}

/// Validate the structure of a received packet.
pub fn check_structure(data: &[u8], options: &DecodeOptions) -> Result<(), DecodeError> {
    if data.len() < Packet::MIN_PACKET_SIZE {
        return Err(DecodeError::TooShort(data.len()));
    }
    if data.len() > Packet::MAX_PACKET_SIZE {
        return Err(DecodeError::TooLong(data.len()));
    }

    let declared = u16::from_be_bytes([data[2], data[3]]) as usize;
    if declared != data.len() {
        return Err(DecodeError::LengthMismatch {
            declared,
            received: data.len(),
        });
    }

    Code::from_u8(data[0]).ok_or(DecodeError::UnknownCode(data[0]))?;

    let mut offset = Packet::MIN_PACKET_SIZE;
    let mut count = 0usize;
    let mut has_message_authenticator = false;
    let mut has_eap = false;

    while offset < data.len() {
        if offset + 2 > data.len() {
            return Err(DecodeError::HeaderOverflow(offset));
        }
        let attr_type = data[offset];
        let length = data[offset + 1] as usize;
        if length < 2 {
            return Err(DecodeError::AttributeTooShort { offset, length });
        }
        if offset + length > data.len() {
            return Err(DecodeError::AttributeOverflow { offset, length });
        }

        count += 1;
        if options.max_attributes > 0 && count > options.max_attributes {
            return Err(DecodeError::TooManyAttributes(options.max_attributes));
        }

        match AttributeType::from_u8(attr_type) {
            Some(AttributeType::MessageAuthenticator) => {
                if length != 18 {
                    return Err(DecodeError::InvalidMessageAuthenticator(length));
                }
                has_message_authenticator = true;
            }
            Some(AttributeType::EapMessage) => has_eap = true,
            _ => {}
        }

        offset += length;
    }

    if has_eap && !has_message_authenticator {
        return Err(DecodeError::EapWithoutMessageAuthenticator);
    }
    if options.require_message_authenticator && !has_message_authenticator {
        return Err(DecodeError::MissingMessageAuthenticator);
    }

    Ok(())
}
