//! Message-Authenticator Support (RFC 2869)
//!
//! Message-Authenticator is HMAC-MD5 keyed with the shared secret, computed
//! over the whole packet with:
//! - the authenticator slot holding the vector the signing rule calls for
//!   (see [`VectorKind`](crate::packet::VectorKind))
//! - the Message-Authenticator value set to sixteen zero octets
//!
//! The digest is fed in slices, so no copy of the packet is made.

use crate::attributes::AttributeType;
use crate::validation::RawAttributes;
use hmac::{Hmac, Mac};
use md5_digest::Md5;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacMd5 = Hmac<Md5>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageAuthError {
    #[error("Message-Authenticator offset {0} is outside the packet")]
    OutOfBounds(usize),
    #[error("shared secret rejected by HMAC")]
    Key,
}

/// Offset of the Message-Authenticator value (after type and length).
///
/// Only an attribute with a 16-byte value counts.
pub fn find_message_authenticator(packet_bytes: &[u8]) -> Option<usize> {
    RawAttributes::new(packet_bytes)
        .find(|raw| {
            raw.attr_type == AttributeType::MessageAuthenticator.as_u8() && raw.value.len() == 16
        })
        .map(|raw| raw.offset + 2)
}

/// Calculate Message-Authenticator for a RADIUS packet
///
/// # Arguments
/// * `packet_bytes` - The complete RADIUS packet
/// * `vector` - What the authenticator slot holds while digesting
/// * `value_offset` - Where the Message-Authenticator value starts
/// * `secret` - The shared secret
pub fn calculate_message_authenticator(
    packet_bytes: &[u8],
    vector: &[u8; 16],
    value_offset: usize,
    secret: &[u8],
) -> Result<[u8; 16], MessageAuthError> {
    if value_offset < 22 || value_offset + 16 > packet_bytes.len() {
        return Err(MessageAuthError::OutOfBounds(value_offset));
    }

    let mut mac = HmacMd5::new_from_slice(secret).map_err(|_| MessageAuthError::Key)?;
    mac.update(&packet_bytes[..4]);
    mac.update(vector);
    mac.update(&packet_bytes[20..value_offset]);
    mac.update(&[0u8; 16]);
    mac.update(&packet_bytes[value_offset + 16..]);

    let mut output = [0u8; 16];
    output.copy_from_slice(&mac.finalize().into_bytes());
    Ok(output)
}

/// Check the Message-Authenticator at `value_offset` in constant time.
pub fn verify_message_authenticator(
    packet_bytes: &[u8],
    vector: &[u8; 16],
    value_offset: usize,
    secret: &[u8],
) -> Result<bool, MessageAuthError> {
    let expected = calculate_message_authenticator(packet_bytes, vector, value_offset, secret)?;
    let received = &packet_bytes[value_offset..value_offset + 16];
    Ok(bool::from(received.ct_eq(&expected)))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Access-Request header, one User-Name, then a zeroed Message-Authenticator.
    fn packet_with_ma() -> Vec<u8> {
        let mut packet = vec![1, 7, 0, 43];
        packet.extend_from_slice(&[0x11; 16]);
        packet.extend_from_slice(&[1, 5, b'b', b'o', b'b']);
        packet.extend_from_slice(&[80, 18]);
        packet.extend_from_slice(&[0u8; 16]);
        packet
    }

    #[test]
    fn test_find_message_authenticator() {
        let packet = packet_with_ma();
        assert_eq!(find_message_authenticator(&packet), Some(27));
        assert_eq!(find_message_authenticator(&packet[..25]), None);
    }

    #[test]
    fn test_calculate_is_deterministic_and_keyed() {
        let packet = packet_with_ma();
        let vector = [0x11; 16];
        let a = calculate_message_authenticator(&packet, &vector, 27, b"secret1").unwrap();
        let b = calculate_message_authenticator(&packet, &vector, 27, b"secret1").unwrap();
        let c = calculate_message_authenticator(&packet, &vector, 27, b"secret2").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c, "Different secrets should produce different authenticators");
    }

    #[test]
    fn test_value_field_is_ignored() {
        let mut packet = packet_with_ma();
        let vector = [0x11; 16];
        let before = calculate_message_authenticator(&packet, &vector, 27, b"s").unwrap();
        packet[27..43].fill(0xff);
        let after = calculate_message_authenticator(&packet, &vector, 27, b"s").unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_vector_substitution_changes_digest() {
        let packet = packet_with_ma();
        let a = calculate_message_authenticator(&packet, &[0x11; 16], 27, b"s").unwrap();
        let b = calculate_message_authenticator(&packet, &[0u8; 16], 27, b"s").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_message_authenticator() {
        let mut packet = packet_with_ma();
        let vector = [0x11; 16];
        let mac = calculate_message_authenticator(&packet, &vector, 27, b"testing123").unwrap();
        packet[27..43].copy_from_slice(&mac);

        assert!(verify_message_authenticator(&packet, &vector, 27, b"testing123").unwrap());
        assert!(!verify_message_authenticator(&packet, &vector, 27, b"wrong").unwrap());

        packet[30] ^= 1;
        assert!(!verify_message_authenticator(&packet, &vector, 27, b"testing123").unwrap());
    }

    #[test]
    fn test_out_of_bounds() {
        let packet = vec![0u8; 20];
        assert_eq!(
            calculate_message_authenticator(&packet, &[0u8; 16], 100, b"s"),
            Err(MessageAuthError::OutOfBounds(100))
        );
    }
}
