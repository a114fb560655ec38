//! Request/Response Authenticator handling (RFC 2865, 2866, 5176, 5997)
//!
//! Signing rules by code:
//!
//! | Code | Vector slot while digesting | Authenticator on the wire |
//! |------|-----------------------------|---------------------------|
//! | Access-Request, Status-Server | sender's random vector | the random vector |
//! | Accounting/CoA/Disconnect-Request | zeros | MD5(packet + secret) |
//! | responses | original request vector | MD5(packet + secret) |
//!
//! Message-Authenticator, when present, is computed first with the same
//! vector substitution. Both functions work on the wire bytes in place.

use crate::message_auth::{
    calculate_message_authenticator, find_message_authenticator, verify_message_authenticator,
    MessageAuthError,
};
use crate::packet::{Code, Packet, PacketError, VectorKind};
use rand::Rng;
use subtle::ConstantTimeEq;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("packet too short to verify: {0} bytes")]
    Malformed(usize),
    #[error("unknown packet code {0}")]
    UnknownCode(u8),
    #[error("{0} needs the original request vector")]
    MissingOriginal(Code),
    #[error("Request/Response Authenticator mismatch")]
    AuthenticatorMismatch,
    #[error("Message-Authenticator mismatch")]
    MessageAuthenticatorMismatch,
    #[error("Message-Authenticator required but missing")]
    MissingMessageAuthenticator,
    #[error("Message-Authenticator unusable: {0}")]
    InvalidMessageAuthenticator(MessageAuthError),
}

#[derive(Error, Debug)]
pub enum SignError {
    #[error(transparent)]
    Packet(#[from] PacketError),
    #[error("packet too short to sign: {0} bytes")]
    TooShort(usize),
    #[error("cannot sign packet code {0}")]
    Unsignable(u8),
    #[error("{0} needs the original request vector")]
    MissingOriginal(Code),
    #[error("Message-Authenticator: {0}")]
    MessageAuthenticator(#[from] MessageAuthError),
}

/// Generate a random Request Authenticator (16 bytes) per RFC 2865 Section 3
pub fn generate_request_authenticator() -> [u8; 16] {
    let mut rng = rand::rng();
    let mut authenticator = [0u8; 16];
    rng.fill(&mut authenticator);
    authenticator
}

fn keyed_digest(packet_bytes: &[u8], vector: &[u8; 16], secret: &[u8]) -> [u8; 16] {
    let mut ctx = md5::Context::new();
    ctx.consume(&packet_bytes[..4]);
    ctx.consume(vector);
    ctx.consume(&packet_bytes[20..]);
    ctx.consume(secret);
    ctx.compute().0
}

fn signing_vector(
    code: Code,
    packet_bytes: &[u8],
    original: Option<&[u8; 16]>,
) -> Result<(VectorKind, [u8; 16]), VerifyError> {
    match code.vector_kind() {
        None => Err(VerifyError::UnknownCode(code.as_u8())),
        Some(VectorKind::Random) => {
            let mut own = [0u8; 16];
            own.copy_from_slice(&packet_bytes[4..20]);
            Ok((VectorKind::Random, own))
        }
        Some(VectorKind::Zero) => Ok((VectorKind::Zero, [0u8; 16])),
        Some(VectorKind::Original) => original
            .map(|vector| (VectorKind::Original, *vector))
            .ok_or(VerifyError::MissingOriginal(code)),
    }
}

/// Verify the authenticator and Message-Authenticator of raw packet bytes.
///
/// `original` is the vector of the request a response answers; it is
/// ignored for requests. Status-Server always needs a Message-Authenticator
/// (RFC 5997 Section 3).
pub fn verify(
    packet_bytes: &[u8],
    original: Option<&[u8; 16]>,
    secret: &[u8],
    require_message_authenticator: bool,
) -> Result<(), VerifyError> {
    if packet_bytes.len() < Packet::MIN_PACKET_SIZE {
        return Err(VerifyError::Malformed(packet_bytes.len()));
    }
    let code = Code::from_u8(packet_bytes[0]).ok_or(VerifyError::UnknownCode(packet_bytes[0]))?;
    let (kind, vector) = signing_vector(code, packet_bytes, original)?;

    match find_message_authenticator(packet_bytes) {
        Some(offset) => {
            let valid = verify_message_authenticator(packet_bytes, &vector, offset, secret)
                .map_err(VerifyError::InvalidMessageAuthenticator)?;
            if !valid {
                return Err(VerifyError::MessageAuthenticatorMismatch);
            }
        }
        None if require_message_authenticator || code == Code::StatusServer => {
            return Err(VerifyError::MissingMessageAuthenticator);
        }
        None => {}
    }

    if kind == VectorKind::Random {
        return Ok(());
    }

    let expected = keyed_digest(packet_bytes, &vector, secret);
    if bool::from(packet_bytes[4..20].ct_eq(&expected)) {
        Ok(())
    } else {
        Err(VerifyError::AuthenticatorMismatch)
    }
}

/// Sign encoded packet bytes in place and return the resulting vector.
pub fn sign_bytes(
    packet_bytes: &mut [u8],
    original: Option<&[u8; 16]>,
    secret: &[u8],
) -> Result<[u8; 16], SignError> {
    if packet_bytes.len() < Packet::MIN_PACKET_SIZE {
        return Err(SignError::TooShort(packet_bytes.len()));
    }
    let code = Code::from_u8(packet_bytes[0]).ok_or(SignError::Unsignable(packet_bytes[0]))?;
    let (kind, vector) = signing_vector(code, packet_bytes, original).map_err(|e| match e {
        VerifyError::MissingOriginal(code) => SignError::MissingOriginal(code),
        _ => SignError::Unsignable(code.as_u8()),
    })?;

    packet_bytes[4..20].copy_from_slice(&vector);

    if let Some(offset) = find_message_authenticator(packet_bytes) {
        packet_bytes[offset..offset + 16].fill(0);
        let mac = calculate_message_authenticator(packet_bytes, &vector, offset, secret)?;
        packet_bytes[offset..offset + 16].copy_from_slice(&mac);
    }

    if kind != VectorKind::Random {
        let digest = keyed_digest(packet_bytes, &vector, secret);
        packet_bytes[4..20].copy_from_slice(&digest);
    }

    let mut signed = [0u8; 16];
    signed.copy_from_slice(&packet_bytes[4..20]);
    Ok(signed)
}

/// Encode (if needed) and sign a packet, then refresh its stored vector.
pub fn sign(packet: &mut Packet, original: Option<&[u8; 16]>, secret: &[u8]) -> Result<(), SignError> {
    if packet.data().is_none() {
        packet.encode(original)?;
    }
    let code = packet.code.as_u8();
    let bytes = packet.data_mut().ok_or(SignError::Unsignable(code))?;
    let vector = sign_bytes(bytes, original, secret)?;
    packet.authenticator = vector;
    Ok(())
}

/// Encrypt User-Password attribute per RFC 2865 Section 5.2
///
/// The password is padded to a multiple of 16 bytes, then XORed with
/// MD5(secret + request_authenticator) for the first block and
/// MD5(secret + previous_block) for each following block.
pub fn encrypt_user_password(password: &str, secret: &[u8], authenticator: &[u8; 16]) -> Vec<u8> {
    let mut padded = password.as_bytes().to_vec();
    let blocks = padded.len().div_ceil(16).max(1);
    padded.resize(blocks * 16, 0);

    let mut result = Vec::with_capacity(padded.len());
    let mut previous: [u8; 16] = *authenticator;

    for chunk in padded.chunks(16) {
        let mut ctx = md5::Context::new();
        ctx.consume(secret);
        ctx.consume(previous);
        let hash = ctx.compute();

        for (i, byte) in chunk.iter().enumerate() {
            previous[i] = byte ^ hash.0[i];
        }
        result.extend_from_slice(&previous);
    }

    result
}

/// Decrypt User-Password attribute per RFC 2865 Section 5.2
pub fn decrypt_user_password(
    encrypted: &[u8],
    secret: &[u8],
    authenticator: &[u8; 16],
) -> Result<String, String> {
    if encrypted.len() % 16 != 0 || encrypted.is_empty() {
        return Err("Invalid encrypted password length".to_string());
    }

    let mut result = Vec::with_capacity(encrypted.len());
    let mut previous: &[u8] = authenticator;

    for chunk in encrypted.chunks(16) {
        let mut ctx = md5::Context::new();
        ctx.consume(secret);
        ctx.consume(previous);
        let hash = ctx.compute();

        result.extend(chunk.iter().zip(hash.0.iter()).map(|(c, h)| c ^ h));
        previous = chunk;
    }

    while result.last() == Some(&0) {
        result.pop();
    }

    String::from_utf8(result).map_err(|e| format!("Invalid UTF-8 in password: {}", e))
}

/// Check a CHAP-Password value (RFC 2865 Section 5.3).
///
/// `chap_password` is the 17-byte attribute value: CHAP ident then
/// MD5(ident + password + challenge).
pub fn verify_chap_password(chap_password: &[u8], password: &str, challenge: &[u8]) -> bool {
    let Some((ident, response)) = chap_password.split_first() else {
        return false;
    };
    if response.len() != 16 {
        return false;
    }

    let mut ctx = md5::Context::new();
    ctx.consume([*ident]);
    ctx.consume(password.as_bytes());
    ctx.consume(challenge);
    bool::from(ctx.compute().0[..].ct_eq(response))
}
