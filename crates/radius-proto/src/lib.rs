//! RADIUS Protocol Implementation
//!
//! Wire format, integrity and dictionary support for RFC 2865, 2866, 2869,
//! 5176 and 5997.
//!
//! # Features
//!
//! - Structural validation of received frames before anything is parsed
//! - Packet encoding and decoding with the per-code vector rules
//! - Request/Response Authenticator and Message-Authenticator signing
//! - User-Password hiding and CHAP verification
//! - Attribute dictionary with enumerated values
//!
//! # Example
//!
//! ```rust
//! use radius_proto::{Attribute, AttributeType, Code, Packet};
//! use radius_proto::auth::{encrypt_user_password, generate_request_authenticator, sign, verify};
//!
//! let vector = generate_request_authenticator();
//! let mut request = Packet::new(Code::AccessRequest, 1, vector);
//! request.add_attribute(Attribute::string(AttributeType::UserName.as_u8(), "alice").unwrap());
//! request.add_attribute(
//!     Attribute::new(
//!         AttributeType::UserPassword.as_u8(),
//!         encrypt_user_password("password", b"secret", &vector),
//!     )
//!     .unwrap(),
//! );
//! request.add_attribute(Attribute::message_authenticator());
//!
//! sign(&mut request, None, b"secret").unwrap();
//! let wire = request.data().unwrap();
//! assert!(verify(wire, None, b"secret", true).is_ok());
//! ```

pub mod attributes;
pub mod auth;
pub mod debug;
pub mod dictionary;
pub mod message_auth;
pub mod packet;
pub mod validation;

pub use attributes::{Attribute, AttributeType};
pub use auth::{
    decrypt_user_password, encrypt_user_password, generate_request_authenticator, sign,
    sign_bytes, verify, verify_chap_password, SignError, VerifyError,
};
pub use dictionary::{Dictionary, DictionaryError};
pub use message_auth::{calculate_message_authenticator, verify_message_authenticator};
pub use packet::{Code, EndpointId, Packet, PacketError, SocketInfo, TransportKind, VectorKind};
pub use validation::{check_structure, DecodeError, DecodeOptions};
