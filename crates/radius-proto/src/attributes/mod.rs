mod attribute;
mod types;

pub use attribute::Attribute;
pub use types::{AttributeType, ERROR_CAUSE_INVALID_REQUEST, ORIGINAL_PACKET_CODE};
