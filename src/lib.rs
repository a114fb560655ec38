//! USG RADIUS
//!
//! Umbrella crate for the wire codec ([`proto`]) and the request processing
//! engine ([`engine`]). The end-to-end tests and benchmarks live here.

pub use radius_engine as engine;
pub use radius_proto as proto;
