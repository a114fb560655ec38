//! Session/State tracking for multi-round exchanges
//!
//! An Access-Challenge leaves an exchange open: the reply carries an opaque
//! State token and the attributes the next round needs are parked here
//! until the client answers with the same token.
//!
//! # Token layout
//!
//! ```text
//! byte  0      round counter
//! byte  3      state_server_id
//! bytes 4..8   hash of the virtual server name (big endian)
//! others       random
//! ```
//!
//! Tokens that do not carry our server id and name hash are not ours. They
//! may belong to an upstream server and are ignored rather than rejected.

pub mod config;
pub mod error;
pub mod tracker;

pub use config::SessionConfig;
pub use error::StateError;
pub use tracker::{ExchangeContext, SessionTracker, TOKEN_LENGTH};
