//! Session tracker errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Token was not issued by this tracker
    #[error("state token was not issued by this server")]
    ForeignToken,

    /// A live session already uses the token
    #[error("state token is already in use")]
    Duplicate,

    /// Capacity is zero, nothing can be stored
    #[error("session table is full")]
    Full,

    /// Token carries our identity but has the wrong length
    #[error("state token has invalid length {0}")]
    Malformed(usize),
}
