//! Error types for the weft-thread crate

use thiserror::Error;

/// Result type alias using `ThreadError`
pub type Result<T> = std::result::Result<T, ThreadError>;

/// Errors that can occur while building or parsing thread identifiers, keys and addresses
///
/// Varints are decoded strictly: a padded encoding such as `0x81 0x00` for 1
/// is rejected with [`ThreadError::VarintNotMinimal`] rather than read as its
/// value, so every valid ID has exactly one byte form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThreadError {
    /// The buffer ended in the middle of a varint (or was empty)
    #[error("reading varint: buffer too small")]
    VarintBufferTooSmall,

    /// The varint does not fit into 64 bits
    #[error("reading varint: varint bigger than 64bits and not supported")]
    VarintTooBig,

    /// The varint uses more bytes than necessary; lenient uvarint readers
    /// accept such input, this crate does not
    #[error("reading varint: varint not minimally encoded")]
    VarintNotMinimal,

    /// The string passed to decode is shorter than two characters
    #[error("id too short")]
    TooShort,

    /// The first character is not a known multibase tag
    #[error("unknown base encoding: {0:?}")]
    UnknownBase(char),

    /// The base-encoded part could not be decoded
    #[error("invalid base string: {0}")]
    InvalidBaseString(String),

    /// The id version is not supported
    #[error("expected 1 as the id version number, got: {0}")]
    UnsupportedVersion(u64),

    /// The id variant is not supported
    #[error("expected RandomVariant or PubKeyVariant as the id variant, got: {0}")]
    UnsupportedVariant(u64),

    /// Version and variant parsed but no payload bytes follow
    #[error("expected random id bytes but there are none")]
    NoPayload,

    /// The randomness source failed
    #[error("randomness source failed: {0}")]
    Randomness(String),

    /// Invalid key format or length
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Invalid network address
    #[error("invalid address: {0}")]
    InvalidAddr(String),
}

impl From<unsigned_varint::decode::Error> for ThreadError {
    fn from(err: unsigned_varint::decode::Error) -> Self {
        use unsigned_varint::decode::Error;
        match err {
            Error::Overflow => ThreadError::VarintTooBig,
            Error::NotMinimal => ThreadError::VarintNotMinimal,
            _ => ThreadError::VarintBufferTooSmall,
        }
    }
}

impl From<multibase::Error> for ThreadError {
    fn from(err: multibase::Error) -> Self {
        match err {
            multibase::Error::UnknownBase(code) => ThreadError::UnknownBase(code),
            other => ThreadError::InvalidBaseString(other.to_string()),
        }
    }
}

impl From<multiaddr::Error> for ThreadError {
    fn from(err: multiaddr::Error) -> Self {
        ThreadError::InvalidAddr(err.to_string())
    }
}
