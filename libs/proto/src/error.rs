//! Decode/Encode errors
use thiserror::Error;

/// Result returned by decode operations
pub type DecodeResult<T> = Result<T, DecodeError>;
/// Result returned by encode operations
pub type EncodeResult<T> = Result<T, EncodeError>;

/// An error produced while decoding a message or option off the wire.
/// A message failing with any of these is malformed and gets dropped,
/// the error is never fatal to the server.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// ran past the end of the buffer
    #[error("not enough bytes: needed {needed} have {have}")]
    NotEnoughBytes {
        /// bytes the read wanted
        needed: usize,
        /// bytes left in the buffer
        have: usize,
    },
    /// domain name label longer than 63 octets
    #[error("domain name label exceeds 63 octets: {0}")]
    LabelTooLong(usize),
    /// whole domain name longer than 255 octets
    #[error("domain name exceeds 255 octets: {0}")]
    NameTooLong(usize),
    /// character not allowed in a domain name label
    #[error("illegal character in domain name label: {0:?}")]
    IllegalCharacter(char),
    /// a label with zero length inside the name (consecutive dots)
    #[error("empty label in domain name")]
    EmptyLabel,
    /// bytes found after the terminating root label
    #[error("{0} trailing bytes after domain name root label")]
    TrailingBytes(usize),
    /// the client fqdn N and S bits are mutually exclusive
    #[error("client fqdn flags invalid, N and S both set: {0:#04x}")]
    InvalidFqdnFlags(u8),
}

/// An error produced while encoding a message or option
#[derive(Error, Debug)]
pub enum EncodeError {
    /// io error during write
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
