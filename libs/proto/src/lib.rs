//! # vesta-proto
//!
//! Encoding & decoding for the DHCPv6 messages and options the server
//! handles: Client Identifier / Server Identifier, IA_NA, IA Address,
//! Status Code, Option Request and the Client FQDN option (RFC 4704).
//!
//! ## Example - decoding/encoding a message
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use vesta_proto::{v6::Message, Decodable, Decoder, Encodable, Encoder};
//! // client id + elapsed time
//! let solicit = vec![
//!     0x01, 0x10, 0x08, 0x74, 0x00, 0x01, 0x00, 0x0e, 0x00, 0x01, 0x00, 0x01, 0x1c, 0x39,
//!     0xcf, 0x88, 0x08, 0x00, 0x27, 0xfe, 0x8f, 0x95, 0x00, 0x08, 0x00, 0x02, 0x00, 0x00,
//! ];
//! let msg = Message::decode(&mut Decoder::new(&solicit))?;
//! let mut buf = Vec::new();
//! let mut e = Encoder::new(&mut buf);
//! msg.encode(&mut e)?;
//! assert_eq!(solicit, buf);
//! # Ok(()) }
//! ```
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod v6;

pub use crate::{
    decoder::{Decodable, Decoder},
    encoder::{Encodable, Encoder},
    error::{DecodeError, DecodeResult, EncodeError, EncodeResult},
};
