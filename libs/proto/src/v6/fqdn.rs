//! Client FQDN option (RFC 4704) & domain name wire format
use std::{fmt, str::FromStr};

use crate::{
    decoder::{Decodable, Decoder},
    encoder::{Encodable, Encoder},
    error::{DecodeError, DecodeResult, EncodeResult},
};

/// Client FQDN flag bits.
///
/// ```text
///  0 1 2 3 4 5 6 7
/// +-+-+-+-+-+-+-+-+
/// |  MBZ    |N|O|S|
/// +-+-+-+-+-+-+-+-+
/// ```
///
/// The MBZ bits are sent as zero and ignored on receipt.
/// <https://datatracker.ietf.org/doc/html/rfc4704#section-4.1>
#[derive(Copy, Clone, PartialEq, Eq, Default, Hash)]
pub struct FqdnFlags(u8);

impl FqdnFlags {
    const S: u8 = 0x01;
    const O: u8 = 0x02;
    const N: u8 = 0x04;

    /// create from a wire byte, masking the reserved bits
    pub fn new(n: u8) -> Self {
        Self(n & (Self::S | Self::O | Self::N))
    }

    /// get the S flag: server performs the AAAA update
    pub fn s(&self) -> bool {
        self.0 & Self::S != 0
    }

    /// set the S flag, returning the new flags
    pub fn set_s(mut self, bit: bool) -> Self {
        if bit {
            self.0 |= Self::S;
        } else {
            self.0 &= !Self::S;
        }
        self
    }

    /// get the O flag: server overrode the client's S preference
    pub fn o(&self) -> bool {
        self.0 & Self::O != 0
    }

    /// set the O flag, returning the new flags
    pub fn set_o(mut self, bit: bool) -> Self {
        if bit {
            self.0 |= Self::O;
        } else {
            self.0 &= !Self::O;
        }
        self
    }

    /// get the N flag: no DNS updates are performed
    pub fn n(&self) -> bool {
        self.0 & Self::N != 0
    }

    /// set the N flag, returning the new flags
    pub fn set_n(mut self, bit: bool) -> Self {
        if bit {
            self.0 |= Self::N;
        } else {
            self.0 &= !Self::N;
        }
        self
    }

    /// the raw flag byte
    pub fn bits(&self) -> u8 {
        self.0
    }
}

impl fmt::Debug for FqdnFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FqdnFlags")
            .field("n", &self.n())
            .field("o", &self.o())
            .field("s", &self.s())
            .finish()
    }
}

/// A domain name as carried in the Client FQDN option.
///
/// Wire form distinguishes a fully qualified name (label sequence
/// terminated by the root label) from a partial name (no terminating
/// root label, interpreted relative to a configured suffix). An empty
/// name is a partial name with no labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DomainName {
    labels: Vec<String>,
    fqdn: bool,
}

impl DomainName {
    /// longest allowed single label
    pub const MAX_LABEL_LEN: usize = 63;
    /// longest allowed wire-form name
    pub const MAX_NAME_LEN: usize = 255;

    /// the empty (partial) name
    pub fn empty() -> Self {
        Self::default()
    }

    /// true if the name holds no labels
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// true if the name is fully qualified (ends in the root label)
    pub fn is_fqdn(&self) -> bool {
        self.fqdn
    }

    /// mark the name fully qualified (or not)
    pub fn set_fqdn(&mut self, fqdn: bool) {
        self.fqdn = fqdn;
    }

    /// the labels of this name
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Complete a partial name with `suffix`, i.e. `myhost` joined with
    /// `example.com.` is `myhost.example.com.`. A name that is already
    /// fully qualified is returned unchanged.
    pub fn join(&self, suffix: &DomainName) -> DomainName {
        if self.fqdn {
            return self.clone();
        }
        let mut labels = self.labels.clone();
        labels.extend(suffix.labels.iter().cloned());
        DomainName {
            labels,
            fqdn: suffix.fqdn,
        }
    }

    /// ASCII lower-case every label, the canonical case for hashing and
    /// for what gets written to a lease
    pub fn to_lowercase(&self) -> DomainName {
        DomainName {
            labels: self
                .labels
                .iter()
                .map(|label| label.to_ascii_lowercase())
                .collect(),
            fqdn: self.fqdn,
        }
    }

    /// Canonical wire form for digest computation: every label
    /// lower-cased, always terminated by the root label.
    pub fn to_canonical_wire(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for label in &self.labels {
            buf.push(label.len() as u8);
            buf.extend(label.bytes().map(|b| b.to_ascii_lowercase()));
        }
        buf.push(0);
        buf
    }

    fn wire_len(&self) -> usize {
        self.labels.iter().map(|l| l.len() + 1).sum::<usize>() + usize::from(self.fqdn)
    }

    fn check_label(label: &str) -> DecodeResult<()> {
        if label.is_empty() {
            return Err(DecodeError::EmptyLabel);
        }
        if label.len() > Self::MAX_LABEL_LEN {
            return Err(DecodeError::LabelTooLong(label.len()));
        }
        if let Some(chr) = label
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(DecodeError::IllegalCharacter(chr));
        }
        Ok(())
    }

    /// Decode a name occupying the rest of `decoder`. A zero label ends
    /// a fully qualified name; running out of buffer mid-sequence ends a
    /// partial one. Bytes after the root label are an error.
    pub fn decode_wire(decoder: &mut Decoder<'_>) -> DecodeResult<Self> {
        let mut labels = Vec::new();
        let mut fqdn = false;
        let mut wire_len = 0usize;
        while let Some(len) = decoder.peek_u8() {
            if len == 0 {
                decoder.read_u8()?;
                fqdn = true;
                if !decoder.is_empty() {
                    return Err(DecodeError::TrailingBytes(decoder.remaining()));
                }
                break;
            }
            decoder.read_u8()?;
            let label = String::from_utf8_lossy(decoder.read_slice(len as usize)?).into_owned();
            Self::check_label(&label)?;
            wire_len += label.len() + 1;
            labels.push(label);
        }
        let name = DomainName { labels, fqdn };
        if wire_len + usize::from(fqdn) > Self::MAX_NAME_LEN {
            return Err(DecodeError::NameTooLong(name.wire_len()));
        }
        Ok(name)
    }

    /// Encode in wire form, writing the root label only for a fully
    /// qualified name.
    pub fn encode_wire(&self, e: &mut Encoder<'_>) -> EncodeResult<()> {
        for label in &self.labels {
            e.write_u8(label.len() as u8)?;
            e.write_slice(label.as_bytes())?;
        }
        if self.fqdn {
            e.write_u8(0)?;
        }
        Ok(())
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.labels.join("."))?;
        if self.fqdn {
            write!(f, ".")?;
        }
        Ok(())
    }
}

impl FromStr for DomainName {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(DomainName::empty());
        }
        let (body, fqdn) = match s.strip_suffix('.') {
            Some(body) => (body, true),
            None => (s, false),
        };
        let mut labels = Vec::new();
        let mut wire_len = 0usize;
        for label in body.split('.') {
            Self::check_label(label)?;
            wire_len += label.len() + 1;
            labels.push(label.to_owned());
        }
        if wire_len + usize::from(fqdn) > Self::MAX_NAME_LEN {
            return Err(DecodeError::NameTooLong(wire_len + usize::from(fqdn)));
        }
        Ok(DomainName { labels, fqdn })
    }
}

/// Client FQDN option body: one flag byte followed by the domain name
/// in wire form.
/// <https://datatracker.ietf.org/doc/html/rfc4704#section-4.2>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFqdn {
    flags: FqdnFlags,
    domain: DomainName,
}

impl ClientFqdn {
    /// create a new client fqdn option
    pub fn new(flags: FqdnFlags, domain: DomainName) -> Self {
        Self { flags, domain }
    }

    /// the option flags
    pub fn flags(&self) -> FqdnFlags {
        self.flags
    }

    /// replace the option flags
    pub fn set_flags(&mut self, flags: FqdnFlags) {
        self.flags = flags;
    }

    /// the domain name
    pub fn domain(&self) -> &DomainName {
        &self.domain
    }

    /// replace the domain name
    pub fn set_domain(&mut self, domain: DomainName) {
        self.domain = domain;
    }
}

impl Decodable for ClientFqdn {
    fn decode(decoder: &mut Decoder<'_>) -> DecodeResult<Self> {
        let raw = decoder.read_u8()?;
        let flags = FqdnFlags::new(raw);
        if flags.n() && flags.s() {
            return Err(DecodeError::InvalidFqdnFlags(raw));
        }
        let domain = DomainName::decode_wire(decoder)?;
        Ok(ClientFqdn { flags, domain })
    }
}

impl Encodable for ClientFqdn {
    fn encode(&self, e: &mut Encoder<'_>) -> EncodeResult<()> {
        e.write_u8(self.flags.bits())?;
        self.domain.encode_wire(e)?;
        Ok(())
    }
}
