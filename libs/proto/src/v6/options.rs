//! DHCPv6 options
use std::net::Ipv6Addr;

use crate::{
    decoder::{Decodable, Decoder},
    encoder::{Encodable, Encoder},
    error::{DecodeResult, EncodeResult},
    v6::{duid::Duid, fqdn::ClientFqdn},
};

/// Collection of options in a message or nested in an IA. Options are
/// kept in the order they were decoded/inserted, the first IA_NA of a
/// message is the first one the client put on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DhcpOptions(Vec<DhcpOption>);

impl DhcpOptions {
    /// create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// get the first option matching `code`
    pub fn get(&self, code: OptionCode) -> Option<&DhcpOption> {
        self.0.iter().find(|opt| OptionCode::from(*opt) == code)
    }

    /// get a mutable reference to the first option matching `code`
    pub fn get_mut(&mut self, code: OptionCode) -> Option<&mut DhcpOption> {
        self.0.iter_mut().find(|opt| OptionCode::from(&**opt) == code)
    }

    /// iterate over every option matching `code`, in wire order
    pub fn get_all(&self, code: OptionCode) -> impl Iterator<Item = &DhcpOption> {
        self.0.iter().filter(move |opt| OptionCode::from(*opt) == code)
    }

    /// append an option
    pub fn insert(&mut self, opt: DhcpOption) {
        self.0.push(opt)
    }

    /// remove every option matching `code`, returning whether any was present
    pub fn remove(&mut self, code: OptionCode) -> bool {
        let before = self.0.len();
        self.0.retain(|opt| OptionCode::from(opt) != code);
        self.0.len() != before
    }

    /// iterate all options in wire order
    pub fn iter(&self) -> impl Iterator<Item = &DhcpOption> {
        self.0.iter()
    }

    /// number of options
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// true if there are no options
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Decodable for DhcpOptions {
    fn decode(decoder: &mut Decoder<'_>) -> DecodeResult<Self> {
        let mut opts = Vec::new();
        while !decoder.is_empty() {
            opts.push(DhcpOption::decode(decoder)?);
        }
        Ok(DhcpOptions(opts))
    }
}

impl Encodable for DhcpOptions {
    fn encode(&self, e: &mut Encoder<'_>) -> EncodeResult<()> {
        self.0.iter().try_for_each(|opt| opt.encode(e))
    }
}

/// DHCPv6 option codes
#[derive(Debug, Copy, Hash, Clone, PartialEq, Eq)]
pub enum OptionCode {
    /// 1 Client Identifier
    ClientId,
    /// 2 Server Identifier
    ServerId,
    /// 3 Identity Association for Non-temporary Addresses
    IANA,
    /// 5 IA Address
    IAAddr,
    /// 6 Option Request
    ORO,
    /// 8 Elapsed Time
    ElapsedTime,
    /// 13 Status Code
    StatusCode,
    /// 39 Client FQDN - <https://datatracker.ietf.org/doc/html/rfc4704>
    ClientFqdn,
    /// unknown/unimplemented option
    Unknown(u16),
}

impl From<u16> for OptionCode {
    fn from(n: u16) -> Self {
        use OptionCode::*;
        match n {
            1 => ClientId,
            2 => ServerId,
            3 => IANA,
            5 => IAAddr,
            6 => ORO,
            8 => ElapsedTime,
            13 => StatusCode,
            39 => ClientFqdn,
            n => Unknown(n),
        }
    }
}

impl From<OptionCode> for u16 {
    fn from(code: OptionCode) -> Self {
        use OptionCode::*;
        match code {
            ClientId => 1,
            ServerId => 2,
            IANA => 3,
            IAAddr => 5,
            ORO => 6,
            ElapsedTime => 8,
            StatusCode => 13,
            ClientFqdn => 39,
            Unknown(n) => n,
        }
    }
}

impl From<&DhcpOption> for OptionCode {
    fn from(opt: &DhcpOption) -> Self {
        use DhcpOption as O;
        match opt {
            O::ClientId(_) => OptionCode::ClientId,
            O::ServerId(_) => OptionCode::ServerId,
            O::IANA(_) => OptionCode::IANA,
            O::IAAddr(_) => OptionCode::IAAddr,
            O::ORO(_) => OptionCode::ORO,
            O::ElapsedTime(_) => OptionCode::ElapsedTime,
            O::StatusCode(_) => OptionCode::StatusCode,
            O::ClientFqdn(_) => OptionCode::ClientFqdn,
            O::Unknown(unknown) => OptionCode::Unknown(unknown.code),
        }
    }
}

/// DHCPv6 options relevant to address assignment & DDNS
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DhcpOption {
    /// 1 Client Identifier (DUID)
    ClientId(Duid),
    /// 2 Server Identifier (DUID)
    ServerId(Duid),
    /// 3 Identity Association for Non-temporary Addresses
    IANA(IANA),
    /// 5 IA Address, nested in an IA
    IAAddr(IAAddr),
    /// 6 Option Request
    ORO(ORO),
    /// 8 Elapsed Time (hundredths of a second)
    ElapsedTime(u16),
    /// 13 Status Code
    StatusCode(StatusCode),
    /// 39 Client FQDN
    ClientFqdn(ClientFqdn),
    /// unknown/unimplemented option, kept as raw bytes
    Unknown(UnknownOption),
}

/// Identity Association for Non-temporary Addresses
/// <https://datatracker.ietf.org/doc/html/rfc8415#section-21.4>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IANA {
    /// IAID, unique among this client's IA_NAs
    pub id: u32,
    /// seconds until the client contacts the assigning server
    pub t1: u32,
    /// seconds until the client contacts any server
    pub t2: u32,
    /// nested options (IA Address, Status Code)
    pub opts: DhcpOptions,
}

impl IANA {
    /// the first IA Address nested in this IA, if any
    pub fn first_addr(&self) -> Option<&IAAddr> {
        self.opts.iter().find_map(|opt| match opt {
            DhcpOption::IAAddr(iaaddr) => Some(iaaddr),
            _ => None,
        })
    }
}

/// IA Address
/// <https://datatracker.ietf.org/doc/html/rfc8415#section-21.6>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IAAddr {
    /// the assigned address
    pub addr: Ipv6Addr,
    /// preferred lifetime in seconds
    pub preferred_life: u32,
    /// valid lifetime in seconds
    pub valid_life: u32,
    /// nested options (Status Code)
    pub opts: DhcpOptions,
}

/// Status Code
/// <https://datatracker.ietf.org/doc/html/rfc8415#section-21.13>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCode {
    /// numeric status
    pub status: Status,
    /// human readable message
    pub msg: String,
}

/// DHCPv6 status codes
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    /// 0 Success
    Success,
    /// 1 UnspecFail
    UnspecFail,
    /// 2 NoAddrsAvail
    NoAddrsAvail,
    /// 3 NoBinding
    NoBinding,
    /// 4 NotOnLink
    NotOnLink,
    /// 5 UseMulticast
    UseMulticast,
    /// unknown status
    Unknown(u16),
}

impl From<u16> for Status {
    fn from(n: u16) -> Self {
        use Status::*;
        match n {
            0 => Success,
            1 => UnspecFail,
            2 => NoAddrsAvail,
            3 => NoBinding,
            4 => NotOnLink,
            5 => UseMulticast,
            n => Unknown(n),
        }
    }
}

impl From<Status> for u16 {
    fn from(status: Status) -> Self {
        use Status::*;
        match status {
            Success => 0,
            UnspecFail => 1,
            NoAddrsAvail => 2,
            NoBinding => 3,
            NotOnLink => 4,
            UseMulticast => 5,
            Unknown(n) => n,
        }
    }
}

/// Option Request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ORO {
    /// requested option codes
    pub opts: Vec<OptionCode>,
}

/// Unknown option, body kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOption {
    /// the option code off the wire
    pub code: u16,
    /// raw option body
    pub data: Vec<u8>,
}

impl Decodable for DhcpOption {
    fn decode(decoder: &mut Decoder<'_>) -> DecodeResult<Self> {
        let code = decoder.read_u16()?;
        let len = decoder.read_u16()? as usize;
        let mut decoder = Decoder::new(decoder.read_slice(len)?);

        Ok(match OptionCode::from(code) {
            OptionCode::ClientId => DhcpOption::ClientId(decoder.read_slice(len)?.into()),
            OptionCode::ServerId => DhcpOption::ServerId(decoder.read_slice(len)?.into()),
            OptionCode::IANA => DhcpOption::IANA(IANA {
                id: decoder.read_u32()?,
                t1: decoder.read_u32()?,
                t2: decoder.read_u32()?,
                opts: DhcpOptions::decode(&mut decoder)?,
            }),
            OptionCode::IAAddr => DhcpOption::IAAddr(IAAddr {
                addr: decoder.read::<16>()?.into(),
                preferred_life: decoder.read_u32()?,
                valid_life: decoder.read_u32()?,
                opts: DhcpOptions::decode(&mut decoder)?,
            }),
            OptionCode::ORO => {
                let mut opts = Vec::with_capacity(len / 2);
                while !decoder.is_empty() {
                    opts.push(decoder.read_u16()?.into());
                }
                DhcpOption::ORO(ORO { opts })
            }
            OptionCode::ElapsedTime => DhcpOption::ElapsedTime(decoder.read_u16()?),
            OptionCode::StatusCode => DhcpOption::StatusCode(StatusCode {
                status: decoder.read_u16()?.into(),
                msg: decoder.read_string(len - 2)?,
            }),
            OptionCode::ClientFqdn => DhcpOption::ClientFqdn(ClientFqdn::decode(&mut decoder)?),
            OptionCode::Unknown(code) => DhcpOption::Unknown(UnknownOption {
                code,
                data: decoder.read_slice(len)?.to_vec(),
            }),
        })
    }
}

impl Encodable for DhcpOption {
    fn encode(&self, e: &mut Encoder<'_>) -> EncodeResult<()> {
        // encode the body first so the length prefix is known
        let mut body = Vec::new();
        let mut enc = Encoder::new(&mut body);
        match self {
            DhcpOption::ClientId(duid) | DhcpOption::ServerId(duid) => {
                enc.write_slice(duid.as_ref())?;
            }
            DhcpOption::IANA(iana) => {
                enc.write_u32(iana.id)?;
                enc.write_u32(iana.t1)?;
                enc.write_u32(iana.t2)?;
                iana.opts.encode(&mut enc)?;
            }
            DhcpOption::IAAddr(iaaddr) => {
                enc.write_slice(&iaaddr.addr.octets())?;
                enc.write_u32(iaaddr.preferred_life)?;
                enc.write_u32(iaaddr.valid_life)?;
                iaaddr.opts.encode(&mut enc)?;
            }
            DhcpOption::ORO(oro) => {
                for code in &oro.opts {
                    enc.write_u16((*code).into())?;
                }
            }
            DhcpOption::ElapsedTime(time) => {
                enc.write_u16(*time)?;
            }
            DhcpOption::StatusCode(status) => {
                enc.write_u16(status.status.into())?;
                enc.write_slice(status.msg.as_bytes())?;
            }
            DhcpOption::ClientFqdn(fqdn) => {
                fqdn.encode(&mut enc)?;
            }
            DhcpOption::Unknown(unknown) => {
                enc.write_slice(&unknown.data)?;
            }
        }
        e.write_u16(OptionCode::from(self).into())?;
        e.write_u16(body.len() as u16)?;
        e.write_slice(&body)?;
        Ok(())
    }
}
