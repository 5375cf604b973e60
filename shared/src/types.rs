use std::fmt;
use std::net::IpAddr;

/// Kind of record asserted for a `.local` name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Cname,
    Address,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Cname => f.write_str("CNAME"),
            RecordKind::Address => f.write_str("ADDRESS"),
        }
    }
}

/// What a published name resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    /// Alias for a canonical host name, e.g. "myhost.local"
    Cname(String),

    /// Literal IPv4 or IPv6 address
    Address(IpAddr),
}

impl RecordData {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordData::Cname(_) => RecordKind::Cname,
            RecordData::Address(_) => RecordKind::Address,
        }
    }

    /// Target as it is handed to the responder daemon
    pub fn target(&self) -> String {
        match self {
            RecordData::Cname(host) => host.clone(),
            RecordData::Address(addr) => addr.to_string(),
        }
    }
}

impl fmt::Display for RecordData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.target())
    }
}
