use async_trait::async_trait;

/// Failures reported by the mDNS responder daemon or the bus in between
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResponderError {
    /// The daemon is no longer registered on the bus
    #[error("mDNS responder is not running")]
    ServiceUnknown,

    /// The daemon answered with an error, e.g. an invalid address
    #[error("mDNS responder rejected the call ({name}): {message}")]
    Rejected { name: String, message: String },

    /// Any other transport fault
    #[error("bus error: {0}")]
    Bus(String),
}

impl ResponderError {
    pub fn is_service_unknown(&self) -> bool {
        matches!(self, ResponderError::ServiceUnknown)
    }
}

/// Answer to a host name lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Host name the responder reports for the record
    pub name: String,
    pub address: String,
}

/// The operations this process needs from a local mDNS responder daemon
#[async_trait]
pub trait Responder: Send + Sync {
    type Group: RecordGroup + 'static;

    /// Cheap call used as a liveness probe
    async fn version_string(&self) -> Result<String, ResponderError>;

    /// Fully-qualified host name of this machine, e.g. "myhost.local"
    async fn host_name_fqdn(&self) -> Result<String, ResponderError>;

    async fn resolve_host_name(&self, name: &str) -> Result<Resolution, ResponderError>;

    /// Create an empty, uncommitted record group
    async fn new_group(&self) -> Result<Self::Group, ResponderError>;
}

/// A set of records announced and withdrawn together
#[async_trait]
pub trait RecordGroup: Send + Sync {
    async fn add_record(
        &self,
        name: &str,
        class: u16,
        rtype: u16,
        ttl: u32,
        rdata: &[u8],
    ) -> Result<(), ResponderError>;

    async fn add_address(&self, name: &str, flags: u32, address: &str)
        -> Result<(), ResponderError>;

    /// Make the group's records visible on the network
    async fn commit(&self) -> Result<(), ResponderError>;

    /// Withdraw everything in the group
    async fn reset(&self) -> Result<(), ResponderError>;
}

/// Opens a fresh connection to the responder daemon
#[async_trait]
pub trait Connect: Send + Sync {
    type Responder: Responder;

    async fn connect(&self) -> Result<Self::Responder, ResponderError>;
}
