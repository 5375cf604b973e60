use async_trait::async_trait;
use shared::protocol::{IF_UNSPEC, PROTO_UNSPEC};
use zbus::{proxy, zvariant::OwnedObjectPath, Connection};
use crate::responder::{Connect, RecordGroup, Resolution, Responder, ResponderError};

const SERVICE_UNKNOWN: &str = "org.freedesktop.DBus.Error.ServiceUnknown";

#[proxy(
    interface = "org.freedesktop.Avahi.Server",
    default_service = "org.freedesktop.Avahi",
    default_path = "/"
)]
trait Server {
    fn get_version_string(&self) -> zbus::Result<String>;

    fn get_host_name_fqdn(&self) -> zbus::Result<String>;

    fn resolve_host_name(
        &self,
        interface: i32,
        protocol: i32,
        name: &str,
        aprotocol: i32,
        flags: u32,
    ) -> zbus::Result<(i32, i32, String, i32, String, u32)>;

    fn entry_group_new(&self) -> zbus::Result<OwnedObjectPath>;
}

#[proxy(
    interface = "org.freedesktop.Avahi.EntryGroup",
    default_service = "org.freedesktop.Avahi"
)]
trait EntryGroup {
    fn add_record(
        &self,
        interface: i32,
        protocol: i32,
        flags: u32,
        name: &str,
        clazz: u16,
        rtype: u16,
        ttl: u32,
        rdata: &[u8],
    ) -> zbus::Result<()>;

    fn add_address(
        &self,
        interface: i32,
        protocol: i32,
        flags: u32,
        name: &str,
        address: &str,
    ) -> zbus::Result<()>;

    fn commit(&self) -> zbus::Result<()>;

    fn reset(&self) -> zbus::Result<()>;
}

impl From<zbus::Error> for ResponderError {
    fn from(e: zbus::Error) -> Self {
        match e {
            zbus::Error::MethodError(name, message, _) => {
                if name.as_str() == SERVICE_UNKNOWN {
                    ResponderError::ServiceUnknown
                } else {
                    ResponderError::Rejected {
                        name: name.to_string(),
                        message: message.unwrap_or_default(),
                    }
                }
            }
            zbus::Error::FDO(fdo) if matches!(*fdo, zbus::fdo::Error::ServiceUnknown(_)) => {
                ResponderError::ServiceUnknown
            }
            other => ResponderError::Bus(other.to_string()),
        }
    }
}

/// Connects to Avahi over the system bus
#[derive(Debug, Clone, Default)]
pub struct AvahiConnector;

#[async_trait]
impl Connect for AvahiConnector {
    type Responder = AvahiResponder;

    async fn connect(&self) -> Result<AvahiResponder, ResponderError> {
        let conn = Connection::system().await?;
        let server = ServerProxy::new(&conn).await?;

        Ok(AvahiResponder { conn, server })
    }
}

/// Avahi daemon reached through one system bus connection
pub struct AvahiResponder {
    conn: Connection,
    server: ServerProxy<'static>,
}

#[async_trait]
impl Responder for AvahiResponder {
    type Group = AvahiEntryGroup;

    async fn version_string(&self) -> Result<String, ResponderError> {
        Ok(self.server.get_version_string().await?)
    }

    async fn host_name_fqdn(&self) -> Result<String, ResponderError> {
        Ok(self.server.get_host_name_fqdn().await?)
    }

    async fn resolve_host_name(&self, name: &str) -> Result<Resolution, ResponderError> {
        let (_, _, name, _, address, _) = self
            .server
            .resolve_host_name(IF_UNSPEC, PROTO_UNSPEC, name, PROTO_UNSPEC, 0)
            .await?;

        Ok(Resolution { name, address })
    }

    async fn new_group(&self) -> Result<AvahiEntryGroup, ResponderError> {
        let path = self.server.entry_group_new().await?;
        tracing::debug!("Created entry group {}", path.as_str());

        let proxy = EntryGroupProxy::builder(&self.conn)
            .path(path)?
            .build()
            .await?;

        Ok(AvahiEntryGroup { proxy })
    }
}

pub struct AvahiEntryGroup {
    proxy: EntryGroupProxy<'static>,
}

#[async_trait]
impl RecordGroup for AvahiEntryGroup {
    async fn add_record(
        &self,
        name: &str,
        class: u16,
        rtype: u16,
        ttl: u32,
        rdata: &[u8],
    ) -> Result<(), ResponderError> {
        self.proxy
            .add_record(IF_UNSPEC, PROTO_UNSPEC, 0, name, class, rtype, ttl, rdata)
            .await?;
        Ok(())
    }

    async fn add_address(
        &self,
        name: &str,
        flags: u32,
        address: &str,
    ) -> Result<(), ResponderError> {
        self.proxy
            .add_address(IF_UNSPEC, PROTO_UNSPEC, flags, name, address)
            .await?;
        Ok(())
    }

    async fn commit(&self) -> Result<(), ResponderError> {
        Ok(self.proxy.commit().await?)
    }

    async fn reset(&self) -> Result<(), ResponderError> {
        Ok(self.proxy.reset().await?)
    }
}
