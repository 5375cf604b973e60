use shared::protocol::{self, NameError, DNS_CLASS_IN, DNS_TYPE_CNAME, PUBLISH_NO_REVERSE};
use shared::types::RecordData;
use crate::registry::{PublicationRegistry, PublishedRecord};
use crate::responder::{RecordGroup, Responder, ResponderError};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("DNS entry '{name}' is already owned by '{owner}'")]
    Collision { name: String, owner: String },

    #[error("'{0}' is not published by this process")]
    NotPublished(String),

    #[error("invalid name '{name}': {source}")]
    InvalidName {
        name: String,
        #[source]
        source: NameError,
    },

    #[error(transparent)]
    Responder(#[from] ResponderError),
}

/// Publishes `.local` names through a responder daemon and remembers what it owns.
///
/// Records stay visible for as long as the responder connection lives. Call
/// [`Publisher::teardown`] to withdraw them before dropping the publisher.
pub struct Publisher<R: Responder> {
    responder: R,
    hostname: String,
    ttl: u32,
    registry: PublicationRegistry<R::Group>,
}

impl<R: Responder> Publisher<R> {
    /// Bind to a live responder and look up this machine's own FQDN once.
    pub async fn new(responder: R, ttl: u32) -> Result<Self, ResponderError> {
        let hostname = responder.host_name_fqdn().await?;
        tracing::debug!("Avahi mDNS publisher for: {}", hostname);

        Ok(Self {
            responder,
            hostname,
            ttl,
            registry: PublicationRegistry::new(),
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Number of records currently published
    pub fn count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_published(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn published_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// Look up the current owner of `name`; `None` if nobody answers.
    pub async fn resolve(&self, name: &str) -> Option<String> {
        match self.responder.resolve_host_name(name).await {
            Ok(resolution) => {
                tracing::debug!(
                    "'{}' is held by {} ({})",
                    name,
                    resolution.name,
                    resolution.address
                );
                Some(resolution.name)
            }
            Err(e) => {
                tracing::debug!("Could not resolve '{}': {}", name, e);
                None
            }
        }
    }

    /// Publish a CNAME pointing `name` at this machine
    pub async fn publish_cname(&mut self, name: &str, force: bool) -> bool {
        let data = RecordData::Cname(self.hostname.clone());
        self.publish(name, data, force).await
    }

    /// Publish `data` under `name`, logging any failure.
    ///
    /// Returns true when the record is registered on return.
    pub async fn publish(&mut self, name: &str, data: RecordData, force: bool) -> bool {
        match self.try_publish(name, data, force).await {
            Ok(()) => true,
            Err(e @ PublishError::Collision { .. }) => {
                tracing::error!("{}", e);
                false
            }
            Err(e) => {
                tracing::error!("Failed to publish '{}': {}", name, e);
                false
            }
        }
    }

    pub async fn try_publish(
        &mut self,
        name: &str,
        data: RecordData,
        force: bool,
    ) -> Result<(), PublishError> {
        protocol::validate_local_name(name).map_err(|source| PublishError::InvalidName {
            name: name.to_string(),
            source,
        })?;

        if let Some(existing) = self.registry.get(name) {
            if existing.data == data {
                tracing::debug!("'{}' is already published as {}", name, data);
                return Ok(());
            }
            tracing::debug!("Replacing '{}' ({} -> {})", name, existing.data, data);
        }

        if !force {
            // Unfortunately, this takes a few seconds in the expected case
            tracing::info!("Checking for '{}' availability...", name);

            if let Some(owner) = self.resolve(name).await {
                if !same_host(&owner, &self.hostname) {
                    return Err(PublishError::Collision {
                        name: name.to_string(),
                        owner,
                    });
                }
                tracing::warn!("DNS entry '{}' is already being published by this machine", name);
            }
        }

        // Encode before touching the daemon so a bad target leaves nothing behind
        let rdata = match &data {
            RecordData::Cname(target) => Some(protocol::fqdn_to_rdata(target).map_err(
                |source| PublishError::InvalidName {
                    name: target.clone(),
                    source,
                },
            )?),
            RecordData::Address(_) => None,
        };

        let group = self.responder.new_group().await?;
        if let Err(e) = self.fill_and_commit(&group, name, &data, rdata.as_deref()).await {
            // Uncommitted groups are invisible, but don't leave them on the daemon
            if let Err(reset_err) = group.reset().await {
                tracing::debug!("Could not discard group for '{}': {}", name, reset_err);
            }
            return Err(e.into());
        }

        tracing::info!("Published '{}' -> {}", name, data);
        let displaced = self
            .registry
            .insert(PublishedRecord::new(name.to_string(), data, self.ttl, group));

        // The old record is only withdrawn once its replacement is live
        if let Some(old) = displaced {
            match old.group().reset().await {
                Ok(()) => tracing::debug!("Withdrew previous {} for '{}'", old.data, name),
                Err(e) => tracing::warn!(
                    "Failed to withdraw previous {} for '{}': {}",
                    old.data,
                    name,
                    e
                ),
            }
        }

        Ok(())
    }

    async fn fill_and_commit(
        &self,
        group: &R::Group,
        name: &str,
        data: &RecordData,
        rdata: Option<&[u8]>,
    ) -> Result<(), ResponderError> {
        match (data, rdata) {
            (RecordData::Cname(target), Some(rdata)) => {
                tracing::debug!("Adding CNAME record {} -> {} (ttl {}s)", name, target, self.ttl);
                group
                    .add_record(name, DNS_CLASS_IN, DNS_TYPE_CNAME, self.ttl, rdata)
                    .await?;
            }
            _ => {
                let address = data.target();
                tracing::debug!("Adding name {} to address {}", name, address);
                group.add_address(name, PUBLISH_NO_REVERSE, &address).await?;
            }
        }

        group.commit().await
    }

    /// Withdraw `name` and forget it.
    ///
    /// Fails with [`PublishError::NotPublished`] if this process never published it.
    /// The entry is only forgotten once the daemon accepted the reset.
    pub async fn unpublish(&mut self, name: &str) -> Result<(), PublishError> {
        let record = self
            .registry
            .get(name)
            .ok_or_else(|| PublishError::NotPublished(name.to_string()))?;

        record.group().reset().await?;

        if let Some(record) = self.registry.remove(name) {
            let age = chrono::Utc::now() - record.published_at;
            tracing::info!(
                "Unpublished {} '{}' after {}s (ttl {}s)",
                record.kind(),
                name,
                age.num_seconds(),
                record.ttl
            );
        }
        Ok(())
    }

    /// Liveness probe against the responder daemon.
    ///
    /// `Ok(false)` only when the daemon is gone from the bus; other faults are
    /// returned to the caller.
    pub async fn is_available(&self) -> Result<bool, ResponderError> {
        match self.responder.version_string().await {
            Ok(_) => Ok(true),
            Err(e) if e.is_service_unknown() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Withdraw every published record.
    ///
    /// The registry is emptied first, so a second call resets nothing. A vanished
    /// daemon is tolerated; any other fault is returned after the remaining
    /// groups have been tried.
    pub async fn teardown(&mut self) -> Result<(), ResponderError> {
        let records = self.registry.drain();
        if records.is_empty() {
            return Ok(());
        }

        tracing::debug!("Withdrawing {} published record(s)", records.len());

        let mut first_error = None;
        for record in records {
            match record.group().reset().await {
                Ok(()) => tracing::debug!("Withdrew '{}'", record.name),
                Err(e) if e.is_service_unknown() => {
                    tracing::debug!("Responder already gone, '{}' went with it", record.name);
                }
                Err(e) => {
                    tracing::error!("Failed to withdraw '{}': {}", record.name, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Forget every record without calling the daemon.
    ///
    /// Used once the daemon has disappeared: its groups vanished with it.
    pub fn abandon(&mut self) -> usize {
        let records = self.registry.drain();
        for record in &records {
            tracing::debug!("Dropping stale record for '{}'", record.name);
        }
        records.len()
    }
}

impl<R: Responder> Drop for Publisher<R> {
    fn drop(&mut self) {
        if !self.registry.is_empty() {
            tracing::warn!(
                "Publisher dropped with {} record(s) still published: {}",
                self.count(),
                self.published_names().join(", ")
            );
        }
    }
}

/// Host names as reported by the daemon may differ in case or a trailing dot
fn same_host(a: &str, b: &str) -> bool {
    a.trim_end_matches('.')
        .eq_ignore_ascii_case(b.trim_end_matches('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockDaemon, MockEntry, MockResponder};
    use std::net::{IpAddr, Ipv4Addr};

    async fn publisher(daemon: &MockDaemon) -> Publisher<MockResponder> {
        Publisher::new(daemon.responder(), 60).await.unwrap()
    }

    #[tokio::test]
    async fn test_forced_publish_skips_resolution() {
        let daemon = MockDaemon::new("myhost.local");
        daemon.set_owner("a.local", "otherhost.local");
        let mut publisher = publisher(&daemon).await;

        assert!(publisher.publish_cname("a.local", true).await);

        assert!(daemon.state().resolve_calls.is_empty());
        assert_eq!(publisher.count(), 1);
        assert!(publisher.is_published("a.local"));

        let announced = daemon.announced();
        assert_eq!(announced.len(), 1);
        let (name, entry) = &announced[0];
        assert_eq!(name, "a.local");
        match entry {
            MockEntry::Record { class, rtype, ttl, rdata } => {
                assert_eq!((*class, *rtype, *ttl), (DNS_CLASS_IN, DNS_TYPE_CNAME, 60));
                assert_eq!(protocol::rdata_to_fqdn(rdata).unwrap(), "myhost.local");
            }
            other => panic!("unexpected entry: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_foreign_owner_blocks_publish() {
        let daemon = MockDaemon::new("myhost.local");
        daemon.set_owner("a.local", "otherhost.local");
        let mut publisher = publisher(&daemon).await;

        assert!(!publisher.publish_cname("a.local", false).await);

        assert_eq!(daemon.state().resolve_calls, vec!["a.local".to_string()]);
        assert_eq!(daemon.state().groups_created, 0);
        assert_eq!(publisher.count(), 0);

        let err = publisher
            .try_publish("a.local", RecordData::Cname("myhost.local".into()), false)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Collision { ref owner, .. } if owner == "otherhost.local"));
    }

    #[tokio::test]
    async fn test_self_owned_name_is_published() {
        let daemon = MockDaemon::new("myhost.local");
        daemon.set_owner("a.local", "MyHost.local.");
        let mut publisher = publisher(&daemon).await;

        assert!(publisher.publish_cname("a.local", false).await);
        assert!(publisher.is_published("a.local"));
    }

    #[tokio::test]
    async fn test_unresolvable_name_is_published() {
        let daemon = MockDaemon::new("myhost.local");
        let mut publisher = publisher(&daemon).await;

        assert!(publisher.publish_cname("free.local", false).await);
        assert_eq!(daemon.state().resolve_calls, vec!["free.local".to_string()]);
        assert_eq!(daemon.announced_names(), vec!["free.local"]);
    }

    #[tokio::test]
    async fn test_address_record_skips_reverse_entry() {
        let daemon = MockDaemon::new("myhost.local");
        let mut publisher = publisher(&daemon).await;
        let addr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 104));

        assert!(publisher.publish("nas.local", RecordData::Address(addr), true).await);

        let announced = daemon.announced();
        assert_eq!(
            announced[0].1,
            MockEntry::Address {
                flags: PUBLISH_NO_REVERSE,
                address: "192.168.1.104".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_daemon_failure_registers_nothing() {
        let daemon = MockDaemon::new("myhost.local");
        let mut publisher = publisher(&daemon).await;
        daemon.state().fail_commit = true;

        assert!(!publisher.publish_cname("a.local", true).await);
        assert_eq!(publisher.count(), 0);
        assert!(daemon.announced().is_empty());

        daemon.state().fail_commit = false;
        assert!(publisher.publish_cname("b.local", true).await);
        assert_eq!(publisher.published_names(), vec!["b.local"]);
    }

    #[tokio::test]
    async fn test_invalid_names_touch_nothing() {
        let daemon = MockDaemon::new("myhost.local");
        let mut publisher = publisher(&daemon).await;

        let err = publisher
            .try_publish("Not_Valid", RecordData::Cname("myhost.local".into()), true)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::InvalidName { .. }));

        let long_target = format!("{}.local", "x".repeat(64));
        let err = publisher
            .try_publish("a.local", RecordData::Cname(long_target), true)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::InvalidName { .. }));

        assert_eq!(daemon.state().groups_created, 0);
    }

    #[tokio::test]
    async fn test_republish_is_idempotent() {
        let daemon = MockDaemon::new("myhost.local");
        let mut publisher = publisher(&daemon).await;

        assert!(publisher.publish_cname("a.local", true).await);
        assert!(publisher.publish_cname("a.local", true).await);
        assert_eq!(daemon.state().groups_created, 1);

        let addr = RecordData::Address(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)));
        assert!(publisher.publish("a.local", addr, true).await);

        assert_eq!(daemon.state().groups_created, 2);
        assert_eq!(daemon.state().reset_calls, 1);
        assert_eq!(publisher.count(), 1);
        assert_eq!(daemon.announced().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_previous_record() {
        let daemon = MockDaemon::new("myhost.local");
        let mut publisher = publisher(&daemon).await;
        assert!(publisher.publish_cname("a.local", true).await);
        daemon.set_owner("a.local", "otherhost.local");

        let addr = RecordData::Address(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)));
        assert!(!publisher.publish("a.local", addr.clone(), false).await);

        assert!(publisher.is_published("a.local"));
        assert_eq!(daemon.state().reset_calls, 0);
        assert_eq!(daemon.state().groups_created, 1);
        assert!(matches!(daemon.announced()[0].1, MockEntry::Record { .. }));

        // Rejected by the daemon: only the new, uncommitted group is discarded
        daemon.state().fail_commit = true;
        assert!(!publisher.publish("a.local", addr, true).await);

        assert!(publisher.is_published("a.local"));
        assert_eq!(daemon.state().groups_created, 2);
        assert_eq!(daemon.state().reset_calls, 1);
        assert_eq!(daemon.announced_names(), vec!["a.local"]);
        assert!(matches!(daemon.announced()[0].1, MockEntry::Record { .. }));
    }

    #[tokio::test]
    async fn test_unpublish() {
        let daemon = MockDaemon::new("myhost.local");
        let mut publisher = publisher(&daemon).await;
        publisher.publish_cname("a.local", true).await;

        publisher.unpublish("a.local").await.unwrap();

        assert!(!publisher.is_published("a.local"));
        assert!(daemon.announced().is_empty());

        let err = publisher.unpublish("a.local").await.unwrap_err();
        assert!(matches!(err, PublishError::NotPublished(ref n) if n == "a.local"));
    }

    #[tokio::test]
    async fn test_availability_probe() {
        let daemon = MockDaemon::new("myhost.local");
        let publisher = publisher(&daemon).await;

        assert_eq!(publisher.is_available().await, Ok(true));

        daemon.state().gone = true;
        assert_eq!(publisher.is_available().await, Ok(false));

        daemon.state().gone = false;
        daemon.state().fault = Some("org.freedesktop.DBus.Error.AccessDenied".into());
        assert!(matches!(
            publisher.is_available().await,
            Err(ResponderError::Rejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_teardown_withdraws_everything() {
        let daemon = MockDaemon::new("myhost.local");
        let mut publisher = publisher(&daemon).await;
        publisher.publish_cname("a.local", true).await;
        publisher.publish_cname("b.local", true).await;

        publisher.teardown().await.unwrap();

        assert_eq!(publisher.count(), 0);
        assert!(daemon.announced().is_empty());
        assert_eq!(daemon.state().reset_calls, 2);
    }

    #[tokio::test]
    async fn test_teardown_twice_after_daemon_gone() {
        let daemon = MockDaemon::new("myhost.local");
        let mut publisher = publisher(&daemon).await;
        publisher.publish_cname("a.local", true).await;
        daemon.state().gone = true;

        publisher.teardown().await.unwrap();
        publisher.teardown().await.unwrap();

        assert_eq!(daemon.state().reset_calls, 1);
        assert_eq!(publisher.count(), 0);
    }

    #[tokio::test]
    async fn test_teardown_reports_other_faults() {
        let daemon = MockDaemon::new("myhost.local");
        let mut publisher = publisher(&daemon).await;
        publisher.publish_cname("a.local", true).await;
        publisher.publish_cname("b.local", true).await;
        daemon.state().fault = Some("org.freedesktop.DBus.Error.NoReply".into());

        let err = publisher.teardown().await.unwrap_err();

        assert!(!err.is_service_unknown());
        assert_eq!(daemon.state().reset_calls, 2);
        assert_eq!(publisher.count(), 0);
    }

    #[tokio::test]
    async fn test_abandon_makes_no_calls() {
        let daemon = MockDaemon::new("myhost.local");
        let mut publisher = publisher(&daemon).await;
        publisher.publish_cname("a.local", true).await;

        assert_eq!(publisher.abandon(), 1);
        assert_eq!(publisher.count(), 0);
        assert_eq!(daemon.state().reset_calls, 0);
    }
}
