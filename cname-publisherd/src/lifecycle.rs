use std::fmt;
use std::future::Future;
use std::time::Duration;
use shared::types::{RecordData, RecordKind};
use tokio::time::{interval, sleep, MissedTickBehavior};
use crate::config::PublisherConfig;
use crate::publisher::Publisher;
use crate::responder::{Connect, ResponderError};
use crate::signals::TerminationSignal;

/// How often the responder connection is probed
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Time the responder gets to announce withdrawals before we exit
pub const GRACE_DELAY: Duration = Duration::from_secs(1);

/// Outcome of one publish pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishSummary {
    pub published: usize,
    pub requested: usize,
    pub kind: RecordKind,
}

impl PublishSummary {
    pub fn is_complete(&self) -> bool {
        self.published == self.requested
    }
}

impl fmt::Display for PublishSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            RecordKind::Cname => "CNAMEs",
            RecordKind::Address => "addresses",
        };
        if self.is_complete() {
            write!(f, "All {} published", what)
        } else {
            write!(f, "{} out of {} {} published", self.published, self.requested, what)
        }
    }
}

/// Keeps the configured names published across responder restarts.
///
/// Disconnected (no publisher) or Connected (publisher whose daemon answers
/// the liveness probe). Every reconnect builds a fresh publisher and
/// republishes everything.
pub struct Lifecycle<C: Connect> {
    connector: C,
    config: PublisherConfig,
    publisher: Option<Publisher<C::Responder>>,
    ever_connected: bool,
}

impl<C: Connect> Lifecycle<C> {
    pub fn new(connector: C, config: PublisherConfig) -> Self {
        Self {
            connector,
            config,
            publisher: None,
            ever_connected: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.publisher.is_some()
    }

    #[cfg(test)]
    pub fn publisher(&self) -> Option<&Publisher<C::Responder>> {
        self.publisher.as_ref()
    }

    /// Poll the responder until `shutdown` resolves, then withdraw everything.
    ///
    /// The first connection failure and any unexpected responder fault end the
    /// loop with an error.
    pub async fn run<S>(mut self, shutdown: S) -> Result<TerminationSignal, ResponderError>
    where
        S: Future<Output = TerminationSignal>,
    {
        tokio::pin!(shutdown);

        let mut ticker = interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                signal = &mut shutdown => {
                    self.shutdown(signal).await?;
                    return Ok(signal);
                }
                _ = ticker.tick() => self.poll().await?,
            }
        }
    }

    /// One step of the loop: nothing while connected, full reconnect otherwise.
    pub async fn poll(&mut self) -> Result<(), ResponderError> {
        let connected = match &self.publisher {
            Some(publisher) => publisher.is_available().await?,
            None => false,
        };

        if !connected {
            self.reconnect().await?;
        }
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<(), ResponderError> {
        if let Some(mut stale) = self.publisher.take() {
            tracing::warn!("Lost connection to the mDNS responder");
            stale.abandon();
        }

        let publisher = match self.connect().await {
            Ok(publisher) => publisher,
            Err(e) if self.ever_connected => {
                tracing::warn!("mDNS responder still unavailable: {}", e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            "Connected to the mDNS responder as {} (ttl {}s)",
            publisher.hostname(),
            publisher.ttl()
        );
        self.ever_connected = true;
        self.publisher = Some(publisher);

        let summary = self.publish_all().await;
        if summary.is_complete() {
            tracing::info!("{}", summary);
        } else {
            tracing::warn!("{}", summary);
        }
        Ok(())
    }

    async fn connect(&self) -> Result<Publisher<C::Responder>, ResponderError> {
        let responder = self.connector.connect().await?;
        Publisher::new(responder, self.config.ttl).await
    }

    /// Publish every configured name once, in order.
    ///
    /// Failed names are logged and skipped; they are only retried on the next
    /// reconnect.
    pub async fn publish_all(&mut self) -> PublishSummary {
        let requested = self.config.names.len();
        let kind = self.config.kind();

        let Some(publisher) = self.publisher.as_mut() else {
            return PublishSummary {
                published: 0,
                requested,
                kind,
            };
        };

        for name in &self.config.names {
            match self.config.address {
                Some(addr) => {
                    publisher
                        .publish(name, RecordData::Address(addr), self.config.force)
                        .await
                }
                None => publisher.publish_cname(name, self.config.force).await,
            };
        }

        let published = self
            .config
            .names
            .iter()
            .filter(|name| publisher.is_published(name))
            .count();
        tracing::debug!("{} record(s) held in total", publisher.count());

        PublishSummary {
            published,
            requested,
            kind,
        }
    }

    /// Withdraw every record, then give the responder time to announce it.
    pub async fn shutdown(&mut self, signal: TerminationSignal) -> Result<(), ResponderError> {
        tracing::debug!("Cleaning up on {}...", signal);

        if !self.is_connected() {
            tracing::debug!("Not connected to the mDNS responder, nothing to withdraw");
        }
        if let Some(publisher) = self.publisher.as_mut() {
            publisher.teardown().await?;
        }

        sleep(GRACE_DELAY).await;
        Ok(())
    }
}
