//! In-memory stand-in for the responder daemon

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use async_trait::async_trait;
use crate::responder::{Connect, RecordGroup, Resolution, Responder, ResponderError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEntry {
    Record {
        class: u16,
        rtype: u16,
        ttl: u32,
        rdata: Vec<u8>,
    },
    Address {
        flags: u32,
        address: String,
    },
}

#[derive(Debug, Default)]
pub struct MockState {
    pub hostname: String,
    /// name -> host reported when resolving it
    pub owners: HashMap<String, String>,
    /// Daemon dropped off the bus
    pub gone: bool,
    /// Every call fails with this D-Bus error name
    pub fault: Option<String>,
    pub fail_commit: bool,
    pub refuse_connect: bool,

    pub connects: usize,
    pub resolve_calls: Vec<String>,
    pub groups_created: usize,
    pub reset_calls: usize,
    /// Committed entries by group id
    pub announced: HashMap<usize, Vec<(String, MockEntry)>>,
}

impl MockState {
    fn check(&self) -> Result<(), ResponderError> {
        if self.gone {
            return Err(ResponderError::ServiceUnknown);
        }
        match &self.fault {
            Some(name) => Err(ResponderError::Rejected {
                name: name.clone(),
                message: "injected fault".to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[derive(Clone)]
pub struct MockDaemon {
    state: Arc<Mutex<MockState>>,
}

impl MockDaemon {
    pub fn new(hostname: &str) -> Self {
        let state = MockState {
            hostname: hostname.to_string(),
            ..MockState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn set_owner(&self, name: &str, owner: &str) {
        self.state().owners.insert(name.to_string(), owner.to_string());
    }

    pub fn responder(&self) -> MockResponder {
        MockResponder {
            state: self.state.clone(),
        }
    }

    pub fn connector(&self) -> MockConnector {
        MockConnector {
            state: self.state.clone(),
        }
    }

    /// Everything currently visible on the network, sorted by name
    pub fn announced(&self) -> Vec<(String, MockEntry)> {
        let mut entries: Vec<_> = self.state().announced.values().flatten().cloned().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn announced_names(&self) -> Vec<String> {
        self.announced().into_iter().map(|(name, _)| name).collect()
    }

    /// Daemon restart: it comes back with none of the old groups
    pub fn restart(&self) {
        let mut state = self.state();
        state.gone = false;
        state.announced.clear();
    }
}

pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl Connect for MockConnector {
    type Responder = MockResponder;

    async fn connect(&self) -> Result<MockResponder, ResponderError> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_connect {
            return Err(ResponderError::Bus("connection refused".to_string()));
        }
        state.connects += 1;

        Ok(MockResponder {
            state: self.state.clone(),
        })
    }
}

pub struct MockResponder {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl Responder for MockResponder {
    type Group = MockGroup;

    async fn version_string(&self) -> Result<String, ResponderError> {
        self.state.lock().unwrap().check()?;
        Ok("avahi 0.8".to_string())
    }

    async fn host_name_fqdn(&self) -> Result<String, ResponderError> {
        let state = self.state.lock().unwrap();
        state.check()?;
        Ok(state.hostname.clone())
    }

    async fn resolve_host_name(&self, name: &str) -> Result<Resolution, ResponderError> {
        let mut state = self.state.lock().unwrap();
        state.check()?;
        state.resolve_calls.push(name.to_string());

        match state.owners.get(name) {
            Some(owner) => Ok(Resolution {
                name: owner.clone(),
                address: "192.0.2.1".to_string(),
            }),
            None => Err(ResponderError::Rejected {
                name: "org.freedesktop.Avahi.TimeoutError".to_string(),
                message: "Timeout reached".to_string(),
            }),
        }
    }

    async fn new_group(&self) -> Result<MockGroup, ResponderError> {
        let mut state = self.state.lock().unwrap();
        state.check()?;
        state.groups_created += 1;

        Ok(MockGroup {
            id: state.groups_created,
            state: self.state.clone(),
            pending: Mutex::new(Vec::new()),
        })
    }
}

pub struct MockGroup {
    id: usize,
    state: Arc<Mutex<MockState>>,
    pending: Mutex<Vec<(String, MockEntry)>>,
}

#[async_trait]
impl RecordGroup for MockGroup {
    async fn add_record(
        &self,
        name: &str,
        class: u16,
        rtype: u16,
        ttl: u32,
        rdata: &[u8],
    ) -> Result<(), ResponderError> {
        self.state.lock().unwrap().check()?;
        let entry = MockEntry::Record {
            class,
            rtype,
            ttl,
            rdata: rdata.to_vec(),
        };
        self.pending.lock().unwrap().push((name.to_string(), entry));
        Ok(())
    }

    async fn add_address(
        &self,
        name: &str,
        flags: u32,
        address: &str,
    ) -> Result<(), ResponderError> {
        self.state.lock().unwrap().check()?;
        if address.parse::<std::net::IpAddr>().is_err() {
            return Err(ResponderError::Rejected {
                name: "org.freedesktop.Avahi.InvalidAddressError".to_string(),
                message: format!("Invalid address: {}", address),
            });
        }
        let entry = MockEntry::Address {
            flags,
            address: address.to_string(),
        };
        self.pending.lock().unwrap().push((name.to_string(), entry));
        Ok(())
    }

    async fn commit(&self) -> Result<(), ResponderError> {
        let mut state = self.state.lock().unwrap();
        state.check()?;
        if state.fail_commit {
            return Err(ResponderError::Rejected {
                name: "org.freedesktop.Avahi.CollisionError".to_string(),
                message: "Local name collision".to_string(),
            });
        }
        let entries = std::mem::take(&mut *self.pending.lock().unwrap());
        state.announced.insert(self.id, entries);
        Ok(())
    }

    async fn reset(&self) -> Result<(), ResponderError> {
        let mut state = self.state.lock().unwrap();
        state.reset_calls += 1;
        state.check()?;
        state.announced.remove(&self.id);
        self.pending.lock().unwrap().clear();
        Ok(())
    }
}
