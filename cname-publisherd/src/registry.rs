use std::collections::HashMap;
use chrono::{DateTime, Utc};
use shared::types::{RecordData, RecordKind};

/// One name this process currently asserts on the network
pub struct PublishedRecord<G> {
    pub name: String,
    pub data: RecordData,
    pub ttl: u32,
    pub published_at: DateTime<Utc>,
    group: G,
}

impl<G> PublishedRecord<G> {
    pub fn new(name: String, data: RecordData, ttl: u32, group: G) -> Self {
        Self {
            name,
            data,
            ttl,
            published_at: Utc::now(),
            group,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.data.kind()
    }

    /// Responder-side group holding this record
    pub fn group(&self) -> &G {
        &self.group
    }
}

/// Published name -> record, at most one entry per name
pub struct PublicationRegistry<G> {
    records: HashMap<String, PublishedRecord<G>>,
}

impl<G> Default for PublicationRegistry<G> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
        }
    }
}

impl<G> PublicationRegistry<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a committed record, handing back any entry it displaced
    pub fn insert(&mut self, record: PublishedRecord<G>) -> Option<PublishedRecord<G>> {
        self.records.insert(record.name.clone(), record)
    }

    pub fn get(&self, name: &str) -> Option<&PublishedRecord<G>> {
        self.records.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<PublishedRecord<G>> {
        self.records.remove(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Published names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.records.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Remove every entry, sorted by name
    pub fn drain(&mut self) -> Vec<PublishedRecord<G>> {
        let mut records: Vec<_> = self.records.drain().map(|(_, r)| r).collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }
}
