use std::net::IpAddr;
use std::path::PathBuf;
use clap::Parser;
use shared::protocol::{self, DEFAULT_TTL};
use shared::types::RecordKind;

/// Publish CNAMEs pointing to the local host over Avahi/mDNS.
#[derive(Debug, Parser)]
#[command(name = "cname-publisherd", version)]
pub struct Cli {
    /// Names to publish, e.g. "printer.local"
    #[arg(required = true, value_name = "HOSTNAME.local", value_parser = parse_local_name)]
    pub names: Vec<String>,

    /// Set the TTL for all published records
    #[arg(short, long, value_name = "SECONDS", default_value_t = DEFAULT_TTL)]
    pub ttl: u32,

    /// Publish without checking if the names are already being published
    /// elsewhere on the network. Much faster, but generally unsafe.
    #[arg(short, long)]
    pub force: bool,

    /// Produce extra output for debugging purposes
    #[arg(short, long)]
    pub verbose: bool,

    /// Run the publishing service in the background
    #[arg(short, long)]
    pub daemon: bool,

    /// Send log messages into the specified file
    #[arg(short, long, value_name = "FILENAME")]
    pub log: Option<PathBuf>,

    /// Publish address records for this IP instead of CNAMEs
    #[arg(short, long, value_name = "IP")]
    pub address: Option<IpAddr>,
}

fn parse_local_name(raw: &str) -> Result<String, String> {
    protocol::normalize_local_name(raw).map_err(|e| e.to_string())
}

impl Cli {
    pub fn publisher_config(&self) -> PublisherConfig {
        let mut names: Vec<String> = Vec::with_capacity(self.names.len());
        for name in &self.names {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }

        PublisherConfig {
            names,
            ttl: self.ttl,
            force: self.force,
            address: self.address,
        }
    }
}

/// What the lifecycle publishes on every (re)connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherConfig {
    /// Normalized, de-duplicated names in command-line order
    pub names: Vec<String>,
    pub ttl: u32,
    pub force: bool,
    /// Publish address records for this IP; CNAMEs to this host otherwise
    pub address: Option<IpAddr>,
}

impl PublisherConfig {
    pub fn kind(&self) -> RecordKind {
        match self.address {
            Some(_) => RecordKind::Address,
            None => RecordKind::Cname,
        }
    }
}
