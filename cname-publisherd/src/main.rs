mod avahi;
mod config;
mod lifecycle;
mod logging;
mod publisher;
mod registry;
mod responder;
mod signals;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::Parser;
use daemonize::Daemonize;
use crate::avahi::AvahiConnector;
use crate::config::{Cli, PublisherConfig};
use crate::lifecycle::Lifecycle;
use crate::signals::{TerminationSignal, TerminationSignals};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.publisher_config();

    // Before detaching, so a relative log path lands where the user expects
    logging::init(cli.verbose, cli.log.as_deref())?;

    if cli.daemon {
        Daemonize::new()
            .working_directory("/")
            .start()
            .context("Failed to detach into the background")?;
    }

    let _process = tracing::info_span!("cname-publisherd", pid = std::process::id()).entered();

    tracing::info!("Avahi/mDNS publisher starting...");
    if config.force {
        tracing::info!("Forcing CNAME publishing without collision checks");
    }

    // One thread: the poll loop and the signal path never run concurrently
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    let signal = runtime.block_on(run(config))?;
    tracing::info!("Stopped on {}", signal);

    std::process::exit(0);
}

async fn run(config: PublisherConfig) -> Result<TerminationSignal> {
    let mut signals =
        TerminationSignals::install().context("Failed to install signal handlers")?;

    let lifecycle = Lifecycle::new(AvahiConnector, config);
    let signal = lifecycle
        .run(async move { signals.recv().await })
        .await
        .context("mDNS publisher failed")?;

    Ok(signal)
}
