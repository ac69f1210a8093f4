//! # Resolver Lifecycle
//!
//! Owns startup and graceful shutdown of the trust resolution pipeline:
//! leader election against the durable store, the push-channel subscription,
//! and the polling loop itself. A reader instance never reaches the polling
//! loop — it only holds the lock attempt open so it can take over if the
//! leader disappears.

use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{Config, Role};
use crate::error::Result;
use crate::indexer::http::subscribe;
use crate::polling;
use crate::provider::Provider;

/// A unique identifier for this process's leader-lock holder id. In a real
/// deployment this would be the pod/hostname; a random id is sufficient for
/// a single-process or test run.
fn holder_id() -> String {
    format!("resolver-{}", uuid::Uuid::new_v4())
}

/// Runs the resolver until `shutdown` fires: attempts to acquire leadership,
/// and if successful, drives the polling loop; releases the lock on exit.
/// A `Reader`-configured instance never attempts to acquire leadership.
pub async fn run<P: Provider>(provider: P, config: Config, shutdown: CancellationToken) -> Result<()> {
    let http_client = Client::builder().timeout(Duration::from_secs(30)).build().map_err(anyhow::Error::from)?;

    if config.role != Role::Leader {
        info!("running as reader, polling loop disabled");
        shutdown.cancelled().await;
        return Ok(());
    }

    let holder = holder_id();
    loop {
        if shutdown.is_cancelled() {
            return Ok(());
        }
        if provider.try_acquire(&holder).await? {
            break;
        }
        tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            () = tokio::time::sleep(Duration::from_secs(5)) => {}
        }
    }

    info!(holder = %holder, "acquired leader lock, starting polling loop");
    let events = subscribe(config.indexer_ws_url());
    polling::run_leader_loop(&provider, &http_client, &config, events, shutdown.clone()).await;

    info!("releasing leader lock");
    provider.release(&holder).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holder_ids_are_unique() {
        assert_ne!(holder_id(), holder_id());
    }
}
