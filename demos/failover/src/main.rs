//! Demo: two candidates race for one in-memory lease, the winner steps
//! down, and leadership fails over to the survivor.

use anyhow::{anyhow, Result};
use futures_util::FutureExt;
use leasekit_election::{wait, ElectionCallbacks, ElectionConfig, LeaderElector};
use leasekit_testing::InMemoryLockStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("starting two candidates against one lease slot");
    let store = InMemoryLockStore::new();

    let mut electors = Vec::new();
    let mut shutdowns = Vec::new();
    let mut handles = Vec::new();

    for i in 0..2 {
        let identity = format!("candidate-{}-{}", i, Uuid::new_v4());
        let mut config = ElectionConfig::new(Arc::new(store.lock_for(identity.clone())));
        config.lease_duration = Duration::from_secs(2);
        config.renew_timeout = Duration::from_secs(1);
        config.retry_period = Duration::from_millis(200);
        config.release_on_cancel = true;
        config.name = format!("demo-{}", i);

        let started_label = identity.clone();
        let stopped_label = identity.clone();
        config.callbacks = ElectionCallbacks {
            on_started_leading: Some(Arc::new(move |mut cancel: watch::Receiver<bool>| {
                let label = started_label.clone();
                async move {
                    info!("{} started leader-only work", label);
                    wait::cancelled(&mut cancel).await;
                    info!("{} winding down leader-only work", label);
                }
                .boxed()
            })),
            on_stopped_leading: Some(Arc::new(move || {
                info!("{} stopped leading", stopped_label);
            })),
            on_new_leader: Some(Arc::new(|leader| {
                info!("observed new leader: {}", leader);
            })),
        };

        let elector = Arc::new(LeaderElector::new(config)?);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        handles.push(tokio::spawn({
            let elector = Arc::clone(&elector);
            async move { elector.run(shutdown_rx).await }
        }));
        electors.push(elector);
        shutdowns.push(shutdown_tx);
    }

    tokio::time::sleep(Duration::from_secs(3)).await;
    let leader_index = electors
        .iter()
        .position(|elector| elector.is_leader())
        .ok_or_else(|| anyhow!("no candidate became leader"))?;
    info!("cancelling the current leader (candidate {})", leader_index);
    let _ = shutdowns[leader_index].send(true);
    handles.remove(leader_index).await?;

    // with release-on-cancel the slot frees immediately; the survivor
    // should pick it up within a few retry periods
    tokio::time::sleep(Duration::from_secs(2)).await;
    let survivor = &electors[1 - leader_index];
    info!(
        "survivor leads: {} (lease holder: {:?}, transitions: {:?})",
        survivor.is_leader(),
        store.record().map(|record| record.holder_identity),
        store.record().map(|record| record.leader_transitions),
    );

    for shutdown in &shutdowns {
        let _ = shutdown.send(true);
    }
    for handle in handles {
        handle.await?;
    }
    info!("demo finished");
    Ok(())
}
