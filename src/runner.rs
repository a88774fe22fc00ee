use std::collections::BTreeSet;

use kube_client::Client;
use tokio_util::sync::CancellationToken;

use crate::catalog::{ApiAppCatalog, AppCatalog};
use crate::config::Config;
use crate::dispatch::EventDispatcher;
use crate::queue::KeyedQueue;
use crate::reconciler::Reconciler;
use crate::resource::StreamSpec;
use crate::store::{ClusterStore, KubeStore};
use crate::watch::{ApiWatchSource, WatchSource, WatchStream};
use crate::Result;

/// Reconciles `Stream` resources of the cluster behind `client` until `shutdown` is cancelled.
pub async fn run(client: Client, config: Config, shutdown: CancellationToken) -> Result<()> {
    let source = ApiWatchSource::new(client.clone(), &config.api);
    let catalog = ApiAppCatalog::new(client.clone(), &config.api);
    let store = KubeStore::new(client, &config.api.namespace);
    run_with(source, catalog, store, config, shutdown).await
}

/// [`run`] against arbitrary collaborators.
pub async fn run_with<Src, C, St>(
    source: Src,
    catalog: C,
    store: St,
    config: Config,
    shutdown: CancellationToken,
) -> Result<()>
where
    Src: WatchSource,
    C: AppCatalog + 'static,
    St: ClusterStore + 'static,
{
    let reconciler = Reconciler::new(catalog, store, &config);

    let existing = if config.seed_from_cluster {
        reconciler.existing_pipelines().await?
    } else {
        BTreeSet::new()
    };
    log::info!("Found {} existing stream(s) in the cluster", existing.len());

    let mut dispatcher = EventDispatcher::<StreamSpec, _>::new(KeyedQueue::new(
        reconciler,
        config.queue_capacity,
    ));
    dispatcher.seed(existing);

    let mut watch = WatchStream::new(source, dispatcher, config.watch.clone());
    watch.start();
    log::info!("Watching {}", config.api.streams_path());

    shutdown.cancelled().await;
    watch.stop();
    log::info!("Stopped watching {}", config.api.streams_path());

    Ok(())
}
