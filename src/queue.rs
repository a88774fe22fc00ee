//! Bounded work queue keyed by resource name.
//!
//! Jobs for the same name run one after another in submission order, each
//! waiting for its predecessor before it starts. Jobs for different names run
//! concurrently. At most `capacity` jobs are queued or running; further
//! submissions wait, which in turn holds up the watch that feeds the queue.

use std::{collections::HashMap, future::Future, sync::Arc};

use parking_lot::Mutex;
use tokio::{sync::Semaphore, task::JoinHandle};

use crate::dispatch::ResourceHandler;
use crate::resource::Envelope;

pub struct KeyedQueue<H> {
    handler: Arc<H>,
    permits: Arc<Semaphore>,
    /// Most recently submitted job per name; earlier jobs are awaited by it.
    tails: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl<H: Send + Sync + 'static> KeyedQueue<H> {
    pub fn new(handler: H, capacity: usize) -> Self {
        Self {
            handler: Arc::new(handler),
            permits: Arc::new(Semaphore::new(capacity.max(1))),
            tails: Mutex::new(HashMap::new()),
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    async fn submit<F, Fut>(&self, key: String, job: F)
    where
        F: FnOnce(Arc<H>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
            // The semaphore is never closed.
            return;
        };

        let mut tails = self.tails.lock();
        tails.retain(|_, tail| !tail.is_finished());

        let prev = tails.remove(&key);
        let handler = Arc::clone(&self.handler);
        let name = key.clone();
        let tail = tokio::spawn(async move {
            if let Some(prev) = prev {
                if let Err(err) = prev.await {
                    log::error!("Previous job for {name} did not complete: {err}");
                }
            }
            job(handler).await;
            drop(permit);
        });
        tails.insert(key, tail);
    }

    /// Waits for every job submitted so far.
    pub async fn drain(&self) {
        let tails: Vec<_> = self.tails.lock().drain().map(|(_, tail)| tail).collect();
        for tail in tails {
            if let Err(err) = tail.await {
                log::error!("Queued job did not complete: {err}");
            }
        }
    }
}

impl<S, H> ResourceHandler<S> for KeyedQueue<H>
where
    S: Send + 'static,
    H: ResourceHandler<S> + 'static,
{
    async fn resource_added(&self, resource: Envelope<S>) {
        let key = resource.name().to_owned();
        self.submit(key, move |handler| async move {
            handler.resource_added(resource).await;
        })
        .await;
    }

    async fn resource_deleted(&self, resource: Envelope<S>) {
        let key = resource.name().to_owned();
        self.submit(key, move |handler| async move {
            handler.resource_deleted(resource).await;
        })
        .await;
    }
}
