//! Turns raw watch events into add/remove notifications.

use std::{collections::HashSet, future::Future, marker::PhantomData};

use crate::resource::{Envelope, WatchEvent};

/// Receives de-duplicated notifications for one resource kind.
pub trait ResourceHandler<S>: Send + Sync {
    /// A resource was seen for the first time.
    fn resource_added(&self, resource: Envelope<S>) -> impl Future<Output = ()> + Send;

    /// A previously added resource was deleted.
    fn resource_deleted(&self, resource: Envelope<S>) -> impl Future<Output = ()> + Send;
}

/// Forwards added/deleted events to a [`ResourceHandler`] at most once per name.
///
/// The set of known names is owned by the dispatcher; it is only ever driven by
/// the single watch worker of its resource kind.
pub struct EventDispatcher<S, H> {
    handler: H,
    known: HashSet<String>,
    _ph: PhantomData<fn() -> S>,
}

impl<S, H: ResourceHandler<S>> EventDispatcher<S, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            known: HashSet::new(),
            _ph: PhantomData,
        }
    }

    /// Marks names as already handled, e.g. pipelines found in the cluster on startup.
    pub fn seed(&mut self, names: impl IntoIterator<Item = String>) {
        self.known.extend(names);
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub async fn on_event(&mut self, event: WatchEvent<S>) {
        match event {
            WatchEvent::Added(resource) => {
                if self.known.insert(resource.name().to_owned()) {
                    log::info!("{} added", resource.name());
                    self.handler.resource_added(resource).await;
                } else {
                    log::debug!("Ignoring repeated add of {}", resource.name());
                }
            }
            WatchEvent::Deleted(resource) => {
                if self.known.remove(resource.name()) {
                    log::info!("{} deleted", resource.name());
                    self.handler.resource_deleted(resource).await;
                } else {
                    log::debug!("Ignoring delete of unknown {}", resource.name());
                }
            }
            event => log::debug!("Dropping unhandled {} event", event.kind()),
        }
    }
}
