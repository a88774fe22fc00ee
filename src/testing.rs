//! In-memory stand-ins for the cluster, shared by the unit tests.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use futures::{stream, StreamExt};
use k8s_openapi::api::{apps::v1::Deployment, core::v1::Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube_core::Resource;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::catalog::AppCatalog;
use crate::dispatch::ResourceHandler;
use crate::resource::{Envelope, StreamAppSpec};
use crate::store::{managed_selector, ClusterStore, GROUP_LABEL};
use crate::watch::{LineStream, WatchSource};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Added(String),
    Deleted(String),
}

/// Handler that remembers every notification and optionally forwards it to a channel.
#[derive(Default)]
pub struct RecordingHandler {
    notifications: Mutex<Vec<Notification>>,
    tx: Option<mpsc::UnboundedSender<Notification>>,
}

impl RecordingHandler {
    pub fn with_channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = Self {
            notifications: Mutex::default(),
            tx: Some(tx),
        };
        (handler, rx)
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    fn record(&self, notification: Notification) {
        self.notifications.lock().push(notification.clone());
        if let Some(tx) = &self.tx {
            let _ = tx.send(notification);
        }
    }
}

impl<S: Send> ResourceHandler<S> for RecordingHandler {
    async fn resource_added(&self, resource: Envelope<S>) {
        self.record(Notification::Added(resource.name().to_owned()));
    }

    async fn resource_deleted(&self, resource: Envelope<S>) {
        self.record(Notification::Deleted(resource.name().to_owned()));
    }
}

/// Watch source replaying one scripted response per connection, then hanging.
#[derive(Default)]
pub struct ScriptedSource {
    connections: Mutex<VecDeque<Vec<io::Result<String>>>>,
    connects: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(self, lines: Vec<io::Result<String>>) -> Self {
        self.connections.lock().push_back(lines);
        self
    }

    /// Number of connections opened so far.
    pub fn connects(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.connects)
    }
}

impl WatchSource for ScriptedSource {
    async fn connect(&self) -> Result<LineStream> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let next = self.connections.lock().pop_front();
        Ok(match next {
            Some(lines) => stream::iter(lines).boxed(),
            None => stream::pending().boxed(),
        })
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    apps: HashMap<String, StreamAppSpec>,
    lookups: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn with(mut self, name: &str, spec: StreamAppSpec) -> Self {
        self.apps.insert(name.to_owned(), spec);
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().clone()
    }
}

impl AppCatalog for FakeCatalog {
    async fn lookup(&self, name: &str) -> Result<Envelope<StreamAppSpec>> {
        self.lookups.lock().push(name.to_owned());
        match self.apps.get(name) {
            Some(spec) => Ok(Envelope::new(name, spec.clone())),
            None => Err(Error::AppNotFound(name.to_owned())),
        }
    }
}

#[derive(Default)]
struct StoreState {
    services: Vec<Service>,
    deployments: Vec<Deployment>,
    writes: Vec<String>,
    failing_deployments: HashSet<String>,
}

/// Cluster store keeping objects in memory. Clones share the same objects.
#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<Mutex<StoreState>>,
}

impl FakeStore {
    /// Adds a service as if something else had created it.
    pub fn insert_service(&self, service: Service) {
        self.state.lock().services.push(service);
    }

    /// Makes creating the named deployment fail.
    pub fn fail_deployment(&self, name: &str) {
        self.state.lock().failing_deployments.insert(name.to_owned());
    }

    pub fn service_names(&self) -> Vec<String> {
        self.state.lock().services.iter().map(name_of).collect()
    }

    pub fn deployment_names(&self) -> Vec<String> {
        self.state.lock().deployments.iter().map(name_of).collect()
    }

    pub fn service(&self, name: &str) -> Option<Service> {
        let state = self.state.lock();
        state.services.iter().find(|svc| name_of(*svc) == name).cloned()
    }

    pub fn deployment(&self, name: &str) -> Option<Deployment> {
        let state = self.state.lock();
        state.deployments.iter().find(|d| name_of(*d) == name).cloned()
    }

    /// Labels of every stored object.
    pub fn labels(&self) -> Vec<BTreeMap<String, String>> {
        let state = self.state.lock();
        let services = state.services.iter().map(labels_of);
        let deployments = state.deployments.iter().map(labels_of);
        services.chain(deployments).collect()
    }

    /// Successful writes in order, as `kind/name`.
    pub fn writes(&self) -> Vec<String> {
        self.state.lock().writes.clone()
    }
}

impl ClusterStore for FakeStore {
    async fn create_service(&self, service: Service) -> Result<()> {
        let mut state = self.state.lock();
        state.writes.push(format!("service/{}", name_of(&service)));
        state.services.push(service);
        Ok(())
    }

    async fn create_deployment(&self, deployment: Deployment) -> Result<()> {
        let mut state = self.state.lock();
        let name = name_of(&deployment);
        if state.failing_deployments.contains(&name) {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "apiserver unavailable").into());
        }
        state.writes.push(format!("deployment/{name}"));
        state.deployments.push(deployment);
        Ok(())
    }

    async fn delete_services(&self, selector: &str) -> Result<()> {
        self.state
            .lock()
            .services
            .retain(|svc| !matches_selector(svc, selector));
        Ok(())
    }

    async fn delete_deployments(&self, selector: &str) -> Result<()> {
        self.state
            .lock()
            .deployments
            .retain(|d| !matches_selector(d, selector));
        Ok(())
    }

    async fn groups(&self) -> Result<BTreeSet<String>> {
        let selector = managed_selector();
        let state = self.state.lock();
        let services = state.services.iter().filter(|svc| matches_selector(*svc, &selector));
        let deployments = state.deployments.iter().filter(|d| matches_selector(*d, &selector));
        Ok(services
            .map(labels_of)
            .chain(deployments.map(labels_of))
            .filter_map(|mut labels| labels.remove(GROUP_LABEL))
            .collect())
    }
}

pub fn labelled_service(name: &str, labels: &[(&str, &str)]) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            labels: Some(
                labels
                    .iter()
                    .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
                    .collect(),
            ),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn name_of<K: Resource>(object: &K) -> String {
    object.meta().name.clone().unwrap_or_default()
}

fn labels_of<K: Resource>(object: &K) -> BTreeMap<String, String> {
    object.meta().labels.clone().unwrap_or_default()
}

/// Matches a selector made of comma-separated `key=value` and `key` requirements.
fn matches_selector<K: Resource>(object: &K, selector: &str) -> bool {
    let labels = labels_of(object);
    selector
        .split(',')
        .all(|requirement| match requirement.split_once('=') {
            Some((key, value)) => labels.get(key).map(String::as_str) == Some(value),
            None => labels.contains_key(requirement),
        })
}
