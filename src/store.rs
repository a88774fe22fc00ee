//! Writes generated objects to the cluster.

use std::{collections::BTreeSet, future::Future};

use k8s_openapi::api::{apps::v1::Deployment, core::v1::Service};
use kube_client::{
    api::{DeleteParams, ListParams, PostParams},
    Api, Client,
};
use kube_core::Resource;

use crate::Result;

/// Label carrying the pipeline name on every generated object.
pub const GROUP_LABEL: &str = "group";

/// Label marking objects as created by this controller.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGER: &str = "stream-controller";

/// Label selector matching every object generated for `pipeline`.
pub fn group_selector(pipeline: &str) -> String {
    format!("{MANAGED_BY_LABEL}={MANAGER},{GROUP_LABEL}={pipeline}")
}

/// Label selector matching generated objects of any pipeline.
pub fn managed_selector() -> String {
    format!("{MANAGED_BY_LABEL}={MANAGER},{GROUP_LABEL}")
}

/// The operations the reconciler needs from the cluster.
pub trait ClusterStore: Send + Sync {
    fn create_service(&self, service: Service) -> impl Future<Output = Result<()>> + Send;

    fn create_deployment(&self, deployment: Deployment) -> impl Future<Output = Result<()>> + Send;

    fn delete_services(&self, selector: &str) -> impl Future<Output = Result<()>> + Send;

    fn delete_deployments(&self, selector: &str) -> impl Future<Output = Result<()>> + Send;

    /// Values of the [`GROUP_LABEL`] found on services and deployments this controller created.
    fn groups(&self) -> impl Future<Output = Result<BTreeSet<String>>> + Send;
}

/// [`ClusterStore`] backed by the apiserver, scoped to one namespace.
pub struct KubeStore {
    services: Api<Service>,
    deployments: Api<Deployment>,
}

impl KubeStore {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            services: Api::namespaced(client.clone(), namespace),
            deployments: Api::namespaced(client, namespace),
        }
    }
}

impl ClusterStore for KubeStore {
    async fn create_service(&self, service: Service) -> Result<()> {
        self.services.create(&PostParams::default(), &service).await?;
        Ok(())
    }

    async fn create_deployment(&self, deployment: Deployment) -> Result<()> {
        self.deployments
            .create(&PostParams::default(), &deployment)
            .await?;
        Ok(())
    }

    async fn delete_services(&self, selector: &str) -> Result<()> {
        self.services
            .delete_collection(&DeleteParams::default(), &ListParams::default().labels(selector))
            .await?;
        Ok(())
    }

    async fn delete_deployments(&self, selector: &str) -> Result<()> {
        self.deployments
            .delete_collection(&DeleteParams::default(), &ListParams::default().labels(selector))
            .await?;
        Ok(())
    }

    async fn groups(&self) -> Result<BTreeSet<String>> {
        let params = ListParams::default().labels(&managed_selector());
        let services = self.services.list(&params).await?;
        let deployments = self.deployments.list(&params).await?;

        let mut groups = BTreeSet::new();
        groups.extend(services.items.iter().filter_map(group_of));
        groups.extend(deployments.items.iter().filter_map(group_of));
        Ok(groups)
    }
}

fn group_of<K: Resource>(object: &K) -> Option<String> {
    object.meta().labels.as_ref()?.get(GROUP_LABEL).cloned()
}
