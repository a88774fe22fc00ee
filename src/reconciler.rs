//! Expands a `Stream` into one service and one deployment per app.
//!
//! Every generated object is labelled with the pipeline name under
//! [`GROUP_LABEL`] and marked with [`MANAGED_BY_LABEL`]; removal deletes by
//! those labels and keeps no other record of what was created.

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{
            Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, Service, ServicePort,
            ServiceSpec,
        },
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta},
};
use serde_json::json;

use crate::catalog::AppCatalog;
use crate::config::{BusConfig, Config, WorkloadConfig};
use crate::dispatch::ResourceHandler;
use crate::resource::{App, Envelope, StreamSpec};
use crate::store::{group_selector, ClusterStore, GROUP_LABEL, MANAGED_BY_LABEL, MANAGER};
use crate::{Error, Result};

pub const APP_LABEL: &str = "app";
pub const TOPIC_LABEL: &str = "topic";

/// Result of applying one pipeline. Apps that failed do not roll back the ones created.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Composite names of the apps whose objects were submitted.
    pub created: Vec<String>,
    /// Composite names of the apps that could not be created, with the cause.
    pub failed: Vec<(String, Error)>,
}

pub struct Reconciler<C, St> {
    catalog: C,
    store: St,
    bus: BusConfig,
    workload: WorkloadConfig,
}

impl<C: AppCatalog, St: ClusterStore> Reconciler<C, St> {
    pub fn new(catalog: C, store: St, config: &Config) -> Self {
        Self {
            catalog,
            store,
            bus: config.bus.clone(),
            workload: config.workload.clone(),
        }
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    /// Creates the objects of every app in the pipeline, continuing past failed apps.
    pub async fn apply(&self, stream: &Envelope<StreamSpec>) -> Outcome {
        let pipeline = stream.name();
        let mut outcome = Outcome::default();

        for app in &stream.spec.apps {
            let name = app.composite_name();
            match self.apply_app(pipeline, &name, app).await {
                Ok(()) => outcome.created.push(name),
                Err(err) => {
                    log::error!("Failed to create app {name} of stream {pipeline}: {err}");
                    outcome.failed.push((name, err));
                }
            }
        }

        outcome
    }

    async fn apply_app(&self, pipeline: &str, name: &str, app: &App) -> Result<()> {
        let template = self.catalog.lookup(name).await?;
        log::info!(
            "Creating app {name} of stream {pipeline} using image {}",
            template.spec.image
        );

        let labels = labels(pipeline, name);
        self.store
            .create_service(self.build_service(name, &labels))
            .await?;
        let deployment = self.build_deployment(pipeline, name, &labels, &template.spec.image, app);
        self.store.create_deployment(deployment).await?;
        Ok(())
    }

    /// Deletes every service and deployment labelled with the pipeline name.
    ///
    /// Deployments are deleted even if deleting the services failed.
    pub async fn cleanup(&self, pipeline: &str) -> Result<()> {
        let selector = group_selector(pipeline);
        let services = self.store.delete_services(&selector).await;
        let deployments = self.store.delete_deployments(&selector).await;
        services.and(deployments)
    }

    /// Pipelines that already have objects in the cluster.
    pub async fn existing_pipelines(&self) -> Result<BTreeSet<String>> {
        self.store.groups().await
    }

    fn build_service(&self, name: &str, labels: &BTreeMap<String, String>) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                labels: Some(labels.clone()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                selector: Some(selector(name)),
                ports: Some(vec![ServicePort {
                    port: self.workload.port,
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn build_deployment(
        &self,
        pipeline: &str,
        name: &str,
        labels: &BTreeMap<String, String>,
        image: &str,
        app: &App,
    ) -> Deployment {
        let container = Container {
            name: name.to_owned(),
            image: Some(image.to_owned()),
            env: Some(self.env(pipeline, name)),
            args: Some(app.args()),
            ports: Some(vec![ContainerPort {
                container_port: self.workload.port,
                ..Default::default()
            }]),
            ..Default::default()
        };

        Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                labels: Some(labels.clone()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(self.workload.replicas),
                selector: LabelSelector {
                    match_labels: Some(selector(name)),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels.clone()),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Bus connection settings plus the binding of the app to the pipeline topic.
    fn env(&self, pipeline: &str, name: &str) -> Vec<EnvVar> {
        let topic = topic(pipeline);
        let bindings = if name.contains(&self.workload.source_marker) {
            json!({
                "spring.cloud.stream.bindings.output.producer.requiredGroups": pipeline,
                "spring.cloud.stream.bindings.output.destination": topic,
            })
        } else {
            json!({
                "spring.cloud.stream.bindings.input.group": pipeline,
                "spring.cloud.stream.bindings.input.destination": topic,
            })
        };

        [
            ("SPRING_APPLICATION_JSON", bindings.to_string()),
            ("SPRING_CLOUD_CONFIG_ENABLED", "false".to_owned()),
            ("ENDPOINTS_SHUTDOWN_ENABLED", "true".to_owned()),
            ("SPRING_RABBITMQ_HOST", format!("${{{}}}", self.bus.host_variable)),
            ("SPRING_RABBITMQ_PORT", self.bus.port.to_string()),
            ("SPRING_RABBITMQ_USERNAME", self.bus.username.clone()),
            ("SPRING_RABBITMQ_PASSWORD", self.bus.password.clone()),
        ]
        .into_iter()
        .map(|(name, value)| EnvVar {
            name: name.to_owned(),
            value: Some(value),
            value_from: None,
        })
        .collect()
    }
}

impl<C: AppCatalog, St: ClusterStore> ResourceHandler<StreamSpec> for Reconciler<C, St> {
    async fn resource_added(&self, stream: Envelope<StreamSpec>) {
        let outcome = self.apply(&stream).await;
        log::info!(
            "Applied stream {}: {} app(s) created, {} failed",
            stream.name(),
            outcome.created.len(),
            outcome.failed.len()
        );
    }

    async fn resource_deleted(&self, stream: Envelope<StreamSpec>) {
        match self.cleanup(stream.name()).await {
            Ok(()) => log::info!("Deleted objects of stream {}", stream.name()),
            Err(err) => log::error!("Failed to delete objects of stream {}: {err}", stream.name()),
        }
    }
}

/// Bus destination shared by all apps of a pipeline.
pub fn topic(pipeline: &str) -> String {
    format!("{pipeline}.data")
}

fn labels(pipeline: &str, name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (APP_LABEL.to_owned(), name.to_owned()),
        (GROUP_LABEL.to_owned(), pipeline.to_owned()),
        (TOPIC_LABEL.to_owned(), topic(pipeline)),
        (MANAGED_BY_LABEL.to_owned(), MANAGER.to_owned()),
    ])
}

fn selector(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_owned(), name.to_owned())])
}
