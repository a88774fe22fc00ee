use std::time::Duration;

/// Settings for [`run`](crate::run).
#[derive(Debug, Clone)]
pub struct Config {
    /// Where the custom resources live.
    pub api: ApiConfig,
    /// How generated workloads reach the message bus.
    pub bus: BusConfig,
    /// Shape of the generated services and deployments.
    pub workload: WorkloadConfig,
    /// Reconnect policy of the watch.
    pub watch: WatchConfig,
    /// Maximum number of reconciliations in flight before the watch stops reading.
    pub queue_capacity: usize,
    /// Seed the known pipeline names from `group` labels found in the cluster on startup.
    pub seed_from_cluster: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            bus: BusConfig::default(),
            workload: WorkloadConfig::default(),
            watch: WatchConfig::default(),
            queue_capacity: 16,
            seed_from_cluster: true,
        }
    }
}

/// Coordinates of the `Stream` and `StreamApp` resources.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub group: String,
    pub version: String,
    /// Namespace for StreamApp lookups and generated objects.
    pub namespace: String,
    /// Plural of the watched pipeline resource.
    pub streams: String,
    /// Plural of the app template resource.
    pub stream_apps: String,
}

impl ApiConfig {
    /// Cluster-wide collection path of the watched resource.
    pub fn streams_path(&self) -> String {
        format!("/apis/{}/{}/{}", self.group, self.version, self.streams)
    }

    /// Namespaced collection path of the app templates.
    pub fn stream_apps_path(&self) -> String {
        format!(
            "/apis/{}/{}/namespaces/{}/{}",
            self.group, self.version, self.namespace, self.stream_apps
        )
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            group: "extensions.diolkos.io".into(),
            version: "v1".into(),
            namespace: "default".into(),
            streams: "streams".into(),
            stream_apps: "streamapps".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Environment variable the bus host is resolved from inside the pod.
    pub host_variable: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host_variable: "DIOLKOS_RABBITMQ_SERVICE_HOST".into(),
            port: 5672,
            username: "user".into(),
            password: "rabbit".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    pub replicas: i32,
    /// Service port, also exposed as the container port.
    pub port: i32,
    /// Apps whose composite name contains this marker produce to the pipeline topic;
    /// all others consume from it.
    pub source_marker: String,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            replicas: 1,
            port: 8080,
            source_marker: "source".into(),
        }
    }
}

/// Delay before reconnecting after a failed watch connection.
///
/// Connections that end cleanly or time out reconnect immediately.
/// A zero `initial_backoff` disables the delay altogether.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}
