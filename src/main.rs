use std::time::Duration;

use clap::Parser;
use kube_client::Client;
use stream_controller::{
    config::{ApiConfig, BusConfig, WatchConfig, WorkloadConfig},
    Config,
};
use tokio_util::sync::CancellationToken;

/// Creates a deployment and service for every app of every `Stream` resource.
#[derive(Parser, Debug)]
#[command(name = "stream-controller", version)]
struct Args {
    /// API group of the Stream and StreamApp resources
    #[arg(long, env = "STREAM_API_GROUP", default_value = "extensions.diolkos.io")]
    api_group: String,

    #[arg(long, env = "STREAM_API_VERSION", default_value = "v1")]
    api_version: String,

    /// Namespace of the StreamApp templates and the generated objects
    #[arg(long, env = "STREAM_NAMESPACE", default_value = "default")]
    namespace: String,

    /// Variable the message bus host is read from inside each app
    #[arg(long, env = "BUS_HOST_VARIABLE", default_value = "DIOLKOS_RABBITMQ_SERVICE_HOST")]
    bus_host_variable: String,

    #[arg(long, env = "BUS_PORT", default_value_t = 5672)]
    bus_port: u16,

    #[arg(long, env = "BUS_USERNAME", default_value = "user")]
    bus_username: String,

    #[arg(long, env = "BUS_PASSWORD", default_value = "rabbit", hide_env_values = true)]
    bus_password: String,

    #[arg(long, env = "APP_REPLICAS", default_value_t = 1)]
    replicas: i32,

    /// Port exposed by every app and its service
    #[arg(long, env = "APP_PORT", default_value_t = 8080)]
    app_port: i32,

    /// Apps whose `<name>-<type>` contains this marker are wired as sources
    #[arg(long, env = "SOURCE_MARKER", default_value = "source")]
    source_marker: String,

    /// Delay before the first reconnect after a failed watch, in milliseconds
    #[arg(long, env = "WATCH_INITIAL_BACKOFF_MS", default_value_t = 500)]
    watch_initial_backoff_ms: u64,

    #[arg(long, env = "WATCH_MAX_BACKOFF_MS", default_value_t = 30_000)]
    watch_max_backoff_ms: u64,

    /// Reconciliations allowed in flight before the watch stops reading
    #[arg(long, env = "QUEUE_CAPACITY", default_value_t = 16)]
    queue_capacity: usize,

    /// Do not treat streams with existing objects as already applied on startup
    #[arg(long, env = "NO_SEED")]
    no_seed: bool,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            api: ApiConfig {
                group: args.api_group,
                version: args.api_version,
                namespace: args.namespace,
                ..Default::default()
            },
            bus: BusConfig {
                host_variable: args.bus_host_variable,
                port: args.bus_port,
                username: args.bus_username,
                password: args.bus_password,
            },
            workload: WorkloadConfig {
                replicas: args.replicas,
                port: args.app_port,
                source_marker: args.source_marker,
            },
            watch: WatchConfig {
                initial_backoff: Duration::from_millis(args.watch_initial_backoff_ms),
                max_backoff: Duration::from_millis(args.watch_max_backoff_ms),
            },
            queue_capacity: args.queue_capacity,
            seed_from_cluster: !args.no_seed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from(Args::parse());
    let client = Client::try_default().await?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => shutdown.cancel(),
                Err(err) => log::error!("Failed to listen for shutdown signal: {err}"),
            }
        }
    });

    stream_controller::run(client, config, shutdown).await?;
    Ok(())
}
