use futures::{AsyncBufReadExt, StreamExt};
use kube_client::Client;
use kube_core::{params::WatchParams, Request};

use super::{LineStream, WatchSource};
use crate::config::ApiConfig;
use crate::Result;

/// Watches the cluster-wide collection of a custom resource through the apiserver.
///
/// Every connection starts from the current state; no resource version is carried
/// over between connections.
pub struct ApiWatchSource {
    client: Client,
    path: String,
}

impl ApiWatchSource {
    pub fn new(client: Client, api: &ApiConfig) -> Self {
        Self {
            client,
            path: api.streams_path(),
        }
    }
}

impl WatchSource for ApiWatchSource {
    async fn connect(&self) -> Result<LineStream> {
        let request =
            Request::new(self.path.clone()).watch(&WatchParams::default().disable_bookmarks(), "0")?;
        log::debug!("Opening watch on {}", request.uri());

        let body = self.client.request_stream(request).await?;
        Ok(body.lines().boxed())
    }
}
