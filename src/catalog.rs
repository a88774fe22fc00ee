//! Lookup of registered `StreamApp` templates.

use std::future::Future;

use kube_client::Client;
use kube_core::{params::GetParams, Request};

use crate::config::ApiConfig;
use crate::resource::{Envelope, StreamAppSpec};
use crate::{Error, Result};

pub trait AppCatalog: Send + Sync {
    /// Resolves the template registered under `name`, failing with
    /// [`Error::AppNotFound`] if there is none.
    fn lookup(&self, name: &str) -> impl Future<Output = Result<Envelope<StreamAppSpec>>> + Send;
}

/// Reads `StreamApp` objects from the apiserver, one GET per lookup.
pub struct ApiAppCatalog {
    client: Client,
    request: Request,
}

impl ApiAppCatalog {
    pub fn new(client: Client, api: &ApiConfig) -> Self {
        Self {
            client,
            request: Request::new(api.stream_apps_path()),
        }
    }
}

impl AppCatalog for ApiAppCatalog {
    async fn lookup(&self, name: &str) -> Result<Envelope<StreamAppSpec>> {
        let request = self.request.get(name, &GetParams::default())?;
        match self.client.request::<Envelope<StreamAppSpec>>(request).await {
            Ok(app) => Ok(app),
            Err(kube_client::Error::Api(err)) if err.code == 404 => {
                Err(Error::AppNotFound(name.to_owned()))
            }
            Err(err) => Err(err.into()),
        }
    }
}
