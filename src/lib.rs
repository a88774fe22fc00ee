//! stream-controller turns `Stream` custom resources into running pipelines.
//!
//! A `Stream` lists the apps of a data pipeline. Each app refers to a
//! registered `StreamApp` template by `<name>-<type>`. For every app the
//! controller creates a service and a deployment running the template image,
//! bound to the pipeline topic on the message bus: sources produce to it,
//! every other app consumes from it. Deleting the `Stream` deletes every
//! object labelled with its name.
//!
//! The process watches the `Stream` collection through one long-lived
//! [`WatchStream`], de-duplicates events in an [`EventDispatcher`] and hands
//! notifications to the [`Reconciler`] through a [`KeyedQueue`], which keeps
//! work for one pipeline in order.

pub mod catalog;
pub mod config;
pub use config::Config;
pub mod dispatch;
pub use dispatch::{EventDispatcher, ResourceHandler};
mod error;
pub use error::{Error, Result};
pub mod queue;
pub use queue::KeyedQueue;
pub mod reconciler;
pub use reconciler::Reconciler;
pub mod resource;
mod runner;
pub use runner::{run, run_with};
pub mod store;
pub mod watch;
pub use watch::WatchStream;

#[cfg(test)]
mod testing;
