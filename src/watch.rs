//! Long-lived watch over one resource kind.
//!
//! A [`WatchStream`] owns a single background task which repeatedly opens a
//! connection through its [`WatchSource`], decodes one [`WatchEvent`] per line
//! and hands it to the [`EventDispatcher`] before reading the next line.
//! The task never gives up on its own; it only ends through [`WatchStream::stop`].

use std::{
    future::Future,
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::{stream::BoxStream, TryStreamExt};
use serde::de::DeserializeOwned;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::config::WatchConfig;
use crate::dispatch::{EventDispatcher, ResourceHandler};
use crate::resource::WatchEvent;
use crate::{Error, Result};

mod api;
pub use api::ApiWatchSource;

/// The lines of one watch response body.
pub type LineStream = BoxStream<'static, io::Result<String>>;

/// Opens connections to a watch feed.
pub trait WatchSource: Send + Sync + 'static {
    fn connect(&self) -> impl Future<Output = Result<LineStream>> + Send;
}

pub struct WatchStream<Src, S, H> {
    source: Arc<Src>,
    dispatcher: Arc<Mutex<EventDispatcher<S, H>>>,
    config: WatchConfig,
    running: Arc<AtomicBool>,
    worker: Option<CancellableTask>,
}

impl<Src, S, H> WatchStream<Src, S, H>
where
    Src: WatchSource,
    S: DeserializeOwned + Send + 'static,
    H: ResourceHandler<S> + 'static,
{
    pub fn new(source: Src, dispatcher: EventDispatcher<S, H>, config: WatchConfig) -> Self {
        Self {
            source: Arc::new(source),
            dispatcher: Arc::new(Mutex::new(dispatcher)),
            config,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Spawns the watch worker. Does nothing if it is already running.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let token = CancellationToken::new();
        let worker = watch_loop(
            Arc::clone(&self.source),
            Arc::clone(&self.dispatcher),
            self.config.clone(),
        );
        let join_handle = tokio::spawn({
            let token = token.clone();
            async move {
                tokio::select! {
                    () = token.cancelled() => {}
                    () = worker => {}
                }
            }
        });

        self.worker = Some(CancellableTask { join_handle, token });
    }

    /// Stops the worker. An in-flight read is dropped, not drained.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl<Src, S, H> Drop for WatchStream<Src, S, H> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

struct CancellableTask {
    join_handle: JoinHandle<()>,
    token: CancellationToken,
}

impl CancellableTask {
    fn abort(self) {
        self.token.cancel();
        self.join_handle.abort();
    }
}

async fn watch_loop<Src, S, H>(
    source: Arc<Src>,
    dispatcher: Arc<Mutex<EventDispatcher<S, H>>>,
    config: WatchConfig,
) where
    Src: WatchSource,
    S: DeserializeOwned + Send,
    H: ResourceHandler<S>,
{
    // Held for the lifetime of the worker, so a restarted watch waits for the old one to go away.
    let mut dispatcher = dispatcher.lock().await;
    let mut backoff = Backoff::new(&config);

    loop {
        let mut delivered = 0;
        let result = read_connection(&*source, &mut *dispatcher, &mut delivered).await;

        let delay = reconnect_delay(&mut backoff, result, delivered);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// How long to wait before reconnecting, given how the last connection ended and
/// how many events it dispatched.
fn reconnect_delay(backoff: &mut Backoff, result: Result<()>, delivered: usize) -> Duration {
    if delivered > 0 {
        backoff.reset();
    }

    match result {
        Ok(()) if delivered > 0 => Duration::ZERO,
        Ok(()) => {
            log::debug!("Watch connection closed without delivering events");
            backoff.next()
        }
        Err(err) if err.is_timeout() => {
            log::debug!("Watch connection timed out, reconnecting");
            backoff.reset();
            Duration::ZERO
        }
        Err(err) => {
            log::warn!("Watch connection failed: {err}");
            backoff.next()
        }
    }
}

/// Reads one connection until it ends, an empty line arrives or a line fails to decode.
async fn read_connection<Src, S, H>(
    source: &Src,
    dispatcher: &mut EventDispatcher<S, H>,
    delivered: &mut usize,
) -> Result<()>
where
    Src: WatchSource,
    S: DeserializeOwned + Send,
    H: ResourceHandler<S>,
{
    let mut lines = source.connect().await?;

    while let Some(line) = lines.try_next().await? {
        if line.trim().is_empty() {
            break;
        }

        match serde_json::from_str::<WatchEvent<S>>(&line)? {
            WatchEvent::Error(status) => {
                return Err(Error::WatchStatus {
                    code: status.code,
                    message: status.message,
                })
            }
            WatchEvent::Bookmark(_) => {}
            event => {
                dispatcher.on_event(event).await;
                *delivered += 1;
            }
        }
    }

    Ok(())
}

/// Exponential reconnect delay, doubling from `initial` up to `max`.
struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(config: &WatchConfig) -> Self {
        Self {
            initial: config.initial_backoff,
            max: config.max_backoff,
            current: config.initial_backoff,
        }
    }

    fn next(&mut self) -> Duration {
        let delay = self.current.min(self.max);
        self.current = (self.current * 2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}
