use std::{error::Error as StdError, io};

/// Errors raised while watching, resolving or reconciling pipelines.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No StreamApp is registered under the composite name.
    #[error("stream app {0} not found")]
    AppNotFound(String),
    /// The apiserver rejected or failed a request.
    #[error("kubernetes api request failed: {0}")]
    Kube(#[from] kube_client::Error),
    #[error("failed to build api request: {0}")]
    Request(#[from] kube_core::request::Error),
    #[error("failed to decode document: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("watch stream I/O failed: {0}")]
    Io(#[from] io::Error),
    /// The watch feed reported an error status in place of an event.
    #[error("watch feed returned status {code}: {message}")]
    WatchStatus { code: u16, message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Whether this error is a timeout, which ends a watch connection the same way a
    /// clean disconnect does.
    ///
    /// The client wraps body read failures in further errors, so the whole source
    /// chain is searched for an I/O error of kind [`io::ErrorKind::TimedOut`].
    pub fn is_timeout(&self) -> bool {
        let mut cause: Option<&(dyn StdError + 'static)> = match self {
            Error::Io(err) => Some(err),
            Error::Kube(err) => Some(err),
            _ => None,
        };

        while let Some(err) = cause {
            cause = match err.downcast_ref::<io::Error>() {
                Some(err) if err.kind() == io::ErrorKind::TimedOut => return true,
                // `io::Error::source` skips the wrapped error itself.
                Some(err) => err.get_ref().map(|inner| inner as &(dyn StdError + 'static)),
                None => err.source(),
            };
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapped(err: io::Error) -> io::Error {
        io::Error::new(io::ErrorKind::Other, err)
    }

    #[test]
    fn timeouts_are_classified() {
        let err = Error::from(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
        assert!(err.is_timeout());

        let err = Error::from(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert!(!err.is_timeout());

        assert!(!Error::AppNotFound("http-source".into()).is_timeout());
    }

    #[test]
    fn timeouts_are_found_behind_wrapping_errors() {
        let timed_out = || io::Error::new(io::ErrorKind::TimedOut, "read timed out");

        assert!(Error::from(wrapped(timed_out())).is_timeout());
        assert!(Error::from(wrapped(wrapped(timed_out()))).is_timeout());

        let service = kube_client::Error::Service(Box::new(wrapped(timed_out())));
        assert!(Error::from(service).is_timeout());

        let events = kube_client::Error::ReadEvents(wrapped(timed_out()));
        assert!(Error::from(events).is_timeout());

        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert!(!Error::from(wrapped(reset)).is_timeout());
        assert!(!Error::from(io::Error::new(io::ErrorKind::Other, "closed")).is_timeout());
    }

    #[test]
    fn not_found_names_the_app() {
        let err = Error::AppNotFound("log-sink".into());
        assert_eq!(err.to_string(), "stream app log-sink not found");
    }
}
