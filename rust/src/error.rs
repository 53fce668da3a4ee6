use std::time::Duration;

/// Failure of a single backend call. Also the error type of the platform callback
/// interface, so it has to stay flat and FFI-friendly.
#[derive(uniffi::Error, thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("timed out: {message}")]
    Timeout { message: String },
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error("rejected by backend: {message}")]
    Rejected { message: String },
}

impl BackendError {
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout {
            message: format!("no response after {}ms", after.as_millis()),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for BackendError {
    fn from(e: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::Transport { message: e.reason }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("a session fetch is already in flight")]
    FetchInFlight,
    #[error("session fetch is only available while bootstrapping (state: {state})")]
    NotBootstrapping { state: &'static str },
    #[error("session fetch failed after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: u32, last: BackendError },
    #[error("app initialization exceeded {after_ms}ms")]
    InitCeilingExceeded { after_ms: u64 },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("realtime subscription for {user_id} failed: {source}")]
    Transport {
        user_id: String,
        #[source]
        source: BackendError,
    },
}
