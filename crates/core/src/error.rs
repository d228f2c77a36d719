use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Result alias that carries the custom [`ExhibitError`] type.
pub type Result<T> = std::result::Result<T, ExhibitError>;

/// Common error type for the core crate.
///
/// Errors raised by artwork modules never leave the lifecycle manager; they
/// are logged and the manager carries on with best-effort recovery. The
/// variants exist so that the log line says which step failed for which
/// marker.
#[derive(Debug, thiserror::Error)]
pub enum ExhibitError {
    /// Registration or configuration input was unusable (blank marker id,
    /// unknown artwork kind, malformed config).
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("failed to construct module `{marker_id}`: {reason}")]
    Construction { marker_id: String, reason: String },
    #[error("failed to activate module `{marker_id}`: {reason}")]
    Activation { marker_id: String, reason: String },
    #[error("failed to deactivate module `{marker_id}`: {reason}")]
    Deactivation { marker_id: String, reason: String },
    #[error("failed to clean up module `{marker_id}`: {reason}")]
    Cleanup { marker_id: String, reason: String },
    #[error("audio source `{id}`: {reason}")]
    Audio { id: String, reason: String },
    #[error("popup `{id}`: {reason}")]
    Popup { id: String, reason: String },
    /// Free-form message for failures raised inside module implementations.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl ExhibitError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<&str> for ExhibitError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for ExhibitError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

/// Runs a fallible module callback, turning both an `Err` and a panic into a
/// readable reason string.
///
/// Module code is foreign to the manager; a panic inside `activate` must be
/// contained exactly like a returned error.
pub(crate) fn isolate<T>(f: impl FnOnce() -> Result<T>) -> std::result::Result<T, String> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(format!("panicked: {}", panic_message(payload))),
    }
}

/// Extract a human-readable message from a panic payload.
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}
