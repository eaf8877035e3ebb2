//! Error taxonomy shared by frames, configuration and the pipeline.

use std::time::Duration;

use thiserror::Error;

use crate::frame::FrameKind;
use crate::settings::SettingsError;
use crate::stream::StreamKind;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced synchronously by frame, config and pipeline operations.
///
/// Release paths never produce errors: releasing twice is a no-op.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid (null) frame handle")]
    InvalidHandle,
    #[error("frame used after release")]
    UseAfterRelease,
    #[error("index {index} out of range (count {count})")]
    IndexOutOfRange { index: usize, count: usize },
    #[error("size mismatch: source holds {expected} bytes, destination holds {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("wrong frame kind: expected {expected}, got {actual}")]
    WrongFrameKind { expected: FrameKind, actual: FrameKind },
    #[error("config cannot be resolved: {0}")]
    UnresolvableConfig(String),
    #[error("stream {stream} (index {index:?}) is not part of the profile")]
    StreamNotFound {
        stream: StreamKind,
        index: Option<u32>,
    },
    #[error("frame didn't arrive within {0:?}")]
    Timeout(Duration),
    #[error("pipeline has not been started")]
    NotStarted,
    #[error("pipeline is already started; call stop() first")]
    AlreadyStarted,
    #[error("frames are delivered to a callback, wait/poll are unavailable")]
    CallbackActive,
    #[error("invalid pipeline settings: {0}")]
    InvalidSettings(#[from] SettingsError),
    #[error("{function}({args}) failed: {message}")]
    NativeFailure {
        function: &'static str,
        args: String,
        message: String,
    },
}

impl Error {
    /// Builds a [`Error::NativeFailure`] for the capture layer.
    pub fn native(function: &'static str, args: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NativeFailure {
            function,
            args: args.into(),
            message: message.into(),
        }
    }

    /// Returns true for conditions callers are expected to retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_timeout_is_recoverable() {
        assert!(Error::Timeout(Duration::from_millis(100)).is_recoverable());
        assert!(!Error::NotStarted.is_recoverable());
        assert!(!Error::UnresolvableConfig("x".into()).is_recoverable());
    }

    #[test]
    fn test_native_failure_message() {
        let err = Error::native("open", "depth/z16", "profile not offered");
        assert_eq!(err.to_string(), "open(depth/z16) failed: profile not offered");
    }
}
