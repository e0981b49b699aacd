//! Error taxonomy and the shared error-reporting channel.
//!
//! Fatal failures travel as [`RenderError`] through `Result`. Recoverable
//! failures (a font that never loads, an image payload that cannot be decoded)
//! are handed to an [`ErrorReporter`] and rendering carries on.

use std::fmt;

use serde::{Deserialize, Serialize};

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("canvas `{0}` has no drawing context")]
    ContextUnavailable(String),

    #[error("frame scheduling primitive is unavailable")]
    SchedulerUnavailable,

    #[error("text rasterization failed: {0}")]
    Text(String),

    #[error("failed to composite frame {index}: {source}")]
    Frame {
        index: u32,
        #[source]
        source: Box<RenderError>,
    },

    #[error("encoder error: {0}")]
    Encode(#[from] image::ImageError),

    #[error("settings error: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("worker error: {0}")]
    Worker(String),
}

impl RenderError {
    pub fn text(msg: impl Into<String>) -> Self {
        Self::Text(msg.into())
    }

    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }

    pub(crate) fn in_frame(self, index: u32) -> Self {
        Self::Frame {
            index,
            source: Box::new(self),
        }
    }
}

/// Failure to turn an embedded image payload into pixels.
#[derive(thiserror::Error, Debug)]
pub enum ImageLoadError {
    #[error("image payload is not a base64 data URI")]
    NotDataUri,

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("unsupported or malformed image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image has zero size")]
    Empty,
}

/// Failure to make a font family available before painting.
#[derive(thiserror::Error, Debug)]
pub enum FontLoadError {
    #[error("font family `{family}` (weight {weight}) is not available")]
    NotFound { family: String, weight: u16 },

    #[error("font data for `{0}` could not be parsed")]
    InvalidData(String),
}

// ============================================================================
// Error Channel
// ============================================================================

/// Closed set of error categories accepted by the reporting channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    FontLoading,
    FileDownload,
    ImageLoad,
    CanvasRender,
    Network,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FontLoading => "font-loading",
            Self::FileDownload => "file-download",
            Self::ImageLoad => "image-load",
            Self::CanvasRender => "canvas-render",
            Self::Network => "network",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives recoverable failures.
pub trait ErrorReporter {
    fn report(&self, kind: ErrorKind, error: &dyn std::error::Error);
}

/// Reporter that forwards everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, kind: ErrorKind, error: &dyn std::error::Error) {
        tracing::error!(kind = kind.as_str(), error = %error, "recoverable failure");
    }
}
