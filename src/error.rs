// src/error.rs
//
// Unified error handling for iiif-pipe
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - UserError: Malformed request spec or identifier, fixable by the caller
// - CodecError: Source decoding / output encoding issues
// - ResourceLimit: Size, byte-count and deadline limits
// - InternalBug: Invariant violations (should not happen)

use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy used for logging and recoverability decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid input, recoverable by the caller
    UserError,
    /// Format/encoding issues
    CodecError,
    /// Memory/time/dimension limits
    ResourceLimit,
    /// Library bugs (should not happen)
    InternalBug,
}

/// iiif-pipe error types
#[derive(Debug, Error)]
pub enum IiifError {
    // Request errors
    #[error("{message}")]
    InvalidSpec { message: Cow<'static, str> },

    #[error("invalid identifier {identifier:?}: {reason}")]
    InvalidIdentifier {
        identifier: String,
        reason: Cow<'static, str>,
    },

    #[error("({width}, {height}) exceeds maximum allowed dimensions ({max_width}, {max_height})")]
    DimensionExceeded {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },

    // Fetch errors
    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("failed to fetch {url}: {message}")]
    FetchFailed {
        url: String,
        message: Cow<'static, str>,
    },

    #[error("fetching {url} returned HTTP status {status}")]
    UpstreamStatus { url: String, status: u16 },

    #[error("{url} returned an empty body")]
    EmptyBody { url: String },

    #[error("{url} returned a body larger than {limit} bytes")]
    BodyTooLarge { url: String, limit: u64 },

    // Source limits
    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    // Codec errors
    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Resize failed ({source_width}x{source_height} -> {target_width}x{target_height}): {message}")]
    ResizeFailed {
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
        message: Cow<'static, str>,
    },

    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    #[error("Failed to write output: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {message}")]
    Internal { message: Cow<'static, str> },
}

impl IiifError {
    pub fn invalid_spec(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidSpec {
            message: message.into(),
        }
    }

    pub fn invalid_identifier(
        identifier: impl Into<String>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidIdentifier {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    pub fn dimension_exceeded(width: u32, height: u32, max_width: u32, max_height: u32) -> Self {
        Self::DimensionExceeded {
            width,
            height,
            max_width,
            max_height,
        }
    }

    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    pub fn fetch_failed(url: impl Into<String>, message: impl Into<Cow<'static, str>>) -> Self {
        Self::FetchFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn upstream_status(url: impl Into<String>, status: u16) -> Self {
        Self::UpstreamStatus {
            url: url.into(),
            status,
        }
    }

    pub fn empty_body(url: impl Into<String>) -> Self {
        Self::EmptyBody { url: url.into() }
    }

    pub fn body_too_large(url: impl Into<String>, limit: u64) -> Self {
        Self::BodyTooLarge {
            url: url.into(),
            limit,
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn resize_failed(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ResizeFailed {
            source_width: source_dims.0,
            source_height: source_dims.1,
            target_width: target_dims.0,
            target_height: target_dims.1,
            message: message.into(),
        }
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn io(source: std::io::Error) -> Self {
        Self::Io { source }
    }

    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (the caller can fix it)
    ///
    /// Consistent with category(): UserError and ResourceLimit are recoverable,
    /// CodecError and InternalBug are not.
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::ResourceLimit => true,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidSpec { .. }
            | Self::InvalidIdentifier { .. }
            | Self::DimensionExceeded { .. } => ErrorCategory::UserError,

            Self::DecodeFailed { .. } | Self::ResizeFailed { .. } | Self::EncodeFailed { .. } => {
                ErrorCategory::CodecError
            }

            // Upstream failures land here too: they are about the remote resource,
            // not about a bug in the pipeline.
            Self::Timeout { .. }
            | Self::FetchFailed { .. }
            | Self::UpstreamStatus { .. }
            | Self::EmptyBody { .. }
            | Self::BodyTooLarge { .. }
            | Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::Io { .. } => ErrorCategory::ResourceLimit,

            Self::Internal { .. } => ErrorCategory::InternalBug,
        }
    }

    /// HTTP status the server answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidSpec { .. }
            | Self::InvalidIdentifier { .. }
            | Self::DimensionExceeded { .. } => 400,
            Self::Timeout { .. } => 503,
            _ => 500,
        }
    }
}

impl From<std::io::Error> for IiifError {
    fn from(source: std::io::Error) -> Self {
        Self::io(source)
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, IiifError>;
