// src/error.rs
//
// Unified error handling for raw-image-cache
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - UserError: Invalid input or parameters, recoverable
// - CacheMiss: Signature not resident, recoverable by re-materializing
// - CodecError: Format/encoding issues
// - ResourceLimit: Dimension limits and file system failures
// - InternalBug: Library bugs (should not happen)

use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy used by the UI layer to decide how to surface a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Invalid input, recoverable by user
    UserError,
    /// Lookup by signature found nothing
    CacheMiss,
    /// Format/encoding issues
    CodecError,
    /// Dimension limits and I/O
    ResourceLimit,
    /// Library bugs (should not happen)
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "UserError",
            ErrorCategory::CacheMiss => "CacheMiss",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }

    /// Stable code string for hosts that marshal errors across a boundary.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "RAW_IMAGE_USER_ERROR",
            ErrorCategory::CacheMiss => "RAW_IMAGE_CACHE_MISS",
            ErrorCategory::CodecError => "RAW_IMAGE_CODEC_ERROR",
            ErrorCategory::ResourceLimit => "RAW_IMAGE_RESOURCE_LIMIT",
            ErrorCategory::InternalBug => "RAW_IMAGE_INTERNAL_BUG",
        }
    }
}

/// raw-image-cache error types
#[derive(Debug, Error)]
pub enum RawImageError {
    // Buffer construction
    #[error("Pixel buffer of {actual} bytes does not match {width}x{height} RGBA (expected {expected})")]
    ShapeMismatch {
        width: u32,
        height: u32,
        expected: u64,
        actual: u64,
    },

    // Operation parameters
    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidParameter {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    // Signatures
    #[error("No cached pixels for signature {signature}")]
    CacheMiss { signature: Cow<'static, str> },

    #[error("Failed to compute content signature: {message}")]
    SignatureComputationFailure { message: Cow<'static, str> },

    #[error("Malformed content signature '{value}'")]
    InvalidSignature { value: Cow<'static, str> },

    #[error("Encoded bytes hash to {actual}, not to the requested signature {expected}")]
    SignatureMismatch {
        expected: Cow<'static, str>,
        actual: Cow<'static, str>,
    },

    // Codec
    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: Cow<'static, str> },

    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // Size limits
    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    // File I/O
    #[error("Failed to read file '{path}': {source}")]
    FileReadFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWriteFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    // Scheduling
    #[error("Transform for target {target} was superseded by a newer request")]
    Superseded { target: u64 },

    // Internal
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

impl Clone for RawImageError {
    fn clone(&self) -> Self {
        match self {
            Self::ShapeMismatch {
                width,
                height,
                expected,
                actual,
            } => Self::ShapeMismatch {
                width: *width,
                height: *height,
                expected: *expected,
                actual: *actual,
            },
            Self::InvalidParameter {
                name,
                value,
                reason,
            } => Self::InvalidParameter {
                name: name.clone(),
                value: value.clone(),
                reason: reason.clone(),
            },
            Self::CacheMiss { signature } => Self::CacheMiss {
                signature: signature.clone(),
            },
            Self::SignatureComputationFailure { message } => Self::SignatureComputationFailure {
                message: message.clone(),
            },
            Self::SignatureMismatch { expected, actual } => Self::SignatureMismatch {
                expected: expected.clone(),
                actual: actual.clone(),
            },
            Self::InvalidSignature { value } => Self::InvalidSignature {
                value: value.clone(),
            },
            Self::UnsupportedFormat { format } => Self::UnsupportedFormat {
                format: format.clone(),
            },
            Self::DecodeFailed { message } => Self::DecodeFailed {
                message: message.clone(),
            },
            Self::EncodeFailed { format, message } => Self::EncodeFailed {
                format: format.clone(),
                message: message.clone(),
            },
            Self::DimensionExceedsLimit { dimension, max } => Self::DimensionExceedsLimit {
                dimension: *dimension,
                max: *max,
            },
            Self::PixelCountExceedsLimit { pixels, max } => Self::PixelCountExceedsLimit {
                pixels: *pixels,
                max: *max,
            },
            Self::FileReadFailed { path, source } => Self::FileReadFailed {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::FileWriteFailed { path, source } => Self::FileWriteFailed {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::Superseded { target } => Self::Superseded { target: *target },
            Self::InternalPanic { message } => Self::InternalPanic {
                message: message.clone(),
            },
        }
    }
}

// Constructor Helpers
impl RawImageError {
    pub fn shape_mismatch(width: u32, height: u32, expected: u64, actual: u64) -> Self {
        Self::ShapeMismatch {
            width,
            height,
            expected,
            actual,
        }
    }

    pub fn invalid_parameter(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn cache_miss(signature: impl Into<Cow<'static, str>>) -> Self {
        Self::CacheMiss {
            signature: signature.into(),
        }
    }

    pub fn signature_computation_failure(message: impl Into<Cow<'static, str>>) -> Self {
        Self::SignatureComputationFailure {
            message: message.into(),
        }
    }

    pub fn signature_mismatch(
        expected: impl Into<Cow<'static, str>>,
        actual: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::SignatureMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_signature(value: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidSignature {
            value: value.into(),
        }
    }

    pub fn unsupported_format(format: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
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

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn file_read_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn file_write_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileWriteFailed {
            path: path.into(),
            source,
        }
    }

    pub fn superseded(target: u64) -> Self {
        Self::Superseded { target }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable without restarting the editing session.
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::CacheMiss | ErrorCategory::ResourceLimit => {
                true
            }
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }

    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Self::CacheMiss { .. })
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ShapeMismatch { .. }
            | Self::InvalidParameter { .. }
            | Self::InvalidSignature { .. }
            | Self::SignatureMismatch { .. }
            | Self::Superseded { .. } => ErrorCategory::UserError,

            Self::CacheMiss { .. } => ErrorCategory::CacheMiss,

            Self::UnsupportedFormat { .. }
            | Self::DecodeFailed { .. }
            | Self::EncodeFailed { .. } => ErrorCategory::CodecError,

            Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::FileReadFailed { .. }
            | Self::FileWriteFailed { .. } => ErrorCategory::ResourceLimit,

            // A failing digest would corrupt cache addressing, so it is never downgraded.
            Self::SignatureComputationFailure { .. } | Self::InternalPanic { .. } => {
                ErrorCategory::InternalBug
            }
        }
    }

    /// Short, non-technical text for the interaction layer to display.
    pub fn user_message(&self) -> Cow<'static, str> {
        match self {
            Self::CacheMiss { .. } => {
                Cow::Borrowed("This image is no longer in memory. Reload it to keep editing.")
            }
            Self::Superseded { .. } => Cow::Borrowed("A newer edit replaced this one."),
            Self::InvalidParameter { name, .. } => {
                Cow::Owned(format!("The value for '{name}' is out of range."))
            }
            Self::DimensionExceedsLimit { .. } | Self::PixelCountExceedsLimit { .. } => {
                Cow::Borrowed("This image is too large to edit.")
            }
            Self::UnsupportedFormat { .. } | Self::DecodeFailed { .. } => {
                Cow::Borrowed("This image could not be opened.")
            }
            Self::SignatureMismatch { .. } => {
                Cow::Borrowed("The saved copy does not match this image. Reopen the original.")
            }
            _ => Cow::Borrowed("Something went wrong while processing the image."),
        }
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, RawImageError>;
