// src/error.rs
//
// Unified error handling for brush-stylize
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - InputError: unreadable/unsupported/zero-area input, rejected before any stage runs
// - ResourceLimit: buffers too large to allocate, limits exceeded
// - CodecError: encode/serialization failures
// - InternalBug: library bugs (should not happen)

use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy used by the CLI status object and batch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Invalid input, fixable by the caller
    InputError,
    /// Encode/write issues
    CodecError,
    /// Memory/dimension/byte limits
    ResourceLimit,
    /// Library bugs (should not happen)
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::InputError => "InputError",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }

    /// Stable machine-readable code, emitted in the CLI status object.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCategory::InputError => "STYLIZE_INPUT_ERROR",
            ErrorCategory::CodecError => "STYLIZE_CODEC_ERROR",
            ErrorCategory::ResourceLimit => "STYLIZE_RESOURCE_LIMIT",
            ErrorCategory::InternalBug => "STYLIZE_INTERNAL_BUG",
        }
    }

    /// Process exit code used by the `stylize` binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorCategory::InputError => 2,
            ErrorCategory::ResourceLimit => 3,
            ErrorCategory::CodecError => 4,
            ErrorCategory::InternalBug => 70,
        }
    }
}

/// brush-stylize error types
#[derive(Debug, Error)]
pub enum StylizeError {
    // File I/O Errors
    #[error("File not found: {path}")]
    FileNotFound { path: Cow<'static, str> },

    #[error("Failed to read file '{path}': {source}")]
    FileReadFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to memory-map file '{path}': {source}")]
    MmapFailed {
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

    // Decode Errors
    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: Cow<'static, str> },

    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Image has zero area ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    // Size Limit Errors
    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    #[error("Input size {bytes} bytes exceeds limit of {max} bytes")]
    SourceTooLarge { bytes: u64, max: u64 },

    #[error("Processing exceeded {limit_ms}ms at {stage} stage (elapsed: {elapsed_ms}ms)")]
    TimeoutExceeded {
        stage: &'static str,
        elapsed_ms: u64,
        limit_ms: u64,
    },

    #[error("Cannot allocate {bytes} bytes for a {width}x{height} working buffer")]
    AllocationFailed { width: u32, height: u32, bytes: u64 },

    // Operation Errors
    #[error("Resize failed ({source_width}x{source_height} -> {target_width}x{target_height}): {message}")]
    ResizeFailed {
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
        message: Cow<'static, str>,
    },

    #[error("Alpha mask is {mask_width}x{mask_height} but image is {width}x{height}")]
    MaskMismatch {
        width: u32,
        height: u32,
        mask_width: u32,
        mask_height: u32,
    },

    // Collaborator Errors (recovered by falling back to the deterministic pipeline)
    #[error("Style transfer model unavailable: {reason}")]
    ModelUnavailable { reason: Cow<'static, str> },

    #[error("Style transfer failed: {message}")]
    StyleTransferFailed { message: Cow<'static, str> },

    // Encode Errors
    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    #[error("Written output '{path}' failed verification: {reason}")]
    OutputVerificationFailed {
        path: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    // Configuration Errors
    #[error("Unknown style profile: '{name}'. Available: brush, light")]
    InvalidProfile { name: Cow<'static, str> },

    #[error("Unknown limits policy: '{policy}'. Expected strict, lenient or disabled")]
    InvalidLimitsPolicy { policy: Cow<'static, str> },

    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidArgument {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    // Internal Errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

impl Clone for StylizeError {
    fn clone(&self) -> Self {
        fn clone_io(source: &std::io::Error) -> std::io::Error {
            std::io::Error::new(source.kind(), source.to_string())
        }

        match self {
            Self::FileNotFound { path } => Self::FileNotFound { path: path.clone() },
            Self::FileReadFailed { path, source } => Self::FileReadFailed {
                path: path.clone(),
                source: clone_io(source),
            },
            Self::MmapFailed { path, source } => Self::MmapFailed {
                path: path.clone(),
                source: clone_io(source),
            },
            Self::FileWriteFailed { path, source } => Self::FileWriteFailed {
                path: path.clone(),
                source: clone_io(source),
            },
            Self::UnsupportedFormat { format } => Self::UnsupportedFormat {
                format: format.clone(),
            },
            Self::DecodeFailed { message } => Self::DecodeFailed {
                message: message.clone(),
            },
            Self::EmptyImage { width, height } => Self::EmptyImage {
                width: *width,
                height: *height,
            },
            Self::DimensionExceedsLimit { dimension, max } => Self::DimensionExceedsLimit {
                dimension: *dimension,
                max: *max,
            },
            Self::PixelCountExceedsLimit { pixels, max } => Self::PixelCountExceedsLimit {
                pixels: *pixels,
                max: *max,
            },
            Self::SourceTooLarge { bytes, max } => Self::SourceTooLarge {
                bytes: *bytes,
                max: *max,
            },
            Self::TimeoutExceeded {
                stage,
                elapsed_ms,
                limit_ms,
            } => Self::TimeoutExceeded {
                stage: *stage,
                elapsed_ms: *elapsed_ms,
                limit_ms: *limit_ms,
            },
            Self::AllocationFailed {
                width,
                height,
                bytes,
            } => Self::AllocationFailed {
                width: *width,
                height: *height,
                bytes: *bytes,
            },
            Self::ResizeFailed {
                source_width,
                source_height,
                target_width,
                target_height,
                message,
            } => Self::ResizeFailed {
                source_width: *source_width,
                source_height: *source_height,
                target_width: *target_width,
                target_height: *target_height,
                message: message.clone(),
            },
            Self::MaskMismatch {
                width,
                height,
                mask_width,
                mask_height,
            } => Self::MaskMismatch {
                width: *width,
                height: *height,
                mask_width: *mask_width,
                mask_height: *mask_height,
            },
            Self::ModelUnavailable { reason } => Self::ModelUnavailable {
                reason: reason.clone(),
            },
            Self::StyleTransferFailed { message } => Self::StyleTransferFailed {
                message: message.clone(),
            },
            Self::EncodeFailed { format, message } => Self::EncodeFailed {
                format: format.clone(),
                message: message.clone(),
            },
            Self::OutputVerificationFailed { path, reason } => Self::OutputVerificationFailed {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::InvalidProfile { name } => Self::InvalidProfile { name: name.clone() },
            Self::InvalidLimitsPolicy { policy } => Self::InvalidLimitsPolicy {
                policy: policy.clone(),
            },
            Self::InvalidArgument {
                name,
                value,
                reason,
            } => Self::InvalidArgument {
                name: name.clone(),
                value: value.clone(),
                reason: reason.clone(),
            },
            Self::InternalPanic { message } => Self::InternalPanic {
                message: message.clone(),
            },
        }
    }
}

// Constructor Helpers
impl StylizeError {
    pub fn file_not_found(path: impl Into<Cow<'static, str>>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn file_read_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn mmap_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::MmapFailed {
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

    pub fn empty_image(width: u32, height: u32) -> Self {
        Self::EmptyImage { width, height }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn source_too_large(bytes: u64, max: u64) -> Self {
        Self::SourceTooLarge { bytes, max }
    }

    pub fn timeout_exceeded(stage: &'static str, elapsed_ms: u64, limit_ms: u64) -> Self {
        Self::TimeoutExceeded {
            stage,
            elapsed_ms,
            limit_ms,
        }
    }

    pub fn allocation_failed(width: u32, height: u32, bytes: u64) -> Self {
        Self::AllocationFailed {
            width,
            height,
            bytes,
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

    pub fn mask_mismatch(image_dims: (u32, u32), mask_dims: (u32, u32)) -> Self {
        Self::MaskMismatch {
            width: image_dims.0,
            height: image_dims.1,
            mask_width: mask_dims.0,
            mask_height: mask_dims.1,
        }
    }

    pub fn model_unavailable(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::ModelUnavailable {
            reason: reason.into(),
        }
    }

    pub fn style_transfer_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::StyleTransferFailed {
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

    pub fn output_verification_failed(
        path: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::OutputVerificationFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_profile(name: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidProfile { name: name.into() }
    }

    pub fn invalid_limits_policy(policy: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidLimitsPolicy {
            policy: policy.into(),
        }
    }

    pub fn invalid_argument(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// True for collaborator failures, which trigger the deterministic fallback
    /// instead of aborting the invocation.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            Self::ModelUnavailable { .. } | Self::StyleTransferFailed { .. }
        )
    }

    /// Check if this error is recoverable (user can fix it)
    ///
    /// Consistent with category():
    /// - InputError and ResourceLimit errors are recoverable (fix the input, shrink the image)
    /// - CodecError and InternalBug errors are not
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::InputError | ErrorCategory::ResourceLimit => true,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::FileNotFound { .. }
            | Self::FileReadFailed { .. }
            | Self::MmapFailed { .. }
            | Self::UnsupportedFormat { .. }
            | Self::DecodeFailed { .. }
            | Self::EmptyImage { .. }
            | Self::InvalidProfile { .. }
            | Self::InvalidLimitsPolicy { .. }
            | Self::InvalidArgument { .. } => ErrorCategory::InputError,

            Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::SourceTooLarge { .. }
            | Self::TimeoutExceeded { .. }
            | Self::AllocationFailed { .. } => ErrorCategory::ResourceLimit,

            // Note: write failures are serialization errors, not resource limits;
            // the caller must treat the output path as absent.
            Self::EncodeFailed { .. }
            | Self::FileWriteFailed { .. }
            | Self::OutputVerificationFailed { .. }
            | Self::ResizeFailed { .. } => ErrorCategory::CodecError,

            // Collaborator errors only surface here if a caller bypasses the fallback.
            Self::ModelUnavailable { .. }
            | Self::StyleTransferFailed { .. }
            | Self::MaskMismatch { .. }
            | Self::InternalPanic { .. } => ErrorCategory::InternalBug,
        }
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, StylizeError>;
