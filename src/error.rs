//! Unified error type and the adapter from engine status codes.

use thiserror::Error;

use crate::context::ItemId;
use crate::encoder::CompressionFormat;
use crate::image::{Channel, Chroma, Colorspace};
use crate::native;

/// Unified error type for container, image, and encoder operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HeifError {
    /// The engine allocator returned a null handle.
    #[error("allocation failed: {what}")]
    AllocationFailed { what: &'static str },

    /// The container was already populated by a previous read.
    #[error("context is already populated")]
    AlreadyPopulated,

    /// The engine rejected the bitstream; carries the engine diagnostic.
    #[error("decoding failed: {message}")]
    Decode { message: String },

    /// The engine rejected the encoding request; carries the engine diagnostic.
    #[error("encoding failed: {message}")]
    Encode { message: String },

    /// Width or height outside the valid range.
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Colorspace/chroma pair or subsampling ratio outside the known set.
    #[error("unsupported format: {detail}")]
    UnsupportedFormat { detail: String },

    /// The engine could not allocate a pixel plane.
    #[error("failed to allocate plane for channel {channel:?}")]
    PlaneAllocationFailed { channel: Channel },

    /// The image layout has no mapping to or from a host pixel buffer.
    #[error("unsupported image type: {detail}")]
    UnsupportedImageType { detail: &'static str },

    /// No encoder plugin is registered for the compression format.
    #[error("no encoder available for {format:?}")]
    UnsupportedCompressionFormat { format: CompressionFormat },

    /// A configuration value was rejected by the engine.
    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// The container declares no primary image.
    #[error("no primary image")]
    NoPrimaryImage,

    /// Navigational lookup for an unknown item id.
    #[error("image id {id} not found")]
    ImageNotFound { id: ItemId },

    /// The engine runtime version is older than the version assumed at build.
    #[error("expected at least engine version {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },

    /// File I/O failure in `read_from_file`/`write_to_file`.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HeifError {
    pub(crate) fn unsupported_pair(colorspace: Colorspace, chroma: Chroma) -> Self {
        HeifError::UnsupportedFormat {
            detail: format!("colorspace {colorspace:?} with chroma {chroma:?}"),
        }
    }
}

/// Every engine call result is converted through here, exactly once, at the
/// call site. Each status code maps to a single taxonomy kind.
impl From<native::Status> for HeifError {
    fn from(status: native::Status) -> Self {
        use native::StatusCode::*;
        match status.code {
            InvalidInput | UnsupportedFiletype | UnsupportedFeature | DecoderPlugin => {
                HeifError::Decode {
                    message: status.message,
                }
            }
            EncoderPlugin | EncodingError => HeifError::Encode {
                message: status.message,
            },
            UsageError => HeifError::InvalidParameter {
                message: status.message,
            },
            MemoryAllocation => HeifError::AllocationFailed {
                what: "engine object",
            },
        }
    }
}
