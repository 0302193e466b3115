//! Safe HEIF/AVIF container encoding and decoding.
//!
//! The crate wraps a codec engine behind ownership-based lifetimes: every
//! engine object ([`Context`], [`Image`], [`ImageHandle`], [`Encoder`], the
//! option blocks) is released exactly once, either explicitly through
//! `release()` or when the wrapper drops. Handles derived from a container
//! keep it alive, so navigation never dangles.
//!
//! Typical decode flow: [`Context::read_from_memory`] →
//! [`Context::primary_image_handle`] → [`ImageHandle::decode_image`] →
//! [`Image::to_rgba8`]. For encoding, either assemble an [`Image`] plane by
//! plane and call [`Context::encode_image`], or hand a host buffer to
//! [`encode_from_host_image`].

use std::sync::Once;

mod context;
mod convert;
mod encode;
mod encoder;
mod error;
mod handle;
mod image;
mod native;
mod options;

pub use context::{Context, ImageHandle, ItemId};
pub use convert::{
    image_from_gray8, image_from_nrgba8, image_from_rgba8, image_from_rgba16, image_from_ycbcr,
    YCbCrBuffer, YCbCrSubsampleRatio,
};
pub use encode::{encode_from_host_image, HostImage};
pub use encoder::{
    have_encoder_for_format, CompressionFormat, Encoder, LoggingLevel, LosslessMode,
};
pub use error::HeifError;
pub use image::{Channel, Chroma, Colorspace, Image, Plane, PlaneData};
pub use options::{DecodingOptions, EncodingOptions};

/// Initialize the engine once per process. Called by every entry-point
/// constructor, so users never need to call anything themselves.
pub(crate) fn ensure_init() {
    static INIT: Once = Once::new();
    INIT.call_once(native::init);
}

fn format_version(packed: u32) -> String {
    format!(
        "{}.{}.{}",
        packed >> 24,
        (packed >> 16) & 0xff,
        (packed >> 8) & 0xff
    )
}

/// Version of the engine, as `major.minor.patch`.
pub fn get_version() -> String {
    ensure_init();
    format_version(native::version_number())
}

/// Verify the engine at runtime is at least the version this crate was
/// written against.
pub fn check_library_version() -> Result<(), HeifError> {
    ensure_init();
    let runtime = native::version_number();
    if runtime < native::BUILD_VERSION {
        return Err(HeifError::VersionMismatch {
            expected: format_version(native::BUILD_VERSION),
            actual: format_version(runtime),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_formats_as_dotted_triple() {
        assert_eq!(get_version(), "1.20.2");
    }

    #[test]
    fn version_parts_come_from_the_packed_bcd() {
        assert_eq!(format_version(0x0102_0300), "1.2.3");
        assert_eq!(format_version(0x0114_0200), "1.20.2");
    }

    #[test]
    fn library_version_check_passes() {
        check_library_version().unwrap();
    }
}
