//! Decoding and encoding option blocks.
//!
//! Both blocks are versioned engine structs. The constructors check the
//! version the engine filled in against the one this binding was written for,
//! so a silently reordered struct turns into an error instead of garbage
//! settings.

use crate::error::HeifError;
use crate::handle::Owned;
use crate::native;

const DECODING_OPTIONS_VERSION: u8 = 5;
const ENCODING_OPTIONS_VERSION: u8 = 7;

/// Options applied when decoding an image handle.
#[derive(Debug)]
pub struct DecodingOptions {
    handle: Owned,
}

impl DecodingOptions {
    pub fn new() -> Result<Self, HeifError> {
        crate::check_library_version()?;
        let raw = native::decoding_options_alloc();
        let handle = Owned::acquire(raw, native::decoding_options_free, "decoding options")?;
        let version = native::decoding_options_version(handle.get()?)?;
        if version != DECODING_OPTIONS_VERSION {
            return Err(HeifError::VersionMismatch {
                expected: format!("decoding options v{DECODING_OPTIONS_VERSION}"),
                actual: format!("v{version}"),
            });
        }
        Ok(DecodingOptions { handle })
    }

    pub(crate) fn raw(&self) -> Result<native::RawHandle, HeifError> {
        self.handle.get()
    }

    /// Decode ignoring the container's rotation, mirroring, and crop
    /// transformations.
    pub fn set_ignore_transformations(&mut self, ignore: bool) -> Result<(), HeifError> {
        native::decoding_options_set_ignore_transformations(self.handle.get()?, ignore)?;
        Ok(())
    }

    /// Fold content with more than 8 bits per sample down to 8 bits while
    /// decoding.
    pub fn set_convert_hdr_to_8bit(&mut self, convert: bool) -> Result<(), HeifError> {
        native::decoding_options_set_convert_hdr_to_8bit(self.handle.get()?, convert)?;
        Ok(())
    }

    /// Release the engine-side option block now instead of at drop. Idempotent.
    pub fn release(&mut self) {
        self.handle.release_now();
    }
}

/// Options applied when encoding an image into a context.
#[derive(Debug)]
pub struct EncodingOptions {
    handle: Owned,
}

impl EncodingOptions {
    pub fn new() -> Result<Self, HeifError> {
        crate::check_library_version()?;
        let raw = native::encoding_options_alloc();
        let handle = Owned::acquire(raw, native::encoding_options_free, "encoding options")?;
        let version = native::encoding_options_version(handle.get()?)?;
        if version != ENCODING_OPTIONS_VERSION {
            return Err(HeifError::VersionMismatch {
                expected: format!("encoding options v{ENCODING_OPTIONS_VERSION}"),
                actual: format!("v{version}"),
            });
        }
        Ok(EncodingOptions { handle })
    }

    pub(crate) fn raw(&self) -> Result<native::RawHandle, HeifError> {
        self.handle.get()
    }

    /// Keep or drop the alpha channel when encoding. Defaults to keeping it.
    pub fn set_save_alpha_channel(&mut self, save: bool) -> Result<(), HeifError> {
        native::encoding_options_set_save_alpha(self.handle.get()?, save)?;
        Ok(())
    }

    /// Release the engine-side option block now instead of at drop. Idempotent.
    pub fn release(&mut self) {
        self.handle.release_now();
    }
}
