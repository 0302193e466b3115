//! Encoder selection and configuration.

use std::sync::Arc;

use crate::context::ContextInner;
use crate::error::HeifError;
use crate::handle::Owned;
use crate::native;

/// Compression format of an item. Numeric codes match the engine surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CompressionFormat {
    Undefined = 0,
    Hevc = 1,
    Avc = 2,
    Jpeg = 3,
    Av1 = 4,
    Vvc = 5,
    Evc = 6,
    Jpeg2000 = 7,
    Uncompressed = 8,
}

/// Whether the encoder runs in lossless mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LosslessMode {
    Disabled = 0,
    Enabled = 1,
}

/// Verbosity of the encoder's own diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoggingLevel {
    None = 0,
    Basic = 1,
    Advanced = 2,
    Full = 3,
}

/// Whether an encoder plugin is registered for `format`.
pub fn have_encoder_for_format(format: CompressionFormat) -> bool {
    crate::ensure_init();
    native::have_encoder_for_format(format)
}

/// One configured encoder instance, bound to the context that created it.
///
/// The context reference keeps the engine context alive while the encoder
/// exists; dropping the context wrapper first is fine.
#[derive(Debug)]
pub struct Encoder {
    handle: Owned,
    _ctx: Arc<ContextInner>,
    id: &'static str,
    name: &'static str,
}

impl Encoder {
    pub(crate) fn for_format(
        ctx: Arc<ContextInner>,
        format: CompressionFormat,
    ) -> Result<Self, HeifError> {
        let (id, name) = native::encoder_descriptor(format)
            .ok_or(HeifError::UnsupportedCompressionFormat { format })?;
        let raw = native::encoder_alloc(format);
        let handle = Owned::acquire(raw, native::encoder_release, "encoder")?;
        Ok(Encoder {
            handle,
            _ctx: ctx,
            id,
            name,
        })
    }

    pub(crate) fn raw(&self) -> Result<native::RawHandle, HeifError> {
        self.handle.get()
    }

    /// Short identifier of the underlying encoder plugin, e.g. `x265`.
    pub fn id(&self) -> &str {
        self.id
    }

    /// Human-readable name of the underlying encoder plugin.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Set the rate-control quality, 0 (worst) to 100 (best).
    pub fn set_quality(&mut self, quality: i32) -> Result<(), HeifError> {
        native::encoder_set_quality(self.handle.get()?, quality)?;
        Ok(())
    }

    pub fn set_lossless(&mut self, mode: LosslessMode) -> Result<(), HeifError> {
        native::encoder_set_lossless(self.handle.get()?, mode == LosslessMode::Enabled)?;
        Ok(())
    }

    pub fn set_logging_level(&mut self, level: LoggingLevel) -> Result<(), HeifError> {
        native::encoder_set_logging_level(self.handle.get()?, level as i32)?;
        Ok(())
    }

    /// Release the engine encoder now instead of at drop. Idempotent.
    pub fn release(&mut self) {
        self.handle.release_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Context;

    #[test]
    fn plugin_availability_matches_the_registry() {
        assert!(have_encoder_for_format(CompressionFormat::Hevc));
        assert!(have_encoder_for_format(CompressionFormat::Av1));
        assert!(!have_encoder_for_format(CompressionFormat::Jpeg));
        assert!(!have_encoder_for_format(CompressionFormat::Uncompressed));
    }

    #[test]
    fn encoder_reports_its_plugin() {
        let ctx = Context::new().unwrap();
        let encoder = ctx.new_encoder(CompressionFormat::Hevc).unwrap();
        assert_eq!(encoder.id(), "x265");
        assert_eq!(encoder.name(), "x265 HEVC encoder");
        let av1 = ctx.new_encoder(CompressionFormat::Av1).unwrap();
        assert_eq!(av1.id(), "aom");
    }

    #[test]
    fn unregistered_format_is_rejected() {
        let ctx = Context::new().unwrap();
        let err = ctx.new_encoder(CompressionFormat::Vvc).unwrap_err();
        assert!(matches!(
            err,
            HeifError::UnsupportedCompressionFormat {
                format: CompressionFormat::Vvc
            }
        ));
    }

    #[test]
    fn quality_is_validated_by_the_engine() {
        let ctx = Context::new().unwrap();
        let mut encoder = ctx.new_encoder(CompressionFormat::Hevc).unwrap();
        encoder.set_quality(75).unwrap();
        assert!(matches!(
            encoder.set_quality(101),
            Err(HeifError::InvalidParameter { .. })
        ));
        assert!(matches!(
            encoder.set_quality(-1),
            Err(HeifError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn released_encoder_rejects_configuration() {
        let ctx = Context::new().unwrap();
        let mut encoder = ctx.new_encoder(CompressionFormat::Hevc).unwrap();
        encoder.release();
        encoder.release();
        assert!(matches!(
            encoder.set_lossless(LosslessMode::Enabled),
            Err(HeifError::InvalidParameter { .. })
        ));
    }
}
