//! One-call encoding from a host pixel buffer into a finished container.

use imgref::ImgRef;
use rgb::alt::GRAY8;
use rgb::RGBA;

use crate::context::Context;
use crate::convert::{
    image_from_gray8, image_from_nrgba8, image_from_rgba8, image_from_rgba16, image_from_ycbcr,
    YCbCrBuffer,
};
use crate::encoder::{CompressionFormat, LoggingLevel, LosslessMode};
use crate::error::HeifError;
use crate::image::Image;
use crate::options::EncodingOptions;

/// A borrowed host pixel buffer in one of the supported source layouts.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub enum HostImage<'a> {
    /// Interleaved 8-bit RGBA, premultiplied alpha.
    Rgba8(ImgRef<'a, RGBA<u8>>),
    /// Interleaved 8-bit RGBA, straight alpha.
    Nrgba8(ImgRef<'a, RGBA<u8>>),
    /// Interleaved 16-bit RGBA; narrowed to 10 bits per channel.
    Rgba16(ImgRef<'a, RGBA<u16>>),
    /// 8-bit grayscale.
    Gray8(ImgRef<'a, GRAY8>),
    /// Planar YCbCr.
    YCbCr(YCbCrBuffer<'a>),
}

fn convert(host: HostImage<'_>) -> Result<Image, HeifError> {
    match host {
        HostImage::Rgba8(pixels) => image_from_rgba8(pixels),
        HostImage::Nrgba8(pixels) => image_from_nrgba8(pixels),
        HostImage::Rgba16(pixels) => image_from_rgba16(pixels),
        HostImage::Gray8(pixels) => image_from_gray8(pixels),
        HostImage::YCbCr(buffer) => image_from_ycbcr(&buffer),
    }
}

/// Convert a host buffer and encode it as the primary image of a fresh
/// container.
pub fn encode_from_host_image(
    host: HostImage<'_>,
    format: CompressionFormat,
    quality: i32,
    lossless: LosslessMode,
    logging: LoggingLevel,
) -> Result<Context, HeifError> {
    crate::check_library_version()?;
    let image = convert(host)?;
    let mut ctx = Context::new()?;
    let mut encoder = ctx.new_encoder(format)?;
    encoder.set_quality(quality)?;
    encoder.set_lossless(lossless)?;
    encoder.set_logging_level(logging)?;
    let options = EncodingOptions::new()?;
    ctx.encode_image(&image, &encoder, Some(&options))?;
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgref::Img;
    use rgb::alt::Gray;

    #[test]
    fn rgba8_buffer_encodes_to_a_primary_image() {
        let pixels = vec![RGBA::new(255u8, 255, 255, 255); 16];
        let img = Img::new(pixels, 4, 4);
        let ctx = encode_from_host_image(
            HostImage::Rgba8(img.as_ref()),
            CompressionFormat::Hevc,
            75,
            LosslessMode::Disabled,
            LoggingLevel::None,
        )
        .unwrap();
        assert_eq!(ctx.number_of_top_level_images().unwrap(), 1);
        let handle = ctx.primary_image_handle().unwrap();
        assert_eq!((handle.width(), handle.height()), (4, 4));
        assert!(handle.is_primary_image());
    }

    #[test]
    fn gray8_buffer_encodes_without_alpha() {
        let pixels = vec![Gray(90u8); 9];
        let img = Img::new(pixels, 3, 3);
        let ctx = encode_from_host_image(
            HostImage::Gray8(img.as_ref()),
            CompressionFormat::Av1,
            50,
            LosslessMode::Disabled,
            LoggingLevel::None,
        )
        .unwrap();
        let handle = ctx.primary_image_handle().unwrap();
        assert!(!handle.has_alpha_channel());
    }

    #[test]
    fn unregistered_format_is_rejected() {
        let pixels = vec![RGBA::new(0u8, 0, 0, 255); 4];
        let img = Img::new(pixels, 2, 2);
        let err = encode_from_host_image(
            HostImage::Rgba8(img.as_ref()),
            CompressionFormat::Jpeg,
            75,
            LosslessMode::Disabled,
            LoggingLevel::None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            HeifError::UnsupportedCompressionFormat {
                format: CompressionFormat::Jpeg
            }
        ));
    }

    #[test]
    fn invalid_quality_is_rejected_before_encoding() {
        let pixels = vec![RGBA::new(0u8, 0, 0, 255); 4];
        let img = Img::new(pixels, 2, 2);
        let err = encode_from_host_image(
            HostImage::Rgba8(img.as_ref()),
            CompressionFormat::Hevc,
            101,
            LosslessMode::Disabled,
            LoggingLevel::None,
        )
        .unwrap_err();
        assert!(matches!(err, HeifError::InvalidParameter { .. }));
    }
}
