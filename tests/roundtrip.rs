//! End-to-end container tests: encode, serialize, read back, decode.

use heifbox::{
    encode_from_host_image, image_from_rgba16, image_from_ycbcr, Channel, Chroma, Colorspace,
    CompressionFormat, Context, DecodingOptions, EncodingOptions, HeifError, HostImage, Image,
    LoggingLevel, LosslessMode, YCbCrBuffer, YCbCrSubsampleRatio,
};
use imgref::Img;
use rgb::RGBA;

fn solid_rgba(width: usize, height: usize, px: RGBA<u8>) -> Img<Vec<RGBA<u8>>> {
    Img::new(vec![px; width * height], width, height)
}

fn encode_rgba(
    ctx: &mut Context,
    pixels: &Img<Vec<RGBA<u8>>>,
    quality: i32,
) -> heifbox::ImageHandle {
    let image = heifbox::image_from_rgba8(pixels.as_ref()).unwrap();
    let mut encoder = ctx.new_encoder(CompressionFormat::Hevc).unwrap();
    encoder.set_quality(quality).unwrap();
    encoder.set_lossless(LosslessMode::Disabled).unwrap();
    ctx.encode_image(&image, &encoder, None).unwrap()
}

#[test]
fn encode_write_read_decode_round_trip() {
    let white = solid_rgba(4, 4, RGBA::new(255, 255, 255, 255));
    let source = encode_from_host_image(
        HostImage::Rgba8(white.as_ref()),
        CompressionFormat::Hevc,
        75,
        LosslessMode::Disabled,
        LoggingLevel::None,
    )
    .unwrap();
    let mut bytes = Vec::new();
    source.write(&mut bytes).unwrap();

    let mut ctx = Context::new().unwrap();
    ctx.read_from_memory(&bytes).unwrap();
    assert_eq!(ctx.number_of_top_level_images().unwrap(), 1);

    let handle = ctx.primary_image_handle().unwrap();
    assert_eq!((handle.width(), handle.height()), (4, 4));
    assert!(handle.is_primary_image());
    assert!(handle.has_alpha_channel());

    let image = handle
        .decode_image(Colorspace::Rgb, Chroma::InterleavedRgba, None)
        .unwrap();
    assert_eq!((image.width(), image.height()), (4, 4));
    let host = image.to_rgba8().unwrap();
    assert_eq!(host.buf()[0], RGBA::new(255, 255, 255, 255));
    assert_eq!(host.buf()[15], RGBA::new(255, 255, 255, 255));
}

#[test]
fn first_encoded_image_is_primary() {
    let mut ctx = Context::new().unwrap();
    let first = encode_rgba(&mut ctx, &solid_rgba(4, 4, RGBA::new(10, 20, 30, 255)), 75);
    let second = encode_rgba(&mut ctx, &solid_rgba(8, 8, RGBA::new(40, 50, 60, 255)), 75);

    assert!(first.is_primary_image());
    assert!(!second.is_primary_image());
    assert_eq!(ctx.number_of_top_level_images().unwrap(), 2);

    let ids = ctx.top_level_image_ids().unwrap();
    assert_eq!(ids.len(), 2);
    let primary = ctx.primary_image_id().unwrap();
    assert!(ids.contains(&primary));
    assert_eq!(ctx.image_handle(primary).unwrap().width(), 4);
}

#[test]
fn file_and_memory_serializations_are_identical() {
    let pixels = solid_rgba(6, 2, RGBA::new(1, 2, 3, 4));
    let mut ctx = Context::new().unwrap();
    encode_rgba(&mut ctx, &pixels, 60);

    let mut in_memory = Vec::new();
    ctx.write(&mut in_memory).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.heic");
    ctx.write_to_file(&path).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), in_memory);

    let mut read_back = Context::new().unwrap();
    read_back.read_from_file(&path).unwrap();
    assert_eq!(read_back.number_of_top_level_images().unwrap(), 1);
}

#[test]
fn thumbnails_survive_serialization() {
    let pixels = solid_rgba(16, 8, RGBA::new(200, 100, 50, 255));
    let image = heifbox::image_from_rgba8(pixels.as_ref()).unwrap();

    let mut ctx = Context::new().unwrap();
    let mut encoder = ctx.new_encoder(CompressionFormat::Hevc).unwrap();
    encoder.set_quality(75).unwrap();
    let master = ctx.encode_image(&image, &encoder, None).unwrap();
    let thumb = ctx
        .encode_thumbnail(&image, &master, &encoder, None, 4)
        .unwrap();
    assert_eq!((thumb.width(), thumb.height()), (4, 2));

    let mut bytes = Vec::new();
    ctx.write(&mut bytes).unwrap();
    let mut read_back = Context::new().unwrap();
    read_back.read_from_memory(&bytes).unwrap();
    // The thumbnail is attached to the master, not a top-level image.
    assert_eq!(read_back.number_of_top_level_images().unwrap(), 1);

    let handle = read_back.primary_image_handle().unwrap();
    assert_eq!(handle.number_of_thumbnails().unwrap(), 1);
    let ids = handle.thumbnail_ids().unwrap();
    let thumb = handle.thumbnail(ids[0]).unwrap();
    assert_eq!((thumb.width(), thumb.height()), (4, 2));
    let decoded = thumb
        .decode_image(Colorspace::Undefined, Chroma::Undefined, None)
        .unwrap();
    assert_eq!((decoded.width(), decoded.height()), (4, 2));
}

#[test]
fn ycbcr_420_content_round_trips() {
    let y = vec![120u8; 8 * 4];
    let c = vec![128u8; 4 * 2];
    let buffer = YCbCrBuffer {
        y: &y,
        cb: &c,
        cr: &c,
        y_stride: 8,
        c_stride: 4,
        width: 8,
        height: 4,
        subsample_ratio: YCbCrSubsampleRatio::Ratio420,
    };
    let image = image_from_ycbcr(&buffer).unwrap();

    let mut ctx = Context::new().unwrap();
    let encoder = ctx.new_encoder(CompressionFormat::Av1).unwrap();
    ctx.encode_image(&image, &encoder, None).unwrap();
    let mut bytes = Vec::new();
    ctx.write(&mut bytes).unwrap();

    let mut read_back = Context::new().unwrap();
    read_back.read_from_memory(&bytes).unwrap();
    let handle = read_back.primary_image_handle().unwrap();
    assert!(!handle.has_alpha_channel());

    let decoded = handle
        .decode_image(Colorspace::Undefined, Chroma::Undefined, None)
        .unwrap();
    assert_eq!(decoded.chroma_format(), Chroma::C420);
    let luma = decoded.plane(Channel::Y).unwrap().unwrap();
    assert!(luma.data.iter().all(|&b| b == 120));
    let cb = decoded.plane(Channel::Cb).unwrap().unwrap();
    assert_eq!((cb.width, cb.height), (4, 2));
}

#[test]
fn hdr_content_decodes_to_8bit_on_request() {
    let pixels = Img::new(vec![RGBA::new(0xFFFFu16, 0, 0, 0xFFFF); 4], 2, 2);
    let image = image_from_rgba16(pixels.as_ref()).unwrap();
    assert_eq!(image.chroma_format(), Chroma::InterleavedRrggbbaaBe);

    let mut ctx = Context::new().unwrap();
    let encoder = ctx.new_encoder(CompressionFormat::Hevc).unwrap();
    ctx.encode_image(&image, &encoder, None).unwrap();

    let handle = ctx.primary_image_handle().unwrap();
    let mut options = DecodingOptions::new().unwrap();
    options.set_convert_hdr_to_8bit(true).unwrap();
    let decoded = handle
        .decode_image(Colorspace::Undefined, Chroma::Undefined, Some(&options))
        .unwrap();
    assert_eq!(decoded.chroma_format(), Chroma::InterleavedRgba);
    let host = decoded.to_rgba8().unwrap();
    assert_eq!(host.buf()[0], RGBA::new(255, 0, 0, 255));
}

#[test]
fn alpha_can_be_dropped_at_encode_time() {
    let pixels = solid_rgba(4, 4, RGBA::new(9, 8, 7, 128));
    let image = heifbox::image_from_rgba8(pixels.as_ref()).unwrap();

    let mut ctx = Context::new().unwrap();
    let encoder = ctx.new_encoder(CompressionFormat::Hevc).unwrap();
    let mut options = EncodingOptions::new().unwrap();
    options.set_save_alpha_channel(false).unwrap();
    let handle = ctx.encode_image(&image, &encoder, Some(&options)).unwrap();
    assert!(!handle.has_alpha_channel());

    let decoded = handle
        .decode_image(Colorspace::Undefined, Chroma::Undefined, None)
        .unwrap();
    assert_eq!(decoded.chroma_format(), Chroma::InterleavedRgb);
}

#[test]
fn ten_bit_alpha_can_be_dropped_at_encode_time() {
    let pixels = Img::new(vec![RGBA::new(0xFFFFu16, 0, 0, 0x8000); 4], 2, 2);
    let image = image_from_rgba16(pixels.as_ref()).unwrap();

    let mut ctx = Context::new().unwrap();
    let encoder = ctx.new_encoder(CompressionFormat::Hevc).unwrap();
    let mut options = EncodingOptions::new().unwrap();
    options.set_save_alpha_channel(false).unwrap();
    let handle = ctx.encode_image(&image, &encoder, Some(&options)).unwrap();
    assert!(!handle.has_alpha_channel());

    let decoded = handle
        .decode_image(Colorspace::Undefined, Chroma::Undefined, None)
        .unwrap();
    assert_eq!(decoded.chroma_format(), Chroma::InterleavedRrggbbBe);
    let plane = decoded.plane(Channel::Interleaved).unwrap().unwrap();
    assert_eq!(plane.bit_depth, 10);
    // Red sample survives at 10 bits; the alpha pair is gone.
    assert_eq!(&plane.data[..6], &[0x03, 0xFF, 0x00, 0x00, 0x00, 0x00]);
}

#[test]
fn handles_survive_context_release() {
    let pixels = solid_rgba(4, 4, RGBA::new(33, 44, 55, 255));
    let mut ctx = Context::new().unwrap();
    let handle = encode_rgba(&mut ctx, &pixels, 75);
    drop(ctx);

    // The handle holds its own reference; decoding still works.
    let decoded = handle
        .decode_image(Colorspace::Rgb, Chroma::InterleavedRgba, None)
        .unwrap();
    assert_eq!(decoded.to_rgba8().unwrap().buf()[0], RGBA::new(33, 44, 55, 255));
}

#[test]
fn released_handle_rejects_use_but_tolerates_more_releases() {
    let pixels = solid_rgba(2, 2, RGBA::new(0, 0, 0, 255));
    let mut ctx = Context::new().unwrap();
    let mut handle = encode_rgba(&mut ctx, &pixels, 75);

    handle.release();
    handle.release();
    // Eager scalars stay readable; engine access is refused.
    assert_eq!(handle.width(), 2);
    assert!(matches!(
        handle.decode_image(Colorspace::Undefined, Chroma::Undefined, None),
        Err(HeifError::InvalidParameter { .. })
    ));
}

#[test]
fn failed_encoder_lookup_leaves_the_context_usable() {
    let mut ctx = Context::new().unwrap();
    let err = ctx.new_encoder(CompressionFormat::Uncompressed).unwrap_err();
    assert!(matches!(
        err,
        HeifError::UnsupportedCompressionFormat { .. }
    ));

    // The context is still good for a real encode afterwards.
    let pixels = solid_rgba(2, 2, RGBA::new(5, 6, 7, 255));
    encode_rgba(&mut ctx, &pixels, 75);
    assert_eq!(ctx.number_of_top_level_images().unwrap(), 1);
}

#[test]
fn incomplete_image_fails_to_encode() {
    let image = Image::new(4, 4, Colorspace::YCbCr, Chroma::C420).unwrap();
    // No planes were added.
    let mut ctx = Context::new().unwrap();
    let encoder = ctx.new_encoder(CompressionFormat::Hevc).unwrap();
    let err = ctx.encode_image(&image, &encoder, None).unwrap_err();
    assert!(matches!(err, HeifError::Encode { .. }));
    assert_eq!(ctx.number_of_top_level_images().unwrap(), 0);
}
