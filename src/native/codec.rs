//! Encoder plugins and decode-time layout conversion.
//!
//! The plugin table mirrors a codec library's registry: a format is encodable
//! only when a descriptor is present. Item payloads store planes verbatim;
//! quality and lossless settings are recorded with the item. Conversion
//! between stored and requested layouts goes through an 8-bit RGBA
//! intermediate using full-range BT.601.

use super::heap::{EncoderData, EncodingOptionsData, ImageData, ItemData, ItemKind, PlaneRec};
use super::{Status, StatusCode};
use crate::context::ItemId;
use crate::encoder::CompressionFormat;
use crate::image::{Channel, Chroma, Colorspace};

pub(crate) struct EncoderDescriptor {
    pub format: CompressionFormat,
    pub id: &'static str,
    pub name: &'static str,
}

const DESCRIPTORS: &[EncoderDescriptor] = &[
    EncoderDescriptor {
        format: CompressionFormat::Hevc,
        id: "x265",
        name: "x265 HEVC encoder",
    },
    EncoderDescriptor {
        format: CompressionFormat::Av1,
        id: "aom",
        name: "AOMedia Project AV1 Encoder",
    },
];

pub(crate) fn descriptor_for(format: CompressionFormat) -> Option<&'static EncoderDescriptor> {
    DESCRIPTORS.iter().find(|d| d.format == format)
}

/// Channels an image must provide for its declared layout.
fn required_channels(colorspace: Colorspace, chroma: Chroma) -> &'static [Channel] {
    match (colorspace, chroma) {
        (_, Chroma::Monochrome) => &[Channel::Y],
        (Colorspace::YCbCr, _) => &[Channel::Y, Channel::Cb, Channel::Cr],
        (Colorspace::Rgb, Chroma::C444) => &[Channel::R, Channel::G, Channel::B],
        (Colorspace::Rgb, _) => &[Channel::Interleaved],
        _ => &[],
    }
}

fn plane<'a>(planes: &'a [PlaneRec], channel: Channel) -> Option<&'a PlaneRec> {
    planes.iter().find(|p| p.channel == channel)
}

/// Compress one image into a container item. Planes are validated against the
/// declared layout and stored; the alpha channel is stripped when the
/// encoding options ask for it.
pub(crate) fn encode_item(
    image: &ImageData,
    encoder: &EncoderData,
    options: &EncodingOptionsData,
    id: ItemId,
) -> Result<ItemData, Status> {
    let descriptor = descriptor_for(encoder.format).ok_or_else(|| {
        Status::new(StatusCode::EncoderPlugin, "no encoder plugin for format")
    })?;

    for channel in required_channels(image.colorspace, image.chroma) {
        if plane(&image.planes, *channel).is_none() {
            return Err(Status::new(
                StatusCode::EncodingError,
                format!("image is missing the {channel:?} plane"),
            ));
        }
    }
    if let Some((sx, sy)) = image.chroma.subsampling() {
        let cw = image.width.div_ceil(sx);
        let ch = image.height.div_ceil(sy);
        for channel in [Channel::Cb, Channel::Cr] {
            if let Some(p) = plane(&image.planes, channel) {
                if p.width != cw || p.height != ch {
                    return Err(Status::new(
                        StatusCode::EncodingError,
                        format!(
                            "{channel:?} plane is {}x{}, expected {cw}x{ch}",
                            p.width, p.height
                        ),
                    ));
                }
            }
        }
    }

    let (chroma, planes) = if !options.save_alpha_channel {
        strip_alpha(image)?
    } else {
        (image.chroma, image.planes.clone())
    };

    log_encode(encoder, descriptor, image);

    Ok(ItemData {
        id,
        kind: ItemKind::TopLevel,
        compression: encoder.format,
        width: image.width,
        height: image.height,
        colorspace: image.colorspace,
        chroma,
        quality: encoder.quality.clamp(0, 100) as u8,
        lossless: encoder.lossless,
        planes,
        thumbnails: Vec::new(),
        depth_images: Vec::new(),
    })
}

fn strip_alpha(image: &ImageData) -> Result<(Chroma, Vec<PlaneRec>), Status> {
    match image.chroma {
        // 16-bit samples drop the trailing alpha pair verbatim; no need to
        // round-trip through 8 bits.
        Chroma::InterleavedRrggbbaaBe => {
            let p = plane(&image.planes, Channel::Interleaved)
                .ok_or_else(|| Status::new(StatusCode::EncodingError, "cannot strip alpha"))?;
            let w = image.width as usize;
            let stride = w * 6;
            let mut data = Vec::with_capacity(stride * image.height as usize);
            for y in 0..image.height as usize {
                for x in 0..w {
                    let src = y * p.stride + x * 8;
                    data.extend_from_slice(&p.data[src..src + 6]);
                }
            }
            Ok((
                Chroma::InterleavedRrggbbBe,
                vec![PlaneRec {
                    channel: Channel::Interleaved,
                    width: image.width,
                    height: image.height,
                    bit_depth: p.bit_depth,
                    stride,
                    data,
                }],
            ))
        }
        Chroma::InterleavedRgba => {
            let rgba = item_planes_to_rgba8(
                &image.planes,
                image.colorspace,
                image.chroma,
                image.width,
                image.height,
            )
            .ok_or_else(|| Status::new(StatusCode::EncodingError, "cannot strip alpha"))?;
            let planes =
                rgba8_to_planes(&rgba, image.width, image.height, Colorspace::Rgb, Chroma::InterleavedRgb)
                    .ok_or_else(|| Status::new(StatusCode::EncodingError, "cannot strip alpha"))?;
            Ok((Chroma::InterleavedRgb, planes))
        }
        _ => Ok((
            image.chroma,
            image
                .planes
                .iter()
                .filter(|p| p.channel != Channel::Alpha)
                .cloned()
                .collect(),
        )),
    }
}

/// Diagnostic output on the engine's own channel, gated by the encoder's
/// logging verbosity. The wrapper layer never logs.
fn log_encode(encoder: &EncoderData, descriptor: &EncoderDescriptor, image: &ImageData) {
    match encoder.logging {
        0 => {}
        1 => log::debug!(
            target: "heifbox::engine",
            "{}: encoding {}x{} image",
            descriptor.id,
            image.width,
            image.height
        ),
        2 => log::debug!(
            target: "heifbox::engine",
            "{}: encoding {}x{} image, quality={}, lossless={}",
            descriptor.id,
            image.width,
            image.height,
            encoder.quality,
            encoder.lossless
        ),
        _ => {
            log::debug!(
                target: "heifbox::engine",
                "{}: encoding {}x{} image, quality={}, lossless={}, chroma={:?}",
                descriptor.id,
                image.width,
                image.height,
                encoder.quality,
                encoder.lossless,
                image.chroma
            );
            for p in &image.planes {
                log::trace!(
                    target: "heifbox::engine",
                    "{}: plane {:?} {}x{}@{} stride {}",
                    descriptor.id,
                    p.channel,
                    p.width,
                    p.height,
                    p.bit_depth,
                    p.stride
                );
            }
        }
    }
}

/// Decompress one item into an image, converting to the requested layout.
pub(crate) fn decode_item(
    item: &ItemData,
    colorspace: Colorspace,
    chroma: Chroma,
    convert_hdr_to_8bit: bool,
) -> Result<ImageData, Status> {
    for channel in required_channels(item.colorspace, item.chroma) {
        if plane(&item.planes, *channel).is_none() {
            return Err(Status::new(
                StatusCode::DecoderPlugin,
                format!("bitstream is missing the {channel:?} plane"),
            ));
        }
    }

    let (mut target_cs, mut target_chroma) = (colorspace, chroma);
    if target_cs == Colorspace::Undefined || target_chroma == Chroma::Undefined {
        target_cs = item.colorspace;
        target_chroma = item.chroma;
        if convert_hdr_to_8bit {
            match item.chroma {
                Chroma::InterleavedRrggbbaaBe => target_chroma = Chroma::InterleavedRgba,
                Chroma::InterleavedRrggbbBe => target_chroma = Chroma::InterleavedRgb,
                _ => {}
            }
        }
    }

    if target_cs == item.colorspace && target_chroma == item.chroma {
        return Ok(ImageData {
            width: item.width,
            height: item.height,
            colorspace: item.colorspace,
            chroma: item.chroma,
            planes: item.planes.clone(),
        });
    }

    let rgba = item_planes_to_rgba8(
        &item.planes,
        item.colorspace,
        item.chroma,
        item.width,
        item.height,
    )
    .ok_or_else(|| {
        Status::new(
            StatusCode::UnsupportedFeature,
            format!(
                "no conversion from {:?}/{:?}",
                item.colorspace, item.chroma
            ),
        )
    })?;
    let planes = rgba8_to_planes(&rgba, item.width, item.height, target_cs, target_chroma)
        .ok_or_else(|| {
            Status::new(
                StatusCode::UnsupportedFeature,
                format!("no conversion to {target_cs:?}/{target_chroma:?}"),
            )
        })?;

    Ok(ImageData {
        width: item.width,
        height: item.height,
        colorspace: target_cs,
        chroma: target_chroma,
        planes,
    })
}

/// Scale an item's planes with nearest-neighbor sampling so the image fits
/// into a `bbox`x`bbox` box. Returns the scaled dimensions and planes.
pub(crate) fn scale_to_bbox(
    width: u32,
    height: u32,
    chroma: Chroma,
    planes: &[PlaneRec],
    bbox: u32,
) -> (u32, u32, Vec<PlaneRec>) {
    let longest = width.max(height);
    if longest <= bbox || bbox == 0 {
        return (width, height, planes.to_vec());
    }
    let tw = ((width as u64 * bbox as u64) / longest as u64).max(1) as u32;
    let th = ((height as u64 * bbox as u64) / longest as u64).max(1) as u32;

    let scaled = planes
        .iter()
        .map(|p| {
            let (pw, ph) = if p.width == width && p.height == height {
                (tw, th)
            } else {
                // Subsampled chroma plane; keep its ratio to the luma grid.
                let (sx, sy) = chroma.subsampling().unwrap_or((1, 1));
                (tw.div_ceil(sx), th.div_ceil(sy))
            };
            scale_plane(p, pw, ph)
        })
        .collect();
    (tw, th, scaled)
}

fn scale_plane(plane: &PlaneRec, tw: u32, th: u32) -> PlaneRec {
    let bpp = plane.stride / plane.width as usize;
    let stride = tw as usize * bpp;
    let mut data = vec![0u8; stride * th as usize];
    for ty in 0..th as usize {
        let sy = ty * plane.height as usize / th as usize;
        for tx in 0..tw as usize {
            let sx = tx * plane.width as usize / tw as usize;
            let src = sy * plane.stride + sx * bpp;
            let dst = ty * stride + tx * bpp;
            data[dst..dst + bpp].copy_from_slice(&plane.data[src..src + bpp]);
        }
    }
    PlaneRec {
        channel: plane.channel,
        width: tw,
        height: th,
        bit_depth: plane.bit_depth,
        stride,
        data,
    }
}

// --- layout conversion through an RGBA8 intermediate ---

fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    (
        y.round().clamp(0.0, 255.0) as u8,
        cb.round().clamp(0.0, 255.0) as u8,
        cr.round().clamp(0.0, 255.0) as u8,
    )
}

fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let cb = cb as f32 - 128.0;
    let cr = cr as f32 - 128.0;
    let r = y + 1.402 * cr;
    let g = y - 0.344_136 * cb - 0.714_136 * cr;
    let b = y + 1.772 * cb;
    (
        r.round().clamp(0.0, 255.0) as u8,
        g.round().clamp(0.0, 255.0) as u8,
        b.round().clamp(0.0, 255.0) as u8,
    )
}

fn be_sample_to_u8(hi: u8, lo: u8, bit_depth: u8) -> u8 {
    let value = ((hi as u16) << 8) | lo as u16;
    (value >> (bit_depth - 8)).min(255) as u8
}

/// Flatten stored planes into a packed width*4-per-row RGBA8 buffer.
/// Returns `None` for layouts with no conversion path.
pub(crate) fn item_planes_to_rgba8(
    planes: &[PlaneRec],
    colorspace: Colorspace,
    chroma: Chroma,
    width: u32,
    height: u32,
) -> Option<Vec<u8>> {
    let (w, h) = (width as usize, height as usize);
    let mut out = vec![0u8; w * h * 4];

    match (colorspace, chroma) {
        (Colorspace::Rgb, Chroma::InterleavedRgba) | (Colorspace::Rgb, Chroma::InterleavedRgb) => {
            let p = plane(planes, Channel::Interleaved)?;
            if p.bit_depth != 8 {
                return None;
            }
            let bpp = chroma.interleaved_bytes_per_pixel()?;
            for y in 0..h {
                for x in 0..w {
                    let src = y * p.stride + x * bpp;
                    let dst = (y * w + x) * 4;
                    out[dst] = p.data[src];
                    out[dst + 1] = p.data[src + 1];
                    out[dst + 2] = p.data[src + 2];
                    out[dst + 3] = if bpp == 4 { p.data[src + 3] } else { 255 };
                }
            }
        }
        (Colorspace::Rgb, Chroma::InterleavedRrggbbaaBe)
        | (Colorspace::Rgb, Chroma::InterleavedRrggbbBe) => {
            let p = plane(planes, Channel::Interleaved)?;
            if p.bit_depth <= 8 {
                return None;
            }
            let channels = if chroma == Chroma::InterleavedRrggbbaaBe {
                4
            } else {
                3
            };
            for y in 0..h {
                for x in 0..w {
                    let src = y * p.stride + x * channels * 2;
                    let dst = (y * w + x) * 4;
                    for c in 0..3 {
                        out[dst + c] =
                            be_sample_to_u8(p.data[src + c * 2], p.data[src + c * 2 + 1], p.bit_depth);
                    }
                    out[dst + 3] = if channels == 4 {
                        be_sample_to_u8(p.data[src + 6], p.data[src + 7], p.bit_depth)
                    } else {
                        255
                    };
                }
            }
        }
        (Colorspace::Rgb, Chroma::C444) => {
            let (pr, pg, pb) = (
                plane(planes, Channel::R)?,
                plane(planes, Channel::G)?,
                plane(planes, Channel::B)?,
            );
            if pr.bit_depth != 8 {
                return None;
            }
            for y in 0..h {
                for x in 0..w {
                    let dst = (y * w + x) * 4;
                    out[dst] = pr.data[y * pr.stride + x];
                    out[dst + 1] = pg.data[y * pg.stride + x];
                    out[dst + 2] = pb.data[y * pb.stride + x];
                    out[dst + 3] = 255;
                }
            }
        }
        (Colorspace::YCbCr, Chroma::Monochrome) | (Colorspace::Monochrome, Chroma::Monochrome) => {
            let py = plane(planes, Channel::Y)?;
            if py.bit_depth != 8 {
                return None;
            }
            for y in 0..h {
                for x in 0..w {
                    let v = py.data[y * py.stride + x];
                    let dst = (y * w + x) * 4;
                    out[dst] = v;
                    out[dst + 1] = v;
                    out[dst + 2] = v;
                    out[dst + 3] = 255;
                }
            }
        }
        (Colorspace::YCbCr, _) => {
            let (sx, sy) = chroma.subsampling()?;
            let (py, pcb, pcr) = (
                plane(planes, Channel::Y)?,
                plane(planes, Channel::Cb)?,
                plane(planes, Channel::Cr)?,
            );
            if py.bit_depth != 8 {
                return None;
            }
            for y in 0..h {
                for x in 0..w {
                    let cy = y / sy as usize;
                    let cx = x / sx as usize;
                    let (r, g, b) = ycbcr_to_rgb(
                        py.data[y * py.stride + x],
                        pcb.data[cy * pcb.stride + cx],
                        pcr.data[cy * pcr.stride + cx],
                    );
                    let dst = (y * w + x) * 4;
                    out[dst] = r;
                    out[dst + 1] = g;
                    out[dst + 2] = b;
                    out[dst + 3] = 255;
                }
            }
        }
        _ => return None,
    }
    Some(out)
}

/// Build target-layout planes from a packed RGBA8 buffer.
/// Returns `None` for layouts with no conversion path.
pub(crate) fn rgba8_to_planes(
    rgba: &[u8],
    width: u32,
    height: u32,
    colorspace: Colorspace,
    chroma: Chroma,
) -> Option<Vec<PlaneRec>> {
    let (w, h) = (width as usize, height as usize);

    let interleaved = |bpp: usize, bit_depth: u8, fill: &dyn Fn(&mut Vec<u8>, usize)| {
        let stride = w * bpp;
        let mut data = Vec::with_capacity(stride * h);
        for i in 0..w * h {
            fill(&mut data, i * 4);
        }
        vec![PlaneRec {
            channel: Channel::Interleaved,
            width,
            height,
            bit_depth,
            stride,
            data,
        }]
    };

    let planes = match (colorspace, chroma) {
        (Colorspace::Rgb, Chroma::InterleavedRgba) => interleaved(4, 8, &|data, src| {
            data.extend_from_slice(&rgba[src..src + 4]);
        }),
        (Colorspace::Rgb, Chroma::InterleavedRgb) => interleaved(3, 8, &|data, src| {
            data.extend_from_slice(&rgba[src..src + 3]);
        }),
        (Colorspace::Rgb, Chroma::InterleavedRrggbbaaBe) => interleaved(8, 10, &|data, src| {
            for c in 0..4 {
                let v = (rgba[src + c] as u16) << 2;
                data.push((v >> 8) as u8);
                data.push((v & 0xff) as u8);
            }
        }),
        (Colorspace::Rgb, Chroma::InterleavedRrggbbBe) => interleaved(6, 10, &|data, src| {
            for c in 0..3 {
                let v = (rgba[src + c] as u16) << 2;
                data.push((v >> 8) as u8);
                data.push((v & 0xff) as u8);
            }
        }),
        (Colorspace::Rgb, Chroma::C444) => {
            let mut r = vec![0u8; w * h];
            let mut g = vec![0u8; w * h];
            let mut b = vec![0u8; w * h];
            for i in 0..w * h {
                r[i] = rgba[i * 4];
                g[i] = rgba[i * 4 + 1];
                b[i] = rgba[i * 4 + 2];
            }
            [(Channel::R, r), (Channel::G, g), (Channel::B, b)]
                .into_iter()
                .map(|(channel, data)| PlaneRec {
                    channel,
                    width,
                    height,
                    bit_depth: 8,
                    stride: w,
                    data,
                })
                .collect()
        }
        (Colorspace::YCbCr, Chroma::Monochrome) | (Colorspace::Monochrome, Chroma::Monochrome) => {
            let mut luma = vec![0u8; w * h];
            for i in 0..w * h {
                let (y, _, _) = rgb_to_ycbcr(rgba[i * 4], rgba[i * 4 + 1], rgba[i * 4 + 2]);
                luma[i] = y;
            }
            vec![PlaneRec {
                channel: Channel::Y,
                width,
                height,
                bit_depth: 8,
                stride: w,
                data: luma,
            }]
        }
        (Colorspace::YCbCr, _) => {
            let (sx, sy) = chroma.subsampling()?;
            let (sx, sy) = (sx as usize, sy as usize);
            let cw = w.div_ceil(sx);
            let ch = h.div_ceil(sy);
            let mut luma = vec![0u8; w * h];
            let mut full_cb = vec![0u8; w * h];
            let mut full_cr = vec![0u8; w * h];
            for i in 0..w * h {
                let (y, cb, cr) = rgb_to_ycbcr(rgba[i * 4], rgba[i * 4 + 1], rgba[i * 4 + 2]);
                luma[i] = y;
                full_cb[i] = cb;
                full_cr[i] = cr;
            }
            // Box-average each sx*sy block, clamped at the right/bottom edges.
            let subsample = |full: &[u8]| {
                let mut out = vec![0u8; cw * ch];
                for by in 0..ch {
                    for bx in 0..cw {
                        let mut sum = 0u32;
                        let mut count = 0u32;
                        for dy in 0..sy {
                            for dx in 0..sx {
                                let x = bx * sx + dx;
                                let y = by * sy + dy;
                                if x < w && y < h {
                                    sum += full[y * w + x] as u32;
                                    count += 1;
                                }
                            }
                        }
                        out[by * cw + bx] = (sum / count) as u8;
                    }
                }
                out
            };
            let mut planes = vec![PlaneRec {
                channel: Channel::Y,
                width,
                height,
                bit_depth: 8,
                stride: w,
                data: luma,
            }];
            for (channel, full) in [(Channel::Cb, &full_cb), (Channel::Cr, &full_cr)] {
                planes.push(PlaneRec {
                    channel,
                    width: cw as u32,
                    height: ch as u32,
                    bit_depth: 8,
                    stride: cw,
                    data: subsample(full),
                });
            }
            planes
        }
        _ => return None,
    };
    Some(planes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_table_covers_hevc_and_av1_only() {
        assert!(descriptor_for(CompressionFormat::Hevc).is_some());
        assert!(descriptor_for(CompressionFormat::Av1).is_some());
        assert!(descriptor_for(CompressionFormat::Vvc).is_none());
        assert!(descriptor_for(CompressionFormat::Jpeg2000).is_none());
    }

    #[test]
    fn ycbcr_round_trip_is_close() {
        for (r, g, b) in [(255, 255, 255), (0, 0, 0), (200, 30, 90)] {
            let (y, cb, cr) = rgb_to_ycbcr(r, g, b);
            let (r2, g2, b2) = ycbcr_to_rgb(y, cb, cr);
            assert!((r as i32 - r2 as i32).abs() <= 2, "{r} vs {r2}");
            assert!((g as i32 - g2 as i32).abs() <= 2, "{g} vs {g2}");
            assert!((b as i32 - b2 as i32).abs() <= 2, "{b} vs {b2}");
        }
    }

    #[test]
    fn white_maps_to_neutral_chroma() {
        let (y, cb, cr) = rgb_to_ycbcr(255, 255, 255);
        assert_eq!(y, 255);
        assert_eq!(cb, 128);
        assert_eq!(cr, 128);
    }

    #[test]
    fn rgba_to_420_rounds_chroma_up() {
        let rgba = vec![128u8; 5 * 3 * 4];
        let planes = rgba8_to_planes(&rgba, 5, 3, Colorspace::YCbCr, Chroma::C420).unwrap();
        assert_eq!(planes.len(), 3);
        assert_eq!((planes[1].width, planes[1].height), (3, 2));
        assert_eq!((planes[2].width, planes[2].height), (3, 2));
    }

    #[test]
    fn rgba_survives_ycbcr_444_and_back_approximately() {
        let rgba: Vec<u8> = vec![
            10, 20, 30, 255, //
            200, 100, 50, 255, //
            0, 255, 0, 255, //
            255, 0, 255, 255,
        ];
        let planes = rgba8_to_planes(&rgba, 2, 2, Colorspace::YCbCr, Chroma::C444).unwrap();
        let back =
            item_planes_to_rgba8(&planes, Colorspace::YCbCr, Chroma::C444, 2, 2).unwrap();
        for (a, b) in rgba.iter().zip(&back) {
            assert!((*a as i32 - *b as i32).abs() <= 3, "{a} vs {b}");
        }
    }

    #[test]
    fn rgba16_packing_uses_ten_bit_big_endian() {
        let rgba = vec![255u8, 0, 128, 64];
        let planes =
            rgba8_to_planes(&rgba, 1, 1, Colorspace::Rgb, Chroma::InterleavedRrggbbaaBe).unwrap();
        let p = &planes[0];
        assert_eq!(p.bit_depth, 10);
        // 255 << 2 = 0x3FC, 0 -> 0, 128 << 2 = 0x200, 64 << 2 = 0x100.
        assert_eq!(p.data, vec![0x03, 0xFC, 0x00, 0x00, 0x02, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn scaling_fits_the_bounding_box() {
        let plane = PlaneRec {
            channel: Channel::Interleaved,
            width: 8,
            height: 4,
            bit_depth: 8,
            stride: 32,
            data: vec![7u8; 128],
        };
        let (tw, th, planes) =
            scale_to_bbox(8, 4, Chroma::InterleavedRgba, &[plane], 4);
        assert_eq!((tw, th), (4, 2));
        assert_eq!(planes[0].data.len(), 4 * 2 * 4);
        assert!(planes[0].data.iter().all(|&b| b == 7));
    }

    #[test]
    fn scaling_is_identity_when_already_small() {
        let plane = PlaneRec {
            channel: Channel::Y,
            width: 4,
            height: 4,
            bit_depth: 8,
            stride: 4,
            data: vec![1u8; 16],
        };
        let (tw, th, planes) = scale_to_bbox(4, 4, Chroma::Monochrome, &[plane], 16);
        assert_eq!((tw, th), (4, 4));
        assert_eq!(planes[0].data.len(), 16);
    }
}
