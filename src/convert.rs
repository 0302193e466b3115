//! Conversion from host pixel buffers into engine images.
//!
//! Each conversion creates an image in the matching engine layout, allocates
//! its planes, and copies the host rows in. Strided input is handled by
//! copying only the addressed row bytes.

use imgref::ImgRef;
use rgb::alt::GRAY8;
use rgb::{ComponentBytes, RGBA};

use crate::error::HeifError;
use crate::image::{Channel, Chroma, Colorspace, Image};

/// Chroma subsampling ratio of a host YCbCr buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum YCbCrSubsampleRatio {
    Ratio444,
    Ratio422,
    Ratio420,
    Ratio440,
    Ratio411,
    Ratio410,
}

/// Borrowed planar YCbCr pixel data.
#[derive(Clone, Copy, Debug)]
pub struct YCbCrBuffer<'a> {
    pub y: &'a [u8],
    pub cb: &'a [u8],
    pub cr: &'a [u8],
    pub y_stride: usize,
    pub c_stride: usize,
    pub width: u32,
    pub height: u32,
    pub subsample_ratio: YCbCrSubsampleRatio,
}

/// Build an interleaved 8-bit RGBA image from a host buffer.
pub fn image_from_rgba8(pixels: ImgRef<'_, RGBA<u8>>) -> Result<Image, HeifError> {
    let (width, height) = (pixels.width() as u32, pixels.height() as u32);
    let image = Image::new(width, height, Colorspace::Rgb, Chroma::InterleavedRgba)?;
    let row_bytes = pixels.width() * 4;
    let mut data = Vec::with_capacity(row_bytes * pixels.height());
    for row in pixels.rows() {
        data.extend_from_slice(row.as_bytes());
    }
    let mut plane = image.add_plane(Channel::Interleaved, width, height, 8)?;
    plane.set_data(&data, row_bytes)?;
    Ok(image)
}

/// Build an interleaved 8-bit RGBA image from non-premultiplied host pixels.
/// The engine stores straight alpha, so the bytes transfer unchanged.
pub fn image_from_nrgba8(pixels: ImgRef<'_, RGBA<u8>>) -> Result<Image, HeifError> {
    image_from_rgba8(pixels)
}

/// Narrow one 16-bit sample to the 10-bit range and emit it big-endian.
fn push_be_10bit(out: &mut Vec<u8>, sample: u16) {
    let v = sample >> 6;
    out.push((v >> 8) as u8);
    out.push((v & 0xff) as u8);
}

/// Build a 10-bit big-endian RGBA image from 16-bit host pixels.
pub fn image_from_rgba16(pixels: ImgRef<'_, RGBA<u16>>) -> Result<Image, HeifError> {
    let (width, height) = (pixels.width() as u32, pixels.height() as u32);
    let image = Image::new(
        width,
        height,
        Colorspace::Rgb,
        Chroma::InterleavedRrggbbaaBe,
    )?;
    let row_bytes = pixels.width() * 8;
    let mut data = Vec::with_capacity(row_bytes * pixels.height());
    for row in pixels.rows() {
        for px in row {
            push_be_10bit(&mut data, px.r);
            push_be_10bit(&mut data, px.g);
            push_be_10bit(&mut data, px.b);
            push_be_10bit(&mut data, px.a);
        }
    }
    let mut plane = image.add_plane(Channel::Interleaved, width, height, 10)?;
    plane.set_data(&data, row_bytes)?;
    Ok(image)
}

/// Build a monochrome image from an 8-bit grayscale host buffer.
pub fn image_from_gray8(pixels: ImgRef<'_, GRAY8>) -> Result<Image, HeifError> {
    let (width, height) = (pixels.width() as u32, pixels.height() as u32);
    let image = Image::new(width, height, Colorspace::YCbCr, Chroma::Monochrome)?;
    let mut data = Vec::with_capacity(pixels.width() * pixels.height());
    for row in pixels.rows() {
        data.extend(row.iter().map(|px| px.0));
    }
    let mut plane = image.add_plane(Channel::Y, width, height, 8)?;
    plane.set_data(&data, pixels.width())?;
    Ok(image)
}

/// Build a planar YCbCr image from host planes. Only 4:2:0 and 4:4:4
/// subsampling map onto engine layouts.
pub fn image_from_ycbcr(buffer: &YCbCrBuffer<'_>) -> Result<Image, HeifError> {
    let chroma = match buffer.subsample_ratio {
        YCbCrSubsampleRatio::Ratio420 => Chroma::C420,
        YCbCrSubsampleRatio::Ratio444 => Chroma::C444,
        ratio => {
            return Err(HeifError::UnsupportedFormat {
                detail: format!("YCbCr subsampling {ratio:?}"),
            })
        }
    };
    let (width, height) = (buffer.width, buffer.height);
    let image = Image::new(width, height, Colorspace::YCbCr, chroma)?;

    let mut luma = image.add_plane(Channel::Y, width, height, 8)?;
    luma.set_data(buffer.y, buffer.y_stride)?;

    let (sx, sy) = match chroma {
        Chroma::C420 => (2, 2),
        _ => (1, 1),
    };
    let cw = width.div_ceil(sx);
    let ch = height.div_ceil(sy);
    let mut cb = image.add_plane(Channel::Cb, cw, ch, 8)?;
    cb.set_data(buffer.cb, buffer.c_stride)?;
    let mut cr = image.add_plane(Channel::Cr, cw, ch, 8)?;
    cr.set_data(buffer.cr, buffer.c_stride)?;
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgref::Img;
    use rgb::alt::Gray;

    #[test]
    fn rgba8_buffer_becomes_an_interleaved_image() {
        let pixels = vec![RGBA::new(1u8, 2, 3, 4); 6];
        let img = Img::new(pixels, 3, 2);
        let image = image_from_rgba8(img.as_ref()).unwrap();
        assert_eq!(image.colorspace(), Colorspace::Rgb);
        assert_eq!(image.chroma_format(), Chroma::InterleavedRgba);
        let plane = image.plane(Channel::Interleaved).unwrap().unwrap();
        assert_eq!(&plane.data[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn ten_bit_packing_is_big_endian() {
        let mut out = Vec::new();
        push_be_10bit(&mut out, 0xFFFF);
        push_be_10bit(&mut out, 0);
        push_be_10bit(&mut out, 0x4000);
        // 0xFFFF >> 6 = 0x03FF, 0x4000 >> 6 = 0x0100.
        assert_eq!(out, vec![0x03, 0xFF, 0x00, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn rgba16_becomes_a_ten_bit_image() {
        let pixels = vec![RGBA::new(0xFFFFu16, 0, 0x4000, 0xFFFF); 4];
        let img = Img::new(pixels, 2, 2);
        let image = image_from_rgba16(img.as_ref()).unwrap();
        assert_eq!(image.chroma_format(), Chroma::InterleavedRrggbbaaBe);
        let plane = image.plane(Channel::Interleaved).unwrap().unwrap();
        assert_eq!(plane.bit_depth, 10);
        assert_eq!(&plane.data[..8], &[0x03, 0xFF, 0x00, 0x00, 0x01, 0x00, 0x03, 0xFF]);
    }

    #[test]
    fn gray8_becomes_monochrome() {
        let pixels = vec![Gray(200u8); 12];
        let img = Img::new(pixels, 4, 3);
        let image = image_from_gray8(img.as_ref()).unwrap();
        assert_eq!(image.chroma_format(), Chroma::Monochrome);
        let plane = image.plane(Channel::Y).unwrap().unwrap();
        assert!(plane.data.iter().all(|&b| b == 200));
    }

    #[test]
    fn ycbcr_420_planes_land_in_the_image() {
        let y = vec![100u8; 4 * 4];
        let c = vec![128u8; 2 * 2];
        let buffer = YCbCrBuffer {
            y: &y,
            cb: &c,
            cr: &c,
            y_stride: 4,
            c_stride: 2,
            width: 4,
            height: 4,
            subsample_ratio: YCbCrSubsampleRatio::Ratio420,
        };
        let image = image_from_ycbcr(&buffer).unwrap();
        assert_eq!(image.chroma_format(), Chroma::C420);
        let cb = image.plane(Channel::Cb).unwrap().unwrap();
        assert_eq!((cb.width, cb.height), (2, 2));
    }

    #[test]
    fn unsupported_subsampling_is_rejected() {
        let y = vec![0u8; 4];
        let buffer = YCbCrBuffer {
            y: &y,
            cb: &y,
            cr: &y,
            y_stride: 2,
            c_stride: 2,
            width: 2,
            height: 2,
            subsample_ratio: YCbCrSubsampleRatio::Ratio410,
        };
        assert!(matches!(
            image_from_ycbcr(&buffer),
            Err(HeifError::UnsupportedFormat { .. })
        ));
    }
}
