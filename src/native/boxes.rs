//! Container serialization.
//!
//! The on-disk layout is box-structured: a big-endian `u32` size (header
//! included) and a four-byte type tag, starting with an `ftyp` box carrying
//! the brand. Unknown box types are skipped on read.

use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

use super::heap::{ContextData, ItemData, ItemKind, PlaneRec};
use crate::context::ItemId;
use crate::encoder::CompressionFormat;
use crate::image::{Channel, Chroma, Colorspace};

const FTYP: &[u8; 4] = b"ftyp";
const PITM: &[u8; 4] = b"pitm";
const ITEM: &[u8; 4] = b"item";

const BRAND_HEIC: &[u8; 4] = b"heic";
const BRAND_AVIF: &[u8; 4] = b"avif";
const BRAND_MIF1: &[u8; 4] = b"mif1";

// Hard caps so a malformed size field cannot drive allocations.
const MAX_DIMENSION: u32 = 0x10000;
const MAX_PLANE_BYTES: u32 = 1 << 30;

#[derive(Debug, Error)]
pub(crate) enum BoxError {
    #[error("unexpected end of data")]
    UnexpectedEof,
    #[error("unsupported file type: missing or unknown ftyp brand")]
    BadFileType,
    #[error("malformed container: {0}")]
    Malformed(&'static str),
}

fn brand_for(items: &[Arc<ItemData>]) -> &'static [u8; 4] {
    let mut saw_av1 = false;
    for item in items {
        match item.compression {
            CompressionFormat::Hevc => return BRAND_HEIC,
            CompressionFormat::Av1 => saw_av1 = true,
            _ => {}
        }
    }
    if saw_av1 {
        BRAND_AVIF
    } else {
        BRAND_MIF1
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    let mut buf = [0u8; 2];
    BigEndian::write_u16(&mut buf, value);
    out.extend_from_slice(&buf);
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    let mut buf = [0u8; 4];
    BigEndian::write_u32(&mut buf, value);
    out.extend_from_slice(&buf);
}

fn box_size(payload_len: usize) -> Result<u32, BoxError> {
    u32::try_from(payload_len + 8)
        .map_err(|_| BoxError::Malformed("box payload too large for the size field"))
}

fn write_box(out: &mut Vec<u8>, kind: &[u8; 4], payload: &[u8]) -> Result<(), BoxError> {
    put_u32(out, box_size(payload.len())?);
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    Ok(())
}

pub(crate) fn write_container(ctx: &ContextData) -> Result<Vec<u8>, BoxError> {
    let mut out = Vec::new();

    let mut ftyp = Vec::with_capacity(12);
    ftyp.extend_from_slice(brand_for(&ctx.items));
    put_u32(&mut ftyp, 0);
    ftyp.extend_from_slice(BRAND_MIF1);
    write_box(&mut out, FTYP, &ftyp)?;

    if let Some(primary) = ctx.primary {
        let mut pitm = Vec::with_capacity(4);
        put_u32(&mut pitm, primary);
        write_box(&mut out, PITM, &pitm)?;
    }

    for item in &ctx.items {
        write_box(&mut out, ITEM, &item_payload(item))?;
    }
    Ok(out)
}

fn item_payload(item: &ItemData) -> Vec<u8> {
    let mut p = Vec::new();
    put_u32(&mut p, item.id);
    p.push(match item.kind {
        ItemKind::TopLevel => 0,
        ItemKind::Thumbnail => 1,
        ItemKind::Depth => 2,
    });
    p.push(item.compression as u8);
    put_u32(&mut p, item.width);
    put_u32(&mut p, item.height);
    p.push(item.colorspace as u8);
    p.push(item.chroma as u8);
    p.push(item.quality);
    p.push(item.lossless as u8);
    p.push(item.planes.len() as u8);
    for plane in &item.planes {
        p.push(plane.channel as u8);
        put_u32(&mut p, plane.width);
        put_u32(&mut p, plane.height);
        p.push(plane.bit_depth);
        put_u32(&mut p, plane.stride as u32);
        put_u32(&mut p, plane.data.len() as u32);
        p.extend_from_slice(&plane.data);
    }
    put_u16(&mut p, item.thumbnails.len() as u16);
    for id in &item.thumbnails {
        put_u32(&mut p, *id);
    }
    put_u16(&mut p, item.depth_images.len() as u16);
    for id in &item.depth_images {
        put_u32(&mut p, *id);
    }
    p
}

/// Sequential big-endian reader over a byte slice.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], BoxError> {
        if self.remaining() < len {
            return Err(BoxError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, BoxError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, BoxError> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    fn u32(&mut self) -> Result<u32, BoxError> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    fn fourcc(&mut self) -> Result<[u8; 4], BoxError> {
        let slice = self.take(4)?;
        Ok([slice[0], slice[1], slice[2], slice[3]])
    }
}

pub(crate) fn parse_container(data: &[u8]) -> Result<ContextData, BoxError> {
    let mut reader = Reader::new(data);

    let ftyp = read_box(&mut reader)?;
    if &ftyp.0 != FTYP {
        return Err(BoxError::BadFileType);
    }
    let mut ftyp_reader = Reader::new(ftyp.1);
    let brand = ftyp_reader.fourcc()?;
    if ![*BRAND_HEIC, *BRAND_AVIF, *BRAND_MIF1].contains(&brand) {
        return Err(BoxError::BadFileType);
    }

    let mut ctx = ContextData::new();
    while reader.remaining() > 0 {
        let (kind, payload) = read_box(&mut reader)?;
        match &kind {
            PITM => {
                let mut r = Reader::new(payload);
                ctx.primary = Some(r.u32()?);
            }
            ITEM => {
                let item = parse_item(payload)?;
                if ctx.item(item.id).is_some() {
                    return Err(BoxError::Malformed("duplicate item id"));
                }
                ctx.next_id = ctx.next_id.max(item.id.saturating_add(1));
                ctx.items.push(Arc::new(item));
            }
            _ => {} // unknown boxes are skipped
        }
    }

    if let Some(primary) = ctx.primary {
        match ctx.item(primary) {
            Some(item) if item.kind == ItemKind::TopLevel => {}
            _ => return Err(BoxError::Malformed("primary item missing")),
        }
    }
    for item in &ctx.items {
        for id in item.thumbnails.iter().chain(&item.depth_images) {
            if ctx.item(*id).is_none() {
                return Err(BoxError::Malformed("dangling item reference"));
            }
        }
    }
    Ok(ctx)
}

fn read_box<'a>(reader: &mut Reader<'a>) -> Result<([u8; 4], &'a [u8]), BoxError> {
    let size = reader.u32()? as usize;
    if size < 8 {
        return Err(BoxError::Malformed("box size below header size"));
    }
    let kind = reader.fourcc()?;
    let payload = reader.take(size - 8)?;
    Ok((kind, payload))
}

fn parse_item(payload: &[u8]) -> Result<ItemData, BoxError> {
    let mut r = Reader::new(payload);
    let id: ItemId = r.u32()?;
    if id == 0 {
        return Err(BoxError::Malformed("item id zero"));
    }
    let kind = match r.u8()? {
        0 => ItemKind::TopLevel,
        1 => ItemKind::Thumbnail,
        2 => ItemKind::Depth,
        _ => return Err(BoxError::Malformed("unknown item kind")),
    };
    let compression = compression_from_code(r.u8()?)
        .ok_or(BoxError::Malformed("unknown compression format"))?;
    let width = r.u32()?;
    let height = r.u32()?;
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(BoxError::Malformed("item dimensions out of range"));
    }
    let colorspace =
        colorspace_from_code(r.u8()?).ok_or(BoxError::Malformed("unknown colorspace"))?;
    let chroma = chroma_from_code(r.u8()?).ok_or(BoxError::Malformed("unknown chroma"))?;
    let quality = r.u8()?;
    let lossless = r.u8()? != 0;

    let plane_count = r.u8()? as usize;
    let mut planes = Vec::with_capacity(plane_count);
    for _ in 0..plane_count {
        planes.push(parse_plane(&mut r)?);
    }

    let thumb_count = r.u16()? as usize;
    let mut thumbnails = Vec::with_capacity(thumb_count);
    for _ in 0..thumb_count {
        thumbnails.push(r.u32()?);
    }
    let depth_count = r.u16()? as usize;
    let mut depth_images = Vec::with_capacity(depth_count);
    for _ in 0..depth_count {
        depth_images.push(r.u32()?);
    }

    let item = ItemData {
        id,
        kind,
        compression,
        width,
        height,
        colorspace,
        chroma,
        quality,
        lossless,
        planes,
        thumbnails,
        depth_images,
    };
    for plane in &item.planes {
        validate_plane_layout(&item, plane)?;
    }
    Ok(item)
}

/// Geometry checks that keep decode indexing in bounds: the stride must
/// cover a full row of samples and the plane dimensions must match the
/// item's declared layout.
fn validate_plane_layout(item: &ItemData, plane: &PlaneRec) -> Result<(), BoxError> {
    let bytes_per_sample = if plane.channel == Channel::Interleaved {
        match item.chroma.interleaved_bytes_per_pixel() {
            Some(bytes) => bytes,
            None => return Err(BoxError::Malformed("interleaved plane in a planar item")),
        }
    } else {
        if item.chroma.interleaved_bytes_per_pixel().is_some() {
            return Err(BoxError::Malformed("planar plane in an interleaved item"));
        }
        if plane.bit_depth > 8 {
            2
        } else {
            1
        }
    };
    if plane.stride < plane.width as usize * bytes_per_sample {
        return Err(BoxError::Malformed("plane stride below its row size"));
    }
    let (expected_w, expected_h) = match plane.channel {
        Channel::Cb | Channel::Cr => match item.chroma.subsampling() {
            Some((sx, sy)) => (item.width.div_ceil(sx), item.height.div_ceil(sy)),
            None => return Err(BoxError::Malformed("chroma plane in a non-subsampled item")),
        },
        _ => (item.width, item.height),
    };
    if plane.width != expected_w || plane.height != expected_h {
        return Err(BoxError::Malformed("plane dimensions do not match the item"));
    }
    Ok(())
}

fn parse_plane(r: &mut Reader<'_>) -> Result<PlaneRec, BoxError> {
    let channel = channel_from_code(r.u8()?).ok_or(BoxError::Malformed("unknown channel"))?;
    let width = r.u32()?;
    let height = r.u32()?;
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(BoxError::Malformed("plane dimensions out of range"));
    }
    let bit_depth = r.u8()?;
    if bit_depth == 0 || bit_depth > 16 {
        return Err(BoxError::Malformed("plane bit depth out of range"));
    }
    let stride = r.u32()?;
    let len = r.u32()?;
    if len > MAX_PLANE_BYTES || stride == 0 || (stride as usize) < width as usize {
        return Err(BoxError::Malformed("plane stride out of range"));
    }
    if len as usize != stride as usize * height as usize {
        return Err(BoxError::Malformed("plane length does not match stride"));
    }
    let data = r.take(len as usize)?.to_vec();
    Ok(PlaneRec {
        channel,
        width,
        height,
        bit_depth,
        stride: stride as usize,
        data,
    })
}

fn compression_from_code(code: u8) -> Option<CompressionFormat> {
    Some(match code {
        0 => CompressionFormat::Undefined,
        1 => CompressionFormat::Hevc,
        2 => CompressionFormat::Avc,
        3 => CompressionFormat::Jpeg,
        4 => CompressionFormat::Av1,
        5 => CompressionFormat::Vvc,
        6 => CompressionFormat::Evc,
        7 => CompressionFormat::Jpeg2000,
        8 => CompressionFormat::Uncompressed,
        _ => return None,
    })
}

fn colorspace_from_code(code: u8) -> Option<Colorspace> {
    Some(match code {
        0 => Colorspace::YCbCr,
        1 => Colorspace::Rgb,
        2 => Colorspace::Monochrome,
        99 => Colorspace::Undefined,
        _ => return None,
    })
}

fn chroma_from_code(code: u8) -> Option<Chroma> {
    Some(match code {
        0 => Chroma::Monochrome,
        1 => Chroma::C420,
        2 => Chroma::C422,
        3 => Chroma::C444,
        10 => Chroma::InterleavedRgb,
        11 => Chroma::InterleavedRgba,
        12 => Chroma::InterleavedRrggbbBe,
        13 => Chroma::InterleavedRrggbbaaBe,
        99 => Chroma::Undefined,
        _ => return None,
    })
}

fn channel_from_code(code: u8) -> Option<Channel> {
    Some(match code {
        0 => Channel::Y,
        1 => Channel::Cb,
        2 => Channel::Cr,
        3 => Channel::R,
        4 => Channel::G,
        5 => Channel::B,
        6 => Channel::Alpha,
        10 => Channel::Interleaved,
        _ => return None,
    })
}
