//! Image and plane model: colorspace, chroma layout, and strided planes.

use imgref::ImgVec;
use rgb::{FromSlice, RGBA};

use crate::error::HeifError;
use crate::handle::Owned;
use crate::native;

/// Colorspace of an image. Numeric codes match the engine surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Colorspace {
    YCbCr = 0,
    Rgb = 1,
    Monochrome = 2,
    /// Let the engine pick its native representation when decoding.
    Undefined = 99,
}

/// Chroma layout and subsampling mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Chroma {
    Monochrome = 0,
    C420 = 1,
    C422 = 2,
    C444 = 3,
    InterleavedRgb = 10,
    InterleavedRgba = 11,
    /// Interleaved 16-bit-per-channel RGB, big endian, for depths above 8.
    InterleavedRrggbbBe = 12,
    /// Interleaved 16-bit-per-channel RGBA, big endian, for depths above 8.
    InterleavedRrggbbaaBe = 13,
    Undefined = 99,
}

impl Chroma {
    /// Bytes per pixel for the interleaved layouts, `None` for planar ones.
    pub(crate) fn interleaved_bytes_per_pixel(self) -> Option<usize> {
        match self {
            Chroma::InterleavedRgb => Some(3),
            Chroma::InterleavedRgba => Some(4),
            Chroma::InterleavedRrggbbBe => Some(6),
            Chroma::InterleavedRrggbbaaBe => Some(8),
            _ => None,
        }
    }

    /// Horizontal/vertical chroma subsampling factors for planar YCbCr.
    pub(crate) fn subsampling(self) -> Option<(u32, u32)> {
        match self {
            Chroma::C420 => Some((2, 2)),
            Chroma::C422 => Some((2, 1)),
            Chroma::C444 => Some((1, 1)),
            _ => None,
        }
    }
}

impl Colorspace {
    /// Whether this colorspace/chroma pair is a layout the engine knows.
    pub fn supports_chroma(self, chroma: Chroma) -> bool {
        match self {
            Colorspace::YCbCr => matches!(
                chroma,
                Chroma::Monochrome | Chroma::C420 | Chroma::C422 | Chroma::C444
            ),
            Colorspace::Rgb => matches!(
                chroma,
                Chroma::C444
                    | Chroma::InterleavedRgb
                    | Chroma::InterleavedRgba
                    | Chroma::InterleavedRrggbbBe
                    | Chroma::InterleavedRrggbbaaBe
            ),
            Colorspace::Monochrome => chroma == Chroma::Monochrome,
            Colorspace::Undefined => false,
        }
    }
}

/// Channel held by one plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Channel {
    Y = 0,
    Cb = 1,
    Cr = 2,
    R = 3,
    G = 4,
    B = 5,
    Alpha = 6,
    Interleaved = 10,
}

/// Scalar attributes and pixel bytes of one plane, copied out of the engine.
#[derive(Clone, Debug)]
pub struct PlaneData {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub stride: usize,
    pub data: Vec<u8>,
}

/// A decoded image or an image being assembled for encoding.
///
/// Pixel planes live engine-side; `set_data` copies host bytes in at the call
/// boundary and `plane` copies them back out, so no raw engine memory is ever
/// exposed.
#[derive(Debug)]
pub struct Image {
    handle: Owned,
    width: u32,
    height: u32,
    colorspace: Colorspace,
    chroma: Chroma,
}

impl Image {
    /// Create an empty image with the given dimensions and layout.
    pub fn new(
        width: u32,
        height: u32,
        colorspace: Colorspace,
        chroma: Chroma,
    ) -> Result<Self, HeifError> {
        crate::ensure_init();
        if width == 0 || height == 0 {
            return Err(HeifError::InvalidDimensions { width, height });
        }
        if !colorspace.supports_chroma(chroma) {
            return Err(HeifError::unsupported_pair(colorspace, chroma));
        }
        let raw = native::image_create(width, height, colorspace, chroma);
        let handle = Owned::acquire(raw, native::image_release, "image")?;
        Ok(Image {
            handle,
            width,
            height,
            colorspace,
            chroma,
        })
    }

    /// Wrap a decoded engine image, copying its scalar attributes out.
    pub(crate) fn from_raw(raw: native::RawHandle) -> Result<Self, HeifError> {
        let handle = Owned::acquire(Some(raw), native::image_release, "image")?;
        let scalars = native::image_scalars(raw)?;
        Ok(Image {
            handle,
            width: scalars.width,
            height: scalars.height,
            colorspace: scalars.colorspace,
            chroma: scalars.chroma,
        })
    }

    pub(crate) fn raw(&self) -> Result<native::RawHandle, HeifError> {
        self.handle.get()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn colorspace(&self) -> Colorspace {
        self.colorspace
    }

    pub fn chroma_format(&self) -> Chroma {
        self.chroma
    }

    /// Allocate a plane for `channel`. The engine picks the stride.
    pub fn add_plane(
        &self,
        channel: Channel,
        width: u32,
        height: u32,
        bit_depth: u8,
    ) -> Result<Plane<'_>, HeifError> {
        let raw = self.handle.get()?;
        native::image_add_plane(raw, channel, width, height, bit_depth)
            .map_err(|_| HeifError::PlaneAllocationFailed { channel })?;
        let info = native::image_plane_info(raw, channel)
            .ok_or(HeifError::PlaneAllocationFailed { channel })?;
        Ok(Plane {
            image: self,
            channel,
            width: info.width,
            height: info.height,
            bit_depth: info.bit_depth,
            stride: info.stride,
        })
    }

    /// Copy one plane's attributes and bytes out of the engine.
    pub fn plane(&self, channel: Channel) -> Result<Option<PlaneData>, HeifError> {
        let raw = self.handle.get()?;
        Ok(native::image_plane_copy(raw, channel)?.map(|p| PlaneData {
            width: p.width,
            height: p.height,
            bit_depth: p.bit_depth,
            stride: p.stride,
            data: p.data,
        }))
    }

    /// Channels that currently have planes.
    pub fn plane_channels(&self) -> Result<Vec<Channel>, HeifError> {
        let raw = self.handle.get()?;
        Ok(native::image_plane_channels(raw)?)
    }

    /// Convert an interleaved 8-bit RGBA image into a host pixel buffer.
    pub fn to_rgba8(&self) -> Result<ImgVec<RGBA<u8>>, HeifError> {
        if self.colorspace != Colorspace::Rgb || self.chroma != Chroma::InterleavedRgba {
            return Err(HeifError::UnsupportedImageType {
                detail: "only interleaved 8-bit RGBA images convert to a host RGBA buffer",
            });
        }
        let plane = self
            .plane(Channel::Interleaved)?
            .ok_or(HeifError::UnsupportedImageType {
                detail: "image has no interleaved plane",
            })?;
        let width = self.width as usize;
        let height = self.height as usize;
        let row_bytes = width * 4;
        let mut pixels = Vec::with_capacity(width * height);
        for row in 0..height {
            let start = row * plane.stride;
            pixels.extend_from_slice(plane.data[start..start + row_bytes].as_rgba());
        }
        Ok(ImgVec::new(pixels, width, height))
    }

    /// Release the engine image now instead of at drop. Idempotent.
    pub fn release(&mut self) {
        self.handle.release_now();
    }
}

/// Borrowed view of one engine-side plane of an [`Image`].
#[derive(Debug)]
pub struct Plane<'a> {
    image: &'a Image,
    channel: Channel,
    width: u32,
    height: u32,
    bit_depth: u8,
    stride: usize,
}

impl Plane<'_> {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    /// Row stride in bytes, as chosen by the engine. Always at least
    /// width times the bytes per sample for the plane's depth and layout.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Copy pixel rows into the plane. `src_stride` is the distance between
    /// consecutive source rows in bytes; only the addressed row bytes are
    /// copied, trailing padding is ignored.
    pub fn set_data(&mut self, data: &[u8], src_stride: usize) -> Result<(), HeifError> {
        let raw = self.image.raw()?;
        native::image_set_plane_data(raw, self.channel, data, src_stride)?;
        Ok(())
    }
}
