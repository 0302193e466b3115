//! Container contexts and image handles.
//!
//! A [`Context`] wraps one engine container. Everything derived from it
//! (handles, encoders) shares an `Arc` on the inner state, so the engine
//! context outlives its children no matter in which order the wrappers are
//! dropped. An [`ImageHandle`] is a navigational snapshot of one item:
//! scalar attributes are copied out eagerly and remain valid even after the
//! context wrapper itself has been released.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::encoder::{CompressionFormat, Encoder};
use crate::error::HeifError;
use crate::handle::Owned;
use crate::image::{Chroma, Colorspace, Image};
use crate::native;
use crate::options::{DecodingOptions, EncodingOptions};

/// Identifier of one item inside a container.
pub type ItemId = u32;

#[derive(Debug)]
pub(crate) struct ContextInner {
    handle: Owned,
}

impl ContextInner {
    fn raw(&self) -> Result<native::RawHandle, HeifError> {
        self.handle.get()
    }
}

/// One container, either read from bytes or being assembled by encoding.
#[derive(Debug)]
pub struct Context {
    inner: Arc<ContextInner>,
    populated: bool,
}

impl Context {
    /// Allocate an empty container.
    pub fn new() -> Result<Self, HeifError> {
        crate::check_library_version()?;
        let raw = native::context_alloc();
        let handle = Owned::acquire(raw, native::context_release, "context")?;
        Ok(Context {
            inner: Arc::new(ContextInner { handle }),
            populated: false,
        })
    }

    /// Parse a serialized container. A context can be populated only once;
    /// a second read fails with [`HeifError::AlreadyPopulated`].
    pub fn read_from_memory(&mut self, data: &[u8]) -> Result<(), HeifError> {
        if self.populated {
            return Err(HeifError::AlreadyPopulated);
        }
        native::context_read_from_memory(self.inner.raw()?, data)?;
        self.populated = true;
        Ok(())
    }

    /// Read and parse a container file.
    pub fn read_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), HeifError> {
        let data = std::fs::read(path)?;
        self.read_from_memory(&data)
    }

    /// Serialize the container into a writer.
    pub fn write(&self, writer: &mut impl Write) -> Result<(), HeifError> {
        let data = native::context_serialize(self.inner.raw()?)?;
        writer.write_all(&data)?;
        Ok(())
    }

    /// Serialize the container into a file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), HeifError> {
        let mut file = std::fs::File::create(path)?;
        self.write(&mut file)
    }

    pub fn number_of_top_level_images(&self) -> Result<usize, HeifError> {
        Ok(native::context_top_level_count(self.inner.raw()?)?)
    }

    /// Ids of all top-level images. The order carries no meaning.
    pub fn top_level_image_ids(&self) -> Result<Vec<ItemId>, HeifError> {
        Ok(native::context_top_level_ids(self.inner.raw()?)?)
    }

    pub fn primary_image_id(&self) -> Result<ItemId, HeifError> {
        native::context_primary_id(self.inner.raw()?)?.ok_or(HeifError::NoPrimaryImage)
    }

    pub fn primary_image_handle(&self) -> Result<ImageHandle, HeifError> {
        let id = self.primary_image_id()?;
        self.image_handle(id)
    }

    /// Handle for the top-level image with the given id.
    pub fn image_handle(&self, id: ItemId) -> Result<ImageHandle, HeifError> {
        let raw = native::context_image_handle(self.inner.raw()?, id)?
            .ok_or(HeifError::ImageNotFound { id })?;
        ImageHandle::from_raw(raw, Arc::clone(&self.inner))
    }

    /// Create an encoder for `format`, bound to this context.
    pub fn new_encoder(&self, format: CompressionFormat) -> Result<Encoder, HeifError> {
        Encoder::for_format(Arc::clone(&self.inner), format)
    }

    /// Compress `image` into the container and return a handle for the new
    /// item. The first encoded image becomes the primary image.
    pub fn encode_image(
        &mut self,
        image: &Image,
        encoder: &Encoder,
        options: Option<&EncodingOptions>,
    ) -> Result<ImageHandle, HeifError> {
        let options_raw = options.map(|o| o.raw()).transpose()?;
        let raw = native::context_encode_image(
            self.inner.raw()?,
            image.raw()?,
            encoder.raw()?,
            options_raw,
        )?;
        self.populated = true;
        ImageHandle::from_raw(raw, Arc::clone(&self.inner))
    }

    /// Compress `image`, scaled down to fit a `bbox`x`bbox` bounding box,
    /// and attach it as a thumbnail of `master`.
    pub fn encode_thumbnail(
        &mut self,
        image: &Image,
        master: &ImageHandle,
        encoder: &Encoder,
        options: Option<&EncodingOptions>,
        bbox: u32,
    ) -> Result<ImageHandle, HeifError> {
        let options_raw = options.map(|o| o.raw()).transpose()?;
        let raw = native::context_encode_thumbnail(
            self.inner.raw()?,
            image.raw()?,
            master.raw()?,
            encoder.raw()?,
            options_raw,
            bbox,
        )?;
        ImageHandle::from_raw(raw, Arc::clone(&self.inner))
    }
}

/// Handle for one image item of a container.
///
/// Scalar attributes are copied out at creation, so the accessors are
/// infallible and stay usable for as long as the handle wrapper exists.
#[derive(Debug)]
pub struct ImageHandle {
    handle: Owned,
    _ctx: Arc<ContextInner>,
    width: u32,
    height: u32,
    has_alpha: bool,
    primary: bool,
    luma_bits: u8,
    chroma_bits: u8,
}

impl ImageHandle {
    fn from_raw(raw: native::RawHandle, ctx: Arc<ContextInner>) -> Result<Self, HeifError> {
        let handle = Owned::acquire(Some(raw), native::handle_release, "image handle")?;
        let scalars = native::handle_scalars(raw)?;
        Ok(ImageHandle {
            handle,
            _ctx: ctx,
            width: scalars.width,
            height: scalars.height,
            has_alpha: scalars.has_alpha,
            primary: scalars.primary,
            luma_bits: scalars.luma_bits,
            chroma_bits: scalars.chroma_bits,
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

    pub fn has_alpha_channel(&self) -> bool {
        self.has_alpha
    }

    pub fn is_primary_image(&self) -> bool {
        self.primary
    }

    pub fn luma_bits_per_pixel(&self) -> u8 {
        self.luma_bits
    }

    pub fn chroma_bits_per_pixel(&self) -> u8 {
        self.chroma_bits
    }

    pub fn number_of_thumbnails(&self) -> Result<usize, HeifError> {
        Ok(self.thumbnail_ids()?.len())
    }

    /// Ids of the thumbnails attached to this image. The order carries no
    /// meaning.
    pub fn thumbnail_ids(&self) -> Result<Vec<ItemId>, HeifError> {
        Ok(native::handle_thumbnail_ids(self.handle.get()?)?)
    }

    pub fn thumbnail(&self, id: ItemId) -> Result<ImageHandle, HeifError> {
        let raw = native::handle_thumbnail(self.handle.get()?, id)?
            .ok_or(HeifError::ImageNotFound { id })?;
        ImageHandle::from_raw(raw, Arc::clone(&self._ctx))
    }

    pub fn has_depth_image(&self) -> Result<bool, HeifError> {
        Ok(!self.depth_image_ids()?.is_empty())
    }

    pub fn number_of_depth_images(&self) -> Result<usize, HeifError> {
        Ok(self.depth_image_ids()?.len())
    }

    /// Ids of the depth images attached to this image. The order carries no
    /// meaning.
    pub fn depth_image_ids(&self) -> Result<Vec<ItemId>, HeifError> {
        Ok(native::handle_depth_ids(self.handle.get()?)?)
    }

    pub fn depth_image_handle(&self, id: ItemId) -> Result<ImageHandle, HeifError> {
        let raw = native::handle_depth_image(self.handle.get()?, id)?
            .ok_or(HeifError::ImageNotFound { id })?;
        ImageHandle::from_raw(raw, Arc::clone(&self._ctx))
    }

    /// Decode the item into pixel planes, converting to the requested
    /// colorspace and chroma. `Undefined` in either slot keeps the engine's
    /// native representation.
    pub fn decode_image(
        &self,
        colorspace: Colorspace,
        chroma: Chroma,
        options: Option<&DecodingOptions>,
    ) -> Result<Image, HeifError> {
        let options_raw = options.map(|o| o.raw()).transpose()?;
        let raw =
            native::handle_decode_image(self.handle.get()?, colorspace, chroma, options_raw)?;
        Image::from_raw(raw)
    }

    /// Release the engine handle now instead of at drop. Idempotent.
    pub fn release(&mut self) {
        self.handle.release_now();
    }
}
