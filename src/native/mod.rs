//! The codec engine behind the public wrappers.
//!
//! The surface deliberately looks like a C library binding: opaque handles,
//! status codes with a diagnostic string, explicit release calls. Objects
//! live in a global arena ([`heap`]) and every function resolves its handle
//! on entry; a stale or mistyped handle is a `UsageError`, never undefined
//! behavior. The wrappers own lifetimes, the engine owns pixels.

pub(crate) mod boxes;
mod codec;
mod heap;

use std::sync::Arc;

pub(crate) use heap::RawHandle;
use heap::{
    with_heap, ContextData, DecodingOptionsData, EncoderData, EncodingOptionsData, HandleData,
    ImageData, ItemData, ItemKind, PlaneRec, Resource,
};

use crate::context::ItemId;
use crate::encoder::CompressionFormat;
use crate::image::{Channel, Chroma, Colorspace};

/// Engine version assumed by this binding, packed as `0xHHMMLL00` BCD.
pub(crate) const BUILD_VERSION: u32 = 0x0114_0200;

pub(crate) fn version_number() -> u32 {
    BUILD_VERSION
}

pub(crate) fn init() {
    log::trace!(
        target: "heifbox::engine",
        "engine initialized, version {:#010x}",
        BUILD_VERSION
    );
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StatusCode {
    InvalidInput,
    UnsupportedFiletype,
    UnsupportedFeature,
    UsageError,
    MemoryAllocation,
    DecoderPlugin,
    EncoderPlugin,
    EncodingError,
}

/// Status returned by every fallible engine call.
#[derive(Debug)]
pub(crate) struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub(crate) fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Status {
            code,
            message: message.into(),
        }
    }
}

impl From<boxes::BoxError> for Status {
    fn from(err: boxes::BoxError) -> Self {
        let code = match err {
            boxes::BoxError::BadFileType => StatusCode::UnsupportedFiletype,
            _ => StatusCode::InvalidInput,
        };
        Status::new(code, err.to_string())
    }
}

fn bad_handle() -> Status {
    Status::new(StatusCode::UsageError, "invalid or stale handle")
}

// --- contexts ---

pub(crate) fn context_alloc() -> Option<RawHandle> {
    Some(with_heap(|heap| heap.alloc(Resource::Context(ContextData::new()))))
}

pub(crate) fn context_release(raw: RawHandle) {
    with_heap(|heap| heap.release(raw));
}

pub(crate) fn context_read_from_memory(raw: RawHandle, data: &[u8]) -> Result<(), Status> {
    let parsed = boxes::parse_container(data)?;
    with_heap(|heap| match heap.get_mut(raw) {
        Some(Resource::Context(ctx)) => {
            *ctx = parsed;
            Ok(())
        }
        _ => Err(bad_handle()),
    })
}

pub(crate) fn context_serialize(raw: RawHandle) -> Result<Vec<u8>, Status> {
    with_heap(|heap| match heap.get(raw) {
        Some(Resource::Context(ctx)) => boxes::write_container(ctx)
            .map_err(|err| Status::new(StatusCode::EncodingError, err.to_string())),
        _ => Err(bad_handle()),
    })
}

pub(crate) fn context_top_level_count(raw: RawHandle) -> Result<usize, Status> {
    with_heap(|heap| match heap.get(raw) {
        Some(Resource::Context(ctx)) => Ok(ctx
            .items
            .iter()
            .filter(|item| item.kind == ItemKind::TopLevel)
            .count()),
        _ => Err(bad_handle()),
    })
}

pub(crate) fn context_top_level_ids(raw: RawHandle) -> Result<Vec<ItemId>, Status> {
    with_heap(|heap| match heap.get(raw) {
        Some(Resource::Context(ctx)) => Ok(ctx
            .items
            .iter()
            .filter(|item| item.kind == ItemKind::TopLevel)
            .map(|item| item.id)
            .collect()),
        _ => Err(bad_handle()),
    })
}

pub(crate) fn context_primary_id(raw: RawHandle) -> Result<Option<ItemId>, Status> {
    with_heap(|heap| match heap.get(raw) {
        Some(Resource::Context(ctx)) => Ok(ctx.primary),
        _ => Err(bad_handle()),
    })
}

/// Hand out a snapshot handle for one top-level item. `Ok(None)` when the id
/// is unknown.
pub(crate) fn context_image_handle(
    raw: RawHandle,
    id: ItemId,
) -> Result<Option<RawHandle>, Status> {
    with_heap(|heap| {
        let (item, peers, primary) = match heap.get(raw) {
            Some(Resource::Context(ctx)) => match ctx.item(id) {
                Some(item) if item.kind == ItemKind::TopLevel => {
                    (Arc::clone(item), ctx.items.clone(), ctx.primary == Some(id))
                }
                _ => return Ok(None),
            },
            _ => return Err(bad_handle()),
        };
        Ok(Some(heap.alloc(Resource::ImageHandle(HandleData {
            item,
            peers,
            primary,
        }))))
    })
}

// --- image handles ---

pub(crate) struct HandleScalars {
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
    pub primary: bool,
    pub luma_bits: u8,
    pub chroma_bits: u8,
}

pub(crate) fn handle_release(raw: RawHandle) {
    with_heap(|heap| heap.release(raw));
}

pub(crate) fn handle_scalars(raw: RawHandle) -> Result<HandleScalars, Status> {
    with_heap(|heap| match heap.get(raw) {
        Some(Resource::ImageHandle(handle)) => {
            let item = &handle.item;
            let depth_of = |channel: Channel| {
                item.planes
                    .iter()
                    .find(|p| p.channel == channel || p.channel == Channel::Interleaved)
                    .map(|p| p.bit_depth)
                    .unwrap_or(8)
            };
            Ok(HandleScalars {
                width: item.width,
                height: item.height,
                has_alpha: item.has_alpha(),
                primary: handle.primary,
                luma_bits: depth_of(Channel::Y),
                chroma_bits: depth_of(Channel::Cb),
            })
        }
        _ => Err(bad_handle()),
    })
}

pub(crate) fn handle_thumbnail_ids(raw: RawHandle) -> Result<Vec<ItemId>, Status> {
    with_heap(|heap| match heap.get(raw) {
        Some(Resource::ImageHandle(handle)) => Ok(handle.item.thumbnails.clone()),
        _ => Err(bad_handle()),
    })
}

pub(crate) fn handle_depth_ids(raw: RawHandle) -> Result<Vec<ItemId>, Status> {
    with_heap(|heap| match heap.get(raw) {
        Some(Resource::ImageHandle(handle)) => Ok(handle.item.depth_images.clone()),
        _ => Err(bad_handle()),
    })
}

fn handle_child(
    raw: RawHandle,
    id: ItemId,
    listed_in: impl Fn(&ItemData) -> &[ItemId],
) -> Result<Option<RawHandle>, Status> {
    with_heap(|heap| {
        let (item, peers) = match heap.get(raw) {
            Some(Resource::ImageHandle(handle)) => {
                if !listed_in(&handle.item).contains(&id) {
                    return Ok(None);
                }
                match handle.peers.iter().find(|peer| peer.id == id) {
                    Some(peer) => (Arc::clone(peer), handle.peers.clone()),
                    None => return Ok(None),
                }
            }
            _ => return Err(bad_handle()),
        };
        Ok(Some(heap.alloc(Resource::ImageHandle(HandleData {
            item,
            peers,
            primary: false,
        }))))
    })
}

pub(crate) fn handle_thumbnail(raw: RawHandle, id: ItemId) -> Result<Option<RawHandle>, Status> {
    handle_child(raw, id, |item| &item.thumbnails)
}

pub(crate) fn handle_depth_image(raw: RawHandle, id: ItemId) -> Result<Option<RawHandle>, Status> {
    handle_child(raw, id, |item| &item.depth_images)
}

pub(crate) fn handle_decode_image(
    raw: RawHandle,
    colorspace: Colorspace,
    chroma: Chroma,
    options: Option<RawHandle>,
) -> Result<RawHandle, Status> {
    with_heap(|heap| {
        let (convert_hdr, ignore_transformations) = match options {
            Some(opts) => match heap.get(opts) {
                Some(Resource::DecodingOptions(o)) => {
                    (o.convert_hdr_to_8bit, o.ignore_transformations)
                }
                _ => return Err(bad_handle()),
            },
            None => (false, false),
        };
        if ignore_transformations {
            // Stored items carry no rotation or crop boxes, so there is
            // nothing to skip; the request is honored trivially.
            log::trace!(target: "heifbox::engine", "decode: transformations ignored");
        }
        let item = match heap.get(raw) {
            Some(Resource::ImageHandle(handle)) => Arc::clone(&handle.item),
            _ => return Err(bad_handle()),
        };
        let image = codec::decode_item(&item, colorspace, chroma, convert_hdr)?;
        Ok(heap.alloc(Resource::Image(image)))
    })
}

// --- images ---

pub(crate) struct ImageScalars {
    pub width: u32,
    pub height: u32,
    pub colorspace: Colorspace,
    pub chroma: Chroma,
}

pub(crate) struct PlaneInfo {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub stride: usize,
}

pub(crate) fn image_create(
    width: u32,
    height: u32,
    colorspace: Colorspace,
    chroma: Chroma,
) -> Option<RawHandle> {
    Some(with_heap(|heap| {
        heap.alloc(Resource::Image(ImageData {
            width,
            height,
            colorspace,
            chroma,
            planes: Vec::new(),
        }))
    }))
}

pub(crate) fn image_release(raw: RawHandle) {
    with_heap(|heap| heap.release(raw));
}

pub(crate) fn image_scalars(raw: RawHandle) -> Result<ImageScalars, Status> {
    with_heap(|heap| match heap.get(raw) {
        Some(Resource::Image(image)) => Ok(ImageScalars {
            width: image.width,
            height: image.height,
            colorspace: image.colorspace,
            chroma: image.chroma,
        }),
        _ => Err(bad_handle()),
    })
}

fn channel_fits_layout(colorspace: Colorspace, chroma: Chroma, channel: Channel) -> bool {
    if chroma.interleaved_bytes_per_pixel().is_some() {
        return channel == Channel::Interleaved;
    }
    if chroma == Chroma::Monochrome {
        return matches!(channel, Channel::Y | Channel::Alpha);
    }
    match colorspace {
        Colorspace::YCbCr => matches!(
            channel,
            Channel::Y | Channel::Cb | Channel::Cr | Channel::Alpha
        ),
        Colorspace::Rgb => matches!(
            channel,
            Channel::R | Channel::G | Channel::B | Channel::Alpha
        ),
        _ => false,
    }
}

fn bytes_per_sample(chroma: Chroma, channel: Channel, bit_depth: u8) -> usize {
    if channel == Channel::Interleaved {
        chroma.interleaved_bytes_per_pixel().unwrap_or(1)
    } else if bit_depth > 8 {
        2
    } else {
        1
    }
}

pub(crate) fn image_add_plane(
    raw: RawHandle,
    channel: Channel,
    width: u32,
    height: u32,
    bit_depth: u8,
) -> Result<(), Status> {
    with_heap(|heap| {
        let Some(Resource::Image(image)) = heap.get_mut(raw) else {
            return Err(bad_handle());
        };
        if width == 0 || height == 0 {
            return Err(Status::new(StatusCode::UsageError, "empty plane"));
        }
        if bit_depth == 0 || bit_depth > 16 {
            return Err(Status::new(StatusCode::UsageError, "bit depth out of range"));
        }
        if !channel_fits_layout(image.colorspace, image.chroma, channel) {
            return Err(Status::new(
                StatusCode::UsageError,
                format!("channel {channel:?} does not fit the image layout"),
            ));
        }
        if image.planes.iter().any(|p| p.channel == channel) {
            return Err(Status::new(
                StatusCode::UsageError,
                format!("plane for channel {channel:?} already exists"),
            ));
        }
        let stride = width as usize * bytes_per_sample(image.chroma, channel, bit_depth);
        // Same cap the container parser enforces.
        const MAX_PLANE_BYTES: usize = 1 << 30;
        if stride * height as usize > MAX_PLANE_BYTES {
            return Err(Status::new(
                StatusCode::MemoryAllocation,
                "plane exceeds the allocation limit",
            ));
        }
        image.planes.push(PlaneRec {
            channel,
            width,
            height,
            bit_depth,
            stride,
            data: vec![0u8; stride * height as usize],
        });
        Ok(())
    })
}

pub(crate) fn image_plane_info(raw: RawHandle, channel: Channel) -> Option<PlaneInfo> {
    with_heap(|heap| match heap.get(raw) {
        Some(Resource::Image(image)) => {
            image
                .planes
                .iter()
                .find(|p| p.channel == channel)
                .map(|p| PlaneInfo {
                    width: p.width,
                    height: p.height,
                    bit_depth: p.bit_depth,
                    stride: p.stride,
                })
        }
        _ => None,
    })
}

pub(crate) fn image_plane_channels(raw: RawHandle) -> Result<Vec<Channel>, Status> {
    with_heap(|heap| match heap.get(raw) {
        Some(Resource::Image(image)) => Ok(image.planes.iter().map(|p| p.channel).collect()),
        _ => Err(bad_handle()),
    })
}

pub(crate) fn image_plane_copy(
    raw: RawHandle,
    channel: Channel,
) -> Result<Option<PlaneRec>, Status> {
    with_heap(|heap| match heap.get(raw) {
        Some(Resource::Image(image)) => {
            Ok(image.planes.iter().find(|p| p.channel == channel).cloned())
        }
        _ => Err(bad_handle()),
    })
}

/// Copy host rows into a plane. `src_stride` is the source row distance in
/// bytes; the source must cover `(height - 1) * src_stride + row_bytes`.
pub(crate) fn image_set_plane_data(
    raw: RawHandle,
    channel: Channel,
    data: &[u8],
    src_stride: usize,
) -> Result<(), Status> {
    with_heap(|heap| {
        let Some(Resource::Image(image)) = heap.get_mut(raw) else {
            return Err(bad_handle());
        };
        let Some(plane) = image.planes.iter_mut().find(|p| p.channel == channel) else {
            return Err(Status::new(
                StatusCode::UsageError,
                format!("no plane for channel {channel:?}"),
            ));
        };
        let row_bytes = plane.stride;
        if src_stride < row_bytes {
            return Err(Status::new(
                StatusCode::UsageError,
                "source stride below the plane's row size",
            ));
        }
        let height = plane.height as usize;
        let needed = (height - 1) * src_stride + row_bytes;
        if data.len() < needed {
            return Err(Status::new(
                StatusCode::UsageError,
                format!("source buffer holds {} bytes, needs {needed}", data.len()),
            ));
        }
        for row in 0..height {
            let src = row * src_stride;
            let dst = row * plane.stride;
            plane.data[dst..dst + row_bytes].copy_from_slice(&data[src..src + row_bytes]);
        }
        Ok(())
    })
}

// --- encoders ---

pub(crate) fn have_encoder_for_format(format: CompressionFormat) -> bool {
    codec::descriptor_for(format).is_some()
}

pub(crate) fn encoder_descriptor(
    format: CompressionFormat,
) -> Option<(&'static str, &'static str)> {
    codec::descriptor_for(format).map(|d| (d.id, d.name))
}

pub(crate) fn encoder_alloc(format: CompressionFormat) -> Option<RawHandle> {
    codec::descriptor_for(format)?;
    Some(with_heap(|heap| {
        heap.alloc(Resource::Encoder(EncoderData::new(format)))
    }))
}

pub(crate) fn encoder_release(raw: RawHandle) {
    with_heap(|heap| heap.release(raw));
}

fn with_encoder(raw: RawHandle, f: impl FnOnce(&mut EncoderData) -> Result<(), Status>) -> Result<(), Status> {
    with_heap(|heap| match heap.get_mut(raw) {
        Some(Resource::Encoder(enc)) => f(enc),
        _ => Err(bad_handle()),
    })
}

pub(crate) fn encoder_set_quality(raw: RawHandle, quality: i32) -> Result<(), Status> {
    if !(0..=100).contains(&quality) {
        return Err(Status::new(
            StatusCode::UsageError,
            format!("quality {quality} outside 0..=100"),
        ));
    }
    with_encoder(raw, |enc| {
        enc.quality = quality;
        Ok(())
    })
}

pub(crate) fn encoder_set_lossless(raw: RawHandle, lossless: bool) -> Result<(), Status> {
    with_encoder(raw, |enc| {
        enc.lossless = lossless;
        Ok(())
    })
}

pub(crate) fn encoder_set_logging_level(raw: RawHandle, level: i32) -> Result<(), Status> {
    if !(0..=3).contains(&level) {
        return Err(Status::new(
            StatusCode::UsageError,
            format!("logging level {level} outside 0..=3"),
        ));
    }
    with_encoder(raw, |enc| {
        enc.logging = level;
        Ok(())
    })
}

// --- options ---

pub(crate) fn decoding_options_alloc() -> Option<RawHandle> {
    Some(with_heap(|heap| {
        heap.alloc(Resource::DecodingOptions(DecodingOptionsData::new()))
    }))
}

pub(crate) fn decoding_options_free(raw: RawHandle) {
    with_heap(|heap| heap.release(raw));
}

pub(crate) fn decoding_options_version(raw: RawHandle) -> Result<u8, Status> {
    with_heap(|heap| match heap.get(raw) {
        Some(Resource::DecodingOptions(o)) => Ok(o.version),
        _ => Err(bad_handle()),
    })
}

pub(crate) fn decoding_options_set_ignore_transformations(
    raw: RawHandle,
    ignore: bool,
) -> Result<(), Status> {
    with_heap(|heap| match heap.get_mut(raw) {
        Some(Resource::DecodingOptions(o)) => {
            o.ignore_transformations = ignore;
            Ok(())
        }
        _ => Err(bad_handle()),
    })
}

pub(crate) fn decoding_options_set_convert_hdr_to_8bit(
    raw: RawHandle,
    convert: bool,
) -> Result<(), Status> {
    with_heap(|heap| match heap.get_mut(raw) {
        Some(Resource::DecodingOptions(o)) => {
            o.convert_hdr_to_8bit = convert;
            Ok(())
        }
        _ => Err(bad_handle()),
    })
}

pub(crate) fn encoding_options_alloc() -> Option<RawHandle> {
    Some(with_heap(|heap| {
        heap.alloc(Resource::EncodingOptions(EncodingOptionsData::new()))
    }))
}

pub(crate) fn encoding_options_free(raw: RawHandle) {
    with_heap(|heap| heap.release(raw));
}

pub(crate) fn encoding_options_version(raw: RawHandle) -> Result<u8, Status> {
    with_heap(|heap| match heap.get(raw) {
        Some(Resource::EncodingOptions(o)) => Ok(o.version),
        _ => Err(bad_handle()),
    })
}

pub(crate) fn encoding_options_set_save_alpha(raw: RawHandle, save: bool) -> Result<(), Status> {
    with_heap(|heap| match heap.get_mut(raw) {
        Some(Resource::EncodingOptions(o)) => {
            o.save_alpha_channel = save;
            Ok(())
        }
        _ => Err(bad_handle()),
    })
}

// --- encoding into a context ---

fn snapshot_encoder(heap: &heap::Heap, raw: RawHandle) -> Result<EncoderData, Status> {
    match heap.get(raw) {
        Some(Resource::Encoder(enc)) => Ok(EncoderData {
            format: enc.format,
            quality: enc.quality,
            lossless: enc.lossless,
            logging: enc.logging,
        }),
        _ => Err(bad_handle()),
    }
}

fn snapshot_encoding_options(
    heap: &heap::Heap,
    raw: Option<RawHandle>,
) -> Result<EncodingOptionsData, Status> {
    match raw {
        Some(raw) => match heap.get(raw) {
            Some(Resource::EncodingOptions(o)) => Ok(EncodingOptionsData {
                version: o.version,
                save_alpha_channel: o.save_alpha_channel,
            }),
            _ => Err(bad_handle()),
        },
        None => Ok(EncodingOptionsData::new()),
    }
}

/// Compress an image into the context and hand back a handle for the new
/// top-level item. The first encoded item becomes the primary image.
pub(crate) fn context_encode_image(
    ctx_raw: RawHandle,
    image_raw: RawHandle,
    encoder_raw: RawHandle,
    options_raw: Option<RawHandle>,
) -> Result<RawHandle, Status> {
    with_heap(|heap| {
        let encoder = snapshot_encoder(heap, encoder_raw)?;
        let options = snapshot_encoding_options(heap, options_raw)?;
        let id = match heap.get(ctx_raw) {
            Some(Resource::Context(ctx)) => ctx.next_id,
            _ => return Err(bad_handle()),
        };
        let item = match heap.get(image_raw) {
            Some(Resource::Image(image)) => codec::encode_item(image, &encoder, &options, id)?,
            _ => return Err(bad_handle()),
        };

        let (item, peers, primary) = match heap.get_mut(ctx_raw) {
            Some(Resource::Context(ctx)) => {
                let item = Arc::new(item);
                ctx.items.push(Arc::clone(&item));
                ctx.next_id = id + 1;
                if ctx.primary.is_none() {
                    ctx.primary = Some(id);
                }
                (item, ctx.items.clone(), ctx.primary == Some(id))
            }
            _ => return Err(bad_handle()),
        };
        Ok(heap.alloc(Resource::ImageHandle(HandleData {
            item,
            peers,
            primary,
        })))
    })
}

/// Compress `image_raw` scaled into a `bbox` bounding box and attach it as a
/// thumbnail of the master item behind `master_raw`.
pub(crate) fn context_encode_thumbnail(
    ctx_raw: RawHandle,
    image_raw: RawHandle,
    master_raw: RawHandle,
    encoder_raw: RawHandle,
    options_raw: Option<RawHandle>,
    bbox: u32,
) -> Result<RawHandle, Status> {
    with_heap(|heap| {
        let encoder = snapshot_encoder(heap, encoder_raw)?;
        let options = snapshot_encoding_options(heap, options_raw)?;
        let master_id = match heap.get(master_raw) {
            Some(Resource::ImageHandle(handle)) => handle.item.id,
            _ => return Err(bad_handle()),
        };
        let id = match heap.get(ctx_raw) {
            Some(Resource::Context(ctx)) => {
                if ctx.item(master_id).is_none() {
                    return Err(Status::new(
                        StatusCode::UsageError,
                        "master image is not part of this context",
                    ));
                }
                ctx.next_id
            }
            _ => return Err(bad_handle()),
        };
        let mut item = match heap.get(image_raw) {
            Some(Resource::Image(image)) => codec::encode_item(image, &encoder, &options, id)?,
            _ => return Err(bad_handle()),
        };
        let (width, height, planes) =
            codec::scale_to_bbox(item.width, item.height, item.chroma, &item.planes, bbox);
        item.kind = ItemKind::Thumbnail;
        item.width = width;
        item.height = height;
        item.planes = planes;

        let (item, peers) = match heap.get_mut(ctx_raw) {
            Some(Resource::Context(ctx)) => {
                let item = Arc::new(item);
                ctx.items.push(Arc::clone(&item));
                ctx.next_id = id + 1;
                // Replace the master's entry so it lists the new thumbnail.
                // Handles created earlier keep their old snapshot.
                if let Some(slot) = ctx.items.iter_mut().find(|i| i.id == master_id) {
                    let mut master = (**slot).clone();
                    master.thumbnails.push(id);
                    *slot = Arc::new(master);
                }
                (item, ctx.items.clone())
            }
            _ => return Err(bad_handle()),
        };
        Ok(heap.alloc(Resource::ImageHandle(HandleData {
            item,
            peers,
            primary: false,
        })))
    })
}
