//! Handle arena backing the engine.
//!
//! Engine objects live in a global slab of slots. A raw handle packs the slot
//! index and a generation counter, so a handle that outlived its object is
//! detected instead of silently aliasing whatever reuses the slot. Slots are
//! reference counted; `release` decrements and frees at zero, mirroring the
//! manual reference counting of a C codec library.
//!
//! Container items are shared through `Arc`: an image handle derived from a
//! context snapshots the item (and its peers, for thumbnail/depth lookup), so
//! it stays valid and safely releasable after the context itself is gone.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::context::ItemId;
use crate::encoder::CompressionFormat;
use crate::image::{Channel, Chroma, Colorspace};

/// Opaque engine handle. The zero bit pattern is never a valid handle and
/// stands in for null.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) struct RawHandle(u64);

impl RawHandle {
    #[cfg(test)]
    pub(crate) fn from_bits(bits: u64) -> Self {
        RawHandle(bits)
    }

    fn pack(index: usize, generation: u32) -> Self {
        RawHandle(((generation as u64) << 32) | (index as u64 + 1))
    }

    fn unpack(self) -> Option<(usize, u32)> {
        let low = (self.0 & 0xffff_ffff) as u32;
        if low == 0 {
            return None;
        }
        Some((low as usize - 1, (self.0 >> 32) as u32))
    }
}

/// Role of an item within a container.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum ItemKind {
    TopLevel,
    Thumbnail,
    Depth,
}

/// One strided pixel plane.
#[derive(Clone, Debug)]
pub(crate) struct PlaneRec {
    pub channel: Channel,
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub stride: usize,
    pub data: Vec<u8>,
}

/// One encoded item inside a container. Immutable once created; attaching a
/// thumbnail to a master replaces the master's `Arc` in the context, while
/// handles created earlier keep their snapshot.
#[derive(Clone, Debug)]
pub(crate) struct ItemData {
    pub id: ItemId,
    pub kind: ItemKind,
    pub compression: CompressionFormat,
    pub width: u32,
    pub height: u32,
    pub colorspace: Colorspace,
    pub chroma: Chroma,
    pub quality: u8,
    pub lossless: bool,
    pub planes: Vec<PlaneRec>,
    pub thumbnails: Vec<ItemId>,
    pub depth_images: Vec<ItemId>,
}

impl ItemData {
    pub fn has_alpha(&self) -> bool {
        matches!(
            self.chroma,
            Chroma::InterleavedRgba | Chroma::InterleavedRrggbbaaBe
        ) || self.planes.iter().any(|p| p.channel == Channel::Alpha)
    }
}

#[derive(Debug)]
pub(crate) struct ContextData {
    pub items: Vec<Arc<ItemData>>,
    pub primary: Option<ItemId>,
    pub next_id: ItemId,
}

impl ContextData {
    pub fn new() -> Self {
        ContextData {
            items: Vec::new(),
            primary: None,
            next_id: 1,
        }
    }

    pub fn item(&self, id: ItemId) -> Option<&Arc<ItemData>> {
        self.items.iter().find(|item| item.id == id)
    }
}

/// Snapshot handed out for one item of a container.
#[derive(Debug)]
pub(crate) struct HandleData {
    pub item: Arc<ItemData>,
    pub peers: Vec<Arc<ItemData>>,
    pub primary: bool,
}

/// A decoded image or an image under construction for encoding.
#[derive(Debug)]
pub(crate) struct ImageData {
    pub width: u32,
    pub height: u32,
    pub colorspace: Colorspace,
    pub chroma: Chroma,
    pub planes: Vec<PlaneRec>,
}

#[derive(Debug)]
pub(crate) struct EncoderData {
    pub format: CompressionFormat,
    pub quality: i32,
    pub lossless: bool,
    pub logging: i32,
}

impl EncoderData {
    pub fn new(format: CompressionFormat) -> Self {
        EncoderData {
            format,
            quality: 50,
            lossless: false,
            logging: 0,
        }
    }
}

#[derive(Debug)]
pub(crate) struct DecodingOptionsData {
    pub version: u8,
    pub ignore_transformations: bool,
    pub convert_hdr_to_8bit: bool,
}

impl DecodingOptionsData {
    pub fn new() -> Self {
        DecodingOptionsData {
            version: 5,
            ignore_transformations: false,
            convert_hdr_to_8bit: false,
        }
    }
}

#[derive(Debug)]
pub(crate) struct EncodingOptionsData {
    pub version: u8,
    pub save_alpha_channel: bool,
}

impl EncodingOptionsData {
    pub fn new() -> Self {
        EncodingOptionsData {
            version: 7,
            save_alpha_channel: true,
        }
    }
}

#[derive(Debug)]
pub(crate) enum Resource {
    Context(ContextData),
    Image(ImageData),
    ImageHandle(HandleData),
    Encoder(EncoderData),
    DecodingOptions(DecodingOptionsData),
    EncodingOptions(EncodingOptionsData),
}

struct Slot {
    generation: u32,
    refcount: u32,
    resource: Option<Resource>,
}

pub(crate) struct Heap {
    slots: Vec<Slot>,
    free: Vec<usize>,
}

impl Heap {
    fn new() -> Self {
        Heap {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn alloc(&mut self, resource: Resource) -> RawHandle {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.refcount = 1;
                slot.resource = Some(resource);
                RawHandle::pack(index, slot.generation)
            }
            None => {
                let index = self.slots.len();
                self.slots.push(Slot {
                    generation: 0,
                    refcount: 1,
                    resource: Some(resource),
                });
                RawHandle::pack(index, 0)
            }
        }
    }

    fn slot_index(&self, handle: RawHandle) -> Option<usize> {
        let (index, generation) = handle.unpack()?;
        let slot = self.slots.get(index)?;
        if slot.generation != generation || slot.resource.is_none() {
            return None;
        }
        Some(index)
    }

    pub fn get(&self, handle: RawHandle) -> Option<&Resource> {
        let index = self.slot_index(handle)?;
        self.slots[index].resource.as_ref()
    }

    pub fn get_mut(&mut self, handle: RawHandle) -> Option<&mut Resource> {
        let index = self.slot_index(handle)?;
        self.slots[index].resource.as_mut()
    }

    /// Drop one reference. Frees the object and bumps the slot generation at
    /// zero. Stale or null handles are ignored.
    pub fn release(&mut self, handle: RawHandle) {
        let Some(index) = self.slot_index(handle) else {
            return;
        };
        let slot = &mut self.slots[index];
        slot.refcount -= 1;
        if slot.refcount == 0 {
            slot.resource = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index);
        }
    }
}

static HEAP: OnceLock<Mutex<Heap>> = OnceLock::new();

pub(crate) fn with_heap<T>(f: impl FnOnce(&mut Heap) -> T) -> T {
    let mutex = HEAP.get_or_init(|| Mutex::new(Heap::new()));
    let mut guard = mutex.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}
