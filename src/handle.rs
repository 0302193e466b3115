//! Deterministic lifetime management for engine handles.
//!
//! Every public wrapper that owns an engine object embeds an [`Owned`], which
//! pins down when the engine-side release runs:
//!
//! - acquisition fails with [`HeifError::AllocationFailed`] when the engine
//!   allocator returned null,
//! - release runs exactly once, either explicitly or on drop,
//! - a second explicit release is a no-op, never a fault,
//! - after an explicit release the handle can no longer be dereferenced;
//!   [`Owned::get`] reports the misuse instead of touching a stale handle.
//!
//! Wrappers derived from a parent (an encoder from its context, an image
//! handle from its container) additionally hold an `Arc` on the parent's
//! inner state, so the parent stays alive for as long as any child can still
//! reach the engine through it.

use crate::error::HeifError;
use crate::native::RawHandle;

/// Exclusive ownership of one engine handle with exactly-once release.
#[derive(Debug)]
pub(crate) struct Owned {
    raw: RawHandle,
    release: fn(RawHandle),
    released: bool,
}

impl Owned {
    /// Wrap a freshly allocated handle, or fail if the allocator returned null.
    pub(crate) fn acquire(
        raw: Option<RawHandle>,
        release: fn(RawHandle),
        what: &'static str,
    ) -> Result<Self, HeifError> {
        let raw = raw.ok_or(HeifError::AllocationFailed { what })?;
        Ok(Owned {
            raw,
            release,
            released: false,
        })
    }

    /// The wrapped handle, if it has not been explicitly released.
    pub(crate) fn get(&self) -> Result<RawHandle, HeifError> {
        if self.released {
            return Err(HeifError::InvalidParameter {
                message: "handle used after release".into(),
            });
        }
        Ok(self.raw)
    }

    /// Release the engine object now. Idempotent.
    pub(crate) fn release_now(&mut self) {
        if !self.released {
            self.released = true;
            (self.release)(self.raw);
        }
    }
}

impl Drop for Owned {
    fn drop(&mut self) {
        self.release_now();
    }
}
