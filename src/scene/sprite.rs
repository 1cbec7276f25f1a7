//! Sprite-frame handles and the external frame cache boundary.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Opaque handle to a resolved sprite frame.
///
/// The payload belongs to the host (a texture region, an atlas entry, ...);
/// the decoder only stores and clones the handle. A default handle marks a
/// frame that could not be resolved.
#[derive(Clone, Default)]
pub struct SpriteFrame(Option<Arc<dyn Any + Send + Sync>>);

impl SpriteFrame {
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self(Some(Arc::new(payload)))
    }

    /// Handle for a frame the cache could not resolve.
    pub fn unresolved() -> Self {
        Self(None)
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.0.is_some()
    }

    /// Borrow the host payload, if it has the expected type.
    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.0.as_deref()?.downcast_ref()
    }
}

impl fmt::Debug for SpriteFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_resolved() {
            f.write_str("SpriteFrame(resolved)")
        } else {
            f.write_str("SpriteFrame(unresolved)")
        }
    }
}

/// External sprite-frame store.
///
/// Shared read-mostly across decodes of different files; implementations
/// provide their own synchronization. The once-per-decode sheet bookkeeping
/// lives in the decoder, so `load_sheet` may be called repeatedly across
/// decodes and must stay idempotent.
pub trait SpriteFrameCache: Send + Sync {
    /// Resolve a standalone image by its root-relative path.
    fn frame_from_image(&self, path: &str) -> Option<SpriteFrame>;

    /// Load a sprite sheet so its frames become resolvable by name.
    fn load_sheet(&self, path: &str);

    /// Look up a frame by name (sheet-based resolution).
    fn frame(&self, name: &str) -> Option<SpriteFrame>;
}

/// In-memory sprite-frame cache.
///
/// Hosts preload frames under image paths and frame names; sheet loading only
/// records the sheet as seen, since the frames themselves are preloaded.
#[derive(Default)]
pub struct MemorySpriteFrameCache {
    frames: RwLock<HashMap<String, SpriteFrame>>,
    sheets: RwLock<HashSet<String>>,
}

impl MemorySpriteFrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a frame under an image path or frame name.
    pub fn insert(&self, name: impl Into<String>, frame: SpriteFrame) {
        self.frames.write().insert(name.into(), frame);
    }

    /// Whether a sheet has been loaded.
    pub fn is_sheet_loaded(&self, path: &str) -> bool {
        self.sheets.read().contains(path)
    }
}

impl SpriteFrameCache for MemorySpriteFrameCache {
    fn frame_from_image(&self, path: &str) -> Option<SpriteFrame> {
        self.frames.read().get(path).cloned()
    }

    fn load_sheet(&self, path: &str) {
        self.sheets.write().insert(path.to_string());
    }

    fn frame(&self, name: &str) -> Option<SpriteFrame> {
        self.frames.read().get(name).cloned()
    }
}
