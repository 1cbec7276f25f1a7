//! # ccbi
//!
//! Decoder for the CocosBuilder (`.ccbi`) binary scene/animation format.
//!
//! A `.ccbi` buffer packs a scene graph and its timeline animations into a
//! compact, self-describing byte stream: bit-packed variable-length integers,
//! a sentinel-compressed float encoding, an interned string table, and a
//! recursive node-graph protocol that dispatches per-class construction to a
//! pluggable loader registry. Decoding produces an in-memory node tree plus an
//! [`anim::AnimationModel`]; a separate post-pass resolves deferred
//! name-based outlet/callback bindings against caller-supplied owner and
//! controller objects.
//!
//! ## Modules
//!
//! - [`util`] - Error and result types
//! - [`stream`] - Bit cursor, integer/float decodings, string table
//! - [`anim`] - Sequences, channels, keyframes, the animation model
//! - [`scene`] - Node trait and the sprite-frame collaborator boundary
//! - [`reader`] - Graph builder, loader registry, binding resolver
//!
//! ## Example
//!
//! ```ignore
//! use ccbi::prelude::*;
//!
//! let registry = LoaderRegistry::with_defaults();
//! let frames = MemorySpriteFrameCache::new();
//! let env = DecodeEnv::new(&registry, &frames);
//!
//! let document = ccbi::decode(&bytes, &env, None)?;
//! let controllers = ccbi::resolve_bindings(&document, None, None);
//! ```

pub mod anim;
pub mod reader;
pub mod scene;
pub mod stream;
pub mod util;

// Re-export commonly used types
pub use reader::{decode, load, resolve_bindings, DecodeEnv, Document};
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::anim::{AnimationModel, Channel, Keyframe, KeyframeValue, Sequence};
    pub use crate::reader::{
        decode, load, resolve_bindings, BindingTarget, ControllerFactory, DecodeEnv, Document,
        LoaderRegistry, NodeLoader, PendingBinding, PropType, PropertyValue,
    };
    pub use crate::scene::{
        node_ref, BaseNode, MemorySpriteFrameCache, NodeRef, SceneNode, SpriteFrame,
        SpriteFrameCache,
    };
    pub use crate::util::{Error, Result};
}
