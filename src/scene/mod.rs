//! Scene-graph surface: the node trait the decoder populates and the
//! sprite-frame collaborator boundary.

mod node;
mod sprite;

pub use node::{node_ref, BaseNode, FileWrapperNode, NodeRef, SceneNode};
pub use sprite::{MemorySpriteFrameCache, SpriteFrame, SpriteFrameCache};
