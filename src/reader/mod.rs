//! Document decoding: the graph builder, the loader registry, the property
//! parser and the binding resolver.

mod bindings;
mod decoder;
mod loader;
mod props;

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;

use crate::anim::AnimationModel;
use crate::scene::{NodeRef, SpriteFrameCache};
use crate::util::Result;

pub use bindings::{
    resolve_bindings, AssignTarget, BindingTarget, Callback, ControllerFactory, DocumentSource,
    MemberAssigner, NodeLoadListener, PendingBinding, SelectorResolver, TargetRef,
};
pub use decoder::{Decoder, FORMAT_VERSION};
pub use loader::{BaseNodeLoader, FileNodeLoader, LoaderRegistry, NodeLoader};
pub use props::{
    parse_property_block, CustomProperty, PositionUnit, PropType, PropertyValue, ScaleUnit,
    SizeUnit,
};

use decoder::SharedLoad;

/// Borrowed collaborator set for one or more decodes.
///
/// The registry and sprite-frame cache are shared read-mostly resources; the
/// optional members cover direct-mode assignment, callback resolution, load
/// notifications, and embedded sub-document fetching.
pub struct DecodeEnv<'e> {
    pub loaders: &'e LoaderRegistry,
    pub sprite_frames: &'e dyn SpriteFrameCache,
    pub assigner: Option<&'e dyn MemberAssigner>,
    pub selectors: Option<&'e dyn SelectorResolver>,
    pub listener: Option<&'e dyn NodeLoadListener>,
    pub documents: Option<&'e dyn DocumentSource>,
    /// Prefix for root-relative resource paths.
    pub root_path: &'e str,
    /// Container size used to interpret relative position/size types.
    pub container_size: Vec2,
}

impl<'e> DecodeEnv<'e> {
    pub fn new(loaders: &'e LoaderRegistry, sprite_frames: &'e dyn SpriteFrameCache) -> Self {
        Self {
            loaders,
            sprite_frames,
            assigner: None,
            selectors: None,
            listener: None,
            documents: None,
            root_path: "",
            container_size: Vec2::ZERO,
        }
    }
}

/// A fully decoded document: the node graph, the animation models of the
/// document and its embedded sub-documents, and the owner-scope bindings left
/// for [`resolve_bindings`] to apply.
pub struct Document {
    /// Root of the decoded node graph.
    pub root: NodeRef,
    /// Animation models keyed by their document root, the top-level document
    /// last.
    pub animations: Vec<(NodeRef, Rc<RefCell<AnimationModel>>)>,
    /// Owner-scope outlet/callback bindings recorded during the decode.
    pub owner_bindings: Vec<PendingBinding>,
    /// Whether the file declared itself host-controlled.
    pub document_controlled: bool,
}

impl Document {
    /// The animation model attached to the document root.
    pub fn root_animation(&self) -> Option<&Rc<RefCell<AnimationModel>>> {
        self.animations
            .iter()
            .find(|(node, _)| Rc::ptr_eq(node, &self.root))
            .map(|(_, model)| model)
    }
}

/// Decode one document from a byte buffer.
///
/// Runs to completion or fails with no partial graph; binding resolution is a
/// separate pass. `owner` is recorded for direct-mode assignment and later
/// owner-scope resolution.
pub fn decode(data: &[u8], env: &DecodeEnv<'_>, owner: Option<TargetRef>) -> Result<Document> {
    let mut shared = SharedLoad::default();
    let root = Decoder::new(data, env, owner, &mut shared).read_document(true)?;
    Ok(Document {
        root,
        animations: shared.models,
        owner_bindings: shared.owner_bindings,
        document_controlled: shared.document_controlled,
    })
}

/// Decode a document and resolve its bindings in one call.
///
/// Returns the document together with the instantiated per-document
/// controllers.
pub fn load(
    data: &[u8],
    env: &DecodeEnv<'_>,
    owner: Option<TargetRef>,
    controllers: Option<&dyn ControllerFactory>,
) -> Result<(Document, Vec<(NodeRef, TargetRef)>)> {
    let document = decode(data, env, owner.clone())?;
    let instantiated = resolve_bindings(&document, owner.as_ref(), controllers);
    Ok((document, instantiated))
}
