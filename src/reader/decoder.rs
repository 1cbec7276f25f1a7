//! The recursive document decoder.
//!
//! One `Decoder` drives one document: header, string cache, sequences, then
//! the node graph. Nested sub-documents run their own decoder over their own
//! buffer while sharing the per-load state (loaded sheet set, owner bindings,
//! the model registry) with the top-level decode.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

use tracing::warn;

use crate::anim::{
    AnimationModel, CallbackScope, Channel, Easing, EasingKind, Keyframe, KeyframeValue,
    NodeSequence, Sequence,
};
use crate::scene::{FileWrapperNode, NodeRef, SpriteFrame};
use crate::stream::{BitCursor, StringCache};
use crate::util::{Error, Result};

use super::bindings::{AssignTarget, PendingBinding, TargetRef};
use super::props::PropType;
use super::DecodeEnv;

/// Format version this decoder understands.
pub const FORMAT_VERSION: u64 = 5;

/// Magic bytes as stored on disk; read back-to-front they spell `ccbi`.
const MAGIC: &[u8] = b"ibcc";

/// Member-assignment target kinds.
const TARGET_NONE: u64 = 0;
const TARGET_DOCUMENT_ROOT: u64 = 1;
const TARGET_OWNER: u64 = 2;

/// State shared between the top-level decode and its nested sub-document
/// decodes.
#[derive(Default)]
pub(crate) struct SharedLoad {
    pub(crate) loaded_sheets: HashSet<String>,
    pub(crate) owner_bindings: Vec<PendingBinding>,
    pub(crate) models: Vec<(NodeRef, Rc<RefCell<AnimationModel>>)>,
    pub(crate) document_controlled: bool,
}

/// Decodes one document from one byte buffer.
///
/// Created fresh per decode and consumed when the document returns; loaders
/// receive `&mut Decoder` during node construction and property parsing and
/// read further stream data through it.
pub struct Decoder<'a, 'c, 'e> {
    cursor: BitCursor<'a>,
    strings: StringCache,
    document_controlled: bool,
    animation: AnimationModel,
    animated_props: Vec<String>,
    owner: Option<TargetRef>,
    env: &'e DecodeEnv<'e>,
    shared: &'c mut SharedLoad,
}

impl<'a, 'c, 'e> Decoder<'a, 'c, 'e> {
    pub(crate) fn new(
        data: &'a [u8],
        env: &'e DecodeEnv<'e>,
        owner: Option<TargetRef>,
        shared: &'c mut SharedLoad,
    ) -> Self {
        Self {
            cursor: BitCursor::new(data),
            strings: StringCache::default(),
            document_controlled: false,
            animation: AnimationModel::new(env.container_size),
            animated_props: Vec::new(),
            owner,
            env,
            shared,
        }
    }

    /// Decode the whole document and register its animation model.
    pub(crate) fn read_document(mut self, top_level: bool) -> Result<NodeRef> {
        self.read_header()?;
        if top_level {
            self.shared.document_controlled = self.document_controlled;
        }
        self.strings = StringCache::read(&mut self.cursor)?;
        self.read_sequences()?;
        let root = self.read_node(None)?;
        self.shared
            .models
            .push((root.clone(), Rc::new(RefCell::new(self.animation))));
        if top_level {
            clear_user_data(&root);
        }
        Ok(root)
    }

    fn read_header(&mut self) -> Result<()> {
        if self.cursor.read_bytes(4)? != MAGIC {
            return Err(Error::InvalidMagic);
        }
        let version = self.cursor.read_uint()?;
        if version != FORMAT_VERSION {
            warn!(version, supported = FORMAT_VERSION, "incompatible ccbi version");
            return Err(Error::UnsupportedVersion(version));
        }
        self.document_controlled = self.cursor.read_bool()?;
        Ok(())
    }

    fn read_sequences(&mut self) -> Result<()> {
        let count = self.read_uint()? as usize;
        for _ in 0..count {
            let duration = self.read_float()?;
            let name = self.read_cached_string()?;
            let sequence_id = self.read_uint()? as u32;
            let chained_sequence_id = optional_id(self.read_int()?);
            let callback_channel = self.read_callback_keyframes()?;
            let sound_channel = self.read_sound_keyframes()?;
            self.animation.push_sequence(Sequence {
                sequence_id,
                name,
                duration,
                chained_sequence_id,
                callback_channel,
                sound_channel,
            });
        }
        let auto_play_sequence_id = optional_id(self.read_int()?);
        self.animation
            .set_auto_play_sequence_id(auto_play_sequence_id);
        Ok(())
    }

    fn read_callback_keyframes(&mut self) -> Result<Vec<Keyframe>> {
        let count = self.read_uint()? as usize;
        let mut keyframes = Vec::with_capacity(count.min(self.cursor.remaining()));
        for _ in 0..count {
            let time = self.read_float()?;
            let name = self.read_cached_string()?;
            let scope_tag = self.read_uint()?;
            let scope = CallbackScope::from_tag(scope_tag)
                .ok_or_else(|| Error::invalid(format!("invalid callback scope tag {scope_tag}")))?;
            if self.document_controlled {
                self.animation.record_keyframe_callback(scope, &name);
            }
            keyframes.push(Keyframe {
                time,
                easing: Easing::instant(),
                value: KeyframeValue::Callback { name, scope },
            });
        }
        Ok(keyframes)
    }

    fn read_sound_keyframes(&mut self) -> Result<Vec<Keyframe>> {
        let count = self.read_uint()? as usize;
        let mut keyframes = Vec::with_capacity(count.min(self.cursor.remaining()));
        for _ in 0..count {
            let time = self.read_float()?;
            let file = self.read_cached_string()?;
            let pitch = self.read_float()?;
            let pan = self.read_float()?;
            let gain = self.read_float()?;
            keyframes.push(Keyframe {
                time,
                easing: Easing::instant(),
                value: KeyframeValue::Sound {
                    file,
                    pitch,
                    pan,
                    gain,
                },
            });
        }
        Ok(keyframes)
    }

    /// One keyframe of a per-node property channel; the value shape is
    /// selected by the channel's declared property type.
    fn read_keyframe(&mut self, prop_type: PropType) -> Result<Keyframe> {
        let time = self.read_float()?;
        let easing_tag = self.read_uint()?;
        let kind = EasingKind::from_tag(easing_tag)
            .ok_or_else(|| Error::invalid(format!("invalid easing tag {easing_tag}")))?;
        let amount = if kind.has_amount() {
            Some(self.read_float()?)
        } else {
            None
        };

        let value = match prop_type {
            PropType::Check => KeyframeValue::Bool(self.read_bool()?),
            PropType::Byte => KeyframeValue::Byte(self.read_byte()?),
            PropType::Color3 => KeyframeValue::Color([
                self.read_byte()?,
                self.read_byte()?,
                self.read_byte()?,
            ]),
            PropType::Degrees => KeyframeValue::Float(self.read_float()?),
            PropType::Position | PropType::ScaleLock | PropType::FloatXy => {
                KeyframeValue::Pair(glam::vec2(self.read_float()?, self.read_float()?))
            }
            PropType::SpriteFrame => KeyframeValue::SpriteFrame(self.read_sprite_frame()?),
            other => {
                return Err(Error::invalid(format!(
                    "property type {other:?} cannot be keyframed"
                )))
            }
        };

        Ok(Keyframe {
            time,
            easing: Easing::new(kind, amount),
            value,
        })
    }

    /// Decode one node and, recursively, its children.
    fn read_node(&mut self, parent: Option<&NodeRef>) -> Result<NodeRef> {
        let class_name = self.read_cached_string()?;
        let controller_name = if self.document_controlled {
            Some(self.read_cached_string()?)
        } else {
            None
        };

        let target_kind = self.read_uint()?;
        let member_name = if target_kind != TARGET_NONE {
            Some(self.read_cached_string()?)
        } else {
            None
        };

        let loader = Arc::clone(self.env.loaders.resolve(&class_name));
        let mut node = loader.load(parent, self)?;

        if self.animation.root_node().is_none() {
            self.animation.set_root_node(node.clone());
            // Only the root's document-scope identifier names the controller.
            if let Some(name) = controller_name {
                self.animation.set_document_controller_name(name);
            }
        }

        self.read_node_channels(&node)?;

        let custom_props = loader.parse_properties(&node, parent, self)?;

        // Splice embedded sub-documents: the embedded root inherits the
        // wrapper's transform and replaces it before any binding is recorded.
        let mut is_wrapper = false;
        let embedded = {
            let mut guard = node.borrow_mut();
            match guard.as_any_mut().downcast_mut::<FileWrapperNode>() {
                Some(wrapper) => {
                    is_wrapper = true;
                    wrapper.take_embedded()
                }
                None => None,
            }
        };
        if is_wrapper {
            if let Some(embedded) = embedded {
                {
                    let wrapper = node.borrow();
                    let mut target = embedded.borrow_mut();
                    target.set_position(wrapper.position());
                    target.set_rotation(wrapper.rotation());
                    target.set_scale(wrapper.scale());
                    target.set_tag(wrapper.tag());
                    target.set_visible(true);
                }
                self.animation.move_node_channels(&node, &embedded);
                node = embedded;
            } else {
                warn!(class = %class_name, "embedded document missing; wrapper node kept");
            }
        }

        if let Some(member_name) = member_name {
            self.assign_member_binding(&node, target_kind, member_name)?;
        }

        if !self.document_controlled {
            for prop in &custom_props {
                let assigned = node.borrow_mut().assign_custom(&prop.name, &prop.value);
                let assigned = assigned
                    || self
                        .env
                        .assigner
                        .is_some_and(|a| a.assign_custom(&node, &prop.name, &prop.value));
                if !assigned {
                    warn!(name = %prop.name, "custom property not assigned");
                }
            }
        }

        self.animated_props.clear();

        let num_children = self.read_uint()? as usize;
        for _ in 0..num_children {
            let child = self.read_node(Some(&node))?;
            node.borrow_mut().add_child(child);
        }

        // A spliced wrapper's embedded root was already notified by its own
        // document's decode.
        if !is_wrapper {
            let handled = node.borrow_mut().on_loaded();
            if !handled {
                if let Some(listener) = self.env.listener {
                    listener.on_node_loaded(&node);
                }
            }
        }

        Ok(node)
    }

    /// The node's per-sequence animated-property channels.
    fn read_node_channels(&mut self, node: &NodeRef) -> Result<()> {
        self.animated_props.clear();
        let num_sequences = self.read_uint()? as usize;
        let mut node_sequences = Vec::with_capacity(num_sequences.min(self.cursor.remaining()));
        for _ in 0..num_sequences {
            let sequence_id = self.read_uint()? as u32;
            let num_channels = self.read_uint()? as usize;
            let mut channels = Vec::with_capacity(num_channels.min(self.cursor.remaining()));
            for _ in 0..num_channels {
                let name = self.read_cached_string()?;
                let type_tag = self.read_uint()?;
                let prop_type = PropType::from_tag(type_tag)
                    .ok_or_else(|| Error::invalid(format!("unknown property type tag {type_tag}")))?;
                self.animated_props.push(name.clone());
                let count = self.read_uint()? as usize;
                let mut keyframes = Vec::with_capacity(count.min(self.cursor.remaining()));
                for _ in 0..count {
                    keyframes.push(self.read_keyframe(prop_type)?);
                }
                channels.push(Channel {
                    name,
                    prop_type,
                    keyframes,
                });
            }
            node_sequences.push(NodeSequence {
                sequence_id,
                channels,
            });
        }
        if !node_sequences.is_empty() {
            self.animation.add_node_channels(node, node_sequences);
        }
        Ok(())
    }

    /// Record the member assignment as a pending binding (document-controlled
    /// mode) or resolve it immediately (direct mode: the target's own
    /// acceptor, then the external default assigner).
    fn assign_member_binding(&mut self, node: &NodeRef, target_kind: u64, name: String) -> Result<()> {
        if target_kind != TARGET_DOCUMENT_ROOT && target_kind != TARGET_OWNER {
            return Err(Error::invalid(format!(
                "invalid member assignment target kind {target_kind}"
            )));
        }

        if self.document_controlled {
            let binding = PendingBinding::Outlet {
                name,
                node: node.clone(),
            };
            if target_kind == TARGET_DOCUMENT_ROOT {
                self.animation.add_document_binding(binding);
            } else {
                self.shared.owner_bindings.push(binding);
            }
            return Ok(());
        }

        let assigned = if target_kind == TARGET_DOCUMENT_ROOT {
            match self.animation.root_node().cloned() {
                Some(root) => {
                    let assigned = root.borrow_mut().assign_member(&name, node);
                    assigned
                        || self
                            .env
                            .assigner
                            .is_some_and(|a| a.assign_member(&AssignTarget::Node(&root), &name, node))
                }
                None => false,
            }
        } else {
            match self.owner.clone() {
                Some(owner) => {
                    let assigned = owner.borrow_mut().assign_member(&name, node);
                    assigned
                        || self
                            .env
                            .assigner
                            .is_some_and(|a| a.assign_member(&AssignTarget::Owner(&owner), &name, node))
                }
                None => false,
            }
        };
        if !assigned {
            warn!(name = %name, "member variable not assigned");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Stream primitives exposed to loaders
    // ------------------------------------------------------------------

    /// Read an unsigned variable-length integer.
    #[inline]
    pub fn read_uint(&mut self) -> Result<u64> {
        self.cursor.read_uint()
    }

    /// Read a signed variable-length integer.
    #[inline]
    pub fn read_int(&mut self) -> Result<i64> {
        self.cursor.read_int()
    }

    /// Read one byte.
    #[inline]
    pub fn read_byte(&mut self) -> Result<u8> {
        self.cursor.read_byte()
    }

    /// Read one boolean byte.
    #[inline]
    pub fn read_bool(&mut self) -> Result<bool> {
        self.cursor.read_bool()
    }

    /// Read a float.
    #[inline]
    pub fn read_float(&mut self) -> Result<f32> {
        self.cursor.read_float()
    }

    /// Read a string-cache index and look it up.
    pub fn read_cached_string(&mut self) -> Result<String> {
        let index = self.cursor.read_uint()? as usize;
        Ok(self.strings.get(index)?.to_string())
    }

    /// Resolve a sprite frame: a sheet name plus frame name, where an empty
    /// sheet name means a standalone image resolved by root-relative path.
    /// Sheets load at most once per decode. Frames the cache cannot resolve
    /// yield an unresolved handle.
    pub fn read_sprite_frame(&mut self) -> Result<SpriteFrame> {
        let sheet = self.read_cached_string()?;
        let file = self.read_cached_string()?;

        let frame = if sheet.is_empty() {
            let path = format!("{}{}", self.env.root_path, file);
            self.env.sprite_frames.frame_from_image(&path)
        } else {
            let sheet_path = format!("{}{}", self.env.root_path, sheet);
            if self.shared.loaded_sheets.insert(sheet_path.clone()) {
                self.env.sprite_frames.load_sheet(&sheet_path);
            }
            self.env.sprite_frames.frame(&file)
        };

        Ok(frame.unwrap_or_else(|| {
            warn!(sheet = %sheet, file = %file, "sprite frame not resolved");
            SpriteFrame::unresolved()
        }))
    }

    /// Names of the properties animated on the node currently being decoded;
    /// valid during `parse_properties`.
    #[inline]
    pub fn animated_properties(&self) -> &[String] {
        &self.animated_props
    }

    /// Whether the document declared itself host-controlled.
    #[inline]
    pub fn document_controlled(&self) -> bool {
        self.document_controlled
    }

    /// The file owner supplied by the caller.
    #[inline]
    pub fn owner(&self) -> Option<&TargetRef> {
        self.owner.as_ref()
    }

    /// The document root, once the first node has been constructed.
    #[inline]
    pub fn root_node(&self) -> Option<&NodeRef> {
        self.animation.root_node()
    }

    /// Prefix for root-relative resource paths.
    #[inline]
    pub fn root_path(&self) -> &str {
        self.env.root_path
    }

    /// Container size used to interpret relative position/size types.
    #[inline]
    pub fn container_size(&self) -> glam::Vec2 {
        self.env.container_size
    }

    /// Record a callback-property binding (document-controlled mode) or
    /// resolve it now through the selector resolver (direct mode).
    pub(crate) fn handle_callback_property(
        &mut self,
        node: &NodeRef,
        selector: &str,
        target_kind: u64,
        control_events: u32,
    ) -> Result<()> {
        if target_kind == TARGET_NONE {
            return Ok(());
        }
        if target_kind != TARGET_DOCUMENT_ROOT && target_kind != TARGET_OWNER {
            return Err(Error::invalid(format!(
                "invalid callback target kind {target_kind}"
            )));
        }

        if self.document_controlled {
            let binding = PendingBinding::Callback {
                name: selector.to_string(),
                node: node.clone(),
                control_events,
            };
            if target_kind == TARGET_DOCUMENT_ROOT {
                self.animation.add_document_binding(binding);
            } else {
                self.shared.owner_bindings.push(binding);
            }
            return Ok(());
        }

        let callback = if target_kind == TARGET_DOCUMENT_ROOT {
            self.animation.root_node().and_then(|root| {
                self.env
                    .selectors
                    .and_then(|r| r.resolve(&AssignTarget::Node(root), selector))
            })
        } else {
            self.owner.as_ref().and_then(|owner| {
                self.env
                    .selectors
                    .and_then(|r| r.resolve(&AssignTarget::Owner(owner), selector))
            })
        };
        match callback {
            Some(callback) => {
                if !node.borrow_mut().bind_callback(callback, control_events) {
                    warn!(selector, "node did not accept callback");
                }
            }
            None => warn!(selector, "callback selector not resolved"),
        }
        Ok(())
    }

    /// Decode a nested sub-document fetched through the document source.
    ///
    /// The nested decoder shares this load's sheet set, owner bindings and
    /// model registry. A missing source or unknown path is non-fatal.
    pub fn read_embedded_document(&mut self, path: &str) -> Result<Option<NodeRef>> {
        let Some(source) = self.env.documents else {
            warn!(path, "no document source; embedded document skipped");
            return Ok(None);
        };
        let Some(bytes) = source.document(path) else {
            warn!(path, "embedded document not found");
            return Ok(None);
        };
        let owner = self.owner.clone();
        let child = Decoder::new(&bytes, self.env, owner, &mut *self.shared);
        let root = child.read_document(false)?;
        Ok(Some(root))
    }
}

fn optional_id(raw: i64) -> Option<u32> {
    (raw >= 0).then_some(raw as u32)
}

/// Clear every user-data slot in the finished graph.
fn clear_user_data(node: &NodeRef) {
    node.borrow_mut().set_user_data(None);
    let children = node.borrow().children();
    for child in &children {
        clear_user_data(child);
    }
}
