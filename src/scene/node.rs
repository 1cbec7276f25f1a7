//! Scene-graph nodes as the decoder sees them.
//!
//! Concrete node types belong to the host; the decoder works against the
//! [`SceneNode`] trait and probes the optional capabilities through their
//! defaulted methods instead of requiring an inheritance hierarchy.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use glam::Vec2;

use crate::reader::{Callback, PropertyValue};

/// Shared handle to a node in the decoded graph.
pub type NodeRef = Rc<RefCell<dyn SceneNode>>;

/// Wrap a concrete node into a [`NodeRef`].
pub fn node_ref<N: SceneNode>(node: N) -> NodeRef {
    Rc::new(RefCell::new(node))
}

/// The node surface the decoder needs: parenting, the transform fields copied
/// by the sub-file splice, a user-data slot, and a set of optional
/// capabilities a concrete type may or may not implement. Absence of a
/// capability is not an error.
pub trait SceneNode: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn add_child(&mut self, child: NodeRef);
    fn children(&self) -> Vec<NodeRef>;

    fn position(&self) -> Vec2;
    fn set_position(&mut self, position: Vec2);
    fn rotation(&self) -> f32;
    fn set_rotation(&mut self, degrees: f32);
    fn scale(&self) -> Vec2;
    fn set_scale(&mut self, scale: Vec2);
    fn tag(&self) -> i32;
    fn set_tag(&mut self, tag: i32);
    fn set_visible(&mut self, visible: bool);

    fn user_data(&self) -> Option<&dyn Any>;
    fn set_user_data(&mut self, data: Option<Box<dyn Any>>);

    /// By-name member-assignment acceptor. Return true when the assignment
    /// was handled; the external default assigner runs otherwise.
    ///
    /// Implementations store the handle; when the receiver is the assigned
    /// node itself it is already mutably borrowed and must not be re-borrowed.
    fn assign_member(&mut self, _name: &str, _node: &NodeRef) -> bool {
        false
    }

    /// Custom-property acceptor with the same two-tier fallback contract as
    /// [`assign_member`](Self::assign_member).
    fn assign_custom(&mut self, _name: &str, _value: &PropertyValue) -> bool {
        false
    }

    /// Accept a resolved callback, with control-event filter bits for
    /// control-like nodes. Return true when accepted.
    fn bind_callback(&mut self, _callback: Callback, _control_events: u32) -> bool {
        false
    }

    /// Post-load hook. Return true when handled; the external load listener
    /// is notified otherwise.
    fn on_loaded(&mut self) -> bool {
        false
    }

    /// Generic sink for decoded properties without a typed accessor.
    fn set_property(&mut self, _name: &str, _value: PropertyValue) {}
}

/// Generic node constructed by the fallback loader.
///
/// Keeps the decoded transform fields plus every other applied property in a
/// name-keyed map, and accepts callbacks into a single slot.
pub struct BaseNode {
    position: Vec2,
    rotation: f32,
    scale: Vec2,
    tag: i32,
    visible: bool,
    children: Vec<NodeRef>,
    user_data: Option<Box<dyn Any>>,
    properties: HashMap<String, PropertyValue>,
    callback: Option<(Callback, u32)>,
}

impl BaseNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// A property routed through the generic sink, by name.
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Callback accepted through [`SceneNode::bind_callback`], with its
    /// control-event bits.
    pub fn bound_callback(&self) -> Option<&(Callback, u32)> {
        self.callback.as_ref()
    }
}

impl Default for BaseNode {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
            tag: 0,
            visible: true,
            children: Vec::new(),
            user_data: None,
            properties: HashMap::new(),
            callback: None,
        }
    }
}

impl SceneNode for BaseNode {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn add_child(&mut self, child: NodeRef) {
        self.children.push(child);
    }

    fn children(&self) -> Vec<NodeRef> {
        self.children.clone()
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    fn rotation(&self) -> f32 {
        self.rotation
    }

    fn set_rotation(&mut self, degrees: f32) {
        self.rotation = degrees;
    }

    fn scale(&self) -> Vec2 {
        self.scale
    }

    fn set_scale(&mut self, scale: Vec2) {
        self.scale = scale;
    }

    fn tag(&self) -> i32 {
        self.tag
    }

    fn set_tag(&mut self, tag: i32) {
        self.tag = tag;
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn user_data(&self) -> Option<&dyn Any> {
        self.user_data.as_deref()
    }

    fn set_user_data(&mut self, data: Option<Box<dyn Any>>) {
        self.user_data = data;
    }

    fn bind_callback(&mut self, callback: Callback, control_events: u32) -> bool {
        self.callback = Some((callback, control_events));
        true
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) {
        self.properties.insert(name.to_string(), value);
    }
}

/// Wrapper node standing in for an embedded sub-document while its parent
/// document decodes.
///
/// The graph builder splices it out once its property block has been parsed:
/// the embedded root inherits the wrapper's transform and replaces it in the
/// graph.
#[derive(Default)]
pub struct FileWrapperNode {
    base: BaseNode,
    embedded: Option<NodeRef>,
}

impl FileWrapperNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root of the embedded document, if one was resolved.
    pub fn embedded(&self) -> Option<&NodeRef> {
        self.embedded.as_ref()
    }

    pub fn set_embedded(&mut self, node: NodeRef) {
        self.embedded = Some(node);
    }

    pub fn take_embedded(&mut self) -> Option<NodeRef> {
        self.embedded.take()
    }
}

impl SceneNode for FileWrapperNode {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn add_child(&mut self, child: NodeRef) {
        self.base.add_child(child);
    }

    fn children(&self) -> Vec<NodeRef> {
        self.base.children()
    }

    fn position(&self) -> Vec2 {
        self.base.position()
    }

    fn set_position(&mut self, position: Vec2) {
        self.base.set_position(position);
    }

    fn rotation(&self) -> f32 {
        self.base.rotation()
    }

    fn set_rotation(&mut self, degrees: f32) {
        self.base.set_rotation(degrees);
    }

    fn scale(&self) -> Vec2 {
        self.base.scale()
    }

    fn set_scale(&mut self, scale: Vec2) {
        self.base.set_scale(scale);
    }

    fn tag(&self) -> i32 {
        self.base.tag()
    }

    fn set_tag(&mut self, tag: i32) {
        self.base.set_tag(tag);
    }

    fn set_visible(&mut self, visible: bool) {
        self.base.set_visible(visible);
    }

    fn user_data(&self) -> Option<&dyn Any> {
        self.base.user_data()
    }

    fn set_user_data(&mut self, data: Option<Box<dyn Any>>) {
        self.base.set_user_data(data);
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) {
        match value {
            PropertyValue::SubDocument(Some(root)) => self.embedded = Some(root),
            PropertyValue::SubDocument(None) => {}
            other => self.base.set_property(name, other),
        }
    }
}
