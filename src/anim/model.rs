//! The timeline-animation model attached to a decoded document.

use std::collections::HashMap;
use std::rc::Rc;

use glam::Vec2;
use smallvec::SmallVec;

use crate::reader::{Callback, PendingBinding};
use crate::scene::NodeRef;

use super::{CallbackScope, Channel, Sequence};

/// Channels for one sequence on one node.
#[derive(Clone, Debug)]
pub struct NodeSequence {
    pub sequence_id: u32,
    pub channels: Vec<Channel>,
}

/// Per-node channel registration, keyed by node identity.
struct NodeChannels {
    node: NodeRef,
    sequences: SmallVec<[NodeSequence; 2]>,
}

/// Owns every sequence of one decoded document together with the per-node
/// animated-property channels, the designated root node, and — for
/// document-controlled decodes — the deferred document-scope bindings.
///
/// Built once per decode and handed to the caller with the node graph;
/// playback is the host's concern.
#[derive(Default)]
pub struct AnimationModel {
    sequences: Vec<Sequence>,
    root_node: Option<NodeRef>,
    auto_play_sequence_id: Option<u32>,
    root_container_size: Vec2,
    node_channels: Vec<NodeChannels>,
    document_controller_name: Option<String>,
    document_bindings: Vec<PendingBinding>,
    keyframe_callbacks: Vec<(CallbackScope, String)>,
    callbacks: HashMap<(CallbackScope, String), Callback>,
}

impl AnimationModel {
    pub fn new(root_container_size: Vec2) -> Self {
        Self {
            root_container_size,
            ..Default::default()
        }
    }

    /// All sequences of the document, in file order.
    #[inline]
    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    /// Look up a sequence by id.
    pub fn sequence(&self, sequence_id: u32) -> Option<&Sequence> {
        self.sequences
            .iter()
            .find(|s| s.sequence_id == sequence_id)
    }

    pub(crate) fn push_sequence(&mut self, sequence: Sequence) {
        self.sequences.push(sequence);
    }

    /// The first node constructed in the decode.
    #[inline]
    pub fn root_node(&self) -> Option<&NodeRef> {
        self.root_node.as_ref()
    }

    pub(crate) fn set_root_node(&mut self, node: NodeRef) {
        self.root_node = Some(node);
    }

    /// Sequence started automatically on load, if any.
    #[inline]
    pub fn auto_play_sequence_id(&self) -> Option<u32> {
        self.auto_play_sequence_id
    }

    pub(crate) fn set_auto_play_sequence_id(&mut self, id: Option<u32>) {
        self.auto_play_sequence_id = id;
    }

    /// Container size used to interpret relative position/size types.
    #[inline]
    pub fn root_container_size(&self) -> Vec2 {
        self.root_container_size
    }

    /// Register the animated channels of one node.
    pub fn add_node_channels(&mut self, node: &NodeRef, sequences: Vec<NodeSequence>) {
        self.node_channels.push(NodeChannels {
            node: node.clone(),
            sequences: SmallVec::from_vec(sequences),
        });
    }

    /// Animated channels registered for a node.
    pub fn node_channels(&self, node: &NodeRef) -> Option<&[NodeSequence]> {
        self.node_channels
            .iter()
            .find(|entry| Rc::ptr_eq(&entry.node, node))
            .map(|entry| entry.sequences.as_slice())
    }

    /// Number of nodes with registered channels.
    #[inline]
    pub fn animated_node_count(&self) -> usize {
        self.node_channels.len()
    }

    /// Re-key one node's channel registration onto another node (the
    /// embedded-sub-file splice).
    pub fn move_node_channels(&mut self, from: &NodeRef, to: &NodeRef) {
        let Some(index) = self
            .node_channels
            .iter()
            .position(|entry| Rc::ptr_eq(&entry.node, from))
        else {
            return;
        };
        let moved = self.node_channels.remove(index);
        self.node_channels
            .retain(|entry| !Rc::ptr_eq(&entry.node, to));
        self.node_channels.push(NodeChannels {
            node: to.clone(),
            sequences: moved.sequences,
        });
    }

    /// Controller identifier recorded for a document-controlled decode.
    pub fn document_controller_name(&self) -> Option<&str> {
        self.document_controller_name.as_deref()
    }

    pub(crate) fn set_document_controller_name(&mut self, name: String) {
        self.document_controller_name = Some(name);
    }

    /// Deferred document-scope outlet/callback bindings, in record order.
    #[inline]
    pub fn document_bindings(&self) -> &[PendingBinding] {
        &self.document_bindings
    }

    pub(crate) fn add_document_binding(&mut self, binding: PendingBinding) {
        self.document_bindings.push(binding);
    }

    /// Keyframe callbacks referenced by this document's callback channels.
    #[inline]
    pub fn keyframe_callbacks(&self) -> &[(CallbackScope, String)] {
        &self.keyframe_callbacks
    }

    pub(crate) fn record_keyframe_callback(&mut self, scope: CallbackScope, name: &str) {
        self.keyframe_callbacks.push((scope, name.to_string()));
    }

    /// Install the dispatch function for a keyframe callback.
    pub fn set_keyframe_callback(&mut self, scope: CallbackScope, name: &str, callback: Callback) {
        self.callbacks.insert((scope, name.to_string()), callback);
    }

    /// Dispatch function installed for a keyframe callback, if resolved.
    pub fn keyframe_callback(&self, scope: CallbackScope, name: &str) -> Option<&Callback> {
        self.callbacks.get(&(scope, name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{node_ref, BaseNode};

    fn node() -> NodeRef {
        node_ref(BaseNode::new())
    }

    fn one_sequence(id: u32) -> Vec<NodeSequence> {
        vec![NodeSequence {
            sequence_id: id,
            channels: Vec::new(),
        }]
    }

    #[test]
    fn test_node_channels_keyed_by_identity() {
        let mut model = AnimationModel::new(Vec2::ZERO);
        let a = node();
        let b = node();
        model.add_node_channels(&a, one_sequence(0));

        assert!(model.node_channels(&a).is_some());
        assert!(model.node_channels(&b).is_none());
    }

    #[test]
    fn test_move_node_channels() {
        let mut model = AnimationModel::new(Vec2::ZERO);
        let from = node();
        let to = node();
        model.add_node_channels(&from, one_sequence(3));

        model.move_node_channels(&from, &to);

        assert!(model.node_channels(&from).is_none());
        let moved = model.node_channels(&to).unwrap();
        assert_eq!(moved[0].sequence_id, 3);
    }

    #[test]
    fn test_move_without_registration_is_noop() {
        let mut model = AnimationModel::new(Vec2::ZERO);
        let from = node();
        let to = node();
        model.move_node_channels(&from, &to);
        assert_eq!(model.animated_node_count(), 0);
    }

    #[test]
    fn test_sequence_lookup() {
        let mut model = AnimationModel::new(Vec2::ZERO);
        model.push_sequence(Sequence {
            sequence_id: 7,
            name: "intro".to_string(),
            ..Default::default()
        });

        assert_eq!(model.sequence(7).unwrap().name, "intro");
        assert!(model.sequence(8).is_none());
    }
}
