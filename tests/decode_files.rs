//! End-to-end decoding tests over in-memory fixture documents.

mod common;

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use glam::vec2;

use ccbi::anim::{CallbackScope, EasingKind, KeyframeValue};
use ccbi::reader::{
    AssignTarget, BindingTarget, Callback, ControllerFactory, DecodeEnv, DocumentSource,
    LoaderRegistry, MemberAssigner, NodeLoadListener, PendingBinding, PropType, PropertyValue,
    SelectorResolver, TargetRef,
};
use ccbi::scene::{BaseNode, FileWrapperNode, MemorySpriteFrameCache, NodeRef};
use ccbi::Error;

use common::Fixture;

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ----------------------------------------------------------------------
// Test collaborators
// ----------------------------------------------------------------------

#[derive(Default)]
struct TestOwner {
    assigned_members: Vec<String>,
    outlets: Vec<String>,
    known_callbacks: Vec<String>,
}

impl TestOwner {
    fn with_callbacks(names: &[&str]) -> TargetRef {
        Rc::new(RefCell::new(Self {
            known_callbacks: names.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }))
    }
}

impl BindingTarget for TestOwner {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn assign_member(&mut self, name: &str, _node: &NodeRef) -> bool {
        self.assigned_members.push(name.to_string());
        true
    }

    fn set_outlet(&mut self, name: &str, _node: &NodeRef) -> bool {
        self.outlets.push(name.to_string());
        true
    }

    fn callback(&self, name: &str) -> Option<Callback> {
        if self.known_callbacks.iter().any(|n| n == name) {
            Some(Rc::new(|_node: &NodeRef| {}))
        } else {
            None
        }
    }
}

#[derive(Default)]
struct TestController {
    root_set: bool,
    outlets: Vec<String>,
    did_load: bool,
    known_callbacks: Vec<String>,
}

impl BindingTarget for TestController {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn set_outlet(&mut self, name: &str, _node: &NodeRef) -> bool {
        self.outlets.push(name.to_string());
        true
    }

    fn callback(&self, name: &str) -> Option<Callback> {
        if self.known_callbacks.iter().any(|n| n == name) {
            Some(Rc::new(|_node: &NodeRef| {}))
        } else {
            None
        }
    }

    fn set_root_node(&mut self, _node: &NodeRef) {
        self.root_set = true;
    }

    fn did_load(&mut self) {
        self.did_load = true;
    }
}

struct TestFactory {
    expected_name: &'static str,
    controller_callbacks: Vec<String>,
}

impl ControllerFactory for TestFactory {
    fn instantiate(&self, name: &str) -> Option<TargetRef> {
        if name != self.expected_name {
            return None;
        }
        Some(Rc::new(RefCell::new(TestController {
            known_callbacks: self.controller_callbacks.clone(),
            ..TestController::default()
        })))
    }
}

#[derive(Default)]
struct RecordingAssigner {
    members: RefCell<Vec<String>>,
    customs: RefCell<Vec<String>>,
}

impl MemberAssigner for RecordingAssigner {
    fn assign_member(&self, _target: &AssignTarget<'_>, name: &str, _node: &NodeRef) -> bool {
        self.members.borrow_mut().push(name.to_string());
        true
    }

    fn assign_custom(&self, _node: &NodeRef, name: &str, _value: &PropertyValue) -> bool {
        self.customs.borrow_mut().push(name.to_string());
        true
    }
}

struct TestResolver;

impl SelectorResolver for TestResolver {
    fn resolve(&self, _target: &AssignTarget<'_>, name: &str) -> Option<Callback> {
        if name.starts_with("on") {
            Some(Rc::new(|_node: &NodeRef| {}))
        } else {
            None
        }
    }
}

#[derive(Default)]
struct CountingListener {
    loaded: Cell<usize>,
}

impl NodeLoadListener for CountingListener {
    fn on_node_loaded(&self, _node: &NodeRef) {
        self.loaded.set(self.loaded.get() + 1);
    }
}

#[derive(Default)]
struct MapDocuments {
    documents: HashMap<String, Vec<u8>>,
}

impl DocumentSource for MapDocuments {
    fn document(&self, path: &str) -> Option<Vec<u8>> {
        self.documents.get(path).cloned()
    }
}

// ----------------------------------------------------------------------
// Fixture helpers
// ----------------------------------------------------------------------

/// Node preamble in direct mode: class index, no member assignment.
fn plain_node_header(f: &mut Fixture, class_index: u64) {
    f.uint(class_index);
    f.uint(0);
}

/// No animated channels, empty property block, no children.
fn empty_node_body(f: &mut Fixture) {
    f.uint(0);
    f.uint(0);
    f.uint(0);
    f.uint(0);
}

fn minimal_document() -> Vec<u8> {
    let mut f = Fixture::new();
    f.header(false);
    f.strings(&["CCNode"]);
    f.no_sequences();
    plain_node_header(&mut f, 0);
    empty_node_body(&mut f);
    f.finish()
}

// ----------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------

#[test]
fn varints_roundtrip_through_the_fixture_encoder() {
    let unsigned: &[u64] = &[0, 1, 2, 3, 7, 8, 127, 128, 255, 300, 65535, 1 << 20, u32::MAX as u64];
    for &value in unsigned {
        let mut f = Fixture::new();
        f.uint(value);
        let data = f.finish();
        let mut cursor = ccbi::stream::BitCursor::new(&data);
        assert_eq!(cursor.read_uint().unwrap(), value, "unsigned {value}");
    }

    let signed: &[i64] = &[0, 1, -1, 2, -2, 63, -64, 1000, -1000, i32::MAX as i64, i32::MIN as i64];
    for &value in signed {
        let mut f = Fixture::new();
        f.int(value);
        let data = f.finish();
        let mut cursor = ccbi::stream::BitCursor::new(&data);
        assert_eq!(cursor.read_int().unwrap(), value, "signed {value}");
    }
}

#[test]
fn floats_roundtrip_through_the_fixture_encoder() {
    for value in [0.0f32, 1.0, -1.0, 0.5, 2.5, -123.456, 1.0e-20, 3.4e38] {
        let mut f = Fixture::new();
        f.float(value);
        let data = f.finish();
        let mut cursor = ccbi::stream::BitCursor::new(&data);
        assert_eq!(cursor.read_float().unwrap(), value, "float {value}");
    }
}

#[test]
fn minimal_document_decodes_to_single_node() {
    init_logging();
    let registry = LoaderRegistry::with_defaults();
    let frames = MemorySpriteFrameCache::new();
    let env = DecodeEnv::new(&registry, &frames);

    let document = ccbi::decode(&minimal_document(), &env, None).unwrap();

    assert!(!document.document_controlled);
    assert!(document.owner_bindings.is_empty());
    assert!(document.root.borrow().as_any().is::<BaseNode>());
    assert!(document.root.borrow().children().is_empty());

    assert_eq!(document.animations.len(), 1);
    let model = document.root_animation().unwrap().borrow();
    assert!(model.sequences().is_empty());
    assert_eq!(model.auto_play_sequence_id(), None);
    assert!(Rc::ptr_eq(model.root_node().unwrap(), &document.root));
}

#[test]
fn sequences_and_node_channels_decode() {
    init_logging();
    let mut f = Fixture::new();
    f.header(false);
    f.strings(&["CCNode", "timeline", "onDone", "boom.wav", "rotation"]);

    // One sequence with a callback and a sound channel.
    f.uint(1);
    f.float(2.5); // duration
    f.uint(1); // name "timeline"
    f.uint(0); // sequence id
    f.int(-1); // no chained sequence
    f.uint(1); // callback keyframes
    f.float(0.5);
    f.uint(2); // "onDone"
    f.uint(1); // document scope
    f.uint(1); // sound keyframes
    f.float(1.0);
    f.uint(3); // "boom.wav"
    f.float(1.0); // pitch
    f.float(0.0); // pan
    f.float(1.0); // gain
    f.int(0); // auto-play sequence 0

    plain_node_header(&mut f, 0);
    // Animated channels: one sequence, one degrees channel, two keyframes.
    f.uint(1);
    f.uint(0); // sequence id
    f.uint(1); // channel count
    f.uint(4); // "rotation"
    f.uint(5); // Degrees
    f.uint(2); // keyframe count
    f.float(0.0);
    f.uint(1); // linear
    f.float(0.0);
    f.float(2.5);
    f.uint(5); // elastic-in
    f.float(0.8); // easing amount
    f.float(90.0);
    // Empty property block, no children.
    f.uint(0);
    f.uint(0);
    f.uint(0);

    let registry = LoaderRegistry::with_defaults();
    let frames = MemorySpriteFrameCache::new();
    let env = DecodeEnv::new(&registry, &frames);
    let document = ccbi::decode(&f.finish(), &env, None).unwrap();

    let model = document.root_animation().unwrap().borrow();
    assert_eq!(model.auto_play_sequence_id(), Some(0));
    assert_eq!(model.sequences().len(), 1);

    let sequence = model.sequence(0).unwrap();
    assert_eq!(sequence.name, "timeline");
    assert_eq!(sequence.duration, 2.5);
    assert_eq!(sequence.chained_sequence_id, None);

    assert_eq!(sequence.callback_channel.len(), 1);
    match &sequence.callback_channel[0].value {
        KeyframeValue::Callback { name, scope } => {
            assert_eq!(name, "onDone");
            assert_eq!(*scope, CallbackScope::Document);
        }
        other => panic!("unexpected callback keyframe value: {other:?}"),
    }

    assert_eq!(sequence.sound_channel.len(), 1);
    match &sequence.sound_channel[0].value {
        KeyframeValue::Sound {
            file,
            pitch,
            pan,
            gain,
        } => {
            assert_eq!(file, "boom.wav");
            assert_eq!((*pitch, *pan, *gain), (1.0, 0.0, 1.0));
        }
        other => panic!("unexpected sound keyframe value: {other:?}"),
    }

    // Keyframe callbacks are only recorded for document-controlled files.
    assert!(model.keyframe_callbacks().is_empty());

    let channels = model.node_channels(&document.root).unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].sequence_id, 0);
    let channel = &channels[0].channels[0];
    assert_eq!(channel.name, "rotation");
    assert_eq!(channel.prop_type, PropType::Degrees);
    assert_eq!(channel.keyframes.len(), 2);
    assert_eq!(channel.keyframes[0].easing.kind, EasingKind::Linear);
    assert_eq!(channel.keyframes[1].easing.kind, EasingKind::ElasticIn);
    assert_eq!(channel.keyframes[1].easing.amount, Some(0.8));
    match channel.keyframes[1].value {
        KeyframeValue::Float(degrees) => assert_eq!(degrees, 90.0),
        ref other => panic!("unexpected keyframe value: {other:?}"),
    }
}

#[test]
fn property_block_applies_and_collects_customs() {
    init_logging();
    let mut f = Fixture::new();
    f.header(false);
    f.strings(&[
        "CCNode", "position", "rotation", "visible", "tag", "title", "Hello", "speed",
    ]);
    f.no_sequences();

    plain_node_header(&mut f, 0);
    f.uint(0); // no animated channels
    f.uint(5); // regular properties
    f.uint(1); // extra (custom) properties

    // position = (10, 20), bottom-left
    f.uint(0);
    f.uint(1);
    f.byte(0);
    f.float(10.0);
    f.float(20.0);
    f.uint(0);
    // rotation = 45 degrees
    f.uint(5);
    f.uint(2);
    f.byte(0);
    f.float(45.0);
    // visible = false
    f.uint(9);
    f.uint(3);
    f.byte(0);
    f.byte(0);
    // tag = 7
    f.uint(6);
    f.uint(4);
    f.byte(0);
    f.int(7);
    // title (iOS only, consumed but not applied)
    f.uint(18);
    f.uint(5);
    f.byte(1);
    f.uint(6);
    // custom: speed = 3.5
    f.uint(7);
    f.uint(7);
    f.byte(0);
    f.float(3.5);

    f.uint(0); // children

    let registry = LoaderRegistry::with_defaults();
    let frames = MemorySpriteFrameCache::new();
    let assigner = RecordingAssigner::default();
    let mut env = DecodeEnv::new(&registry, &frames);
    env.assigner = Some(&assigner);

    let document = ccbi::decode(&f.finish(), &env, None).unwrap();

    let root = document.root.borrow();
    assert_eq!(root.position(), vec2(10.0, 20.0));
    assert_eq!(root.rotation(), 45.0);
    assert_eq!(root.tag(), 7);
    let base = root.as_any().downcast_ref::<BaseNode>().unwrap();
    assert!(!base.is_visible());
    assert!(base.property("title").is_none());

    // The custom property fell through the node acceptor to the assigner.
    assert_eq!(*assigner.customs.borrow(), vec!["speed".to_string()]);
}

#[test]
fn direct_mode_resolves_owner_bindings_immediately() {
    init_logging();
    let mut f = Fixture::new();
    f.header(false);
    f.strings(&["CCNode", "startButton", "onStart", "block"]);
    f.no_sequences();

    f.uint(0); // class "CCNode"
    f.uint(2); // owner member assignment
    f.uint(1); // "startButton"
    f.uint(0); // no animated channels
    f.uint(1); // one regular property: a callback block
    f.uint(0);
    f.uint(21); // Block
    f.uint(3); // "block"
    f.byte(0);
    f.uint(2); // selector "onStart"
    f.uint(2); // owner target
    f.uint(0); // children

    let registry = LoaderRegistry::with_defaults();
    let frames = MemorySpriteFrameCache::new();
    let resolver = TestResolver;
    let mut env = DecodeEnv::new(&registry, &frames);
    env.selectors = Some(&resolver);

    let owner = TestOwner::with_callbacks(&[]);
    let document = ccbi::decode(&f.finish(), &env, Some(owner.clone())).unwrap();

    // Both the member and the callback resolved during decode, not after.
    assert!(document.owner_bindings.is_empty());
    let owner = owner.borrow();
    let owner = owner.as_any().downcast_ref::<TestOwner>().unwrap();
    assert_eq!(owner.assigned_members, vec!["startButton".to_string()]);

    let root = document.root.borrow();
    let base = root.as_any().downcast_ref::<BaseNode>().unwrap();
    let (_callback, events) = base.bound_callback().unwrap();
    assert_eq!(*events, 0);
}

#[test]
fn document_controlled_bindings_resolve_after_decode() {
    init_logging();
    let mut f = Fixture::new();
    f.header(true);
    f.strings(&[
        "CCNode",
        "MainScene",
        "titleLabel",
        "onPress",
        "blockControl",
        "intro",
        "onDone",
    ]);

    // One sequence whose callback channel records a document keyframe callback.
    f.uint(1);
    f.float(1.0); // duration
    f.uint(5); // "intro"
    f.uint(0); // id
    f.int(-1);
    f.uint(1); // callback keyframes
    f.float(0.5);
    f.uint(6); // "onDone"
    f.uint(1); // document scope
    f.uint(0); // sound keyframes
    f.int(-1); // no auto-play

    // Root node: carries the controller identifier.
    f.uint(0); // class
    f.uint(1); // controller "MainScene"
    f.uint(0); // no member assignment
    f.uint(0); // no animated channels
    f.uint(0); // properties
    f.uint(0);
    f.uint(1); // one child

    // Child: document-root outlet plus an owner control callback.
    f.uint(0); // class
    f.uint(1); // controller id (ignored for non-root nodes)
    f.uint(1); // document-root member assignment
    f.uint(2); // "titleLabel"
    f.uint(0); // no animated channels
    f.uint(1); // one regular property
    f.uint(0);
    f.uint(25); // BlockControl
    f.uint(4); // "blockControl"
    f.byte(0);
    f.uint(3); // selector "onPress"
    f.uint(2); // owner target
    f.uint(8); // control events
    f.uint(0); // children

    let registry = LoaderRegistry::with_defaults();
    let frames = MemorySpriteFrameCache::new();
    let env = DecodeEnv::new(&registry, &frames);

    let owner = TestOwner::with_callbacks(&["onPress"]);
    let document = ccbi::decode(&f.finish(), &env, Some(owner.clone())).unwrap();

    assert!(document.document_controlled);

    // Nothing resolved during the decode itself.
    let child = document.root.borrow().children()[0].clone();
    assert!(child
        .borrow()
        .as_any()
        .downcast_ref::<BaseNode>()
        .unwrap()
        .bound_callback()
        .is_none());
    assert_eq!(document.owner_bindings.len(), 1);
    assert!(matches!(
        &document.owner_bindings[0],
        PendingBinding::Callback { name, control_events: 8, .. } if name == "onPress"
    ));

    {
        let model = document.root_animation().unwrap().borrow();
        assert_eq!(model.document_controller_name(), Some("MainScene"));
        assert_eq!(model.document_bindings().len(), 1);
        assert!(matches!(
            &model.document_bindings()[0],
            PendingBinding::Outlet { name, .. } if name == "titleLabel"
        ));
        let recorded = model.keyframe_callbacks();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0], (CallbackScope::Document, "onDone".to_string()));
    }

    let factory = TestFactory {
        expected_name: "MainScene",
        controller_callbacks: vec!["onDone".to_string()],
    };
    let controllers = ccbi::resolve_bindings(&document, Some(&owner), Some(&factory));

    assert_eq!(controllers.len(), 1);
    assert!(Rc::ptr_eq(&controllers[0].0, &document.root));
    {
        let controller = controllers[0].1.borrow();
        let controller = controller.as_any().downcast_ref::<TestController>().unwrap();
        assert!(controller.root_set);
        assert!(controller.did_load);
        assert_eq!(controller.outlets, vec!["titleLabel".to_string()]);
    }

    // Owner-scope callback bound with its control-event bits.
    let child = child.borrow();
    let base = child.as_any().downcast_ref::<BaseNode>().unwrap();
    let (_callback, events) = base.bound_callback().unwrap();
    assert_eq!(*events, 8);

    // Keyframe callback installed into the model's dispatch map.
    let model = document.root_animation().unwrap().borrow();
    assert!(model
        .keyframe_callback(CallbackScope::Document, "onDone")
        .is_some());
}

#[test]
fn embedded_document_splices_out_the_wrapper() {
    init_logging();
    let sub = minimal_document();

    let mut f = Fixture::new();
    f.header(false);
    f.strings(&[
        "CCNode",
        "CCBFile",
        "ccbFile",
        "widget.ccbi",
        "position",
        "rotation",
    ]);
    f.no_sequences();

    // Root with one child.
    plain_node_header(&mut f, 0);
    f.uint(0);
    f.uint(0);
    f.uint(0);
    f.uint(1);

    // The child is a sub-file wrapper with a transform and animated channels.
    plain_node_header(&mut f, 1);
    f.uint(1); // one animated sequence
    f.uint(0); // sequence id
    f.uint(1); // one channel
    f.uint(5); // "rotation"
    f.uint(5); // Degrees
    f.uint(1); // one keyframe
    f.float(0.0);
    f.uint(0); // instant easing
    f.float(10.0);
    f.uint(3); // regular properties
    f.uint(0);
    // position = (5, 6)
    f.uint(0);
    f.uint(4);
    f.byte(0);
    f.float(5.0);
    f.float(6.0);
    f.uint(0);
    // rotation = 30
    f.uint(5);
    f.uint(5);
    f.byte(0);
    f.float(30.0);
    // ccbFile = "widget.ccbi"
    f.uint(23);
    f.uint(2);
    f.byte(0);
    f.uint(3);
    f.uint(0); // children

    let mut documents = MapDocuments::default();
    documents
        .documents
        .insert("widget.ccbi".to_string(), sub);

    let registry = LoaderRegistry::with_defaults();
    let frames = MemorySpriteFrameCache::new();
    let listener = CountingListener::default();
    let mut env = DecodeEnv::new(&registry, &frames);
    env.documents = Some(&documents);
    env.listener = Some(&listener);

    let document = ccbi::decode(&f.finish(), &env, None).unwrap();

    let children = document.root.borrow().children();
    assert_eq!(children.len(), 1);
    let spliced = &children[0];

    // The wrapper is gone; the embedded root took its place and transform.
    let node = spliced.borrow();
    assert!(!node.as_any().is::<FileWrapperNode>());
    assert_eq!(node.position(), vec2(5.0, 6.0));
    assert_eq!(node.rotation(), 30.0);
    assert!(node.as_any().downcast_ref::<BaseNode>().unwrap().is_visible());
    drop(node);

    // Loaded exactly once for the embedded root (during its own document's
    // decode) plus once for the outer root.
    assert_eq!(listener.loaded.get(), 2);

    // Two documents, two animation models; the wrapper's channels moved onto
    // the embedded node.
    assert_eq!(document.animations.len(), 2);
    let model = document.root_animation().unwrap().borrow();
    let channels = model.node_channels(spliced).unwrap();
    assert_eq!(channels[0].channels[0].name, "rotation");
}

#[test]
fn decode_failures() {
    init_logging();
    let registry = LoaderRegistry::with_defaults();
    let frames = MemorySpriteFrameCache::new();
    let env = DecodeEnv::new(&registry, &frames);

    // Magic must appear in its on-disk (reversed) order.
    let mut f = Fixture::new();
    f.raw(b"ccbi");
    f.uint(5);
    f.byte(0);
    assert!(matches!(
        ccbi::decode(&f.finish(), &env, None),
        Err(Error::InvalidMagic)
    ));

    // Unsupported version.
    let mut f = Fixture::new();
    f.raw(b"ibcc");
    f.uint(4);
    f.byte(0);
    assert!(matches!(
        ccbi::decode(&f.finish(), &env, None),
        Err(Error::UnsupportedVersion(4))
    ));

    // Truncated right after the header.
    let mut f = Fixture::new();
    f.header(false);
    assert!(matches!(
        ccbi::decode(&f.finish(), &env, None),
        Err(Error::UnexpectedEof { .. })
    ));

    // Class-name index into an empty string cache.
    let mut f = Fixture::new();
    f.header(false);
    f.strings(&[]);
    f.no_sequences();
    f.uint(0); // class index 0, but the cache is empty
    assert!(matches!(
        ccbi::decode(&f.finish(), &env, None),
        Err(Error::StringIndexOutOfRange { index: 0, count: 0 })
    ));
}

#[test]
fn sprite_frame_keyframes_resolve_through_the_cache() {
    init_logging();
    let mut f = Fixture::new();
    f.header(false);
    f.strings(&["CCNode", "displayFrame", "heroes.plist", "hero.png"]);
    f.no_sequences();

    plain_node_header(&mut f, 0);
    f.uint(1); // one animated sequence
    f.uint(0);
    f.uint(1); // one channel
    f.uint(1); // "displayFrame"
    f.uint(10); // SpriteFrame
    f.uint(1); // one keyframe
    f.float(0.0);
    f.uint(0); // instant easing
    f.uint(2); // sheet "heroes.plist"
    f.uint(3); // frame "hero.png"
    f.uint(0);
    f.uint(0);
    f.uint(0);

    let registry = LoaderRegistry::with_defaults();
    let frames = MemorySpriteFrameCache::new();
    frames.insert("hero.png", ccbi::scene::SpriteFrame::new(7u32));
    let mut env = DecodeEnv::new(&registry, &frames);
    env.root_path = "assets/";

    let document = ccbi::decode(&f.finish(), &env, None).unwrap();

    // The sheet loaded once, under the root-relative path.
    assert!(frames.is_sheet_loaded("assets/heroes.plist"));

    let model = document.root_animation().unwrap().borrow();
    let channels = model.node_channels(&document.root).unwrap();
    match &channels[0].channels[0].keyframes[0].value {
        KeyframeValue::SpriteFrame(frame) => {
            assert!(frame.is_resolved());
            assert_eq!(frame.downcast_ref::<u32>(), Some(&7));
        }
        other => panic!("unexpected keyframe value: {other:?}"),
    }
}
