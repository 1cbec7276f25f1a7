//! Deferred bindings and the post-decode resolution pass.
//!
//! Outlet and callback assignments name members on objects that do not exist
//! while the graph decodes (the file owner, per-document controllers). The
//! graph builder records them as [`PendingBinding`]s; [`resolve_bindings`]
//! consumes them exactly once after the decode returns.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use tracing::warn;

use crate::anim::CallbackScope;
use crate::scene::NodeRef;

use super::{Document, PropertyValue};

/// Callback invoked with the node that triggered it.
pub type Callback = Rc<dyn Fn(&NodeRef)>;

/// Shared handle to an owner or document-controller object.
pub type TargetRef = Rc<RefCell<dyn BindingTarget>>;

/// A (name, node) pair awaiting resolution against the file owner or a
/// per-document controller.
#[derive(Clone)]
pub enum PendingBinding {
    /// Assign the node to a named slot on the target.
    Outlet { name: String, node: NodeRef },
    /// Bind a named handler from the target onto the node.
    Callback {
        name: String,
        node: NodeRef,
        control_events: u32,
    },
}

/// Object that can receive name-based bindings: the caller-supplied file
/// owner, or a document controller instantiated by the resolver.
///
/// Every method is optional; a name the target does not know is skipped.
pub trait BindingTarget: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Direct-mode member assignment hook, tried before the external default
    /// assigner. Return true when handled.
    fn assign_member(&mut self, _name: &str, _node: &NodeRef) -> bool {
        false
    }

    /// Assign a named outlet slot. Return true when the slot exists.
    fn set_outlet(&mut self, _name: &str, _node: &NodeRef) -> bool {
        false
    }

    /// Look up a named callback.
    fn callback(&self, _name: &str) -> Option<Callback> {
        None
    }

    /// Called on document controllers with the node their document is rooted
    /// at.
    fn set_root_node(&mut self, _node: &NodeRef) {}

    /// Called on document controllers once every binding has been applied.
    fn did_load(&mut self) {}
}

/// Instantiates document controllers by their recorded identifier.
///
/// Dotted identifiers resolve through nested host containers; that naming
/// convention is the factory's concern, the resolver passes the name through
/// verbatim.
pub trait ControllerFactory {
    fn instantiate(&self, name: &str) -> Option<TargetRef>;
}

/// Assignment target handed to the external default assigner and the selector
/// resolver in direct mode.
pub enum AssignTarget<'a> {
    Owner(&'a TargetRef),
    Node(&'a NodeRef),
}

/// External fallback for member and custom-property assignment, consulted
/// when the target's own acceptor declines.
pub trait MemberAssigner {
    fn assign_member(&self, target: &AssignTarget<'_>, name: &str, node: &NodeRef) -> bool;
    fn assign_custom(&self, node: &NodeRef, name: &str, value: &PropertyValue) -> bool;
}

/// Direct-mode callback lookup against the owner or the document root.
pub trait SelectorResolver {
    fn resolve(&self, target: &AssignTarget<'_>, name: &str) -> Option<Callback>;
}

/// Notified after each node finishes loading, unless the node handled the
/// notification itself.
pub trait NodeLoadListener {
    fn on_node_loaded(&self, node: &NodeRef);
}

/// Supplies the bytes of embedded sub-documents by root-relative path.
pub trait DocumentSource {
    fn document(&self, path: &str) -> Option<Vec<u8>>;
}

/// Resolve every binding recorded during a decode.
///
/// Owner-scope bindings apply directly against `owner`. For each node whose
/// animation model names a document controller, the controller is
/// instantiated, wired (root node, outlets, callbacks, `did_load`), and its
/// keyframe callbacks installed into the model's dispatch map. Unresolvable
/// names are skipped with a warning; this pass cannot fail the load.
///
/// Returns the instantiated controllers paired with their document roots.
pub fn resolve_bindings(
    document: &Document,
    owner: Option<&TargetRef>,
    controllers: Option<&dyn ControllerFactory>,
) -> Vec<(NodeRef, TargetRef)> {
    if let Some(owner) = owner {
        apply_bindings(&document.owner_bindings, owner, "owner");
    } else if !document.owner_bindings.is_empty() {
        warn!(
            count = document.owner_bindings.len(),
            "owner bindings recorded but no owner supplied"
        );
    }

    let mut instantiated = Vec::new();
    for (node, model) in &document.animations {
        let Some(name) = model.borrow().document_controller_name().map(String::from) else {
            continue;
        };
        let Some(factory) = controllers else {
            warn!(controller = %name, "no controller factory; document bindings skipped");
            continue;
        };
        let Some(controller) = factory.instantiate(&name) else {
            warn!(controller = %name, "controller could not be instantiated");
            continue;
        };

        controller.borrow_mut().set_root_node(node);
        apply_bindings(model.borrow().document_bindings(), &controller, "controller");
        controller.borrow_mut().did_load();

        let recorded = model.borrow().keyframe_callbacks().to_vec();
        for (scope, callback_name) in recorded {
            let callback = match scope {
                CallbackScope::Document => controller.borrow().callback(&callback_name),
                CallbackScope::Owner => owner.and_then(|o| o.borrow().callback(&callback_name)),
            };
            match callback {
                Some(callback) => {
                    model
                        .borrow_mut()
                        .set_keyframe_callback(scope, &callback_name, callback);
                }
                None => warn!(
                    name = %callback_name,
                    ?scope,
                    "keyframe callback not resolved"
                ),
            }
        }

        instantiated.push((node.clone(), controller));
    }
    instantiated
}

fn apply_bindings(bindings: &[PendingBinding], target: &TargetRef, target_kind: &str) {
    for binding in bindings {
        match binding {
            PendingBinding::Outlet { name, node } => {
                if !target.borrow_mut().set_outlet(name, node) {
                    warn!(name = %name, target = target_kind, "outlet not assigned");
                }
            }
            PendingBinding::Callback {
                name,
                node,
                control_events,
            } => match target.borrow().callback(name) {
                Some(callback) => {
                    if !node.borrow_mut().bind_callback(callback, *control_events) {
                        warn!(name = %name, "node did not accept callback");
                    }
                }
                None => warn!(name = %name, target = target_kind, "callback not resolved"),
            },
        }
    }
}
