//! Per-class node loaders and their registry.
//!
//! The graph protocol is order-dependent: after the decoder reads a node's
//! class name it hands the stream to the loader registered for that class,
//! which constructs the node and later consumes the node's property block.
//! Host applications register loaders for their concrete node types; classes
//! without a loader fall back to the generic base-node loader, which is not
//! an error.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::scene::{node_ref, BaseNode, FileWrapperNode, NodeRef};
use crate::util::Result;

use super::props::{parse_property_block, CustomProperty};
use super::Decoder;

/// Constructs nodes of one class from the stream and parses their property
/// blocks.
///
/// Loaders are shared read-only across concurrent decodes of different
/// buffers.
pub trait NodeLoader: Send + Sync {
    /// Construct the node, consuming any loader-specific bytes.
    fn load(&self, parent: Option<&NodeRef>, decoder: &mut Decoder<'_, '_, '_>)
        -> Result<NodeRef>;

    /// Consume the node's property block. Returns the properties marked
    /// custom, for the decoder to route through the custom-property acceptors.
    fn parse_properties(
        &self,
        node: &NodeRef,
        parent: Option<&NodeRef>,
        decoder: &mut Decoder<'_, '_, '_>,
    ) -> Result<Vec<CustomProperty>>;
}

/// Generic loader: a [`BaseNode`] plus the generic property block.
pub struct BaseNodeLoader;

impl NodeLoader for BaseNodeLoader {
    fn load(
        &self,
        _parent: Option<&NodeRef>,
        _decoder: &mut Decoder<'_, '_, '_>,
    ) -> Result<NodeRef> {
        Ok(node_ref(BaseNode::new()))
    }

    fn parse_properties(
        &self,
        node: &NodeRef,
        parent: Option<&NodeRef>,
        decoder: &mut Decoder<'_, '_, '_>,
    ) -> Result<Vec<CustomProperty>> {
        parse_property_block(decoder, node, parent)
    }
}

/// Loader for embedded-sub-file wrapper nodes (class `CCBFile`).
///
/// The wrapper's property block carries the sub-document path; the generic
/// parser resolves it into the wrapper, and the graph builder splices the
/// wrapper out afterwards.
pub struct FileNodeLoader;

impl NodeLoader for FileNodeLoader {
    fn load(
        &self,
        _parent: Option<&NodeRef>,
        _decoder: &mut Decoder<'_, '_, '_>,
    ) -> Result<NodeRef> {
        Ok(node_ref(FileWrapperNode::new()))
    }

    fn parse_properties(
        &self,
        node: &NodeRef,
        parent: Option<&NodeRef>,
        decoder: &mut Decoder<'_, '_, '_>,
    ) -> Result<Vec<CustomProperty>> {
        parse_property_block(decoder, node, parent)
    }
}

/// Registry mapping class names to loaders, with a generic fallback.
pub struct LoaderRegistry {
    loaders: HashMap<String, Arc<dyn NodeLoader>>,
    fallback: Arc<dyn NodeLoader>,
}

impl LoaderRegistry {
    /// Empty registry with the base-node fallback.
    pub fn new() -> Self {
        Self {
            loaders: HashMap::new(),
            fallback: Arc::new(BaseNodeLoader),
        }
    }

    /// Registry with the built-in loaders: the base-node fallback and the
    /// `CCBFile` wrapper loader.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("CCBFile", Arc::new(FileNodeLoader));
        registry
    }

    /// Register a loader for a class name, replacing any previous one.
    pub fn register(&mut self, class_name: impl Into<String>, loader: Arc<dyn NodeLoader>) {
        self.loaders.insert(class_name.into(), loader);
    }

    /// Resolve the loader for a class name, falling back to the generic
    /// loader for unknown classes.
    pub fn resolve(&self, class_name: &str) -> &Arc<dyn NodeLoader> {
        match self.loaders.get(class_name) {
            Some(loader) => loader,
            None => {
                debug!(class = class_name, "no loader registered, using the generic node loader");
                &self.fallback
            }
        }
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
