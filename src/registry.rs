use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use schemars::{schema::RootSchema, schema_for};

use crate::editor::{self, OpenPoseEditor};
use crate::node::{ImageNode, NodeDeclaration, NodeError};
use crate::storage::Storage;

type NodeFactory = fn(Arc<Storage>) -> Result<Box<dyn ImageNode>, NodeError>;

/// A discoverable node: its host-facing declaration plus a constructor.
pub struct RegisteredNode {
    pub declaration: NodeDeclaration,
    factory: NodeFactory,
}

impl RegisteredNode {
    pub fn instantiate(&self, storage: Arc<Storage>) -> Result<Box<dyn ImageNode>, NodeError> {
        (self.factory)(storage)
    }
}

static BUILTIN_NODES: Lazy<HashMap<&'static str, RegisteredNode>> = Lazy::new(|| {
    let mut nodes: HashMap<&'static str, RegisteredNode> = HashMap::new();
    nodes.insert(
        editor::IDENTIFIER,
        RegisteredNode {
            declaration: editor::declaration(),
            factory: |storage| {
                OpenPoseEditor::new(storage).map(|node| Box::new(node) as Box<dyn ImageNode>)
            },
        },
    );
    nodes
});

/// All nodes this crate contributes to the host registry.
pub fn builtin_nodes() -> &'static HashMap<&'static str, RegisteredNode> {
    &BUILTIN_NODES
}

/// Look up a node by its registry identifier.
pub fn get(identifier: &str) -> Option<&'static RegisteredNode> {
    BUILTIN_NODES.get(identifier)
}

/// JSON schema of a node declaration, for hosts that validate plugin
/// metadata before loading it.
pub fn declaration_schema() -> RootSchema {
    schema_for!(NodeDeclaration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_lists_the_editor() {
        let nodes = builtin_nodes();
        assert_eq!(nodes.len(), 1);
        let registered = get(editor::IDENTIFIER).unwrap();
        assert_eq!(registered.declaration.display_name, editor::DISPLAY_NAME);
        assert!(get("Nui.Unknown").is_none());
    }

    #[test]
    fn test_registered_factory_builds_a_node() {
        let storage = Arc::new(Storage::ephemeral().unwrap());
        let node = get(editor::IDENTIFIER).unwrap().instantiate(storage).unwrap();
        assert_eq!(node.declaration().identifier, editor::IDENTIFIER);
    }

    #[test]
    fn test_declaration_schema_is_an_object_schema() {
        let schema = declaration_schema();
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["title"], "NodeDeclaration");
        assert!(json["properties"].get("identifier").is_some());
    }
}
