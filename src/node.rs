use std::fmt::Debug;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::batch::ImageBatch;

/// Errors a node can surface to the host runtime. There is no retry
/// layer; a failure aborts the whole invocation.
#[derive(Debug, Clone, Error, Serialize, Deserialize, JsonSchema)]
pub enum NodeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Processing error: {0}")]
    ExecutionFailed(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Where a saved file lives, in the host's three-root layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Temp,
    Input,
    Output,
}

/// Descriptor for a file written to host storage, handed to the
/// front-end so it can fetch the image for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SavedImage {
    pub filename: String,
    pub subfolder: String,
    #[serde(rename = "type")]
    pub kind: StorageKind,
}

/// Connection type of a node port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum PortKind {
    Image,
    String,
}

/// A declared input port, with an optional default for string ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PortDecl {
    pub name: String,
    pub kind: PortKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl PortDecl {
    pub fn image(name: &str) -> Self {
        Self { name: name.to_string(), kind: PortKind::Image, default: None }
    }

    pub fn string(name: &str, default: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: PortKind::String,
            default: Some(default.to_string()),
        }
    }
}

/// Everything the host's node registry needs to discover a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NodeDeclaration {
    pub identifier: String,
    pub display_name: String,
    pub category: String,
    pub inputs: Vec<PortDecl>,
    pub returns: Vec<PortKind>,
}

/// Inputs the host supplies on each invocation. Batches are owned
/// copies handed over by the runtime; the node never mutates upstream
/// tensors.
#[derive(Debug, Clone)]
pub struct NodeInput {
    pub backgrounds: ImageBatch,
    pub pose_images: ImageBatch,
    /// Filename of a prior result round-tripped through the UI.
    /// Empty on the first run.
    pub prior_image: String,
}

/// UI-facing metadata, delivered to the front-end alongside (not as part
/// of) the data result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UiPayload {
    pub backgrounds: Vec<SavedImage>,
}

/// The dual payload a node returns: `ui` goes to the front-end, `result`
/// flows to downstream graph nodes.
#[derive(Debug, Clone)]
pub struct NodeOutput {
    pub ui: UiPayload,
    pub result: ImageBatch,
}

/// A node in the host's visual graph. Invocations are synchronous: the
/// runtime calls `process` once per graph execution and blocks on it.
pub trait ImageNode: Send + Sync + Debug {
    fn declaration(&self) -> NodeDeclaration;

    fn process(&self, input: NodeInput) -> Result<NodeOutput, NodeError>;
}
