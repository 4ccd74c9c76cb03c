//! OpenPose editor bridge node for graph-based image generation pipelines.
//!
//! A single plugin node that hands background and pose-skeleton frames to
//! a browser-side pose editor through host temp storage, and returns
//! either the freshly generated pose frames (first run) or the edited
//! versions the editor wrote back to disk (later runs).

pub mod batch;
pub mod codec;
pub mod editor;
pub mod node;
pub mod registry;
pub mod storage;

pub use batch::{Frame, ImageBatch};
pub use editor::{OpenPoseEditor, PriorImage};
pub use node::{
    ImageNode, NodeDeclaration, NodeError, NodeInput, NodeOutput, SavedImage, StorageKind,
    UiPayload,
};
pub use storage::Storage;
