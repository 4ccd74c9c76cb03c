use std::path::Path;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, warn};

use crate::batch::{Frame, ImageBatch};
use crate::codec;
use crate::node::{
    ImageNode, NodeDeclaration, NodeError, NodeInput, NodeOutput, PortDecl, PortKind, SavedImage,
    StorageKind, UiPayload,
};
use crate::storage::Storage;

pub const IDENTIFIER: &str = "Nui.OpenPoseEditor";
pub const DISPLAY_NAME: &str = "OpenPose Editor";

/// Input uploads carrying this marker come from the editor front-end and
/// are stale once a new editor instance exists.
pub const UPLOAD_MARKER: &str = "OpenPose";

const DEFAULT_FILENAME_PREFIX: &str = "ComfyUI";

/// First-run / later-run state, round-tripped through the UI as an
/// opaque filename. An empty string is the only first-run signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriorImage {
    FirstRun,
    /// A prior result exists; per-frame edits live at `<prefix>_<i>.png`.
    Saved { prefix: String },
}

impl PriorImage {
    /// Parse the UI string, trimming the trailing underscore-separated
    /// segment of a non-empty name to recover the per-frame prefix.
    pub fn parse(raw: &str) -> Result<Self, NodeError> {
        if raw.is_empty() {
            return Ok(PriorImage::FirstRun);
        }
        match raw.rfind('_') {
            Some(idx) => Ok(PriorImage::Saved { prefix: raw[..idx].to_string() }),
            None => Err(NodeError::InvalidInput(format!(
                "prior image name has no frame suffix: {raw}"
            ))),
        }
    }
}

/// Bridge node between the browser pose editor and the image pipeline.
///
/// Backgrounds are written to temp storage for the front-end to display.
/// On the first run the pose batch passes through unchanged; on later
/// runs, per-frame files written back by the editor take precedence over
/// the supplied frames, which are lazily materialized to disk otherwise.
#[derive(Debug)]
pub struct OpenPoseEditor {
    storage: Arc<Storage>,
    prefix_append: String,
}

impl OpenPoseEditor {
    /// Construct an editor instance. Generates the per-instance suffix
    /// that namespaces this instance's background files, and sweeps
    /// stale editor uploads from the input root.
    pub fn new(storage: Arc<Storage>) -> Result<Self, NodeError> {
        let mut rng = rand::rng();
        let suffix: String = (0..5)
            .map(|_| char::from(rng.random_range(b'a'..=b'z')))
            .collect();

        storage.sweep_marked_inputs(UPLOAD_MARKER)?;

        Ok(Self { storage, prefix_append: format!("_temp_{suffix}") })
    }

    /// Write every background frame to temp storage and return the file
    /// records the front-end uses to fetch them, in input order.
    pub fn save_backgrounds(
        &self,
        images: &ImageBatch,
        filename_prefix: &str,
    ) -> Result<Vec<SavedImage>, NodeError> {
        let first = images
            .first()
            .ok_or_else(|| NodeError::InvalidInput("background batch is empty".to_string()))?;
        let (height, width, _) = first.dim();

        let prefix = format!("{filename_prefix}{}", self.prefix_append);
        let location = self
            .storage
            .allocate_save_path(&prefix, width as u32, height as u32)?;

        let mut results = Vec::with_capacity(images.len());
        let mut counter = location.counter;
        for frame in images.frames() {
            let file = location.file_for(counter);
            self.save_frame(frame, &location.folder.join(&file))?;
            results.push(SavedImage {
                filename: file,
                subfolder: location.subfolder.clone(),
                kind: StorageKind::Temp,
            });
            counter += 1;
        }
        debug!(count = results.len(), prefix, "saved background frames");
        Ok(results)
    }

    /// Encode one frame as PNG at the exact given path.
    pub fn save_frame(&self, frame: &Frame, path: &Path) -> Result<(), NodeError> {
        codec::write_png(frame, path)
            .map_err(|e| NodeError::ExecutionFailed(format!("Failed to write image: {e:#}")))
    }

    fn reload_or_materialize(
        &self,
        pose_images: &ImageBatch,
        prefix: &str,
    ) -> Result<ImageBatch, NodeError> {
        let mut frames = Vec::with_capacity(pose_images.len());
        for (i, frame) in pose_images.frames().iter().enumerate() {
            let path = self.storage.annotated_filepath(&format!("{prefix}_{i}.png"));
            if path.exists() {
                // The editor wrote this frame back; its version wins.
                debug!(frame = i, path = %path.display(), "loading edited pose frame");
                let edited = codec::read_png(&path).map_err(|e| {
                    NodeError::ExecutionFailed(format!("Failed to load edited pose frame: {e:#}"))
                })?;
                frames.push(edited);
            } else {
                debug!(frame = i, path = %path.display(), "materializing original pose frame");
                self.save_frame(frame, &path)?;
                frames.push(frame.clone());
            }
        }
        Ok(ImageBatch::from_frames(frames))
    }
}

pub fn declaration() -> NodeDeclaration {
    NodeDeclaration {
        identifier: IDENTIFIER.to_string(),
        display_name: DISPLAY_NAME.to_string(),
        category: "image".to_string(),
        inputs: vec![
            PortDecl::image("backgrounds"),
            // Linking the pose node here is what tells the front-end
            // which upstream node is being edited.
            PortDecl::image("openpose_images"),
            PortDecl::string("image", ""),
        ],
        returns: vec![PortKind::Image],
    }
}

impl ImageNode for OpenPoseEditor {
    fn declaration(&self) -> NodeDeclaration {
        declaration()
    }

    #[tracing::instrument(name = "openpose_editor_process", skip(self, input))]
    fn process(&self, input: NodeInput) -> Result<NodeOutput, NodeError> {
        if input.backgrounds.len() != input.pose_images.len() {
            warn!(
                backgrounds = input.backgrounds.len(),
                pose_images = input.pose_images.len(),
                "batch length mismatch between backgrounds and pose images"
            );
        }

        let saved = self.save_backgrounds(&input.backgrounds, DEFAULT_FILENAME_PREFIX)?;

        let result = match PriorImage::parse(&input.prior_image)? {
            PriorImage::FirstRun => input.pose_images,
            PriorImage::Saved { prefix } => {
                self.reload_or_materialize(&input.pose_images, &prefix)?
            }
        };

        Ok(NodeOutput { ui: UiPayload { backgrounds: saved }, result })
    }
}
