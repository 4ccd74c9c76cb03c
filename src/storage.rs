use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::node::NodeError;

/// Filesystem roots the host hands to nodes: a temp area for artifacts
/// the UI fetches, and an input area where the UI uploads edited images.
#[derive(Debug)]
pub struct Storage {
    temp_dir: PathBuf,
    input_dir: PathBuf,
    // Keeps the backing directory alive for ephemeral storage.
    _ephemeral: Option<TempDir>,
}

/// An allocated save target under the temp root. `counter` is the next
/// free index; callers advance their own copy per file written.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveLocation {
    pub folder: PathBuf,
    pub filename: String,
    pub subfolder: String,
    pub counter: u32,
}

impl SaveLocation {
    pub fn file_for(&self, counter: u32) -> String {
        format!("{}_{:05}_.png", self.filename, counter)
    }

    pub fn path_for(&self, counter: u32) -> PathBuf {
        self.folder.join(self.file_for(counter))
    }
}

impl Storage {
    /// Use the host's directory layout, creating missing roots.
    pub fn new(
        temp_dir: impl Into<PathBuf>,
        input_dir: impl Into<PathBuf>,
    ) -> Result<Self, NodeError> {
        let temp_dir = temp_dir.into();
        let input_dir = input_dir.into();
        for dir in [&temp_dir, &input_dir] {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| {
                    NodeError::ExecutionFailed(format!(
                        "Failed to create storage dir {}: {}",
                        dir.display(),
                        e
                    ))
                })?;
            }
        }
        Ok(Self { temp_dir, input_dir, _ephemeral: None })
    }

    /// Self-contained storage for hosts (and tests) that supply no roots.
    pub fn ephemeral() -> Result<Self, NodeError> {
        let root = TempDir::new().map_err(|e| {
            NodeError::ExecutionFailed(format!("Failed to create tempdir: {}", e))
        })?;
        let mut storage = Self::new(root.path().join("temp"), root.path().join("input"))?;
        storage._ephemeral = Some(root);
        Ok(storage)
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Resolve a UI-supplied file name against the input root.
    pub fn annotated_filepath(&self, name: &str) -> PathBuf {
        self.input_dir.join(name)
    }

    /// Allocate a save target under the temp root.
    ///
    /// The prefix may carry a subfolder (`poses/ComfyUI`) and the tokens
    /// `%width%` / `%height%`, substituted with the supplied dimensions.
    /// The counter continues after the highest `<filename>_NNNNN` already
    /// present in the target folder.
    pub fn allocate_save_path(
        &self,
        filename_prefix: &str,
        width: u32,
        height: u32,
    ) -> Result<SaveLocation, NodeError> {
        let prefix = filename_prefix
            .replace("%width%", &width.to_string())
            .replace("%height%", &height.to_string());

        let rel = Path::new(&prefix);
        let filename = rel
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                NodeError::InvalidInput(format!("invalid filename prefix: {filename_prefix}"))
            })?
            .to_string();
        let subfolder = rel
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        let folder = self.temp_dir.join(&subfolder);
        if !folder.exists() {
            fs::create_dir_all(&folder).map_err(|e| {
                NodeError::ExecutionFailed(format!(
                    "Failed to create output folder {}: {}",
                    folder.display(),
                    e
                ))
            })?;
        }
        let counter = next_counter(&folder, &filename)?;

        debug!(filename, subfolder, counter, "allocated save path");
        Ok(SaveLocation { folder, filename, subfolder, counter })
    }

    /// Delete every PNG in the input root whose name contains `marker`.
    /// Returns how many files were removed; any removal failure aborts.
    pub fn sweep_marked_inputs(&self, marker: &str) -> Result<usize, NodeError> {
        let entries = fs::read_dir(&self.input_dir).map_err(|e| {
            NodeError::ExecutionFailed(format!(
                "Failed to scan input dir {}: {}",
                self.input_dir.display(),
                e
            ))
        })?;

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|e| {
                NodeError::ExecutionFailed(format!("Failed to scan input dir: {}", e))
            })?;
            let path = entry.path();
            let is_png = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("png"));
            let is_marked = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(marker));
            if is_png && is_marked {
                fs::remove_file(&path).map_err(|e| {
                    NodeError::ExecutionFailed(format!(
                        "Failed to remove {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, marker, "swept stale editor uploads");
        }
        Ok(removed)
    }
}

fn next_counter(folder: &Path, filename: &str) -> Result<u32, NodeError> {
    let entries = fs::read_dir(folder).map_err(|e| {
        NodeError::ExecutionFailed(format!(
            "Failed to scan output folder {}: {}",
            folder.display(),
            e
        ))
    })?;

    let mut max = 0u32;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(rest) = name.strip_prefix(filename).and_then(|r| r.strip_prefix('_')) else {
            continue;
        };
        if let Some(digits) = rest.split('_').next()
            && let Ok(n) = digits.parse::<u32>()
        {
            max = max.max(n);
        }
    }
    Ok(max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ephemeral_storage_creates_roots() {
        let storage = Storage::ephemeral().unwrap();
        assert!(storage.temp_dir().is_dir());
        assert!(storage.input_dir().is_dir());
    }

    #[test]
    fn test_allocate_save_path_starts_at_one() {
        let storage = Storage::ephemeral().unwrap();
        let location = storage.allocate_save_path("ComfyUI", 64, 64).unwrap();
        assert_eq!(location.counter, 1);
        assert_eq!(location.subfolder, "");
        assert_eq!(location.file_for(1), "ComfyUI_00001_.png");
        assert_eq!(location.folder, storage.temp_dir());
    }

    #[test]
    fn test_allocate_save_path_continues_counter() {
        let storage = Storage::ephemeral().unwrap();
        fs::write(storage.temp_dir().join("ComfyUI_00007_.png"), b"x").unwrap();
        fs::write(storage.temp_dir().join("other_00042_.png"), b"x").unwrap();

        let location = storage.allocate_save_path("ComfyUI", 64, 64).unwrap();
        assert_eq!(location.counter, 8);
    }

    #[test]
    fn test_allocate_save_path_splits_subfolder_and_tokens() {
        let storage = Storage::ephemeral().unwrap();
        let location = storage
            .allocate_save_path("poses/shot_%width%x%height%", 640, 480)
            .unwrap();
        assert_eq!(location.subfolder, "poses");
        assert_eq!(location.filename, "shot_640x480");
        assert!(location.folder.is_dir());
        assert_eq!(location.folder, storage.temp_dir().join("poses"));
    }

    #[test]
    fn test_sweep_removes_only_marked_pngs() {
        let storage = Storage::ephemeral().unwrap();
        let marked = storage.input_dir().join("ComfyUI_OpenPose_3_0.png");
        let plain = storage.input_dir().join("photo.png");
        let marked_but_json = storage.input_dir().join("OpenPose_backup.json");
        for path in [&marked, &plain, &marked_but_json] {
            fs::write(path, b"x").unwrap();
        }

        let removed = storage.sweep_marked_inputs("OpenPose").unwrap();
        assert_eq!(removed, 1);
        assert!(!marked.exists());
        assert!(plain.exists());
        assert!(marked_but_json.exists());
    }

    #[test]
    fn test_annotated_filepath_resolves_under_input() {
        let storage = Storage::ephemeral().unwrap();
        assert_eq!(
            storage.annotated_filepath("abc_0.png"),
            storage.input_dir().join("abc_0.png")
        );
    }
}
