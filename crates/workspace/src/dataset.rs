//! Dataset files inside a workspace's `data/` directory.
//! 工作區 `data/` 目錄中的資料集檔案管理。

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use filetime::FileTime;
use tracing::{debug, info, warn};

use crate::codec::CodecError;
use crate::error::{WorkspaceError, WorkspaceResult};
use crate::layout::WorkspaceLayout;
use crate::timestamp::Timestamp;
use crate::util::has_extension;

/// Reserved dataset the session reads and writes implicitly.
pub const CANONICAL_DATASET: &str = "workspace_data.csv";

/// Extension (without the dot) every dataset file carries.
pub const DATASET_EXTENSION: &str = "csv";

/// Dataset file as surfaced to callers.
/// 提供給呼叫端的資料集檔案資訊。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

impl DatasetDescriptor {
    /// Filename without the dataset extension.
    pub fn display_name(&self) -> &str {
        let suffix_len = DATASET_EXTENSION.len() + 1;
        if has_extension(&self.name, DATASET_EXTENSION) && self.name.len() > suffix_len {
            &self.name[..self.name.len() - suffix_len]
        } else {
            &self.name
        }
    }

    pub fn is_canonical(&self) -> bool {
        self.name == CANONICAL_DATASET
    }

    pub fn human_size(&self) -> String {
        format_size(self.size)
    }

    pub fn modified_at(&self) -> Timestamp {
        Timestamp::from_system_time(self.modified)
    }
}

/// Formats a byte count with one decimal, e.g. `1.5 KB`.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} TB")
}

/// Owns the dataset files of one workspace.
/// 管理單一工作區內的資料集檔案。
///
/// The canonical dataset can be overwritten by an import but never renamed
/// or deleted through this store.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    layout: WorkspaceLayout,
}

impl DatasetStore {
    pub fn open(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            layout: WorkspaceLayout::new(workspace_root),
        }
    }

    pub fn workspace_root(&self) -> &Path {
        self.layout.root()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.layout.data_dir()
    }

    pub fn dataset_path(&self, name: &str) -> PathBuf {
        self.data_dir().join(name)
    }

    pub fn canonical_path(&self) -> PathBuf {
        self.dataset_path(CANONICAL_DATASET)
    }

    pub fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.dataset_path(name).is_file()
    }

    pub fn describe(&self, name: &str) -> WorkspaceResult<DatasetDescriptor> {
        validate_name(name)?;
        let path = self.dataset_path(name);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(self.not_found(name)),
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(self.not_found(name)),
            Err(err) => return Err(WorkspaceError::io("inspect dataset", &path)(err)),
        };
        let modified = metadata
            .modified()
            .map_err(WorkspaceError::io("read modification time of", &path))?;
        Ok(DatasetDescriptor {
            name: name.to_string(),
            path,
            size: metadata.len(),
            modified,
        })
    }

    /// Lists dataset files sorted by filename.
    pub fn list_datasets(&self) -> WorkspaceResult<Vec<DatasetDescriptor>> {
        let dir = self.data_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(WorkspaceError::io("list datasets in", &dir)(err)),
        };

        let mut datasets = Vec::new();
        for entry in entries {
            let entry = entry.map_err(WorkspaceError::io("list datasets in", &dir))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                debug!(path = %entry.path().display(), "skipping non UTF-8 file name");
                continue;
            };
            if !has_extension(&name, DATASET_EXTENSION) || !entry.path().is_file() {
                continue;
            }
            datasets.push(self.describe(&name)?);
        }
        datasets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(datasets)
    }

    /// Copies `source` into `data/` under its own filename.
    /// 將外部檔案以原檔名複製到 `data/`。
    ///
    /// An existing destination is only replaced when `overwrite` is set; the
    /// copy goes through a temporary file so a failed import leaves the
    /// previous contents intact.
    pub fn import_dataset(
        &self,
        source: &Path,
        overwrite: bool,
    ) -> WorkspaceResult<DatasetDescriptor> {
        let source_meta = match fs::metadata(source) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(WorkspaceError::SourceNotFound(source.to_path_buf()))
            }
            Err(err) => return Err(WorkspaceError::io("read import source", source)(err)),
        };
        if !source_meta.is_file() {
            return Err(WorkspaceError::SourceNotFound(source.to_path_buf()));
        }

        let name = source
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| WorkspaceError::InvalidName {
                name: source.display().to_string(),
                reason: "file name must be valid UTF-8",
            })?
            .to_string();
        if !has_extension(&name, DATASET_EXTENSION) {
            let extension = source
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Err(WorkspaceError::Format {
                path: source.to_path_buf(),
                source: CodecError::UnknownExtension(extension),
            });
        }

        let dir = self.data_dir();
        let destination = dir.join(&name);
        if destination.exists() {
            if !overwrite {
                return Err(WorkspaceError::AlreadyExists {
                    name,
                    path: destination,
                });
            }
            if same_file(source, &destination) {
                debug!(path = %destination.display(), "import source is already in place");
                return self.describe(&name);
            }
        }

        fs::create_dir_all(&dir).map_err(WorkspaceError::io("create directory", &dir))?;
        let staging = dir.join(format!(".{name}.import"));
        if let Err(err) = fs::copy(source, &staging) {
            let _ = fs::remove_file(&staging);
            return Err(WorkspaceError::io("copy dataset to", &staging)(err));
        }
        let mtime = FileTime::from_last_modification_time(&source_meta);
        if let Err(err) = filetime::set_file_mtime(&staging, mtime) {
            warn!(path = %staging.display(), error = %err, "could not preserve modification time");
        }
        if let Err(err) = fs::rename(&staging, &destination) {
            let _ = fs::remove_file(&staging);
            return Err(WorkspaceError::io("import dataset to", &destination)(err));
        }

        info!(dataset = %name, source = %source.display(), "dataset imported");
        self.describe(&name)
    }

    /// Renames a dataset and returns the normalized new filename.
    ///
    /// `.csv` is appended when `new_name` lacks it.
    pub fn rename_dataset(&self, old_name: &str, new_name: &str) -> WorkspaceResult<String> {
        if old_name == CANONICAL_DATASET {
            return Err(WorkspaceError::Forbidden {
                name: old_name.to_string(),
                action: "renamed",
            });
        }
        validate_name(old_name)?;
        let new_name = normalize_name(new_name);
        validate_name(&new_name)?;

        let from = self.dataset_path(old_name);
        if !from.is_file() {
            return Err(self.not_found(old_name));
        }
        let to = self.dataset_path(&new_name);
        if to.exists() {
            return Err(WorkspaceError::AlreadyExists {
                name: new_name,
                path: to,
            });
        }
        fs::rename(&from, &to).map_err(WorkspaceError::io("rename dataset", &from))?;
        info!(from = %old_name, to = %new_name, "dataset renamed");
        Ok(new_name)
    }

    pub fn delete_dataset(&self, name: &str) -> WorkspaceResult<()> {
        if name == CANONICAL_DATASET {
            return Err(WorkspaceError::Forbidden {
                name: name.to_string(),
                action: "deleted",
            });
        }
        validate_name(name)?;
        let path = self.dataset_path(name);
        if !path.is_file() {
            return Err(self.not_found(name));
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(dataset = %name, "dataset deleted");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Err(self.not_found(name)),
            Err(err) => Err(WorkspaceError::io("delete dataset", &path)(err)),
        }
    }

    /// Dataset the session should fall back to: the canonical one if it still exists.
    /// 工作階段應退回使用的資料集；僅在標準資料集仍存在時回傳。
    pub fn resolve_active_fallback(&self) -> WorkspaceResult<Option<DatasetDescriptor>> {
        match self.describe(CANONICAL_DATASET) {
            Ok(descriptor) => Ok(Some(descriptor)),
            Err(WorkspaceError::DatasetNotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn not_found(&self, name: &str) -> WorkspaceError {
        WorkspaceError::DatasetNotFound {
            name: name.to_string(),
            dir: self.data_dir(),
        }
    }
}

fn normalize_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() || has_extension(trimmed, DATASET_EXTENSION) {
        trimmed.to_string()
    } else {
        format!("{trimmed}.{DATASET_EXTENSION}")
    }
}

fn validate_name(name: &str) -> WorkspaceResult<()> {
    let reason = if name.trim().is_empty() {
        Some("dataset names cannot be blank")
    } else if name.contains(['/', '\\']) {
        Some("dataset names cannot contain path separators")
    } else if name == "." || name == ".." {
        Some("dataset names cannot refer to directories")
    } else if name.trim() == format!(".{DATASET_EXTENSION}") {
        Some("dataset names need a stem before the extension")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(WorkspaceError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
