//! On-disk skeleton of a single workspace.
//! 單一工作區在磁碟上的目錄結構與中繼資料。

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::registry::WorkspaceId;
use crate::timestamp::Timestamp;
use crate::util::{has_extension, write_atomic};

pub const METADATA_FILE: &str = "metadata.json";
pub const DATA_DIR: &str = "data";
pub const GRAPHS_DIR: &str = "graphs";
pub const REPORTS_DIR: &str = "reports";

const GRAPH_EXTENSIONS: &[&str] = &["png"];
const REPORT_EXTENSIONS: &[&str] = &["html", "pdf"];

/// Contents of `metadata.json`.
/// `metadata.json` 的內容。
///
/// The counters are a cache of the last recount; readers that need accurate
/// numbers call [`WorkspaceLayout::recompute_counters`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceMetadata {
    pub id: WorkspaceId,
    pub name: String,
    pub created: Timestamp,
    pub last_modified: Timestamp,
    #[serde(default)]
    pub file_count: usize,
    #[serde(default)]
    pub graph_count: usize,
    #[serde(default)]
    pub report_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_opened: Option<Timestamp>,
}

impl WorkspaceMetadata {
    /// Fresh record with zeroed counters and both timestamps set to now.
    pub fn new(id: WorkspaceId, name: impl Into<String>) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            name: name.into(),
            created: now,
            last_modified: now,
            file_count: 0,
            graph_count: 0,
            report_count: 0,
            last_opened: None,
        }
    }

    pub fn counters(&self) -> Counters {
        Counters {
            files: self.file_count,
            graphs: self.graph_count,
            reports: self.report_count,
        }
    }

    pub fn apply_counters(&mut self, counters: Counters) {
        self.file_count = counters.files;
        self.graph_count = counters.graphs;
        self.report_count = counters.reports;
    }

    pub fn touch(&mut self) {
        self.last_modified = Timestamp::now();
    }
}

/// Artifact counts derived from the workspace directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    pub files: usize,
    pub graphs: usize,
    pub reports: usize,
}

/// Path-level view of one workspace root; performs file-system work only.
/// 單一工作區根目錄的路徑檢視，只負責檔案系統操作。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    pub fn graphs_dir(&self) -> PathBuf {
        self.root.join(GRAPHS_DIR)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join(REPORTS_DIR)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    /// `true` when the root, all three subdirectories and the metadata record exist.
    pub fn is_complete(&self) -> bool {
        self.root.is_dir()
            && self.data_dir().is_dir()
            && self.graphs_dir().is_dir()
            && self.reports_dir().is_dir()
            && self.metadata_path().is_file()
    }

    /// `true` when nothing worth keeping lives here: no metadata record (readable
    /// or not) and no entries under `data/`, `graphs/` or `reports/`.
    pub fn is_vacant(&self) -> bool {
        if !self.root.exists() {
            return true;
        }
        self.root.is_dir()
            && !self.metadata_path().exists()
            && [self.data_dir(), self.graphs_dir(), self.reports_dir()]
                .iter()
                .all(|dir| dir_is_empty(dir))
    }

    /// Creates the directory skeleton and writes the initial metadata record.
    /// 建立目錄骨架並寫入初始中繼資料。
    ///
    /// The metadata record is written last so an interrupted creation never
    /// looks like a complete workspace.
    pub fn create_skeleton(
        &self,
        id: WorkspaceId,
        name: impl Into<String>,
    ) -> WorkspaceResult<WorkspaceMetadata> {
        for dir in [
            self.root.clone(),
            self.data_dir(),
            self.graphs_dir(),
            self.reports_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(WorkspaceError::io("create directory", &dir))?;
        }
        let metadata = WorkspaceMetadata::new(id, name);
        self.write_metadata(&metadata)?;
        debug!(root = %self.root.display(), id = %id, "workspace skeleton created");
        Ok(metadata)
    }

    pub fn read_metadata(&self) -> WorkspaceResult<WorkspaceMetadata> {
        let path = self.metadata_path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(WorkspaceError::MetadataMissing(path))
            }
            Err(err) => return Err(WorkspaceError::io("read metadata", &path)(err)),
        };
        serde_json::from_str(&contents).map_err(|err| WorkspaceError::InvalidMetadata {
            path,
            message: err.to_string(),
        })
    }

    /// Replaces the metadata record atomically. Callers refresh `last_modified` first.
    pub fn write_metadata(&self, metadata: &WorkspaceMetadata) -> WorkspaceResult<()> {
        let path = self.metadata_path();
        let json = serde_json::to_vec_pretty(metadata).map_err(|err| {
            WorkspaceError::InvalidMetadata {
                path: path.clone(),
                message: err.to_string(),
            }
        })?;
        write_atomic(&path, &json).map_err(WorkspaceError::io("write metadata", &path))
    }

    /// Counts data files, graph images and reports currently on disk.
    /// 重新計算磁碟上的資料檔、圖表與報告數量。
    pub fn recompute_counters(&self) -> WorkspaceResult<Counters> {
        Ok(Counters {
            files: count_files(&self.data_dir(), |_| true)?,
            graphs: count_files(&self.graphs_dir(), |name| {
                GRAPH_EXTENSIONS.iter().any(|ext| has_extension(name, ext))
            })?,
            reports: count_files(&self.reports_dir(), |name| {
                REPORT_EXTENSIONS.iter().any(|ext| has_extension(name, ext))
            })?,
        })
    }
}

fn dir_is_empty(dir: &Path) -> bool {
    match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(err) => err.kind() == ErrorKind::NotFound,
    }
}

fn count_files<F>(dir: &Path, accept: F) -> WorkspaceResult<usize>
where
    F: Fn(&str) -> bool,
{
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(WorkspaceError::io("list directory", dir)(err)),
    };
    let mut count = 0;
    for entry in entries {
        let entry = entry.map_err(WorkspaceError::io("list directory", dir))?;
        let name = entry.file_name();
        if entry.path().is_file() && accept(&name.to_string_lossy()) {
            count += 1;
        }
    }
    Ok(count)
}
