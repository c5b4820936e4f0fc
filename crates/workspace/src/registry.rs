//! Enumeration and lifecycle of workspaces under a common root directory.
//! 管理共同根目錄下所有工作區的列舉與生命週期。

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::io::ErrorKind;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::layout::{Counters, WorkspaceLayout, WorkspaceMetadata};
use crate::timestamp::Timestamp;

/// Directory name prefix; a workspace lives in `workspace_<id>`.
pub const WORKSPACE_DIR_PREFIX: &str = "workspace_";

/// Positive integer identifying a workspace.
/// 工作區的正整數代號。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct WorkspaceId(NonZeroU32);

impl WorkspaceId {
    /// Returns `None` for zero.
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    pub fn dir_name(self) -> String {
        format!("{WORKSPACE_DIR_PREFIX}{}", self.0)
    }

    /// Parses `workspace_<id>`; zero-padded or signed ids are rejected so that
    /// every id maps back to exactly one directory name.
    pub fn from_dir_name(name: &str) -> Option<Self> {
        let digits = name.strip_prefix(WORKSPACE_DIR_PREFIX)?;
        if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        digits.parse::<u32>().ok().and_then(Self::new)
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for WorkspaceId {
    type Error = &'static str;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or("workspace id must be a positive integer")
    }
}

impl From<WorkspaceId> for u32 {
    fn from(value: WorkspaceId) -> Self {
        value.get()
    }
}

impl FromStr for WorkspaceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s
            .trim()
            .parse()
            .map_err(|_| format!("'{s}' is not a workspace id"))?;
        Self::new(value).ok_or_else(|| "workspace id must be a positive integer".to_string())
    }
}

/// Workspace as reported to callers: metadata with counters recomputed from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSummary {
    pub id: WorkspaceId,
    pub root: PathBuf,
    pub metadata: WorkspaceMetadata,
}

impl WorkspaceSummary {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn counters(&self) -> Counters {
        self.metadata.counters()
    }

    pub fn layout(&self) -> WorkspaceLayout {
        WorkspaceLayout::new(&self.root)
    }
}

/// Allocates workspace ids and is the only writer of workspace metadata.
/// 配置工作區代號，並且是工作區中繼資料的唯一寫入者。
#[derive(Debug, Clone)]
pub struct WorkspaceRegistry {
    root: PathBuf,
}

impl WorkspaceRegistry {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self, id: WorkspaceId) -> WorkspaceLayout {
        WorkspaceLayout::new(self.root.join(id.dir_name()))
    }

    /// Lists every readable workspace in ascending id order.
    /// 依代號遞增列出所有可讀取的工作區。
    ///
    /// Entries with an unparsable name or unreadable metadata are skipped and
    /// logged so one damaged workspace does not hide the others.
    pub fn list_workspaces(&self) -> WorkspaceResult<Vec<WorkspaceSummary>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(WorkspaceError::io("list workspaces in", &self.root)(err)),
        };

        let mut summaries = Vec::new();
        for entry in entries {
            let entry = entry.map_err(WorkspaceError::io("list workspaces in", &self.root))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(id) = WorkspaceId::from_dir_name(&name.to_string_lossy()) else {
                debug!(path = %path.display(), "ignoring directory without a workspace id");
                continue;
            };
            match self.load_summary(id) {
                Ok(summary) => summaries.push(summary),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable workspace");
                }
            }
        }
        summaries.sort_by_key(|summary| summary.id);
        Ok(summaries)
    }

    /// Returns one workspace with live counters.
    pub fn get_workspace(&self, id: WorkspaceId) -> WorkspaceResult<WorkspaceSummary> {
        self.load_summary(id).map_err(|err| not_found_as(id, err))
    }

    pub fn workspace_root(&self, id: WorkspaceId) -> WorkspaceResult<PathBuf> {
        self.read_existing(id)?;
        Ok(self.layout(id).root().to_path_buf())
    }

    /// Creates a workspace under the smallest free id and returns that id.
    /// 以最小可用代號建立新工作區。
    ///
    /// Ids of deleted workspaces are reused. An id whose directory still holds
    /// a metadata record (even a damaged one) or any artifact is never reused;
    /// an empty leftover directory is completed in place. A blank `name`
    /// becomes `"Workspace {id}"`. On failure anything created here is removed
    /// again, so the next call retries the same id.
    pub fn create_workspace(&self, name: &str) -> WorkspaceResult<WorkspaceId> {
        fs::create_dir_all(&self.root)
            .map_err(WorkspaceError::io("create workspaces root", &self.root))?;

        let used: BTreeSet<WorkspaceId> = self
            .list_workspaces()?
            .into_iter()
            .map(|summary| summary.id)
            .collect();
        let id = self.next_free_id(&used)?;

        let name = match name.trim() {
            "" => format!("Workspace {id}"),
            trimmed => trimmed.to_string(),
        };
        let layout = self.layout(id);
        let preexisting = layout.root().exists();
        if preexisting {
            debug!(root = %layout.root().display(), "completing leftover workspace directory");
        }

        match layout.create_skeleton(id, name.as_str()) {
            Ok(_) => {
                info!(id = %id, name = %name, "workspace created");
                Ok(id)
            }
            Err(err) => {
                if !preexisting {
                    if let Err(cleanup) = fs::remove_dir_all(layout.root()) {
                        if cleanup.kind() != ErrorKind::NotFound {
                            warn!(
                                root = %layout.root().display(),
                                error = %cleanup,
                                "failed to remove partially created workspace"
                            );
                        }
                    }
                }
                Err(err)
            }
        }
    }

    pub fn rename_workspace(&self, id: WorkspaceId, new_name: &str) -> WorkspaceResult<()> {
        let trimmed = new_name.trim();
        if trimmed.is_empty() {
            return Err(WorkspaceError::InvalidName {
                name: new_name.to_string(),
                reason: "workspace names cannot be blank",
            });
        }
        let (layout, mut metadata) = self.read_existing(id)?;
        metadata.name = trimmed.to_string();
        metadata.touch();
        layout.write_metadata(&metadata)?;
        info!(id = %id, name = %trimmed, "workspace renamed");
        Ok(())
    }

    /// Removes the workspace directory and everything in it. Irreversible.
    /// 永久刪除工作區目錄及其所有內容。
    pub fn delete_workspace(&self, id: WorkspaceId) -> WorkspaceResult<()> {
        let (layout, _) = self.read_existing(id)?;
        remove_tree(layout.root()).map_err(WorkspaceError::io("delete workspace", layout.root()))?;
        info!(id = %id, "workspace deleted");
        Ok(())
    }

    /// Records that the workspace was opened.
    ///
    /// Opening also refreshes `last_modified`, which home screens sort and
    /// display by; `last_opened` keeps the open time on its own.
    pub fn touch_last_opened(&self, id: WorkspaceId) -> WorkspaceResult<()> {
        let (layout, mut metadata) = self.read_existing(id)?;
        let now = Timestamp::now();
        metadata.last_modified = now;
        metadata.last_opened = Some(now);
        layout.write_metadata(&metadata)
    }

    /// Marks the workspace as opened and returns its current summary.
    pub fn open_workspace(&self, id: WorkspaceId) -> WorkspaceResult<WorkspaceSummary> {
        self.touch_last_opened(id)?;
        debug!(id = %id, "workspace opened");
        self.get_workspace(id)
    }

    /// Stores freshly recomputed counters and a new `last_modified` in the metadata.
    pub fn refresh_metadata(&self, id: WorkspaceId) -> WorkspaceResult<WorkspaceMetadata> {
        let (layout, mut metadata) = self.read_existing(id)?;
        metadata.apply_counters(layout.recompute_counters()?);
        metadata.touch();
        layout.write_metadata(&metadata)?;
        Ok(metadata)
    }

    /// Creates a first workspace when none exist yet; returns its id if one was created.
    pub fn ensure_default_workspace(&self, name: &str) -> WorkspaceResult<Option<WorkspaceId>> {
        if !self.list_workspaces()?.is_empty() {
            return Ok(None);
        }
        self.create_workspace(name).map(Some)
    }

    fn next_free_id(&self, used: &BTreeSet<WorkspaceId>) -> WorkspaceResult<WorkspaceId> {
        for value in 1..=u32::MAX {
            let Some(candidate) = WorkspaceId::new(value) else {
                continue;
            };
            if used.contains(&candidate) {
                continue;
            }
            let layout = self.layout(candidate);
            if !layout.is_vacant() {
                debug!(
                    path = %layout.root().display(),
                    "id blocked by an existing entry that is not a listable workspace"
                );
                continue;
            }
            return Ok(candidate);
        }
        Err(WorkspaceError::Io {
            op: "allocate workspace id in",
            path: self.root.clone(),
            source: io::Error::new(ErrorKind::Other, "workspace ids exhausted"),
        })
    }

    fn load_summary(&self, id: WorkspaceId) -> WorkspaceResult<WorkspaceSummary> {
        let layout = self.layout(id);
        let mut metadata = layout.read_metadata()?;
        if metadata.id != id {
            debug!(dir_id = %id, stored_id = %metadata.id, "metadata id differs from directory");
            metadata.id = id;
        }
        metadata.apply_counters(layout.recompute_counters()?);
        Ok(WorkspaceSummary {
            id,
            root: layout.root().to_path_buf(),
            metadata,
        })
    }

    fn read_existing(&self, id: WorkspaceId) -> WorkspaceResult<(WorkspaceLayout, WorkspaceMetadata)> {
        let layout = self.layout(id);
        let metadata = layout.read_metadata().map_err(|err| not_found_as(id, err))?;
        Ok((layout, metadata))
    }
}

fn not_found_as(id: WorkspaceId, err: WorkspaceError) -> WorkspaceError {
    match err {
        WorkspaceError::MetadataMissing(_) => WorkspaceError::WorkspaceNotFound(id),
        other => other,
    }
}

/// Deletes `path` recursively, clearing read-only attributes and retrying
/// when the first attempt is refused.
fn remove_tree(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::PermissionDenied => {
            debug!(path = %path.display(), "clearing read-only attributes before delete");
            clear_readonly(path)?;
            fs::remove_dir_all(path)
        }
        Err(err) => Err(err),
    }
}

fn clear_readonly(path: &Path) -> io::Result<()> {
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(io::Error::from)?;
        let metadata = entry.metadata().map_err(io::Error::from)?;
        let mut permissions = metadata.permissions();
        if permissions.readonly() || metadata.is_dir() {
            make_writable(&mut permissions, metadata.is_dir());
            fs::set_permissions(entry.path(), permissions)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn make_writable(permissions: &mut fs::Permissions, is_dir: bool) {
    use std::os::unix::fs::PermissionsExt;
    let extra = if is_dir { 0o700 } else { 0o600 };
    permissions.set_mode(permissions.mode() | extra);
}

#[cfg(not(unix))]
fn make_writable(permissions: &mut fs::Permissions, _is_dir: bool) {
    permissions.set_readonly(false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind as Kind;
    use tempfile::tempdir;

    fn id(value: u32) -> WorkspaceId {
        WorkspaceId::new(value).unwrap()
    }

    #[test]
    fn dir_names_round_trip() {
        assert_eq!(id(12).dir_name(), "workspace_12");
        assert_eq!(WorkspaceId::from_dir_name("workspace_12"), Some(id(12)));
        assert_eq!(WorkspaceId::from_dir_name("workspace_0"), None);
        assert_eq!(WorkspaceId::from_dir_name("workspace_012"), None);
        assert_eq!(WorkspaceId::from_dir_name("workspace_x"), None);
        assert_eq!(WorkspaceId::from_dir_name("workspace_"), None);
        assert_eq!(WorkspaceId::from_dir_name("workspace_+3"), None);
        assert_eq!(WorkspaceId::from_dir_name("archive_3"), None);
    }

    #[test]
    fn id_rejects_zero_in_json() {
        assert!(serde_json::from_str::<WorkspaceId>("0").is_err());
        assert_eq!(serde_json::from_str::<WorkspaceId>("7").unwrap(), id(7));
        assert_eq!(serde_json::to_string(&id(7)).unwrap(), "7");
    }

    #[test]
    fn create_lists_new_workspace_with_zero_counters() {
        let tmp = tempdir().unwrap();
        let registry = WorkspaceRegistry::new(tmp.path().join("workspaces"));

        let created = registry.create_workspace("Sales").unwrap();
        let listed = registry.list_workspaces().unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created);
        assert_eq!(listed[0].name(), "Sales");
        assert_eq!(listed[0].counters(), Counters::default());
    }

    #[test]
    fn blank_name_defaults_to_numbered_label() {
        let tmp = tempdir().unwrap();
        let registry = WorkspaceRegistry::new(tmp.path());
        registry.create_workspace("first").unwrap();
        let second = registry.create_workspace("   ").unwrap();
        assert_eq!(registry.get_workspace(second).unwrap().name(), "Workspace 2");
    }

    #[test]
    fn deleted_ids_are_reused_smallest_first() {
        let tmp = tempdir().unwrap();
        let registry = WorkspaceRegistry::new(tmp.path());
        for name in ["a", "b", "c"] {
            registry.create_workspace(name).unwrap();
        }

        registry.delete_workspace(id(2)).unwrap();
        registry.delete_workspace(id(1)).unwrap();

        assert_eq!(registry.create_workspace("again").unwrap(), id(1));
        assert_eq!(registry.create_workspace("again").unwrap(), id(2));
        assert_eq!(registry.create_workspace("again").unwrap(), id(4));
    }

    #[test]
    fn listing_skips_damaged_entries() {
        let tmp = tempdir().unwrap();
        let registry = WorkspaceRegistry::new(tmp.path());
        registry.create_workspace("good").unwrap();
        registry.create_workspace("broken").unwrap();
        fs::write(registry.layout(id(2)).metadata_path(), "not json").unwrap();
        fs::create_dir(tmp.path().join("workspace_abc")).unwrap();
        fs::create_dir(tmp.path().join("workspace_9")).unwrap();
        fs::write(tmp.path().join("workspace_5"), "stray file").unwrap();

        let listed = registry.list_workspaces().unwrap();
        let ids: Vec<u32> = listed.iter().map(|summary| summary.id.get()).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn listing_is_sorted_by_id_and_counts_live() {
        let tmp = tempdir().unwrap();
        let registry = WorkspaceRegistry::new(tmp.path());
        for _ in 0..11 {
            registry.create_workspace("").unwrap();
        }
        fs::write(registry.layout(id(10)).data_dir().join("x.csv"), "a\n1\n").unwrap();

        let listed = registry.list_workspaces().unwrap();
        let ids: Vec<u32> = listed.iter().map(|summary| summary.id.get()).collect();
        assert_eq!(ids, (1..=11).collect::<Vec<_>>());
        assert_eq!(listed[9].counters().files, 1);
        assert_eq!(listed[9].metadata.file_count, 1);
    }

    #[test]
    fn missing_root_lists_nothing() {
        let tmp = tempdir().unwrap();
        let registry = WorkspaceRegistry::new(tmp.path().join("absent"));
        assert!(registry.list_workspaces().unwrap().is_empty());
    }

    #[test]
    fn rename_updates_name_and_rejects_unknown_ids() {
        let tmp = tempdir().unwrap();
        let registry = WorkspaceRegistry::new(tmp.path());
        let created = registry.create_workspace("Draft").unwrap();

        registry.rename_workspace(created, "  Final  ").unwrap();
        assert_eq!(registry.get_workspace(created).unwrap().name(), "Final");

        let err = registry.rename_workspace(id(42), "x").unwrap_err();
        assert!(matches!(err, WorkspaceError::WorkspaceNotFound(missing) if missing == id(42)));

        let err = registry.rename_workspace(created, " ").unwrap_err();
        assert_eq!(err.kind(), Kind::Forbidden);
    }

    #[test]
    fn delete_unknown_workspace_is_not_found() {
        let tmp = tempdir().unwrap();
        let registry = WorkspaceRegistry::new(tmp.path());
        let err = registry.delete_workspace(id(3)).unwrap_err();
        assert_eq!(err.kind(), Kind::NotFound);
    }

    #[test]
    fn delete_clears_read_only_entries() {
        let tmp = tempdir().unwrap();
        let registry = WorkspaceRegistry::new(tmp.path());
        let created = registry.create_workspace("locked").unwrap();
        let layout = registry.layout(created);
        let file = layout.data_dir().join("frozen.csv");
        fs::write(&file, "a\n1\n").unwrap();

        let mut file_perms = fs::metadata(&file).unwrap().permissions();
        file_perms.set_readonly(true);
        fs::set_permissions(&file, file_perms).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(layout.data_dir(), fs::Permissions::from_mode(0o555)).unwrap();
        }

        registry.delete_workspace(created).unwrap();
        assert!(!layout.root().exists());
        assert!(registry.list_workspaces().unwrap().is_empty());
    }

    #[test]
    fn touch_last_opened_moves_both_timestamps() {
        let tmp = tempdir().unwrap();
        let registry = WorkspaceRegistry::new(tmp.path());
        let created = registry.create_workspace("Opened").unwrap();
        let layout = registry.layout(created);

        let mut stale = layout.read_metadata().unwrap();
        stale.last_modified = Timestamp::parse("2020-01-01 00:00:00").unwrap();
        layout.write_metadata(&stale).unwrap();

        let summary = registry.open_workspace(created).unwrap();
        assert!(summary.metadata.last_modified > stale.last_modified);
        assert_eq!(summary.metadata.last_opened, Some(summary.metadata.last_modified));
        assert_eq!(summary.metadata.created, stale.created);
    }

    #[test]
    fn refresh_metadata_persists_counters() {
        let tmp = tempdir().unwrap();
        let registry = WorkspaceRegistry::new(tmp.path());
        let created = registry.create_workspace("Artifacts").unwrap();
        let layout = registry.layout(created);
        fs::write(layout.graphs_dir().join("trend.png"), [0u8; 8]).unwrap();

        registry.refresh_metadata(created).unwrap();
        assert_eq!(layout.read_metadata().unwrap().graph_count, 1);
    }

    #[test]
    fn leftover_directory_without_metadata_is_completed() {
        let tmp = tempdir().unwrap();
        let registry = WorkspaceRegistry::new(tmp.path());
        fs::create_dir_all(tmp.path().join("workspace_1").join("data")).unwrap();

        let created = registry.create_workspace("Recovered").unwrap();
        assert_eq!(created, id(1));
        assert!(registry.layout(created).is_complete());
    }

    #[test]
    fn damaged_workspace_keeps_its_id_and_files() {
        let tmp = tempdir().unwrap();
        let registry = WorkspaceRegistry::new(tmp.path());
        let precious = registry.create_workspace("Precious").unwrap();
        let layout = registry.layout(precious);
        fs::write(layout.data_dir().join("important.csv"), "a\n1\n").unwrap();
        fs::write(layout.metadata_path(), "{ damaged").unwrap();

        let fresh = registry.create_workspace("Fresh").unwrap();
        assert_eq!(fresh, id(2));
        assert_eq!(fs::read_to_string(layout.metadata_path()).unwrap(), "{ damaged");
        assert!(layout.data_dir().join("important.csv").exists());

        let summary = registry.get_workspace(fresh).unwrap();
        assert_eq!(summary.name(), "Fresh");
        assert_eq!(summary.counters(), Counters::default());
    }

    #[test]
    fn leftover_directory_with_files_is_not_reused() {
        let tmp = tempdir().unwrap();
        let registry = WorkspaceRegistry::new(tmp.path());
        let data = tmp.path().join("workspace_1").join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("orphan.csv"), "a\n1\n").unwrap();

        assert_eq!(registry.create_workspace("next").unwrap(), id(2));
        assert!(!registry.layout(id(1)).metadata_path().exists());
        assert!(data.join("orphan.csv").exists());
    }

    #[test]
    fn stray_file_blocks_its_id() {
        let tmp = tempdir().unwrap();
        let registry = WorkspaceRegistry::new(tmp.path());
        fs::write(tmp.path().join("workspace_1"), "not a directory").unwrap();

        assert_eq!(registry.create_workspace("next").unwrap(), id(2));
    }

    #[test]
    fn default_workspace_only_created_on_first_run() {
        let tmp = tempdir().unwrap();
        let registry = WorkspaceRegistry::new(tmp.path());

        assert_eq!(
            registry.ensure_default_workspace("My Workspace").unwrap(),
            Some(id(1))
        );
        assert_eq!(registry.ensure_default_workspace("My Workspace").unwrap(), None);
        assert_eq!(registry.get_workspace(id(1)).unwrap().name(), "My Workspace");
    }
}
