//! Session state: one bound workspace, one in-memory dataset and its dirty flag.
//! 工作階段狀態：綁定的工作區、記憶體中的資料集與未儲存旗標。

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::codec::{DatasetCodec, TabularCodec, TabularFormat};
use crate::dataset::{DatasetStore, CANONICAL_DATASET};
use crate::error::{WorkspaceError, WorkspaceResult};
use crate::events::{ObserverList, SessionObserver};
use crate::layout::WorkspaceLayout;
use crate::table::TabularDataset;
use crate::util::write_atomic;

/// Observable phase of a [`Session`].
/// [`Session`] 目前所處的狀態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No workspace bound.
    Unbound,
    /// Workspace bound, nothing loaded.
    BoundEmpty,
    /// Dataset loaded and identical to what was last loaded or saved.
    BoundClean,
    /// Dataset loaded with edits that are not on disk yet.
    BoundDirty,
}

/// Binds a workspace to the dataset being worked on.
/// 將工作區與正在編輯的資料集綁定。
///
/// The session never prompts. Collaborators that are about to discard a dirty
/// dataset (rebinding, switching datasets, exiting) check [`Session::is_dirty`]
/// and ask the user first.
#[derive(Debug)]
pub struct Session<C = TabularCodec> {
    codec: C,
    workspace: Option<WorkspaceLayout>,
    dataset: Option<TabularDataset>,
    loaded_from: Option<PathBuf>,
    dirty: bool,
    observers: ObserverList,
}

impl Session<TabularCodec> {
    pub fn new() -> Self {
        Self::with_codec(TabularCodec::new())
    }
}

impl Default for Session<TabularCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: DatasetCodec> Session<C> {
    pub fn with_codec(codec: C) -> Self {
        Self {
            codec,
            workspace: None,
            dataset: None,
            loaded_from: None,
            dirty: false,
            observers: ObserverList::default(),
        }
    }

    /// Registers an observer; observers are notified in registration order.
    pub fn subscribe(&mut self, observer: impl SessionObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn state(&self) -> SessionState {
        match (&self.workspace, &self.dataset) {
            (None, _) => SessionState::Unbound,
            (Some(_), None) => SessionState::BoundEmpty,
            (Some(_), Some(_)) if self.dirty => SessionState::BoundDirty,
            (Some(_), Some(_)) => SessionState::BoundClean,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn workspace_root(&self) -> Option<&Path> {
        self.workspace.as_ref().map(WorkspaceLayout::root)
    }

    pub fn dataset(&self) -> Option<&TabularDataset> {
        self.dataset.as_ref()
    }

    /// File the current dataset was last loaded from or saved to.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }

    /// Dataset filename when the loaded file lives in the bound workspace's `data/`.
    pub fn loaded_name(&self) -> Option<&str> {
        let layout = self.workspace.as_ref()?;
        let path = self.loaded_from.as_deref()?;
        if path.parent()? != layout.data_dir() {
            return None;
        }
        path.file_name()?.to_str()
    }

    /// Binds the session to a workspace, discarding any loaded dataset.
    /// 綁定至工作區，並無條件捨棄目前載入的資料集。
    pub fn set_workspace(&mut self, workspace_root: impl AsRef<Path>) {
        let layout = WorkspaceLayout::new(workspace_root);
        debug!(root = %layout.root().display(), "session bound to workspace");
        self.workspace = Some(layout);
        self.dataset = None;
        self.loaded_from = None;
        self.set_dirty(false);
    }

    /// Binds to a workspace and loads its canonical dataset when one exists.
    ///
    /// Returns whether a dataset was loaded.
    pub fn open_workspace(&mut self, workspace_root: impl AsRef<Path>) -> WorkspaceResult<bool> {
        self.set_workspace(workspace_root);
        let store = self.datasets()?;
        if store.resolve_active_fallback()?.is_none() {
            return Ok(false);
        }
        self.load_dataset(CANONICAL_DATASET)?;
        Ok(true)
    }

    /// Dataset store of the bound workspace.
    pub fn datasets(&self) -> WorkspaceResult<DatasetStore> {
        self.workspace
            .as_ref()
            .map(|layout| DatasetStore::open(layout.root()))
            .ok_or(WorkspaceError::Unbound)
    }

    /// Loads a dataset, replacing whatever was loaded before.
    /// 載入資料集並取代先前的內容。
    ///
    /// A bare filename is looked up in the workspace's `data/` directory; any
    /// other value is treated as a path. On failure the session is left as it was.
    pub fn load_dataset(&mut self, target: impl AsRef<Path>) -> WorkspaceResult<()> {
        match self.read_dataset(target.as_ref()) {
            Ok((path, dataset)) => {
                debug!(path = %path.display(), rows = dataset.row_count(), "dataset loaded");
                self.dataset = Some(dataset);
                self.loaded_from = Some(path);
                self.set_dirty(false);
                if let Some(dataset) = &self.dataset {
                    self.observers.data_loaded(dataset);
                }
                Ok(())
            }
            Err(err) => self.fail(err),
        }
    }

    /// Applies an edit to the loaded dataset and marks the session dirty.
    pub fn mutate<F, R>(&mut self, edit: F) -> WorkspaceResult<R>
    where
        F: FnOnce(&mut TabularDataset) -> R,
    {
        if self.workspace.is_none() {
            return Err(WorkspaceError::Unbound);
        }
        let dataset = self.dataset.as_mut().ok_or(WorkspaceError::NoDataset)?;
        let result = edit(dataset);
        self.set_dirty(true);
        Ok(result)
    }

    /// Swaps in a dataset computed elsewhere (for example by a preprocessing step).
    pub fn replace_dataset(&mut self, dataset: TabularDataset) -> WorkspaceResult<()> {
        self.mutate(|current| *current = dataset)
    }

    /// Writes the dataset to the canonical file and marks the session clean.
    /// 將資料集寫入標準資料檔並清除未儲存旗標。
    ///
    /// On failure the dirty flag is untouched so the caller can retry.
    pub fn save(&mut self) -> WorkspaceResult<PathBuf> {
        let path = match self.write_canonical() {
            Ok(path) => path,
            Err(err) => return self.fail(err),
        };
        debug!(path = %path.display(), "dataset saved");
        self.loaded_from = Some(path.clone());
        self.set_dirty(false);
        Ok(path)
    }

    /// Writes a copy of the dataset to `destination`; the format follows its extension.
    ///
    /// Does not change the session state.
    pub fn export(&mut self, destination: impl AsRef<Path>) -> WorkspaceResult<()> {
        let destination = destination.as_ref();
        match self.write_copy(destination) {
            Ok(()) => {
                debug!(path = %destination.display(), "dataset exported");
                Ok(())
            }
            Err(err) => self.fail(err),
        }
    }

    /// Unbinds the workspace and drops the dataset without saving.
    pub fn clear(&mut self) {
        self.workspace = None;
        self.dataset = None;
        self.loaded_from = None;
        self.set_dirty(false);
    }

    /// Reconciles the session after a dataset file was deleted.
    ///
    /// When the deleted file backed the loaded dataset, the canonical dataset
    /// is reloaded if it still exists; otherwise the dataset is dropped. A
    /// fallback that fails to load also drops the dataset before the error is
    /// returned.
    pub fn dataset_removed(&mut self, name: &str) -> WorkspaceResult<()> {
        if self.loaded_name() != Some(name) {
            return Ok(());
        }
        let fallback = match self.datasets()?.resolve_active_fallback() {
            Ok(fallback) => fallback.filter(|fallback| fallback.name != name),
            Err(err) => {
                self.drop_dataset(name);
                return Err(err);
            }
        };
        let Some(fallback) = fallback else {
            self.drop_dataset(name);
            return Ok(());
        };
        if let Err(err) = self.load_dataset(&fallback.path) {
            self.drop_dataset(name);
            return Err(err);
        }
        Ok(())
    }

    /// Keeps the session pointing at a dataset file that was renamed.
    pub fn dataset_renamed(&mut self, old_name: &str, new_name: &str) {
        if self.loaded_name() != Some(old_name) {
            return;
        }
        if let Some(layout) = &self.workspace {
            self.loaded_from = Some(layout.data_dir().join(new_name));
        }
    }

    fn read_dataset(&self, target: &Path) -> WorkspaceResult<(PathBuf, TabularDataset)> {
        let layout = self.workspace.as_ref().ok_or(WorkspaceError::Unbound)?;
        let in_data_dir = is_bare_name(target);
        let path = if in_data_dir {
            layout.data_dir().join(target)
        } else {
            target.to_path_buf()
        };

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(if in_data_dir {
                    WorkspaceError::DatasetNotFound {
                        name: target.display().to_string(),
                        dir: layout.data_dir(),
                    }
                } else {
                    WorkspaceError::SourceNotFound(path)
                });
            }
            Err(err) => return Err(WorkspaceError::io("read dataset", &path)(err)),
        };
        let format = TabularFormat::from_path(&path).map_err(WorkspaceError::format(&path))?;
        let dataset = self
            .codec
            .parse(&bytes, format)
            .map_err(WorkspaceError::format(&path))?;
        Ok((path, dataset))
    }

    fn write_canonical(&self) -> WorkspaceResult<PathBuf> {
        let layout = self.workspace.as_ref().ok_or(WorkspaceError::Unbound)?;
        let path = layout.data_dir().join(CANONICAL_DATASET);
        self.write_copy(&path)?;
        Ok(path)
    }

    fn write_copy(&self, destination: &Path) -> WorkspaceResult<()> {
        let dataset = self.dataset.as_ref().ok_or(WorkspaceError::NoDataset)?;
        let format =
            TabularFormat::for_output(destination).map_err(WorkspaceError::format(destination))?;
        let bytes = self
            .codec
            .serialize(dataset, format)
            .map_err(WorkspaceError::format(destination))?;
        write_atomic(destination, &bytes).map_err(WorkspaceError::io("write dataset", destination))
    }

    fn drop_dataset(&mut self, removed: &str) {
        debug!(dataset = %removed, "loaded dataset removed; session emptied");
        self.dataset = None;
        self.loaded_from = None;
        self.set_dirty(false);
    }

    fn set_dirty(&mut self, dirty: bool) {
        if self.dirty != dirty {
            self.dirty = dirty;
            self.observers.dirty_changed(dirty);
        }
    }

    fn fail<T>(&mut self, err: WorkspaceError) -> WorkspaceResult<T> {
        debug!(error = %err, "session operation failed");
        self.observers.data_error(&err);
        Err(err)
    }
}

fn is_bare_name(target: &Path) -> bool {
    let mut components = target.components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecError;
    use crate::error::ErrorKind;
    use crate::registry::WorkspaceId;
    use crate::table::Cell;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::{tempdir, TempDir};

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Loaded(usize),
        Error(ErrorKind),
        Dirty(bool),
    }

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<Event>>>);

    impl Recorder {
        fn take(&self) -> Vec<Event> {
            self.0.borrow_mut().drain(..).collect()
        }
    }

    impl SessionObserver for Recorder {
        fn on_data_loaded(&mut self, dataset: &TabularDataset) {
            self.0.borrow_mut().push(Event::Loaded(dataset.row_count()));
        }

        fn on_data_error(&mut self, error: &WorkspaceError) {
            self.0.borrow_mut().push(Event::Error(error.kind()));
        }

        fn on_dirty_changed(&mut self, dirty: bool) {
            self.0.borrow_mut().push(Event::Dirty(dirty));
        }
    }

    fn workspace() -> (TempDir, PathBuf) {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("workspace_1");
        WorkspaceLayout::new(&root)
            .create_skeleton(WorkspaceId::new(1).unwrap(), "Session")
            .unwrap();
        (tmp, root)
    }

    fn write_data(root: &Path, name: &str, contents: &str) -> PathBuf {
        let path = root.join("data").join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn walks_through_every_state() {
        let (_tmp, root) = workspace();
        write_data(&root, "q1.csv", "a,b\n1,2\n");
        let mut session = Session::new();
        assert_eq!(session.state(), SessionState::Unbound);

        session.set_workspace(&root);
        assert_eq!(session.state(), SessionState::BoundEmpty);

        session.load_dataset("q1.csv").unwrap();
        assert_eq!(session.state(), SessionState::BoundClean);

        session.mutate(|table| table.push_row([Cell::from(3i64)])).unwrap();
        assert_eq!(session.state(), SessionState::BoundDirty);
        session.mutate(|_| ()).unwrap();
        assert_eq!(session.state(), SessionState::BoundDirty);

        session.save().unwrap();
        assert_eq!(session.state(), SessionState::BoundClean);

        session.clear();
        assert_eq!(session.state(), SessionState::Unbound);
    }

    #[test]
    fn rebinding_discards_dirty_dataset() {
        let (_tmp, root) = workspace();
        write_data(&root, "q1.csv", "a\n1\n");
        let mut session = Session::new();
        session.set_workspace(&root);
        session.load_dataset("q1.csv").unwrap();
        session.mutate(|table| table.set_cell(0, 0, Cell::from(9i64))).unwrap();

        session.set_workspace(&root);
        assert_eq!(session.state(), SessionState::BoundEmpty);
        assert!(!session.is_dirty());
        assert!(session.dataset().is_none());
    }

    #[test]
    fn save_then_load_returns_equal_dataset() {
        let (_tmp, root) = workspace();
        let mut session = Session::new();
        session.set_workspace(&root);
        write_data(&root, "seed.csv", "city,pop\nOslo,700000\n");
        session.load_dataset("seed.csv").unwrap();
        session
            .mutate(|table| {
                table.push_row([Cell::from("Bergen"), Cell::from(285000i64)]);
                table.push_row([Cell::from("Tromsø"), Cell::Empty]);
            })
            .unwrap();
        let expected = session.dataset().cloned().unwrap();

        let saved = session.save().unwrap();
        assert_eq!(saved, root.join("data").join(CANONICAL_DATASET));
        assert_eq!(session.loaded_name(), Some(CANONICAL_DATASET));

        session.set_workspace(&root);
        session.load_dataset(CANONICAL_DATASET).unwrap();
        assert_eq!(session.dataset(), Some(&expected));
    }

    #[test]
    fn parse_failure_keeps_previous_state() {
        let (_tmp, root) = workspace();
        write_data(&root, "good.csv", "a\n1\n");
        write_data(&root, "empty.csv", "");
        let mut session = Session::new();
        session.set_workspace(&root);
        session.load_dataset("good.csv").unwrap();
        session.mutate(|_| ()).unwrap();

        let err = session.load_dataset("empty.csv").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatError);
        assert_eq!(session.state(), SessionState::BoundDirty);
        assert_eq!(session.loaded_name(), Some("good.csv"));
    }

    #[test]
    fn loading_requires_a_workspace() {
        let mut session = Session::new();
        let err = session.load_dataset("anything.csv").unwrap_err();
        assert!(matches!(err, WorkspaceError::Unbound));
        assert!(matches!(session.mutate(|_| ()), Err(WorkspaceError::Unbound)));
    }

    #[test]
    fn mutate_without_dataset_fails() {
        let (_tmp, root) = workspace();
        let mut session = Session::new();
        session.set_workspace(&root);
        assert!(matches!(session.mutate(|_| ()), Err(WorkspaceError::NoDataset)));
        assert!(matches!(session.save(), Err(WorkspaceError::NoDataset)));
    }

    #[test]
    fn load_accepts_external_paths() {
        let (tmp, root) = workspace();
        let outside = tmp.path().join("outside.csv");
        fs::write(&outside, "x,y\n1,2\n3,4\n").unwrap();
        let mut session = Session::new();
        session.set_workspace(&root);

        session.load_dataset(&outside).unwrap();
        assert_eq!(session.dataset().unwrap().row_count(), 2);
        assert_eq!(session.loaded_name(), None);

        let err = session.load_dataset(tmp.path().join("gone.csv")).unwrap_err();
        assert!(matches!(err, WorkspaceError::SourceNotFound(_)));
        let err = session.load_dataset("gone.csv").unwrap_err();
        assert!(matches!(err, WorkspaceError::DatasetNotFound { .. }));
    }

    #[test]
    fn failed_save_stays_dirty() {
        let (_tmp, root) = workspace();
        write_data(&root, "q1.csv", "a\n1\n");
        let mut session = Session::new();
        session.set_workspace(&root);
        session.load_dataset("q1.csv").unwrap();
        session.mutate(|_| ()).unwrap();

        fs::create_dir(root.join("data").join(CANONICAL_DATASET)).unwrap();
        let err = session.save().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert!(session.is_dirty());
    }

    #[test]
    fn export_does_not_touch_state() {
        let (tmp, root) = workspace();
        write_data(&root, "q1.csv", "a\n1\n");
        let mut session = Session::new();
        session.set_workspace(&root);
        session.load_dataset("q1.csv").unwrap();
        session.mutate(|_| ()).unwrap();

        let target = tmp.path().join("exports").join("copy.csv");
        session.export(&target).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "a\n1\n");
        assert!(session.is_dirty());
        assert_eq!(session.loaded_name(), Some("q1.csv"));

        let err = session.export(tmp.path().join("copy.json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatError);
        let err = session.export(tmp.path().join("copy.xls")).unwrap_err();
        assert!(matches!(
            err,
            WorkspaceError::Format {
                source: CodecError::ReadOnlyFormat(_),
                ..
            }
        ));
        assert!(session.is_dirty());
    }

    #[test]
    fn spreadsheet_export_loads_back_equal() {
        let (tmp, root) = workspace();
        write_data(&root, "q1.csv", "zip,city,pop\n02134,Boston,650000\n10001,New York,\n");
        let mut session = Session::new();
        session.set_workspace(&root);
        session.load_dataset("q1.csv").unwrap();
        let expected = session.dataset().cloned().unwrap();
        assert_eq!(expected.cell(0, 0), Some(&Cell::Text("02134".into())));

        let target = tmp.path().join("book.xlsx");
        session.export(&target).unwrap();
        assert!(target.is_file());
        assert_eq!(session.loaded_name(), Some("q1.csv"));

        session.load_dataset(&target).unwrap();
        assert_eq!(session.dataset(), Some(&expected));
        assert_eq!(session.state(), SessionState::BoundClean);
    }

    #[test]
    fn text_cells_survive_save_and_reload() {
        let (_tmp, root) = workspace();
        write_data(&root, "seed.csv", "code,label,amount\n");
        let mut session = Session::new();
        session.set_workspace(&root);
        session.load_dataset("seed.csv").unwrap();
        session
            .mutate(|table| {
                table.push_row([Cell::Text("02134".into()), Cell::Text("  ".into()), Cell::from(2.5)]);
                table.push_row([Cell::Text("-007".into()), Cell::Text(" 5".into()), Cell::Empty]);
            })
            .unwrap();
        let expected = session.dataset().cloned().unwrap();

        session.save().unwrap();
        session.set_workspace(&root);
        session.load_dataset(CANONICAL_DATASET).unwrap();
        assert_eq!(session.dataset(), Some(&expected));
    }

    #[test]
    fn rows_wider_than_header_are_a_format_error() {
        let (_tmp, root) = workspace();
        write_data(&root, "good.csv", "a\n1\n");
        write_data(&root, "wide.csv", "a,b\n1,2,3,4\n");
        let mut session = Session::new();
        session.set_workspace(&root);
        session.load_dataset("good.csv").unwrap();

        let err = session.load_dataset("wide.csv").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatError);
        assert!(matches!(
            err,
            WorkspaceError::Format {
                source: CodecError::TooManyFields { found: 4, expected: 2, .. },
                ..
            }
        ));
        assert_eq!(session.state(), SessionState::BoundClean);
        assert_eq!(session.loaded_name(), Some("good.csv"));
    }

    #[test]
    fn observers_see_events_in_order() {
        let (_tmp, root) = workspace();
        write_data(&root, "q1.csv", "a\n1\n2\n");
        write_data(&root, "bad.csv", "");
        let recorder = Recorder::default();
        let mut session = Session::new();
        session.subscribe(recorder.clone());

        session.set_workspace(&root);
        assert!(recorder.take().is_empty());

        session.load_dataset("q1.csv").unwrap();
        assert_eq!(recorder.take(), vec![Event::Loaded(2)]);

        session.mutate(|_| ()).unwrap();
        session.mutate(|_| ()).unwrap();
        assert_eq!(recorder.take(), vec![Event::Dirty(true)]);

        let _ = session.load_dataset("bad.csv");
        assert_eq!(recorder.take(), vec![Event::Error(ErrorKind::FormatError)]);

        session.save().unwrap();
        assert_eq!(recorder.take(), vec![Event::Dirty(false)]);

        session.mutate(|_| ()).unwrap();
        session.clear();
        assert_eq!(recorder.take(), vec![Event::Dirty(true), Event::Dirty(false)]);
    }

    #[test]
    fn open_workspace_loads_canonical_when_present() {
        let (_tmp, root) = workspace();
        let mut session = Session::new();
        assert!(!session.open_workspace(&root).unwrap());
        assert_eq!(session.state(), SessionState::BoundEmpty);

        write_data(&root, CANONICAL_DATASET, "a\n1\n");
        assert!(session.open_workspace(&root).unwrap());
        assert_eq!(session.state(), SessionState::BoundClean);
    }

    #[test]
    fn removing_the_loaded_dataset_falls_back_to_canonical() {
        let (_tmp, root) = workspace();
        write_data(&root, CANONICAL_DATASET, "a\n1\n2\n3\n");
        write_data(&root, "side.csv", "a\n9\n");
        let mut session = Session::new();
        session.set_workspace(&root);
        session.load_dataset("side.csv").unwrap();

        let store = session.datasets().unwrap();
        store.delete_dataset("side.csv").unwrap();
        session.dataset_removed("side.csv").unwrap();

        assert_eq!(session.loaded_name(), Some(CANONICAL_DATASET));
        assert_eq!(session.dataset().unwrap().row_count(), 3);
    }

    #[test]
    fn removing_the_loaded_dataset_without_canonical_empties_session() {
        let (_tmp, root) = workspace();
        write_data(&root, "side.csv", "a\n9\n");
        let mut session = Session::new();
        session.set_workspace(&root);
        session.load_dataset("side.csv").unwrap();
        session.mutate(|_| ()).unwrap();

        session.datasets().unwrap().delete_dataset("side.csv").unwrap();
        session.dataset_removed("side.csv").unwrap();

        assert_eq!(session.state(), SessionState::BoundEmpty);
        assert!(!session.is_dirty());
    }

    #[test]
    fn unreadable_fallback_still_empties_session() {
        let (_tmp, root) = workspace();
        write_data(&root, CANONICAL_DATASET, "");
        write_data(&root, "side.csv", "a\n9\n");
        let mut session = Session::new();
        session.set_workspace(&root);
        session.load_dataset("side.csv").unwrap();

        session.datasets().unwrap().delete_dataset("side.csv").unwrap();
        let err = session.dataset_removed("side.csv").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::FormatError);
        assert_eq!(session.state(), SessionState::BoundEmpty);
        assert_eq!(session.loaded_from(), None);
    }

    #[test]
    fn removing_another_dataset_is_ignored() {
        let (_tmp, root) = workspace();
        write_data(&root, "keep.csv", "a\n1\n");
        write_data(&root, "drop.csv", "a\n2\n");
        let mut session = Session::new();
        session.set_workspace(&root);
        session.load_dataset("keep.csv").unwrap();

        session.datasets().unwrap().delete_dataset("drop.csv").unwrap();
        session.dataset_removed("drop.csv").unwrap();
        assert_eq!(session.loaded_name(), Some("keep.csv"));
    }

    #[test]
    fn rename_follows_loaded_dataset() {
        let (_tmp, root) = workspace();
        write_data(&root, "q1.csv", "a\n1\n");
        let mut session = Session::new();
        session.set_workspace(&root);
        session.load_dataset("q1.csv").unwrap();

        let new_name = session
            .datasets()
            .unwrap()
            .rename_dataset("q1.csv", "q1_final")
            .unwrap();
        session.dataset_renamed("q1.csv", &new_name);
        assert_eq!(session.loaded_name(), Some("q1_final.csv"));
    }
}
