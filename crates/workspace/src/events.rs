use crate::error::WorkspaceError;
use crate::table::TabularDataset;

/// Receives session notifications, fired synchronously once the triggering
/// operation has finished.
/// 工作階段事件的觀察者；於觸發操作完成後同步呼叫。
///
/// A single load reports either `on_data_loaded` or `on_data_error`, never both.
pub trait SessionObserver {
    fn on_data_loaded(&mut self, _dataset: &TabularDataset) {}

    fn on_data_error(&mut self, _error: &WorkspaceError) {}

    fn on_dirty_changed(&mut self, _dirty: bool) {}
}

/// Ordered fan-out to every registered observer.
#[derive(Default)]
pub(crate) struct ObserverList {
    observers: Vec<Box<dyn SessionObserver>>,
}

impl ObserverList {
    pub fn push(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn data_loaded(&mut self, dataset: &TabularDataset) {
        for observer in &mut self.observers {
            observer.on_data_loaded(dataset);
        }
    }

    pub fn data_error(&mut self, error: &WorkspaceError) {
        for observer in &mut self.observers {
            observer.on_data_error(error);
        }
    }

    pub fn dirty_changed(&mut self, dirty: bool) {
        for observer in &mut self.observers {
            observer.on_dirty_changed(dirty);
        }
    }
}

impl std::fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverList")
            .field("observers", &self.observers.len())
            .finish()
    }
}
