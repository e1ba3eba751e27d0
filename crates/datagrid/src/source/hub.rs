//! Change notification between data sources bound to the same table.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use datagrid_core::Signal;
use datagrid_core::logging::targets;
use parking_lot::Mutex;

use crate::source::RowsChanged;

/// Identity of a physical table: database file plus table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableKey {
    db_file: PathBuf,
    table: String,
}

impl TableKey {
    pub fn new(db_file: &Path, table: &str) -> Self {
        let db_file = std::fs::canonicalize(db_file).unwrap_or_else(|_| db_file.to_path_buf());
        Self {
            db_file,
            table: table.to_string(),
        }
    }
}

struct Subscriber {
    id: u64,
    key: TableKey,
    signal: Weak<Signal<RowsChanged>>,
}

/// Routes row updates to every other live data source on the same table.
///
/// Sources register their `rows_changed` signal weakly, so a dropped source
/// simply stops receiving events.
#[derive(Default)]
pub struct ChangeHub {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl ChangeHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The process-wide hub used by sources that are not given one.
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<ChangeHub>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(ChangeHub::new))
    }

    pub(crate) fn register(&self, key: TableKey, signal: &Arc<Signal<RowsChanged>>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push(Subscriber {
            id,
            key,
            signal: Arc::downgrade(signal),
        });
        id
    }

    pub(crate) fn unregister(&self, id: u64) {
        self.subscribers.lock().retain(|s| s.id != id);
    }

    /// Deliver `change` to every source on `key` except `sender`.
    ///
    /// Returns the number of sources notified.
    pub(crate) fn notify(&self, sender: u64, key: &TableKey, change: &RowsChanged) -> usize {
        let receivers: Vec<Arc<Signal<RowsChanged>>> = {
            let mut subscribers = self.subscribers.lock();
            subscribers.retain(|s| s.signal.strong_count() > 0);
            subscribers
                .iter()
                .filter(|s| s.id != sender && &s.key == key)
                .filter_map(|s| s.signal.upgrade())
                .collect()
        };
        tracing::debug!(
            target: targets::SOURCE,
            receivers = receivers.len(),
            "notifying other sources of row changes"
        );
        for signal in &receivers {
            signal.emit(change.clone());
        }
        receivers.len()
    }

    /// Number of registered sources that are still alive.
    pub fn live_sources(&self) -> usize {
        self.subscribers
            .lock()
            .iter()
            .filter(|s| s.signal.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_notifies_others_on_same_table_only() {
        let hub = ChangeHub::new();
        let key = TableKey::new(Path::new("/nonexistent/a.db"), "people");
        let a = Arc::new(Signal::<RowsChanged>::new());
        let b = Arc::new(Signal::<RowsChanged>::new());
        let other_table = Arc::new(Signal::<RowsChanged>::new());

        let received = Arc::new(Mutex::new(Vec::new()));
        for (name, signal) in [("a", &a), ("b", &b), ("other", &other_table)] {
            let received = received.clone();
            signal.connect(move |_| received.lock().push(name));
        }

        let id_a = hub.register(key.clone(), &a);
        hub.register(key.clone(), &b);
        hub.register(TableKey::new(Path::new("/nonexistent/a.db"), "files"), &other_table);

        let change = RowsChanged {
            changes: [("age".to_string(), Value::Integer(1))].into(),
            ids: Some(vec![Value::Integer(1)]),
        };
        assert_eq!(hub.notify(id_a, &key, &change), 1);
        assert_eq!(*received.lock(), vec!["b"]);
    }

    #[test]
    fn test_dropped_sources_are_pruned() {
        let hub = ChangeHub::new();
        let key = TableKey::new(Path::new("x.db"), "t");
        let a = Arc::new(Signal::<RowsChanged>::new());
        let id = hub.register(key.clone(), &a);
        {
            let b = Arc::new(Signal::<RowsChanged>::new());
            hub.register(key.clone(), &b);
            assert_eq!(hub.live_sources(), 2);
        }
        assert_eq!(hub.live_sources(), 1);
        assert_eq!(hub.notify(id, &key, &RowsChanged::default()), 0);

        hub.unregister(id);
        assert_eq!(hub.live_sources(), 0);
    }
}
