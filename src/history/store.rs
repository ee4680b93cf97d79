use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::broadcast;

use crate::models::{NewRecord, ScreenshotRecord};

const EVENT_CAPACITY: usize = 64;

/// Published after every mutation so surfaces can redraw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent {
    Appended(u64),
    /// Ids that left the history. Remote files are not touched.
    Removed(Vec<u64>),
}

struct HistoryInner {
    records: Vec<Arc<ScreenshotRecord>>,
    next_id: u64,
}

/// Ordered, in-memory record of successful uploads for the current run.
pub struct HistoryStore {
    inner: RwLock<HistoryInner>,
    events: broadcast::Sender<HistoryEvent>,
}

impl HistoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: RwLock::new(HistoryInner {
                records: Vec::new(),
                next_id: 1,
            }),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.events.subscribe()
    }

    /// Assigns the next id and publishes the record in one step.
    pub fn append(&self, new: NewRecord) -> Arc<ScreenshotRecord> {
        let record = {
            let mut inner = self.write();
            let id = inner.next_id;
            inner.next_id += 1;
            let record = Arc::new(ScreenshotRecord::from_new(id, new));
            inner.records.push(Arc::clone(&record));
            record
        };
        self.publish(HistoryEvent::Appended(record.id));
        record
    }

    pub fn remove_last(&self) -> Option<Arc<ScreenshotRecord>> {
        let removed = self.write().records.pop()?;
        self.publish(HistoryEvent::Removed(vec![removed.id]));
        Some(removed)
    }

    pub fn remove_all(&self) -> Vec<Arc<ScreenshotRecord>> {
        let removed = std::mem::take(&mut self.write().records);
        if !removed.is_empty() {
            self.publish(HistoryEvent::Removed(
                removed.iter().map(|record| record.id).collect(),
            ));
        }
        removed
    }

    /// Records in ascending id order.
    pub fn list(&self) -> Vec<Arc<ScreenshotRecord>> {
        self.read().records.clone()
    }

    pub fn get(&self, id: u64) -> Option<Arc<ScreenshotRecord>> {
        let inner = self.read();
        inner
            .records
            .binary_search_by_key(&id, |record| record.id)
            .ok()
            .map(|index| Arc::clone(&inner.records[index]))
    }

    pub fn last(&self) -> Option<Arc<ScreenshotRecord>> {
        self.read().records.last().cloned()
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().records.is_empty()
    }

    fn publish(&self, event: HistoryEvent) {
        // No subscribers is fine; nobody is watching yet.
        let _ = self.events.send(event);
    }

    fn read(&self) -> RwLockReadGuard<'_, HistoryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HistoryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use image::RgbaImage;

    fn new_record(name: &str) -> NewRecord {
        NewRecord {
            filename: name.to_string(),
            thumbnail: RgbaImage::new(2, 2),
            remote_path: format!("/srv/shots/{name}"),
            created_at: Local::now(),
            payload: vec![1, 2, 3],
        }
    }

    fn ids(store: &HistoryStore) -> Vec<u64> {
        store.list().iter().map(|record| record.id).collect()
    }

    #[test]
    fn appends_get_increasing_ids() {
        let store = HistoryStore::new();
        let a = store.append(new_record("a.jpg"));
        let b = store.append(new_record("b.jpg"));
        let c = store.append(new_record("c.jpg"));
        assert_eq!((a.id, b.id, c.id), (1, 2, 3));
        assert_eq!(ids(&store), vec![1, 2, 3]);
        assert_eq!(store.list()[1].filename, "b.jpg");
    }

    #[test]
    fn remove_last_takes_most_recent() {
        let store = HistoryStore::new();
        store.append(new_record("a.jpg"));
        store.append(new_record("b.jpg"));
        let removed = store.remove_last().unwrap();
        assert_eq!(removed.id, 2);
        assert_eq!(ids(&store), vec![1]);
    }

    #[test]
    fn remove_last_on_empty_store_is_none() {
        let store = HistoryStore::new();
        assert!(store.remove_last().is_none());
        assert!(store.remove_all().is_empty());
    }

    #[test]
    fn ids_are_not_reused_after_delete_all() {
        let store = HistoryStore::new();
        store.append(new_record("a.jpg"));
        store.append(new_record("b.jpg"));
        let removed = store.remove_all();
        assert_eq!(removed.len(), 2);
        assert!(store.list().is_empty());
        assert!(store.is_empty());

        let next = store.append(new_record("c.jpg"));
        assert_eq!(next.id, 3);
    }

    #[test]
    fn ids_are_not_reused_after_delete_last() {
        let store = HistoryStore::new();
        store.append(new_record("a.jpg"));
        store.remove_last();
        assert_eq!(store.append(new_record("b.jpg")).id, 2);
    }

    #[test]
    fn stale_ids_resolve_to_nothing() {
        let store = HistoryStore::new();
        store.append(new_record("a.jpg"));
        store.append(new_record("b.jpg"));
        store.remove_last();
        store.append(new_record("c.jpg"));

        assert!(store.get(2).is_none());
        assert_eq!(store.get(3).unwrap().filename, "c.jpg");
        assert_eq!(store.get(1).unwrap().filename, "a.jpg");
    }

    #[test]
    fn mutations_are_published() {
        let store = HistoryStore::new();
        let mut events = store.subscribe();

        store.append(new_record("a.jpg"));
        store.append(new_record("b.jpg"));
        store.remove_last();
        store.remove_all();

        assert_eq!(events.try_recv().unwrap(), HistoryEvent::Appended(1));
        assert_eq!(events.try_recv().unwrap(), HistoryEvent::Appended(2));
        assert_eq!(events.try_recv().unwrap(), HistoryEvent::Removed(vec![2]));
        assert_eq!(events.try_recv().unwrap(), HistoryEvent::Removed(vec![1]));
        assert!(events.try_recv().is_err());
    }
}
