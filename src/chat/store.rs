use crate::chat::message::{ChatMessageThread, ChatThreads};
use crate::chat::storage::KeyValueStorage;
use crate::error::Result;
use crate::ids::{IdGenerator, global_ids};
use parking_lot::Mutex;
use std::sync::Arc;

/// Storage key of the persisted thread record
pub const THREADS_KEY: &str = "chat_threads";

/// Chat threads persisted as one JSON record in a [`KeyValueStorage`]
///
/// Every operation re-reads the record, so edits made through another store
/// on the same storage are picked up. Concurrent writers: last write wins.
pub struct ChatThreadStore {
    storage: Arc<dyn KeyValueStorage>,
    ids: &'static IdGenerator,
    write_lock: Mutex<()>,
}

impl ChatThreadStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Result<Self> {
        Self::with_ids(storage, global_ids())
    }

    pub fn with_ids(storage: Arc<dyn KeyValueStorage>, ids: &'static IdGenerator) -> Result<Self> {
        let store = Self {
            storage,
            ids,
            write_lock: Mutex::new(()),
        };
        if store.read_record()?.is_none() {
            store.persist(&ChatThreads::new())?;
        }
        Ok(store)
    }

    /// Save `thread` under `thread_id`, or under a fresh id when none is given
    pub fn write_thread(&self, thread: &ChatMessageThread, thread_id: Option<&str>) -> Result<String> {
        let _guard = self.write_lock.lock();
        let mut threads = self.read_record()?.unwrap_or_default();

        let thread_id = match thread_id {
            Some(id) => id.to_string(),
            None => self.fresh_id(&threads)?,
        };

        threads.insert(thread_id.clone(), thread.clone());
        self.persist(&threads)?;
        log::debug!("Stored thread {} ({} messages)", thread_id, thread.len());
        Ok(thread_id)
    }

    pub fn read_thread(&self, thread_id: &str) -> Result<Option<ChatMessageThread>> {
        Ok(self
            .read_record()?
            .and_then(|mut threads| threads.shift_remove(thread_id)))
    }

    /// Ids of all stored threads, oldest first
    pub fn thread_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .read_record()?
            .map(|threads| threads.into_keys().collect())
            .unwrap_or_default())
    }

    pub fn threads(&self) -> Result<ChatThreads> {
        Ok(self.read_record()?.unwrap_or_default())
    }

    fn fresh_id(&self, threads: &ChatThreads) -> Result<String> {
        // Ids restart with the process; skip the ones a previous run persisted
        loop {
            let id = self.ids.next_id()?.to_string();
            if !threads.contains_key(&id) {
                return Ok(id);
            }
        }
    }

    fn read_record(&self) -> Result<Option<ChatThreads>> {
        match self.storage.get_item(THREADS_KEY)? {
            Some(raw) => Ok(serde_json::from_str::<Option<ChatThreads>>(&raw)?),
            None => Ok(None),
        }
    }

    fn persist(&self, threads: &ChatThreads) -> Result<()> {
        let raw = serde_json::to_string(threads)?;
        self.storage.set_item(THREADS_KEY, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::ChatMessage;
    use crate::chat::storage::{FileStorage, MemoryStorage};

    static TEST_IDS: IdGenerator = IdGenerator::new();

    fn store() -> (Arc<MemoryStorage>, ChatThreadStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = ChatThreadStore::new(storage.clone()).unwrap();
        (storage, store)
    }

    #[test]
    fn test_initializes_empty_record() {
        let (storage, _store) = store();
        assert_eq!(storage.get_item(THREADS_KEY).unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_null_record_is_reinitialized() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(THREADS_KEY, "null").unwrap();
        let store = ChatThreadStore::new(storage.clone()).unwrap();
        assert!(store.thread_ids().unwrap().is_empty());
        assert_eq!(storage.get_item(THREADS_KEY).unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let (_storage, store) = store();
        let thread = ChatMessageThread::from(vec![ChatMessage::system("Be brief."), ChatMessage::user("Hi")]);

        let id = store.write_thread(&thread, None).unwrap();
        assert_eq!(store.read_thread(&id).unwrap(), Some(thread));
        assert_eq!(store.read_thread("no-such-thread").unwrap(), None);
    }

    #[test]
    fn test_explicit_id_overwrites() {
        let (_storage, store) = store();
        let mut thread = ChatMessageThread::new();
        thread.push_user_message("one");
        store.write_thread(&thread, Some("t")).unwrap();
        thread.push_assistant_message("two");
        assert_eq!(store.write_thread(&thread, Some("t")).unwrap(), "t");

        assert_eq!(store.read_thread("t").unwrap().unwrap().len(), 2);
        assert_eq!(store.thread_ids().unwrap(), vec!["t".to_string()]);
    }

    #[test]
    fn test_fresh_ids_are_distinct_and_ordered() {
        let (_storage, store) = store();
        let a = store.write_thread(&ChatMessageThread::new(), None).unwrap();
        let b = store.write_thread(&ChatMessageThread::new(), None).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.thread_ids().unwrap(), vec![a, b]);
    }

    #[test]
    fn test_fresh_ids_skip_persisted_threads() {
        let storage = Arc::new(MemoryStorage::new());
        let next = (TEST_IDS.last_id() + 1).to_string();
        storage
            .set_item(THREADS_KEY, &format!(r#"{{"{}":[{{"role":"user","content":"old"}}]}}"#, next))
            .unwrap();

        let store = ChatThreadStore::with_ids(storage, &TEST_IDS).unwrap();
        let id = store.write_thread(&ChatMessageThread::new(), None).unwrap();
        assert_ne!(id, next);
        assert_eq!(store.read_thread(&next).unwrap().unwrap().len(), 1);
    }

    #[test]
    fn test_second_store_sees_writes() {
        let dir = tempfile::tempdir().unwrap();
        let first = ChatThreadStore::new(Arc::new(FileStorage::open(dir.path()).unwrap())).unwrap();
        let id = first
            .write_thread(&ChatMessageThread::from(vec![ChatMessage::user("persisted")]), None)
            .unwrap();

        let second = ChatThreadStore::new(Arc::new(FileStorage::open(dir.path()).unwrap())).unwrap();
        let thread = second.read_thread(&id).unwrap().unwrap();
        assert_eq!(thread.messages()[0].content, "persisted");
    }
}
