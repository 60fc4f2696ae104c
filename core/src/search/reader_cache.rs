use {
    crate::{index::DirectoryReader, Id, LuceneResult},
    log::debug,
    parking_lot::Mutex,
    std::{
        collections::HashMap,
        fmt::{Debug, Formatter, Result as FmtResult},
        sync::{Arc, Weak},
    },
};

/// A per-reader cache, e.g. for values computed while warming a new searcher.
///
/// Entries are keyed by [DirectoryReader::id]. The first insert for a reader registers a closed listener on
/// it, so an entry is purged as soon as its reader is disposed.
pub struct ReaderCache<V> {
    entries: Arc<Mutex<HashMap<Id, V>>>,
}

impl<V> Debug for ReaderCache<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ReaderCache").field("len", &self.len()).finish()
    }
}

impl<V> Default for ReaderCache<V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<V: Clone + Send + 'static> ReaderCache<V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value cached for `reader`, computing and caching it with `f` if absent.
    ///
    /// Fails with [crate::LuceneError::AlreadyClosed] if `reader` has already been disposed; nothing is cached
    /// in that case.
    pub fn get_or_insert_with<F>(&self, reader: &DirectoryReader, f: F) -> LuceneResult<V>
    where
        F: FnOnce(&DirectoryReader) -> V,
    {
        let id = reader.id();
        if let Some(value) = self.entries.lock().get(&id) {
            return Ok(value.clone());
        }

        let value = f(reader);
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&id) {
            return Ok(existing.clone());
        }

        let weak: Weak<Mutex<HashMap<Id, V>>> = Arc::downgrade(&self.entries);
        reader.add_closed_listener(move |id| {
            if let Some(entries) = weak.upgrade() {
                if entries.lock().remove(&id).is_some() {
                    debug!("Purged cache entry for reader {id:?}");
                }
            }
        })?;

        entries.insert(id, value.clone());
        Ok(value)
    }

    /// Returns the cached value for the reader with `id`, if any.
    pub fn get(&self, id: Id) -> Option<V> {
        self.entries.lock().get(&id).cloned()
    }
}

impl<V> ReaderCache<V> {
    /// Returns the number of cached readers.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops the entry for the reader with `id`.
    pub fn purge(&self, id: Id) -> bool {
        self.entries.lock().remove(&id).is_some()
    }
}
