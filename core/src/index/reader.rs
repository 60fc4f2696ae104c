use {
    crate::{document::Document, index::Term, util::RefCount, Id, LuceneError, LuceneResult},
    bitvec::vec::BitVec,
    log::{debug, error},
    parking_lot::Mutex,
    std::{
        fmt::{Debug, Formatter, Result as FmtResult},
        sync::Arc,
    },
};

/// Callback run with the reader's id once the reader has been disposed.
pub type ClosedListener = Box<dyn FnOnce(Id) + Send + 'static>;

#[derive(Default)]
struct ClosedListeners {
    closed: bool,
    listeners: Vec<ClosedListener>,
}

/// An immutable, point-in-time view of an index.
///
/// Readers are reference counted. The creator holds the first reference; every holder that wants the
/// reader to stay usable takes another with [DirectoryReader::try_inc_ref] or [DirectoryReader::inc_ref] and
/// gives it back with [DirectoryReader::dec_ref]. When the count drops to zero the reader is disposed:
/// its closed listeners run exactly once and further reference operations fail.
///
/// Document ids are positions in the reader; deleted documents keep their id but are no longer live.
pub struct DirectoryReader {
    id: Id,
    writer_id: Id,
    epoch: u64,
    version: u64,
    docs: Vec<Arc<Document>>,
    deleted: BitVec,
    num_docs: usize,
    ref_count: RefCount,
    closed_listeners: Mutex<ClosedListeners>,
}

impl Debug for DirectoryReader {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DirectoryReader")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("max_doc", &self.docs.len())
            .field("num_docs", &self.num_docs)
            .field("ref_count", &self.ref_count.get())
            .finish()
    }
}

impl DirectoryReader {
    pub(crate) fn new(writer_id: Id, epoch: u64, version: u64, docs: Vec<Arc<Document>>, deleted: BitVec) -> Arc<Self> {
        debug_assert_eq!(docs.len(), deleted.len());
        let num_docs = docs.len() - deleted.count_ones();
        let reader = Arc::new(Self {
            id: Id::random_id(),
            writer_id,
            epoch,
            version,
            docs,
            deleted,
            num_docs,
            ref_count: RefCount::new(),
            closed_listeners: Mutex::new(ClosedListeners::default()),
        });
        debug!("Opened {reader:?}");
        reader
    }

    /// Returns the unique id of this point-in-time view.
    #[inline]
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns the id of the [crate::index::IndexWriter] this reader was opened from.
    #[inline]
    pub fn writer_id(&self) -> Id {
        self.writer_id
    }

    #[inline]
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Version number when this reader was opened. This is the writer's change counter at the time the
    /// snapshot was taken, so a newer snapshot of the same writer always has a larger version.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the number of live (non-deleted) documents.
    #[inline]
    pub fn num_docs(&self) -> usize {
        self.num_docs
    }

    /// Returns one greater than the largest possible document id.
    #[inline]
    pub fn max_doc(&self) -> usize {
        self.docs.len()
    }

    /// Returns the number of deleted documents.
    #[inline]
    pub fn num_deleted_docs(&self) -> usize {
        self.docs.len() - self.num_docs
    }

    /// Returns `true` if the document id is out of range or deleted.
    pub fn is_deleted(&self, doc_id: usize) -> bool {
        self.deleted.get(doc_id).map_or(true, |bit| *bit)
    }

    /// Returns the live document with the given id.
    pub fn document(&self, doc_id: usize) -> Option<&Document> {
        if self.is_deleted(doc_id) {
            None
        } else {
            self.docs.get(doc_id).map(|doc| doc.as_ref())
        }
    }

    /// Iterate over `(doc_id, document)` pairs of the live documents.
    pub fn live_docs(&self) -> impl Iterator<Item = (usize, &Document)> + '_ {
        self.docs.iter().enumerate().filter(|(doc_id, _)| !self.deleted[*doc_id]).map(|(doc_id, doc)| (doc_id, doc.as_ref()))
    }

    pub(crate) fn live_doc_arcs(&self) -> impl Iterator<Item = &Arc<Document>> + '_ {
        self.docs.iter().enumerate().filter(|(doc_id, _)| !self.deleted[*doc_id]).map(|(_, doc)| doc)
    }

    /// Returns the number of live documents containing the term.
    pub fn doc_freq(&self, term: &Term) -> usize {
        self.live_docs().filter(|(_, doc)| doc.has_term(term.field(), term.text())).count()
    }

    /// Returns the current reference count.
    #[inline]
    pub fn ref_count(&self) -> i32 {
        self.ref_count.get()
    }

    /// Returns `true` once the reader has been disposed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.ref_count.get() <= 0
    }

    /// Tries to take a reference. Returns `false` if the reader has already been disposed.
    #[inline]
    pub fn try_inc_ref(&self) -> bool {
        self.ref_count.try_inc_ref()
    }

    /// Takes a reference, failing with [LuceneError::AlreadyClosed] if the reader has already been disposed.
    pub fn inc_ref(&self) -> LuceneResult<()> {
        if self.try_inc_ref() {
            Ok(())
        } else {
            Err(LuceneError::AlreadyClosed(format!("{:?} is closed", self.id)))
        }
    }

    /// Gives back a reference. The last reference disposes the reader.
    ///
    /// Decrementing a reader whose count is already zero fails with [LuceneError::IllegalState].
    pub fn dec_ref(&self) -> LuceneResult<()> {
        if self.ref_count.dec_ref()? {
            self.dispose();
        }
        Ok(())
    }

    /// Registers a callback to run when the reader is disposed. Fails with [LuceneError::AlreadyClosed] if
    /// the reader has already been disposed.
    pub fn add_closed_listener<F>(&self, listener: F) -> LuceneResult<()>
    where
        F: FnOnce(Id) + Send + 'static,
    {
        let mut closed_listeners = self.closed_listeners.lock();
        if closed_listeners.closed {
            return Err(LuceneError::AlreadyClosed(format!("{:?} is closed", self.id)));
        }
        closed_listeners.listeners.push(Box::new(listener));
        Ok(())
    }

    fn dispose(&self) {
        let listeners = {
            let mut closed_listeners = self.closed_listeners.lock();
            if closed_listeners.closed {
                error!("{:?} disposed twice", self.id);
                return;
            }
            closed_listeners.closed = true;
            std::mem::take(&mut closed_listeners.listeners)
        };

        debug!("Disposing reader {:?} at version {}", self.id, self.version);
        for listener in listeners {
            listener(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        crate::{
            document::{Document, Field},
            index::{DirectoryReader, Term},
            Id,
        },
        bitvec::vec::BitVec,
        pretty_assertions::assert_eq,
        std::sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        test_log::test,
    };

    fn reader_with(bodies: &[&str], deleted: &[usize]) -> Arc<DirectoryReader> {
        let docs: Vec<_> = bodies.iter().map(|body| Arc::new(Document::new().with(Field::text("body", *body)))).collect();
        let mut bits = BitVec::repeat(false, docs.len());
        for doc_id in deleted {
            bits.set(*doc_id, true);
        }
        DirectoryReader::new(Id::random_id(), 0, 1, docs, bits)
    }

    #[test]
    fn test_counts() {
        let reader = reader_with(&["united states", "united kingdom", "france"], &[1]);
        assert_eq!(reader.max_doc(), 3);
        assert_eq!(reader.num_docs(), 2);
        assert_eq!(reader.num_deleted_docs(), 1);
        assert_eq!(reader.doc_freq(&Term::new("body", "united")), 1);
        assert!(reader.document(1).is_none());
        assert!(reader.is_deleted(7));
        assert_eq!(reader.live_docs().map(|(doc_id, _)| doc_id).collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_dispose_once() {
        let reader = reader_with(&["a"], &[]);
        let disposed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&disposed);
        reader.add_closed_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        reader.inc_ref().unwrap();
        reader.dec_ref().unwrap();
        assert_eq!(disposed.load(Ordering::SeqCst), 0);
        reader.dec_ref().unwrap();
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
        assert!(reader.is_closed());

        assert!(reader.dec_ref().unwrap_err().is_illegal_state());
        assert!(reader.inc_ref().unwrap_err().is_already_closed());
        assert!(reader.add_closed_listener(|_| ()).unwrap_err().is_already_closed());
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
    }
}
