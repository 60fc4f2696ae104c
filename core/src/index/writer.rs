use {
    crate::{
        document::Document,
        index::{DirectoryReader, Term},
        Id, LuceneError, LuceneResult,
    },
    bitvec::vec::BitVec,
    log::debug,
    parking_lot::Mutex,
    std::sync::Arc,
};

/// Hard limit on maximum number of documents that may be added to the index. If you try to add
/// more than this you will encounter a [crate::LuceneError::TooManyDocs] error.
pub const MAX_DOCS: u32 = i32::MAX as u32 - 128;

/// Holds all the configuration that is used to create an [IndexWriter].
#[derive(Clone, Debug)]
pub struct IndexWriterConfig {
    max_buffered_delete_terms: Option<usize>,
    max_docs: u32,
}

impl Default for IndexWriterConfig {
    fn default() -> Self {
        Self {
            max_buffered_delete_terms: None,
            max_docs: MAX_DOCS,
        }
    }
}

impl IndexWriterConfig {
    /// Create a configuration with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Determines the number of buffered delete terms at which the deletes are applied to the in-memory
    /// documents. `None` (the default) keeps deletes buffered until a commit or until a reader that applies
    /// all deletes is opened.
    pub fn with_max_buffered_delete_terms(mut self, max_buffered_delete_terms: Option<usize>) -> Self {
        self.max_buffered_delete_terms = max_buffered_delete_terms;
        self
    }

    /// Lowers the maximum number of documents the writer accepts. Values above [MAX_DOCS] are clamped.
    pub fn with_max_docs(mut self, max_docs: u32) -> Self {
        self.max_docs = max_docs.min(MAX_DOCS);
        self
    }

    /// Returns the number of buffered delete terms that triggers applying deletes.
    #[inline]
    pub fn max_buffered_delete_terms(&self) -> Option<usize> {
        self.max_buffered_delete_terms
    }

    /// Returns the maximum number of documents the writer accepts.
    #[inline]
    pub fn max_docs(&self) -> u32 {
        self.max_docs
    }
}

/// A single change to the index, applied atomically under the writer's lock.
#[derive(Debug)]
pub(crate) enum Mutation {
    AddDocuments(Vec<Document>),
    UpdateDocuments(Term, Vec<Document>),
    DeleteTerms(Vec<Term>),
    DeleteAll,
    AddIndexes(Vec<Arc<DirectoryReader>>),
}

/// A delete that only applies to documents added before it was buffered.
#[derive(Debug)]
struct PendingDelete {
    term: Term,
    doc_upto: usize,
}

/// The state of the index as of the last commit.
#[derive(Debug)]
struct CommitPoint {
    generation: u64,
    version: u64,
    epoch: u64,
    docs: Vec<Arc<Document>>,
    deleted: BitVec,
}

#[derive(Debug)]
struct WriterState {
    docs: Vec<Arc<Document>>,
    deleted: BitVec,
    pending_deletes: Vec<PendingDelete>,
    version: u64,
    epoch: u64,
    commit: Arc<CommitPoint>,
    closed: bool,
}

impl WriterState {
    fn apply(&mut self, mutation: Mutation, config: &IndexWriterConfig) -> LuceneResult<()> {
        match mutation {
            Mutation::AddDocuments(docs) => self.add(docs.into_iter().map(Arc::new).collect(), config),
            Mutation::UpdateDocuments(term, docs) => {
                let docs: Vec<_> = docs.into_iter().map(Arc::new).collect();
                self.check_room(docs.len(), config)?;
                self.buffer_delete(term);
                self.add(docs, config)
            }
            Mutation::DeleteTerms(terms) => {
                for term in terms {
                    self.buffer_delete(term);
                }
                Ok(())
            }
            Mutation::DeleteAll => {
                self.docs.clear();
                self.deleted.clear();
                self.pending_deletes.clear();
                self.epoch += 1;
                Ok(())
            }
            Mutation::AddIndexes(readers) => {
                let mut docs = Vec::new();
                for reader in &readers {
                    if reader.is_closed() {
                        return Err(LuceneError::AlreadyClosed(format!("cannot add {:?}: it is closed", reader.id())));
                    }
                    docs.extend(reader.live_doc_arcs().cloned());
                }
                self.add(docs, config)
            }
        }
    }

    fn check_room(&self, additional: usize, config: &IndexWriterConfig) -> LuceneResult<()> {
        let total = (self.docs.len() + additional) as u64;
        if total > config.max_docs() as u64 {
            Err(LuceneError::TooManyDocs(total))
        } else {
            Ok(())
        }
    }

    fn add(&mut self, docs: Vec<Arc<Document>>, config: &IndexWriterConfig) -> LuceneResult<()> {
        self.check_room(docs.len(), config)?;
        self.deleted.resize(self.docs.len() + docs.len(), false);
        self.docs.extend(docs);
        Ok(())
    }

    fn buffer_delete(&mut self, term: Term) {
        self.pending_deletes.push(PendingDelete {
            term,
            doc_upto: self.docs.len(),
        });
    }

    /// Resolves all buffered deletes. Bumps the version if any document became deleted.
    fn apply_pending_deletes(&mut self) {
        if self.pending_deletes.is_empty() {
            return;
        }

        let mut newly_deleted = 0;
        for pending in std::mem::take(&mut self.pending_deletes) {
            for doc_id in 0..pending.doc_upto {
                if !self.deleted[doc_id] && self.docs[doc_id].has_term(pending.term.field(), pending.term.text()) {
                    self.deleted.set(doc_id, true);
                    newly_deleted += 1;
                }
            }
        }

        if newly_deleted > 0 {
            self.version += 1;
        }
        debug!("Applied buffered deletes: {newly_deleted} documents deleted");
    }

    fn num_docs(&self) -> usize {
        self.docs.len() - self.deleted.count_ones()
    }
}

/// An `IndexWriter` creates and maintains an in-memory index.
///
/// All methods take `&self` and may be called from many threads at once; changes are serialized by an
/// internal lock. Every change increments the writer's [version](IndexWriter::version), which is also the
/// version of any reader opened afterwards.
///
/// Deletes (including the delete half of an update) are buffered. A buffered delete only applies to the
/// documents that were added before it. Buffered deletes are resolved on [IndexWriter::commit], when a reader
/// that applies all deletes is opened, or when [IndexWriterConfig::max_buffered_delete_terms] is reached.
#[derive(Debug)]
pub struct IndexWriter {
    id: Id,
    config: IndexWriterConfig,
    state: Mutex<WriterState>,
}

impl Default for IndexWriter {
    fn default() -> Self {
        Self::new(IndexWriterConfig::default())
    }
}

impl IndexWriter {
    /// Create a new, empty index.
    pub fn new(config: IndexWriterConfig) -> Self {
        let commit = Arc::new(CommitPoint {
            generation: 0,
            version: 0,
            epoch: 0,
            docs: Vec::new(),
            deleted: BitVec::new(),
        });

        Self {
            id: Id::random_id(),
            config,
            state: Mutex::new(WriterState {
                docs: Vec::new(),
                deleted: BitVec::new(),
                pending_deletes: Vec::new(),
                version: 0,
                epoch: 0,
                commit,
                closed: false,
            }),
        }
    }

    /// Returns the unique id of this writer.
    #[inline]
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns the configuration the writer was created with.
    #[inline]
    pub fn config(&self) -> &IndexWriterConfig {
        &self.config
    }

    /// Applies a mutation and, while still holding the writer lock, runs `stamp`. This lets callers attach a
    /// value (such as a generation) that is ordered exactly like the mutations themselves. A failed mutation
    /// never runs `stamp`.
    pub(crate) fn mutate<R>(&self, mutation: Mutation, stamp: impl FnOnce() -> R) -> LuceneResult<R> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(self.closed_error());
        }

        state.apply(mutation, &self.config)?;
        state.version += 1;

        if let Some(max) = self.config.max_buffered_delete_terms {
            if state.pending_deletes.len() >= max {
                state.apply_pending_deletes();
            }
        }

        Ok(stamp())
    }

    /// Deletes `doc_id` from `reader` directly, provided the document is still known to this writer. Runs
    /// `stamp` under the writer lock on success. Returns `None` if the document could not be deleted this way.
    pub(crate) fn try_delete_document_stamped<R>(
        &self,
        reader: &DirectoryReader,
        doc_id: usize,
        stamp: impl FnOnce() -> R,
    ) -> LuceneResult<Option<R>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(self.closed_error());
        }

        if reader.writer_id() != self.id || reader.epoch() != state.epoch || doc_id >= reader.max_doc() {
            return Ok(None);
        }

        if !state.deleted[doc_id] {
            state.deleted.set(doc_id, true);
            state.version += 1;
        }

        Ok(Some(stamp()))
    }

    /// Adds a document to this index.
    pub fn add_document(&self, doc: Document) -> LuceneResult<()> {
        self.mutate(Mutation::AddDocuments(vec![doc]), || ())
    }

    /// Atomically adds a block of documents. Readers see either all of them or none.
    pub fn add_documents(&self, docs: Vec<Document>) -> LuceneResult<()> {
        self.mutate(Mutation::AddDocuments(docs), || ())
    }

    /// Deletes the documents containing `term` and then adds `doc`, atomically.
    pub fn update_document(&self, term: Term, doc: Document) -> LuceneResult<()> {
        self.mutate(Mutation::UpdateDocuments(term, vec![doc]), || ())
    }

    /// Deletes the documents containing `term` and then adds the block `docs`, atomically.
    pub fn update_documents(&self, term: Term, docs: Vec<Document>) -> LuceneResult<()> {
        self.mutate(Mutation::UpdateDocuments(term, docs), || ())
    }

    /// Deletes the documents containing any of the terms.
    pub fn delete_documents(&self, terms: Vec<Term>) -> LuceneResult<()> {
        self.mutate(Mutation::DeleteTerms(terms), || ())
    }

    /// Deletes all documents in the index.
    pub fn delete_all(&self) -> LuceneResult<()> {
        self.mutate(Mutation::DeleteAll, || ())
    }

    /// Adds the live documents of the given readers to this index.
    pub fn add_indexes(&self, readers: Vec<Arc<DirectoryReader>>) -> LuceneResult<()> {
        self.mutate(Mutation::AddIndexes(readers), || ())
    }

    /// Deletes a document by id, as seen by `reader`. Returns `false` if the reader is not from this writer
    /// (or predates a [IndexWriter::delete_all]) and the document must be deleted by term instead.
    pub fn try_delete_document(&self, reader: &DirectoryReader, doc_id: usize) -> LuceneResult<bool> {
        Ok(self.try_delete_document_stamped(reader, doc_id, || ())?.is_some())
    }

    /// Applies all buffered deletes and records the current state as the latest commit. Returns the commit
    /// generation.
    pub fn commit(&self) -> LuceneResult<u64> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(self.closed_error());
        }
        Ok(Self::commit_locked(&mut state))
    }

    fn commit_locked(state: &mut WriterState) -> u64 {
        state.apply_pending_deletes();
        let generation = state.commit.generation + 1;
        state.commit = Arc::new(CommitPoint {
            generation,
            version: state.version,
            epoch: state.epoch,
            docs: state.docs.clone(),
            deleted: state.deleted.clone(),
        });
        debug!("Committed generation {generation} at version {}", state.version);
        generation
    }

    /// Returns the generation of the latest commit. A new writer starts at zero.
    pub fn commit_generation(&self) -> u64 {
        self.state.lock().commit.generation
    }

    /// Returns the number of documents, counting documents whose delete is still buffered.
    pub fn num_docs(&self) -> usize {
        self.state.lock().num_docs()
    }

    /// Returns one greater than the largest document id, including deleted documents.
    pub fn max_doc(&self) -> usize {
        self.state.lock().docs.len()
    }

    /// Returns the change counter of the index.
    pub fn version(&self) -> u64 {
        self.state.lock().version
    }

    /// Returns `true` if there are deletes that have not yet been applied.
    pub fn has_pending_deletes(&self) -> bool {
        !self.state.lock().pending_deletes.is_empty()
    }

    /// Commits pending changes and closes the writer. Further changes fail with
    /// [LuceneError::AlreadyClosed]. Closing twice is a no-op.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if !state.closed {
            Self::commit_locked(&mut state);
            state.closed = true;
            debug!("Closed IndexWriter {:?}", self.id);
        }
    }

    /// Returns `true` once [IndexWriter::close] has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Opens a reader over everything added so far, optionally resolving buffered deletes first.
    pub fn open_reader(&self, apply_all_deletes: bool) -> LuceneResult<Arc<DirectoryReader>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(self.closed_error());
        }
        if apply_all_deletes {
            state.apply_pending_deletes();
        }
        Ok(DirectoryReader::new(self.id, state.epoch, state.version, state.docs.clone(), state.deleted.clone()))
    }

    /// Opens a new reader if anything changed since `previous` was opened, otherwise returns `None`.
    pub fn open_reader_if_changed(
        &self,
        previous: &DirectoryReader,
        apply_all_deletes: bool,
    ) -> LuceneResult<Option<Arc<DirectoryReader>>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(self.closed_error());
        }
        if apply_all_deletes {
            state.apply_pending_deletes();
        }
        if previous.writer_id() == self.id && previous.version() == state.version {
            return Ok(None);
        }
        Ok(Some(DirectoryReader::new(self.id, state.epoch, state.version, state.docs.clone(), state.deleted.clone())))
    }

    /// Returns `true` if `reader` reflects every change made through this writer, including buffered deletes.
    pub fn is_reader_current(&self, reader: &DirectoryReader) -> bool {
        let state = self.state.lock();
        reader.writer_id() == self.id && reader.version() == state.version && state.pending_deletes.is_empty()
    }

    /// Opens a reader over the latest commit.
    pub fn open_committed_reader(&self) -> LuceneResult<Arc<DirectoryReader>> {
        let commit = Arc::clone(&self.state.lock().commit);
        Ok(DirectoryReader::new(self.id, commit.epoch, commit.version, commit.docs.clone(), commit.deleted.clone()))
    }

    /// Opens a reader over the latest commit if it differs from the one `previous` was opened from.
    pub fn open_committed_reader_if_changed(&self, previous: &DirectoryReader) -> LuceneResult<Option<Arc<DirectoryReader>>> {
        let commit = Arc::clone(&self.state.lock().commit);
        if previous.writer_id() == self.id && previous.version() == commit.version {
            return Ok(None);
        }
        Ok(Some(DirectoryReader::new(self.id, commit.epoch, commit.version, commit.docs.clone(), commit.deleted.clone())))
    }

    /// Returns `true` if `reader` was opened from the latest commit.
    pub fn is_commit_current(&self, reader: &DirectoryReader) -> bool {
        let state = self.state.lock();
        reader.writer_id() == self.id && reader.version() == state.commit.version
    }

    fn closed_error(&self) -> LuceneError {
        LuceneError::AlreadyClosed(format!("IndexWriter {:?} is closed", self.id))
    }
}
