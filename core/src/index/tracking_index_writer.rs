use {
    crate::{
        document::Document,
        index::{writer::Mutation, DirectoryReader, IndexWriter, Term},
        LuceneResult,
    },
    std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

/// Wraps an [IndexWriter] and returns a generation for every change.
///
/// The generation marks the change's position in the index history: if one change is applied before another,
/// its generation is less than or equal to the other's. Pass the generation to
/// [crate::search::ControlledRealTimeReopenThread::wait_for_generation] to block until a searcher reflecting
/// the change is available.
///
/// A change that fails returns its error and is not assigned a generation.
#[derive(Debug)]
pub struct TrackingIndexWriter {
    writer: Arc<IndexWriter>,
    indexing_gen: AtomicU64,
}

impl TrackingIndexWriter {
    /// Create a `TrackingIndexWriter` wrapping the provided [IndexWriter].
    pub fn new(writer: Arc<IndexWriter>) -> Self {
        Self {
            writer,
            indexing_gen: AtomicU64::new(1),
        }
    }

    fn track(&self, mutation: Mutation) -> LuceneResult<u64> {
        self.writer.mutate(mutation, || self.indexing_gen.load(Ordering::SeqCst))
    }

    /// Calls [IndexWriter::update_document] and returns the generation that reflects this change.
    pub fn update_document(&self, term: Term, doc: Document) -> LuceneResult<u64> {
        self.track(Mutation::UpdateDocuments(term, vec![doc]))
    }

    /// Calls [IndexWriter::update_documents] and returns the generation that reflects this change.
    pub fn update_documents(&self, term: Term, docs: Vec<Document>) -> LuceneResult<u64> {
        self.track(Mutation::UpdateDocuments(term, docs))
    }

    /// Calls [IndexWriter::delete_documents] with a single term and returns the generation that reflects this
    /// change.
    pub fn delete_documents(&self, term: Term) -> LuceneResult<u64> {
        self.track(Mutation::DeleteTerms(vec![term]))
    }

    /// Calls [IndexWriter::delete_documents] and returns the generation that reflects this change.
    pub fn delete_documents_many(&self, terms: Vec<Term>) -> LuceneResult<u64> {
        self.track(Mutation::DeleteTerms(terms))
    }

    /// Calls [IndexWriter::delete_all] and returns the generation that reflects this change.
    pub fn delete_all(&self) -> LuceneResult<u64> {
        self.track(Mutation::DeleteAll)
    }

    /// Calls [IndexWriter::add_document] and returns the generation that reflects this change.
    pub fn add_document(&self, doc: Document) -> LuceneResult<u64> {
        self.track(Mutation::AddDocuments(vec![doc]))
    }

    /// Calls [IndexWriter::add_documents] and returns the generation that reflects this change.
    pub fn add_documents(&self, docs: Vec<Document>) -> LuceneResult<u64> {
        self.track(Mutation::AddDocuments(docs))
    }

    /// Calls [IndexWriter::add_indexes] and returns the generation that reflects this change.
    pub fn add_indexes(&self, readers: Vec<Arc<DirectoryReader>>) -> LuceneResult<u64> {
        self.track(Mutation::AddIndexes(readers))
    }

    /// Calls [IndexWriter::try_delete_document] and returns the generation that reflects this change, or
    /// `None` if the document could not be deleted by id.
    pub fn try_delete_document(&self, reader: &DirectoryReader, doc_id: usize) -> LuceneResult<Option<u64>> {
        self.writer.try_delete_document_stamped(reader, doc_id, || self.indexing_gen.load(Ordering::SeqCst))
    }

    /// Returns the wrapped [IndexWriter].
    #[inline]
    pub fn index_writer(&self) -> &Arc<IndexWriter> {
        &self.writer
    }

    /// Returns the current generation that is being indexed.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.indexing_gen.load(Ordering::SeqCst)
    }

    /// Return and increment the current generation. Called by a refresh that is about to open a new
    /// snapshot: every change stamped with the returned value is visible in that snapshot.
    #[inline]
    pub fn get_and_increment_generation(&self) -> u64 {
        self.indexing_gen.fetch_add(1, Ordering::SeqCst)
    }
}
