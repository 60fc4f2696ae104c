use {
    crate::{
        index::{DirectoryReader, Term},
        search::ManagedResource,
        LuceneResult,
    },
    std::sync::Arc,
};

/// Hits returned by [IndexSearcher::search].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TopDocs {
    /// The total number of hits for the query.
    pub total_hits: usize,

    /// Document ids of the top hits, in index order.
    pub doc_ids: Vec<usize>,
}

/// Implements search over a single [DirectoryReader].
///
/// For performance reasons, if your index is unchanging, you should share a single `IndexSearcher`
/// instance across multiple searches instead of creating a new one per-search. If your index has
/// changed and you wish to see the changes reflected in searching, use a
/// [crate::search::SearcherManager] to obtain searchers over fresh readers. Once you have a new
/// [DirectoryReader], it's relatively cheap to create a new `IndexSearcher` from it.
///
/// Searchers share the reference count of their reader: acquiring or releasing a searcher through a
/// [crate::search::ReferenceManager] increments or decrements the reader's count.
#[derive(Debug)]
pub struct IndexSearcher {
    reader: Arc<DirectoryReader>,
}

impl IndexSearcher {
    /// Creates a searcher searching the provided reader.
    pub fn new(reader: Arc<DirectoryReader>) -> Self {
        Self {
            reader,
        }
    }

    /// Returns the reader this searches.
    #[inline]
    pub fn reader(&self) -> &Arc<DirectoryReader> {
        &self.reader
    }

    /// Finds the first `n` live documents containing `term`.
    pub fn search(&self, term: &Term, n: usize) -> TopDocs {
        let mut top_docs = TopDocs::default();
        for (doc_id, doc) in self.reader.live_docs() {
            if doc.has_term(term.field(), term.text()) {
                top_docs.total_hits += 1;
                if top_docs.doc_ids.len() < n {
                    top_docs.doc_ids.push(doc_id);
                }
            }
        }
        top_docs
    }

    /// Counts the live documents containing `term`.
    #[inline]
    pub fn count(&self, term: &Term) -> usize {
        self.reader.doc_freq(term)
    }
}

impl ManagedResource for IndexSearcher {
    type Version = u64;

    #[inline]
    fn try_inc_ref(&self) -> bool {
        self.reader.try_inc_ref()
    }

    #[inline]
    fn dec_ref(&self) -> LuceneResult<()> {
        self.reader.dec_ref()
    }

    #[inline]
    fn ref_count(&self) -> i32 {
        self.reader.ref_count()
    }

    #[inline]
    fn version(&self) -> u64 {
        self.reader.version()
    }
}
