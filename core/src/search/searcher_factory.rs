use {
    crate::{index::DirectoryReader, search::IndexSearcher, BoxResult},
    std::sync::Arc,
};

/// Factory used by [crate::search::SearcherManager] to create new [IndexSearcher]s.
///
/// Implement this to warm new searchers before they are published: run queries against the searcher so
/// caches are populated before real searches hit it. Warming runs synchronously on the refreshing thread.
///
/// The returned searcher must search exactly `reader`; the manager rejects anything else. If warming
/// fails, return the error: the refresh is aborted and the previous searcher stays current.
pub trait SearcherFactory: Send + Sync {
    /// Returns a new [IndexSearcher] over `reader`. `previous` is the reader of the searcher being replaced,
    /// or `None` when the first searcher is created.
    fn new_searcher(
        &self,
        reader: Arc<DirectoryReader>,
        previous: Option<&Arc<DirectoryReader>>,
    ) -> BoxResult<IndexSearcher>;
}

/// A [SearcherFactory] that wraps the reader in a plain [IndexSearcher] without warming.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultSearcherFactory;

impl SearcherFactory for DefaultSearcherFactory {
    #[inline]
    fn new_searcher(&self, reader: Arc<DirectoryReader>, _: Option<&Arc<DirectoryReader>>) -> BoxResult<IndexSearcher> {
        Ok(IndexSearcher::new(reader))
    }
}

impl<F> SearcherFactory for F
where
    F: Fn(Arc<DirectoryReader>, Option<&Arc<DirectoryReader>>) -> BoxResult<IndexSearcher> + Send + Sync,
{
    #[inline]
    fn new_searcher(
        &self,
        reader: Arc<DirectoryReader>,
        previous: Option<&Arc<DirectoryReader>>,
    ) -> BoxResult<IndexSearcher> {
        self(reader, previous)
    }
}
