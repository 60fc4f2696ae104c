use {
    crate::{
        index::{CommitSnapshots, DirectoryReader, IndexWriter, NrtNoDeletesSnapshots, NrtSnapshots, SnapshotSource},
        search::{IndexSearcher, ReferenceManager, RefreshStrategy, SearcherFactory},
        LuceneError, LuceneResult,
    },
    log::{debug, error},
    std::{
        fmt::{Debug, Formatter, Result as FmtResult},
        ops::Deref,
        sync::Arc,
    },
};

/// Utility class to safely share [IndexSearcher] instances across multiple threads, while periodically
/// reopening.
///
/// This dereferences to a [ReferenceManager]; use its [ReferenceManager::acquire] and
/// [ReferenceManager::release] methods to obtain and release searchers, and
/// [ReferenceManager::maybe_refresh] to reopen. In most cases you'll want to perform the refresh from a
/// separate thread such as a [crate::search::ControlledRealTimeReopenThread].
///
/// ```
/// use lucene_nrt::{
///     document::{Document, Field},
///     index::{IndexWriter, Term},
///     search::{DefaultSearcherFactory, SearcherManager},
/// };
/// use std::sync::Arc;
///
/// let writer = Arc::new(IndexWriter::default());
/// let manager = SearcherManager::from_writer(Arc::clone(&writer), true, Arc::new(DefaultSearcherFactory)).unwrap();
/// writer.add_document(Document::new().with(Field::string("id", "1"))).unwrap();
/// manager.maybe_refresh().unwrap();
///
/// let searcher = manager.acquire_guard().unwrap();
/// assert_eq!(searcher.count(&Term::new("id", "1")), 1);
/// ```
pub struct SearcherManager {
    manager: Arc<ReferenceManager<IndexSearcher>>,
    source: Arc<dyn SnapshotSource>,
}

impl Debug for SearcherManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SearcherManager").field("manager", &self.manager).field("source", &self.source).finish()
    }
}

impl SearcherManager {
    /// Creates a searcher manager reading snapshots from `source`.
    ///
    /// The initial searcher is built from [SnapshotSource::open] with `factory`. Fails if the snapshot cannot be
    /// opened, the factory fails, or the factory returns a searcher over a different reader.
    pub fn new(source: Arc<dyn SnapshotSource>, factory: Arc<dyn SearcherFactory>) -> LuceneResult<Self> {
        let searcher = get_searcher(factory.as_ref(), source.open()?, None)?;
        let strategy = SearcherRefresh {
            source: Arc::clone(&source),
            factory,
        };

        Ok(Self {
            manager: Arc::new(ReferenceManager::new(searcher, strategy)),
            source,
        })
    }

    /// Creates a near-real-time searcher manager over `writer`.
    ///
    /// With `apply_all_deletes` set, every reopen resolves the deletes buffered in the writer so searchers never
    /// see deleted documents. Without it reopening is cheaper, but searchers may still return documents whose
    /// delete has not been applied yet.
    pub fn from_writer(
        writer: Arc<IndexWriter>,
        apply_all_deletes: bool,
        factory: Arc<dyn SearcherFactory>,
    ) -> LuceneResult<Self> {
        let source: Arc<dyn SnapshotSource> = if apply_all_deletes {
            Arc::new(NrtSnapshots::new(writer))
        } else {
            Arc::new(NrtNoDeletesSnapshots::new(writer))
        };
        Self::new(source, factory)
    }

    /// Creates a searcher manager that only sees what has been committed through `writer`.
    pub fn from_commits(writer: Arc<IndexWriter>, factory: Arc<dyn SearcherFactory>) -> LuceneResult<Self> {
        Self::new(Arc::new(CommitSnapshots::new(writer)), factory)
    }

    /// Returns the shared [ReferenceManager], e.g. to hand to a
    /// [crate::search::ControlledRealTimeReopenThread].
    #[inline]
    pub fn reference_manager(&self) -> Arc<ReferenceManager<IndexSearcher>> {
        Arc::clone(&self.manager)
    }

    /// Returns `true` if no changes have occurred since the current searcher was opened.
    pub fn is_searcher_current(&self) -> LuceneResult<bool> {
        let searcher = self.manager.acquire_guard()?;
        self.source.is_current(searcher.reader())
    }
}

impl Deref for SearcherManager {
    type Target = ReferenceManager<IndexSearcher>;

    #[inline]
    fn deref(&self) -> &ReferenceManager<IndexSearcher> {
        &self.manager
    }
}

/// Reopens the current reader and wraps the result with the factory.
struct SearcherRefresh {
    source: Arc<dyn SnapshotSource>,
    factory: Arc<dyn SearcherFactory>,
}

impl RefreshStrategy<IndexSearcher> for SearcherRefresh {
    fn refresh_if_needed(&self, current: &Arc<IndexSearcher>) -> LuceneResult<Option<Arc<IndexSearcher>>> {
        let previous = current.reader();
        match self.source.open_if_changed(previous)? {
            None => Ok(None),
            Some(reader) => {
                debug!("Reopened {:?} at version {} (was {})", reader.id(), reader.version(), previous.version());
                get_searcher(self.factory.as_ref(), reader, Some(previous)).map(Some)
            }
        }
    }
}

/// Builds a searcher over `reader` with `factory`, taking over the reader's reference. On failure the reader
/// is released.
fn get_searcher(
    factory: &dyn SearcherFactory,
    reader: Arc<DirectoryReader>,
    previous: Option<&Arc<DirectoryReader>>,
) -> LuceneResult<Arc<IndexSearcher>> {
    let searcher = match factory.new_searcher(Arc::clone(&reader), previous) {
        Ok(searcher) => searcher,
        Err(e) => {
            release_reader(&reader);
            return Err(LuceneError::Factory(e));
        }
    };

    if !Arc::ptr_eq(searcher.reader(), &reader) {
        release_reader(&reader);
        release_reader(searcher.reader());
        return Err(LuceneError::IllegalState(format!(
            "SearcherFactory must wrap exactly the provided reader (got {:?} but expected {:?})",
            searcher.reader().id(),
            reader.id()
        )));
    }

    Ok(Arc::new(searcher))
}

fn release_reader(reader: &DirectoryReader) {
    if let Err(e) = reader.dec_ref() {
        error!("Failed to release reader {:?}: {e}", reader.id());
    }
}
