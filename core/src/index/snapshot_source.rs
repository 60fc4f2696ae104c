use {
    crate::{
        index::{DirectoryReader, IndexWriter},
        LuceneResult,
    },
    std::{fmt::Debug, sync::Arc},
};

/// A strategy for obtaining point-in-time readers of an index.
///
/// Readers returned by [SnapshotSource::open] and [SnapshotSource::open_if_changed] carry one reference
/// owned by the caller.
pub trait SnapshotSource: Debug + Send + Sync {
    /// Opens a reader over the current state.
    fn open(&self) -> LuceneResult<Arc<DirectoryReader>>;

    /// Opens a reader strictly newer than `previous`, or returns `None` if nothing changed.
    fn open_if_changed(&self, previous: &DirectoryReader) -> LuceneResult<Option<Arc<DirectoryReader>>>;

    /// Returns `true` if no newer reader than `reader` could be opened.
    fn is_current(&self, reader: &DirectoryReader) -> LuceneResult<bool>;
}

/// Near-real-time readers that reflect every change, including deletes that are still buffered in the
/// writer. Opening a reader resolves the buffered deletes, which costs time on every reopen.
#[derive(Debug)]
pub struct NrtSnapshots {
    writer: Arc<IndexWriter>,
}

impl NrtSnapshots {
    /// Create a source reading from `writer`.
    pub fn new(writer: Arc<IndexWriter>) -> Self {
        Self {
            writer,
        }
    }
}

impl SnapshotSource for NrtSnapshots {
    fn open(&self) -> LuceneResult<Arc<DirectoryReader>> {
        self.writer.open_reader(true)
    }

    fn open_if_changed(&self, previous: &DirectoryReader) -> LuceneResult<Option<Arc<DirectoryReader>>> {
        self.writer.open_reader_if_changed(previous, true)
    }

    fn is_current(&self, reader: &DirectoryReader) -> LuceneResult<bool> {
        Ok(self.writer.is_reader_current(reader))
    }
}

/// Near-real-time readers that see every added document but may still contain documents whose delete is
/// buffered in the writer. Cheaper to reopen than [NrtSnapshots].
#[derive(Debug)]
pub struct NrtNoDeletesSnapshots {
    writer: Arc<IndexWriter>,
}

impl NrtNoDeletesSnapshots {
    /// Create a source reading from `writer`.
    pub fn new(writer: Arc<IndexWriter>) -> Self {
        Self {
            writer,
        }
    }
}

impl SnapshotSource for NrtNoDeletesSnapshots {
    fn open(&self) -> LuceneResult<Arc<DirectoryReader>> {
        self.writer.open_reader(false)
    }

    fn open_if_changed(&self, previous: &DirectoryReader) -> LuceneResult<Option<Arc<DirectoryReader>>> {
        self.writer.open_reader_if_changed(previous, false)
    }

    fn is_current(&self, reader: &DirectoryReader) -> LuceneResult<bool> {
        Ok(self.writer.is_reader_current(reader))
    }
}

/// Readers over the latest commit only. Uncommitted changes are never visible.
#[derive(Debug)]
pub struct CommitSnapshots {
    writer: Arc<IndexWriter>,
}

impl CommitSnapshots {
    /// Create a source reading the commits of `writer`.
    pub fn new(writer: Arc<IndexWriter>) -> Self {
        Self {
            writer,
        }
    }
}

impl SnapshotSource for CommitSnapshots {
    fn open(&self) -> LuceneResult<Arc<DirectoryReader>> {
        self.writer.open_committed_reader()
    }

    fn open_if_changed(&self, previous: &DirectoryReader) -> LuceneResult<Option<Arc<DirectoryReader>>> {
        self.writer.open_committed_reader_if_changed(previous)
    }

    fn is_current(&self, reader: &DirectoryReader) -> LuceneResult<bool> {
        Ok(self.writer.is_commit_current(reader))
    }
}
