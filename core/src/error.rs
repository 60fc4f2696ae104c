use {
    crate::index::MAX_DOCS,
    std::{
        error::Error,
        fmt::{Display, Formatter, Result as FmtResult},
    },
};

/// Errors that can occur in Lucene.
#[derive(Debug)]
pub enum LuceneError {
    /// The object (manager, reader, writer, reopen thread, ...) has already been closed.
    AlreadyClosed(String),

    /// A caller passed an argument that can never be valid for the operation.
    IllegalArgument(String),

    /// The object is in a state that does not permit the operation. This usually indicates a
    /// reference counting bug in the caller, such as releasing a searcher twice.
    IllegalState(String),

    /// A [crate::search::SearcherFactory] failed while building or warming a searcher.
    Factory(BoxError),

    /// Too many documents (beyond [crate::index::MAX_DOCS]) were encountered.
    TooManyDocs(u64 /* actual */),
}

impl Display for LuceneError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::AlreadyClosed(message) => write!(f, "Already closed: {message}"),
            Self::IllegalArgument(message) => write!(f, "Illegal argument: {message}"),
            Self::IllegalState(message) => write!(f, "Illegal state: {message}"),
            Self::Factory(cause) => write!(f, "Searcher factory failed: {cause}"),
            Self::TooManyDocs(actual) => write!(f, "Too many docs: {actual} exceeds MAX_DOCS value of {MAX_DOCS}"),
        }
    }
}

impl Error for LuceneError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Factory(cause) => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl LuceneError {
    /// Returns `true` if this is an [LuceneError::AlreadyClosed] error.
    #[inline]
    pub fn is_already_closed(&self) -> bool {
        matches!(self, Self::AlreadyClosed(_))
    }

    /// Returns `true` if this is an [LuceneError::IllegalState] error.
    #[inline]
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState(_))
    }

    /// Returns `true` if this is an [LuceneError::IllegalArgument] error.
    #[inline]
    pub fn is_illegal_argument(&self) -> bool {
        matches!(self, Self::IllegalArgument(_))
    }
}

/// A type alias for any kind of error. The error is boxed and must be `Send`, `Sync`, and `'static`.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// A type alias for a `Result` with a [BoxError].
pub type BoxResult<T> = Result<T, BoxError>;

/// A type alias for a `Result` with a [LuceneError].
pub type LuceneResult<T> = Result<T, LuceneError>;
