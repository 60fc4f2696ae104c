use std::fmt::{Display, Formatter, Result as FmtResult};

/// A Term represents a word from text. This is the unit of search, and the key by which documents are
/// updated and deleted.
///
/// A Term consists of two parts: the name of the field that the text occurred in, and the text itself.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Term {
    field: String,
    text: String,
}

impl Term {
    /// Constructs a Term with the given field and text.
    pub fn new(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            text: text.into(),
        }
    }

    /// Returns the field of this term. The field indicates the part of a document which this term came
    /// from.
    #[inline]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the text of this term.
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.field, self.text)
    }
}
