use std::fmt::{Display, Formatter, Result as FmtResult};

/// How the value of a [Field] is turned into terms.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FieldKind {
    /// The entire value is indexed as a single term. Useful for identifiers.
    String,

    /// The value is split on whitespace and each token is indexed as a term.
    Text,
}

/// A named value inside a [crate::document::Document].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Field {
    name: String,
    value: String,
    kind: FieldKind,
}

impl Field {
    /// Create a field whose whole value is indexed as a single term.
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind: FieldKind::String,
        }
    }

    /// Create a field whose value is split into whitespace-separated terms.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind: FieldKind::Text,
        }
    }

    /// Returns the name of the field.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stored value of the field.
    #[inline]
    pub fn string_value(&self) -> &str {
        &self.value
    }

    /// Returns how the field is indexed.
    #[inline]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Returns `true` if this field produces the term `text` when indexed.
    pub fn has_term(&self, text: &str) -> bool {
        match self.kind {
            FieldKind::String => self.value == text,
            FieldKind::Text => self.value.split_whitespace().any(|token| token == text),
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.kind {
            FieldKind::String => write!(f, "string<{}:{}>", self.name, self.value),
            FieldKind::Text => write!(f, "text<{}:{}>", self.name, self.value),
        }
    }
}
