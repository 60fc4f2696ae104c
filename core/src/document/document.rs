use {
    crate::document::Field,
    std::{
        fmt::{Display, Formatter, Result as FmtResult},
        slice::Iter as SliceIter,
    },
};

/// Documents are the unit of indexing and search.
///
/// A Document is a set of fields. Each field has a name and a textual value. Each document should
/// typically contain one or more fields which uniquely identify it, so that it can later be updated
/// or deleted by [crate::index::Term].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Document {
    fields: Vec<Field>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate over the fields of the document in the order they were added.
    pub fn iter(&self) -> SliceIter<'_, Field> {
        self.fields.iter()
    }

    /// Adds a field to a document. Several fields may be added with the same name. In this case, if
    /// the fields are indexed, their text is treated as though appended for the purposes of search.
    ///
    /// Note that add like the remove_field(s) methods only makes sense prior to adding a document to
    /// an index. These methods cannot be used to change the content of an existing index! In order to
    /// achieve this, a document has to be deleted from an index and a new changed version of that
    /// document has to be added.
    pub fn add(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Builder-style variant of [Document::add].
    pub fn with(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Removes field with the specified name from the document. If multiple fields exist with this
    /// name, this method removes the first field that has been added. If there is no field with the
    /// specified name, the document remains unchanged.
    ///
    /// Returns `true` if a field has been removed, `false` otherwise.
    pub fn remove_field(&mut self, name: &str) -> bool {
        match self.fields.iter().position(|field| field.name() == name) {
            Some(i) => {
                self.fields.remove(i);
                true
            }
            None => false,
        }
    }

    /// Removes all fields with the given name from the document. Returns the number of fields removed.
    pub fn remove_fields(&mut self, name: &str) -> usize {
        let start_size = self.fields.len();
        self.fields.retain(|field| field.name() != name);
        start_size - self.fields.len()
    }

    /// Returns a Vec of all the fields in a document.
    pub fn get_fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the values of all fields with the given name.
    pub fn get_values(&self, name: &str) -> Vec<&str> {
        self.fields.iter().filter(|field| field.name() == name).map(|field| field.string_value()).collect()
    }

    /// Returns the value of the first field with the given name, or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|field| field.name() == name).map(|field| field.string_value())
    }

    /// Returns `true` if any field named `name` indexes the term `text`.
    pub fn has_term(&self, name: &str, text: &str) -> bool {
        self.fields.iter().any(|field| field.name() == name && field.has_term(text))
    }

    /// Removes all fields from the document.
    pub fn clear(&mut self) {
        self.fields.clear();
    }
}

impl Display for Document {
    /// Prints the fields of a document for human consumption.
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Document<")?;

        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }

            write!(f, "{}", field)?;
        }

        write!(f, ">")
    }
}

#[cfg(test)]
mod tests {
    use {
        crate::document::{Document, Field},
        pretty_assertions::assert_eq,
        test_log::test,
    };

    #[test]
    fn test_terms() {
        let doc = Document::new().with(Field::string("id", "doc-1")).with(Field::text("body", "the united states"));
        assert!(doc.has_term("id", "doc-1"));
        assert!(!doc.has_term("id", "doc"));
        assert!(doc.has_term("body", "united"));
        assert!(!doc.has_term("body", "the united"));
        assert!(!doc.has_term("title", "united"));
    }

    #[test]
    fn test_remove_fields() {
        let mut doc = Document::new()
            .with(Field::string("id", "1"))
            .with(Field::text("body", "a"))
            .with(Field::text("body", "b"));
        assert!(doc.remove_field("id"));
        assert!(!doc.remove_field("id"));
        assert_eq!(doc.get_values("body"), vec!["a", "b"]);
        assert_eq!(doc.remove_fields("body"), 2);
        assert_eq!(doc.to_string(), "Document<>");
    }
}
