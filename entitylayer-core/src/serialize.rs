//! Packing and unpacking of typed values into raw documents.
//!
//! [`DocumentWriter`] and [`DocumentReader`] are the only surface through
//! which entity fields touch a raw document. Both are driven by typed
//! [`Key`]s, so a field's wire name and value type are stated exactly once
//! per schema.
//!
//! Writers and readers operate on one document level at a time: a nested
//! composite value packs its own sub-document through its own writer and
//! the result is inserted as a single primitive. Dotted key paths exist
//! only on the query side.
//!
//! # Optional fields
//!
//! Packing an absent optional removes the key entirely instead of writing
//! a null marker, keeping partial documents minimal. On the way back,
//! a missing (or null) key unpacks to `None` for optional fields and fails
//! with `MissingValue` for required ones.

use bson::{Bson, Document};

use crate::error::{MappingError, MappingResult};
use crate::key::Key;
use crate::primitive::Primitive;

/// Builds a raw document field by field.
#[derive(Debug, Default)]
pub struct DocumentWriter {
    document: Document,
}

impl DocumentWriter {
    /// Creates a writer over an empty document.
    pub fn new() -> Self {
        Self { document: Document::new() }
    }

    /// Packs a required value under its key.
    pub fn write<V: Primitive>(&mut self, key: &Key<V>, value: &V) -> &mut Self {
        self.document.insert(key.name(), value.to_primitive());
        self
    }

    /// Packs an optional value; `None` omits the key entirely.
    pub fn write_optional<V: Primitive>(&mut self, key: &Key<V>, value: Option<&V>) -> &mut Self {
        match value {
            Some(value) => self.write(key, value),
            None => {
                self.document.remove(key.name());
                self
            }
        }
    }

    /// Finishes the writer and returns the assembled document.
    pub fn finish(self) -> Document {
        self.document
    }
}

/// Reads typed values out of a raw document.
#[derive(Debug, Clone, Copy)]
pub struct DocumentReader<'a> {
    document: &'a Document,
}

impl<'a> DocumentReader<'a> {
    /// Creates a reader over the given document.
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Whether the document holds a non-null value for the key.
    pub fn contains<V: Primitive>(&self, key: &Key<V>) -> bool {
        !matches!(self.document.get(key.name()), None | Some(Bson::Null))
    }

    /// Unpacks a required value.
    ///
    /// # Errors
    ///
    /// `MissingValue` when the key is absent (or null), or
    /// `MissingOrInvalidValue` when the stored primitive does not match
    /// the key's declared type.
    pub fn read<V: Primitive>(&self, key: &Key<V>) -> MappingResult<V> {
        match self.document.get(key.name()) {
            None | Some(Bson::Null) => {
                Err(MappingError::MissingValue { key: key.name().to_string() })
            }
            Some(value) => {
                V::from_primitive(value.clone()).map_err(|e| e.at_key(key.name()))
            }
        }
    }

    /// Unpacks an optional value; an absent or null key yields `None`.
    ///
    /// # Errors
    ///
    /// `MissingOrInvalidValue` when the key is present but its stored
    /// primitive does not match the key's declared type. A present key of
    /// the wrong shape is never silently dropped.
    pub fn read_optional<V: Primitive>(&self, key: &Key<V>) -> MappingResult<Option<V>> {
        match self.document.get(key.name()) {
            None | Some(Bson::Null) => Ok(None),
            Some(value) => V::from_primitive(value.clone())
                .map(Some)
                .map_err(|e| e.at_key(key.name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME: Key<String> = Key::new("name");
    const AGE: Key<i64> = Key::new("age");
    const NICKNAME: Key<String> = Key::new("nickname");

    #[test]
    fn packing_none_omits_the_key() {
        let mut writer = DocumentWriter::new();
        writer
            .write(&NAME, &"Garfield".to_string())
            .write_optional(&NICKNAME, None);
        let doc = writer.finish();

        assert!(doc.get("name").is_some());
        assert!(doc.get("nickname").is_none());
    }

    #[test]
    fn missing_key_is_none_for_optionals_and_an_error_for_required() {
        let doc = Document::new();
        let reader = DocumentReader::new(&doc);

        assert_eq!(reader.read_optional(&NICKNAME).unwrap(), None);

        match reader.read(&NAME).unwrap_err() {
            MappingError::MissingValue { key } => assert_eq!(key, "name"),
            other => panic!("expected MissingValue, got {other:?}"),
        }
    }

    #[test]
    fn shape_mismatch_names_the_offending_key() {
        let mut doc = Document::new();
        doc.insert("age", "not a number");
        let reader = DocumentReader::new(&doc);

        match reader.read(&AGE).unwrap_err() {
            MappingError::MissingOrInvalidValue { key, .. } => assert_eq!(key, "age"),
            other => panic!("expected MissingOrInvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn present_but_invalid_optional_is_an_error_not_none() {
        let mut doc = Document::new();
        doc.insert("nickname", 3i32);
        let reader = DocumentReader::new(&doc);

        assert!(reader.read_optional(&NICKNAME).is_err());
    }

    #[test]
    fn round_trip_preserves_values() {
        let mut writer = DocumentWriter::new();
        writer
            .write(&NAME, &"Siamese".to_string())
            .write(&AGE, &4i64)
            .write_optional(&NICKNAME, Some(&"Sia".to_string()));
        let doc = writer.finish();

        let reader = DocumentReader::new(&doc);
        assert_eq!(reader.read(&NAME).unwrap(), "Siamese");
        assert_eq!(reader.read(&AGE).unwrap(), 4);
        assert_eq!(reader.read_optional(&NICKNAME).unwrap(), Some("Sia".to_string()));
    }
}
