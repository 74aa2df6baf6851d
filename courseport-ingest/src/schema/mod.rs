//! Declarative import schemas
//!
//! One schema per entity type. A schema is pure data: the set of columns the
//! importer understands, each with a data type, requiredness, optional
//! default, optional validation pattern and optional custom validator.
//! Schemas are built once behind `Lazy` and never mutated.

pub mod sanitize;

mod course;
mod lesson;
mod question;

use crate::models::record::RawRecord;
use regex::Regex;
use sanitize::FieldValue;
use serde::{Deserialize, Serialize};

/// Entity types accepted by the importer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Course,
    Lesson,
    Question,
}

impl EntityKind {
    /// Sheet processing order: lessons reference both course and question
    /// import ids, so those sheets must land first.
    pub const SHEET_ORDER: [EntityKind; 3] =
        [EntityKind::Course, EntityKind::Question, EntityKind::Lesson];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Course => "course",
            EntityKind::Lesson => "lesson",
            EntityKind::Question => "question",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "course" => Some(EntityKind::Course),
            "lesson" => Some(EntityKind::Lesson),
            "question" => Some(EntityKind::Question),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data type of a schema field; drives sanitization behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain text, tags stripped
    Text,
    /// Text run through the restricted-HTML sanitizer
    Html,
    Int,
    Float,
    /// Accepts exactly "0", "1", "true", "false"
    Bool,
    Slug,
    Email,
    /// Absolute URL kept as-is, anything else treated as a media filename
    UrlOrFile,
    Username,
    /// Embed-safe HTML (iframes and media elements allowed)
    Video,
}

/// Default value applied to newly created entities
pub enum FieldDefault {
    Const(&'static str),
    /// Computed from the rest of the record
    Computed(fn(&RawRecord) -> Option<String>),
}

impl FieldDefault {
    pub fn resolve(&self, record: &RawRecord) -> Option<String> {
        match self {
            FieldDefault::Const(value) => Some((*value).to_string()),
            FieldDefault::Computed(f) => f(record),
        }
    }
}

impl std::fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldDefault::Const(value) => write!(f, "Const({:?})", value),
            FieldDefault::Computed(_) => write!(f, "Computed(..)"),
        }
    }
}

/// One column definition inside a schema
#[derive(Debug)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<FieldDefault>,
    pub pattern: Option<Regex>,
    pub validator: Option<fn(&FieldValue) -> bool>,
    pub mime_types: Option<&'static [&'static str]>,
}

impl FieldRule {
    pub fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
            pattern: None,
            validator: None,
            mime_types: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_const(mut self, value: &'static str) -> Self {
        self.default = Some(FieldDefault::Const(value));
        self
    }

    pub fn default_computed(mut self, f: fn(&RawRecord) -> Option<String>) -> Self {
        self.default = Some(FieldDefault::Computed(f));
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(Regex::new(pattern).expect("schema pattern must compile"));
        self
    }

    pub fn validator(mut self, f: fn(&FieldValue) -> bool) -> Self {
        self.validator = Some(f);
        self
    }

    pub fn mime_types(mut self, mime_types: &'static [&'static str]) -> Self {
        self.mime_types = Some(mime_types);
        self
    }
}

/// Immutable schema for one entity type
#[derive(Debug)]
pub struct Schema {
    pub kind: EntityKind,
    /// Content-type string used by the storage layer
    pub item_type: &'static str,
    /// Column holding the externally supplied import id
    pub column_id: &'static str,
    /// Column holding the human-readable title, used for error reporting
    /// and slug derivation
    pub column_title: &'static str,
    fields: Vec<FieldRule>,
}

impl Schema {
    pub fn for_kind(kind: EntityKind) -> &'static Schema {
        use once_cell::sync::Lazy;
        match kind {
            EntityKind::Course => Lazy::force(&course::SCHEMA),
            EntityKind::Lesson => Lazy::force(&lesson::SCHEMA),
            EntityKind::Question => Lazy::force(&question::SCHEMA),
        }
    }

    pub fn fields(&self) -> &[FieldRule] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldRule> {
        self.fields.iter().filter(|f| f.required)
    }

    pub fn optional_fields(&self) -> impl Iterator<Item = &FieldRule> {
        self.fields.iter().filter(|f| !f.required)
    }
}

/// Mime types accepted for thumbnail images
pub const IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_schema() {
        for kind in EntityKind::SHEET_ORDER {
            let schema = Schema::for_kind(kind);
            assert_eq!(schema.kind, kind);
            assert!(schema.field(schema.column_id).is_some());
            assert!(schema.field(schema.column_title).is_some());
        }
    }

    #[test]
    fn title_columns_are_required() {
        for kind in EntityKind::SHEET_ORDER {
            let schema = Schema::for_kind(kind);
            assert!(
                schema.field(schema.column_title).unwrap().required,
                "{} title must be required",
                kind
            );
        }
    }

    #[test]
    fn required_and_optional_partition_fields() {
        let schema = Schema::for_kind(EntityKind::Lesson);
        let total = schema.required_fields().count() + schema.optional_fields().count();
        assert_eq!(total, schema.fields().len());
    }

    #[test]
    fn entity_kind_round_trips() {
        for kind in EntityKind::SHEET_ORDER {
            assert_eq!(EntityKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EntityKind::parse("quiz"), None);
    }
}
