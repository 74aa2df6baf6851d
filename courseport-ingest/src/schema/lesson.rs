//! Lesson sheet schema
//!
//! A lesson row also carries the settings of its paired quiz (passmark,
//! question list, randomization); the lesson synchronizer splits those out.

use super::{EntityKind, FieldKind, FieldRule, Schema, IMAGE_MIME_TYPES};
use crate::models::record::RawRecord;
use crate::schema::sanitize::FieldValue;
use courseport_common::slug::slugify;
use once_cell::sync::Lazy;

fn default_slug(record: &RawRecord) -> Option<String> {
    record
        .get("lesson")
        .map(slugify)
        .filter(|s| !s.is_empty())
}

fn passmark_in_range(value: &FieldValue) -> bool {
    match value {
        FieldValue::Float(f) => (0.0..=100.0).contains(f),
        _ => true,
    }
}

pub(super) static SCHEMA: Lazy<Schema> = Lazy::new(|| Schema {
    kind: EntityKind::Lesson,
    item_type: "lesson",
    column_id: "id",
    column_title: "lesson",
    fields: vec![
        FieldRule::new("id", FieldKind::Text),
        FieldRule::new("lesson", FieldKind::Text).required(),
        FieldRule::new("slug", FieldKind::Slug).default_computed(default_slug),
        FieldRule::new("description", FieldKind::Html),
        FieldRule::new("excerpt", FieldKind::Html),
        FieldRule::new("status", FieldKind::Text)
            .default_const("publish")
            .pattern("^(publish|pending|draft)$"),
        // Import id of the course this lesson belongs to
        FieldRule::new("course", FieldKind::Text),
        // Module name; must already be a module of the referenced course
        FieldRule::new("module", FieldKind::Text),
        // Import id of another lesson
        FieldRule::new("prerequisite", FieldKind::Text),
        FieldRule::new("preview", FieldKind::Bool).default_const("0"),
        FieldRule::new("tags", FieldKind::Text),
        FieldRule::new("image", FieldKind::UrlOrFile).mime_types(IMAGE_MIME_TYPES),
        FieldRule::new("length", FieldKind::Int),
        FieldRule::new("complexity", FieldKind::Text).pattern("^(easy|std|hard)$"),
        FieldRule::new("video", FieldKind::Video),
        FieldRule::new("pass required", FieldKind::Bool),
        FieldRule::new("passmark", FieldKind::Float)
            .default_const("0")
            .validator(passmark_in_range),
        FieldRule::new("num questions", FieldKind::Int),
        FieldRule::new("randomize", FieldKind::Bool).default_const("0"),
        FieldRule::new("auto-grade", FieldKind::Bool).default_const("0"),
        FieldRule::new("quiz reset", FieldKind::Bool).default_const("0"),
        FieldRule::new("allow comments", FieldKind::Bool).default_const("1"),
        // Comma-separated question import ids; list order is the quiz order
        FieldRule::new("questions", FieldKind::Text),
    ],
});
