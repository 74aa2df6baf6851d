//! Course sheet schema

use super::{EntityKind, FieldKind, FieldRule, Schema, IMAGE_MIME_TYPES};
use crate::models::record::RawRecord;
use courseport_common::slug::slugify;
use once_cell::sync::Lazy;

fn default_slug(record: &RawRecord) -> Option<String> {
    record
        .get("course")
        .map(slugify)
        .filter(|s| !s.is_empty())
}

pub(super) static SCHEMA: Lazy<Schema> = Lazy::new(|| Schema {
    kind: EntityKind::Course,
    item_type: "course",
    column_id: "id",
    column_title: "course",
    fields: vec![
        FieldRule::new("id", FieldKind::Text),
        FieldRule::new("course", FieldKind::Text).required(),
        FieldRule::new("slug", FieldKind::Slug).default_computed(default_slug),
        FieldRule::new("description", FieldKind::Html),
        FieldRule::new("excerpt", FieldKind::Html),
        FieldRule::new("teacher username", FieldKind::Username),
        FieldRule::new("teacher email", FieldKind::Email),
        // Comma-separated module names; order in the list is the module order
        FieldRule::new("modules", FieldKind::Text),
        FieldRule::new("categories", FieldKind::Text),
        // Import id of another course
        FieldRule::new("prerequisite", FieldKind::Text),
        FieldRule::new("featured", FieldKind::Bool).default_const("0"),
        FieldRule::new("notifications", FieldKind::Bool).default_const("0"),
        FieldRule::new("image", FieldKind::UrlOrFile).mime_types(IMAGE_MIME_TYPES),
        FieldRule::new("video", FieldKind::Video),
    ],
});
