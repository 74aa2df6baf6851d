//! Question sheet schema

use super::{EntityKind, FieldKind, FieldRule, Schema};
use crate::models::record::RawRecord;
use crate::schema::sanitize::FieldValue;
use courseport_common::slug::slugify;
use once_cell::sync::Lazy;

fn default_slug(record: &RawRecord) -> Option<String> {
    record
        .get("question")
        .map(slugify)
        .filter(|s| !s.is_empty())
}

fn grade_non_negative(value: &FieldValue) -> bool {
    match value {
        FieldValue::Int(i) => *i >= 0,
        _ => true,
    }
}

pub(super) static SCHEMA: Lazy<Schema> = Lazy::new(|| Schema {
    kind: EntityKind::Question,
    item_type: "question",
    column_id: "id",
    column_title: "question",
    fields: vec![
        FieldRule::new("id", FieldKind::Text),
        FieldRule::new("question", FieldKind::Text).required(),
        FieldRule::new("slug", FieldKind::Slug).default_computed(default_slug),
        // Answer encoding depends on "type"; parsed by the synchronizer
        FieldRule::new("answer", FieldKind::Text).required(),
        FieldRule::new("type", FieldKind::Slug)
            .default_const("multiple-choice")
            .pattern("^(multiple-choice|boolean|gap-fill|single-line|multi-line|file-upload)$"),
        FieldRule::new("grade", FieldKind::Int)
            .default_const("1")
            .validator(grade_non_negative),
        FieldRule::new("random order", FieldKind::Bool).default_const("0"),
        FieldRule::new("media", FieldKind::UrlOrFile),
        FieldRule::new("categories", FieldKind::Text),
        FieldRule::new("feedback", FieldKind::Text),
        FieldRule::new("text before gap", FieldKind::Text),
        FieldRule::new("gap", FieldKind::Text),
        FieldRule::new("text after gap", FieldKind::Text),
        FieldRule::new("upload notes", FieldKind::Text),
        FieldRule::new("teacher notes", FieldKind::Text),
    ],
});
