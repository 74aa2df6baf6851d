//! Entity model: one decoded row bound to its schema
//!
//! Built fresh per row, per run. Resolves effective field values
//! (raw value → default → none), knows whether the row refers to a
//! pre-existing content item, and performs aggregate validity checks before
//! a synchronizer is allowed to run.

use std::collections::{HashMap, HashSet};

use courseport_common::slug::slugify;
use courseport_common::Result;
use sqlx::SqlitePool;

use crate::db::content;
use crate::models::record::RawRecord;
use crate::schema::sanitize::{sanitize_field, FieldValue};
use crate::schema::{EntityKind, Schema};

/// Warning queued during sanitization, flushed to the job log once the
/// entity's internal id is known
#[derive(Debug, Clone)]
pub struct PendingWarning {
    pub field: String,
    pub message: String,
}

/// One validated row ready for synchronization
pub struct EntityModel {
    schema: &'static Schema,
    record: RawRecord,
    values: HashMap<&'static str, Option<FieldValue>>,
    pattern_failures: HashSet<&'static str>,
    warnings: Vec<PendingWarning>,
    internal_id: Option<i64>,
    is_new: bool,
}

impl EntityModel {
    /// Sanitize a raw record against its schema and look up whether a
    /// content item with the same slug already exists.
    ///
    /// Columns not named by the schema are dropped silently.
    pub async fn from_record(
        pool: &SqlitePool,
        record: RawRecord,
        schema: &'static Schema,
    ) -> Result<Self> {
        let mut values: HashMap<&'static str, Option<FieldValue>> = HashMap::new();
        let mut pattern_failures = HashSet::new();
        let mut warnings = Vec::new();

        for (name, raw) in record.iter() {
            let Some(rule) = schema.field(name) else {
                continue;
            };
            let sanitized = sanitize_field(raw, rule);
            if let Some(message) = sanitized.warning {
                warnings.push(PendingWarning {
                    field: rule.name.to_string(),
                    message,
                });
            }
            if sanitized.pattern_failed {
                pattern_failures.insert(rule.name);
            }
            values.insert(rule.name, sanitized.value);
        }

        let lookup_slug = values
            .get("slug")
            .and_then(|v| v.as_ref())
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| {
                record
                    .get(schema.column_title)
                    .map(slugify)
                    .filter(|s| !s.is_empty())
            });

        let internal_id = match &lookup_slug {
            Some(slug) => content::find_id_by_slug(pool, schema.item_type, slug).await?,
            None => None,
        };

        Ok(Self {
            schema,
            record,
            values,
            pattern_failures,
            warnings,
            internal_id,
            is_new: internal_id.is_none(),
        })
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    pub fn kind(&self) -> EntityKind {
        self.schema.kind
    }

    /// Internal id of the pre-existing content item, if one was found
    pub fn internal_id(&self) -> Option<i64> {
        self.internal_id
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// True when the column was present in the input row
    pub fn has_column(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// True when the column was present with a usable, non-empty value
    pub fn provided(&self, field: &str) -> bool {
        matches!(self.values.get(field), Some(Some(v)) if !v.is_empty())
    }

    /// Effective value of a field: the sanitized raw value when present and
    /// non-empty; otherwise the schema default, but only for new entities;
    /// otherwise none, which updates read as "leave unchanged".
    pub fn get_value(&self, field: &str) -> Option<FieldValue> {
        if let Some(Some(value)) = self.values.get(field) {
            if !value.is_empty() {
                return Some(value.clone());
            }
        }

        if self.is_new {
            if let Some(rule) = self.schema.field(field) {
                if let Some(default) = &rule.default {
                    if let Some(raw) = default.resolve(&self.record) {
                        return sanitize_field(&raw, rule).value;
                    }
                }
            }
        }

        None
    }

    pub fn get_str(&self, field: &str) -> Option<String> {
        self.get_value(field)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get_value(field).and_then(|v| v.as_bool())
    }

    pub fn get_int(&self, field: &str) -> Option<i64> {
        self.get_value(field).and_then(|v| v.as_int())
    }

    pub fn get_float(&self, field: &str) -> Option<f64> {
        self.get_value(field).and_then(|v| v.as_float())
    }

    /// Human-readable title for log messages
    pub fn title(&self) -> String {
        self.get_str(self.schema.column_title)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "(untitled)".to_string())
    }

    /// Externally supplied import id, if the sheet carries one
    pub fn import_id(&self) -> Option<String> {
        self.get_str(self.schema.column_id)
            .filter(|s| !s.is_empty())
    }

    /// Effective slug for storage (explicit column or derived from title)
    pub fn slug(&self) -> Option<String> {
        self.get_str("slug")
            .filter(|s| !s.is_empty())
            .or_else(|| {
                self.record
                    .get(self.schema.column_title)
                    .map(slugify)
                    .filter(|s| !s.is_empty())
            })
    }

    /// Aggregate validity check; returns the first failing field's problem.
    ///
    /// A field configured with both a default and a pattern whose raw value
    /// failed the pattern is only acceptable when the default can apply
    /// (new entity); on an existing entity the row is rejected rather than
    /// silently leaving the field unchanged.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for rule in self.schema.fields() {
            if rule.required {
                match self.get_value(rule.name) {
                    Some(value) if !value.is_empty() => {}
                    _ => return Err(format!("Required column \"{}\" is empty", rule.name)),
                }
            }

            if let Some(validator) = rule.validator {
                if let Some(value) = self.get_value(rule.name) {
                    if !validator(&value) {
                        return Err(format!(
                            "Column \"{}\" has a value outside the allowed range",
                            rule.name
                        ));
                    }
                }
            }

            if rule.default.is_some()
                && rule.pattern.is_some()
                && self.pattern_failures.contains(rule.name)
                && self.get_value(rule.name).is_none()
            {
                return Err(format!(
                    "Column \"{}\" does not match the expected format, and the default does not apply to an existing {}",
                    rule.name, self.schema.kind
                ));
            }
        }

        Ok(())
    }

    pub fn warnings(&self) -> &[PendingWarning] {
        &self.warnings
    }

    /// Queue an additional warning from a synchronizer
    pub fn push_warning(&mut self, field: &str, message: String) {
        self.warnings.push(PendingWarning {
            field: field.to_string(),
            message,
        });
    }
}
