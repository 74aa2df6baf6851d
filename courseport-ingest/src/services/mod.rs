//! Import services: per-entity synchronizers, identifier resolution and the
//! page-driven orchestrator

pub mod course_sync;
pub mod lesson_sync;
pub mod orchestrator;
pub mod question_sync;
pub mod resolver;

pub use course_sync::CourseSynchronizer;
pub use lesson_sync::LessonSynchronizer;
pub use orchestrator::Orchestrator;
pub use question_sync::QuestionSynchronizer;
pub use resolver::IdResolver;

use courseport_common::Error;
use sqlx::SqlitePool;
use thiserror::Error as ThisError;

use crate::db::{content, media};
use crate::models::EntityModel;

/// Row-scoped synchronization failure; never propagates past the row
#[derive(Debug, ThisError)]
pub enum SyncError {
    /// Field-level problem discovered during synchronization
    #[error("{0}")]
    Validation(String),

    /// A referenced entity (course, module, question, media) could not be
    /// resolved
    #[error("{0}")]
    Reference(String),

    /// The storage layer rejected a write
    #[error("Storage error: {0}")]
    Storage(#[from] Error),
}

impl SyncError {
    /// Taxonomy bucket recorded in the job log
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::Validation(_) => "validation",
            SyncError::Reference(_) => "reference",
            SyncError::Storage(_) => "storage",
        }
    }
}

/// Successful synchronization of one row
#[derive(Debug, Clone, Copy)]
pub struct SyncOutcome {
    pub id: i64,
    pub created: bool,
}

/// Split a comma-separated list, honoring double-quoted segments, and trim
/// each entry of surrounding whitespace and quotes
pub(crate) fn split_list(input: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ',' if !in_quotes => {
                items.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    items.push(current);

    items
        .iter()
        .map(|item| trim_quotes(item))
        .filter(|item| !item.is_empty())
        .collect()
}

/// Trim whitespace and one pair of surrounding quotes
pub(crate) fn trim_quotes(input: &str) -> String {
    let trimmed = input.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| {
            trimmed
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
        })
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}

/// Thumbnail change derived from an image column
pub(crate) enum ThumbnailChange {
    /// Column absent from the input row
    Untouched,
    /// Column present but empty: drop the existing thumbnail
    Remove,
    Set(i64),
}

/// Resolve an image/thumbnail column to a media id.
///
/// Runs before the entity itself is written: a value that does not resolve
/// to a usable media object is a hard error and must not leave a partially
/// synchronized row behind.
pub(crate) async fn resolve_thumbnail(
    pool: &SqlitePool,
    model: &EntityModel,
    field: &str,
) -> Result<ThumbnailChange, SyncError> {
    if !model.has_column(field) {
        return Ok(ThumbnailChange::Untouched);
    }

    match model.get_str(field).filter(|s| !s.is_empty()) {
        Some(source) => {
            let mime_types = model
                .schema()
                .field(field)
                .and_then(|rule| rule.mime_types);
            let media_id = media::resolve(pool, &source, mime_types)
                .await
                .map_err(|e| match e {
                    Error::NotFound(message) | Error::InvalidInput(message) => {
                        SyncError::Reference(message)
                    }
                    other => SyncError::Storage(other),
                })?;
            Ok(ThumbnailChange::Set(media_id))
        }
        None => Ok(ThumbnailChange::Remove),
    }
}

/// Apply a resolved thumbnail change to an item
pub(crate) async fn apply_thumbnail(
    pool: &SqlitePool,
    item_id: i64,
    change: &ThumbnailChange,
) -> Result<(), SyncError> {
    match change {
        ThumbnailChange::Untouched => {}
        ThumbnailChange::Remove => {
            content::delete_meta(pool, item_id, "_thumbnail_id").await?;
        }
        ThumbnailChange::Set(media_id) => {
            content::set_meta(pool, item_id, "_thumbnail_id", &media_id.to_string()).await?;
        }
    }
    Ok(())
}
