//! Course synchronizer
//!
//! Translates a validated course row into storage writes: the course item
//! itself, the teacher identity, ordered module terms, unordered categories,
//! the thumbnail and the course-level metadata.

use sqlx::SqlitePool;
use tracing::debug;

use crate::db::{content, terms, users};
use crate::models::EntityModel;
use crate::schema::EntityKind;
use crate::services::{
    apply_thumbnail, resolve_thumbnail, split_list, IdResolver, SyncError, SyncOutcome,
};

pub struct CourseSynchronizer<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CourseSynchronizer<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn sync(
        &self,
        model: &mut EntityModel,
        resolver: &mut IdResolver,
    ) -> Result<SyncOutcome, SyncError> {
        // Media must resolve before the course is written
        let thumbnail = resolve_thumbnail(self.pool, model, "image").await?;

        let author_id = match model.get_str("teacher username").filter(|s| !s.is_empty()) {
            Some(username) => {
                let email = model.get_str("teacher email");
                Some(
                    users::get_or_create(self.pool, &username, email.as_deref(), "teacher")
                        .await?,
                )
            }
            None => None,
        };

        let fields = content::ContentFields {
            title: model.get_str("course"),
            slug: model.slug(),
            content: model.get_str("description"),
            excerpt: model.get_str("excerpt"),
            author_id,
            ..Default::default()
        };

        let created = model.is_new();
        let id = content::upsert_item(self.pool, "course", model.internal_id(), &fields).await?;

        // Modules are ordered: the list fully replaces the stored order
        if model.has_column("modules") {
            let names = split_list(&model.get_str("modules").unwrap_or_default());
            let mut term_ids = Vec::with_capacity(names.len());
            for name in &names {
                term_ids.push(terms::get_or_create(self.pool, "module", name).await?.id);
            }
            terms::set_item_terms(self.pool, id, "module", &term_ids, true).await?;
        }

        if model.has_column("categories") {
            let names = split_list(&model.get_str("categories").unwrap_or_default());
            let mut term_ids = Vec::with_capacity(names.len());
            for name in &names {
                term_ids.push(
                    terms::get_or_create(self.pool, "course-category", name)
                        .await?
                        .id,
                );
            }
            terms::set_item_terms(self.pool, id, "course-category", &term_ids, false).await?;
        }

        // Prerequisite references another course's import id. The sheet may
        // list courses in any order, so a miss is a warning rather than an
        // error; a re-run resolves it.
        if let Some(prerequisite) = model.get_str("prerequisite").filter(|s| !s.is_empty()) {
            match resolver.resolve(EntityKind::Course, &prerequisite) {
                Some(other) => {
                    content::set_meta(self.pool, id, "_course_prerequisite", &other.to_string())
                        .await?;
                }
                None => model.push_warning(
                    "prerequisite",
                    format!(
                        "Course \"{}\" has not been imported yet; prerequisite skipped",
                        prerequisite
                    ),
                ),
            }
        }

        if let Some(featured) = model.get_bool("featured") {
            content::set_meta(self.pool, id, "_course_featured", bool_meta(featured)).await?;
        }
        if let Some(notifications) = model.get_bool("notifications") {
            content::set_meta(self.pool, id, "_course_notifications", bool_meta(notifications))
                .await?;
        }
        if let Some(video) = model.get_str("video").filter(|s| !s.is_empty()) {
            content::set_meta(self.pool, id, "_course_video_embed", &video).await?;
        }

        apply_thumbnail(self.pool, id, &thumbnail).await?;

        if let Some(import_id) = model.import_id() {
            resolver.register(EntityKind::Course, &import_id, id);
        }

        debug!(course_id = id, created = created, "Course synchronized");

        Ok(SyncOutcome { id, created })
    }
}

pub(crate) fn bool_meta(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}
