//! Lesson synchronizer
//!
//! A lesson row produces a lesson item plus its paired quiz (one per
//! lesson, created transparently on first sync). All cross-references
//! (course, module, question list) are resolved before the first write so a
//! row with a bad reference leaves nothing behind.

use sqlx::SqlitePool;
use tracing::debug;

use courseport_common::slug::slugify;

use crate::db::{content, quiz, terms};
use crate::models::EntityModel;
use crate::schema::EntityKind;
use crate::services::course_sync::bool_meta;
use crate::services::{
    apply_thumbnail, resolve_thumbnail, split_list, IdResolver, SyncError, SyncOutcome,
};

pub struct LessonSynchronizer<'a> {
    pool: &'a SqlitePool,
}

impl<'a> LessonSynchronizer<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn sync(
        &self,
        model: &mut EntityModel,
        resolver: &mut IdResolver,
    ) -> Result<SyncOutcome, SyncError> {
        // Resolve every reference up front; hard errors must not leave a
        // partially written lesson behind.
        let course_id = match model.get_str("course").filter(|s| !s.is_empty()) {
            Some(reference) => Some(
                resolver
                    .resolve(EntityKind::Course, &reference)
                    .ok_or_else(|| {
                        SyncError::Reference(format!(
                            "Course \"{}\" was not found in this import",
                            reference
                        ))
                    })?,
            ),
            None => None,
        };

        let module_term = match model.get_str("module").filter(|s| !s.is_empty()) {
            Some(name) => {
                let Some(course_id) = course_id else {
                    return Err(SyncError::Reference(format!(
                        "Module \"{}\" requires the lesson to reference a course",
                        name
                    )));
                };
                let term = terms::find_by_slug(self.pool, "module", &slugify(&name))
                    .await?
                    .ok_or_else(|| {
                        SyncError::Reference(format!("Module \"{}\" does not exist", name))
                    })?;
                if !terms::item_has_term(self.pool, course_id, term.id).await? {
                    return Err(SyncError::Reference(format!(
                        "Module \"{}\" does not belong to the lesson's course",
                        name
                    )));
                }
                Some(term)
            }
            None => None,
        };

        // Quiz pass settings travel as a pair
        if model.provided("pass required") != model.provided("passmark") {
            return Err(SyncError::Validation(
                "\"pass required\" and \"passmark\" must be supplied together".to_string(),
            ));
        }

        let question_ids = match model.has_column("questions") {
            true => {
                let references = split_list(&model.get_str("questions").unwrap_or_default());
                let mut ids = Vec::with_capacity(references.len());
                for reference in &references {
                    ids.push(
                        resolver
                            .resolve(EntityKind::Question, reference)
                            .ok_or_else(|| {
                                SyncError::Reference(format!(
                                    "Question \"{}\" was not found in this import",
                                    reference
                                ))
                            })?,
                    );
                }
                Some(ids)
            }
            false => None,
        };

        let thumbnail = resolve_thumbnail(self.pool, model, "image").await?;

        let fields = content::ContentFields {
            title: model.get_str("lesson"),
            slug: model.slug(),
            content: model.get_str("description"),
            excerpt: model.get_str("excerpt"),
            status: model.get_str("status"),
            ..Default::default()
        };

        let created = model.is_new();
        let id = content::upsert_item(self.pool, "lesson", model.internal_id(), &fields).await?;

        if let Some(course_id) = course_id {
            content::set_meta(self.pool, id, "_lesson_course", &course_id.to_string()).await?;
        }

        if let Some(term) = module_term {
            terms::set_item_terms(self.pool, id, "module", &[term.id], false).await?;
        }

        if model.has_column("tags") {
            let names = split_list(&model.get_str("tags").unwrap_or_default());
            let mut term_ids = Vec::with_capacity(names.len());
            for name in &names {
                term_ids.push(terms::get_or_create(self.pool, "lesson-tag", name).await?.id);
            }
            terms::set_item_terms(self.pool, id, "lesson-tag", &term_ids, false).await?;
        }

        // Lesson prerequisite is resolved against lessons seen so far;
        // a miss is reported but does not reject the row
        if let Some(prerequisite) = model.get_str("prerequisite").filter(|s| !s.is_empty()) {
            match resolver.resolve(EntityKind::Lesson, &prerequisite) {
                Some(other) => {
                    content::set_meta(self.pool, id, "_lesson_prerequisite", &other.to_string())
                        .await?;
                }
                None => model.push_warning(
                    "prerequisite",
                    format!(
                        "Lesson \"{}\" has not been imported yet; prerequisite skipped",
                        prerequisite
                    ),
                ),
            }
        }

        if let Some(preview) = model.get_bool("preview") {
            content::set_meta(self.pool, id, "_lesson_preview", bool_meta(preview)).await?;
        }
        if let Some(length) = model.get_int("length") {
            content::set_meta(self.pool, id, "_lesson_length", &length.to_string()).await?;
        }
        if let Some(complexity) = model.get_str("complexity").filter(|s| !s.is_empty()) {
            content::set_meta(self.pool, id, "_lesson_complexity", &complexity).await?;
        }
        if let Some(video) = model.get_str("video").filter(|s| !s.is_empty()) {
            content::set_meta(self.pool, id, "_lesson_video_embed", &video).await?;
        }
        if let Some(allow_comments) = model.get_bool("allow comments") {
            content::set_meta(self.pool, id, "_allow_comments", bool_meta(allow_comments)).await?;
        }

        apply_thumbnail(self.pool, id, &thumbnail).await?;

        let quiz_id = self.sync_quiz(model, id, &fields).await?;

        if let Some(ids) = question_ids {
            quiz::set_question_order(self.pool, quiz_id, &ids).await?;
        }

        if let Some(import_id) = model.import_id() {
            resolver.register(EntityKind::Lesson, &import_id, id);
        }

        debug!(lesson_id = id, quiz_id = quiz_id, created = created, "Lesson synchronized");

        Ok(SyncOutcome { id, created })
    }

    /// Create or update the lesson's paired quiz and its settings
    async fn sync_quiz(
        &self,
        model: &EntityModel,
        lesson_id: i64,
        lesson_fields: &content::ContentFields,
    ) -> Result<i64, SyncError> {
        let existing = quiz::find_for_lesson(self.pool, lesson_id).await?;
        let quiz_fields = content::ContentFields {
            title: lesson_fields.title.clone(),
            slug: lesson_fields.slug.clone(),
            status: lesson_fields.status.clone(),
            parent_id: Some(lesson_id),
            ..Default::default()
        };
        let quiz_id = content::upsert_item(self.pool, "quiz", existing, &quiz_fields).await?;

        if let Some(pass_required) = model.get_bool("pass required") {
            content::set_meta(self.pool, quiz_id, "_pass_required", bool_meta(pass_required))
                .await?;
        }
        if let Some(passmark) = model.get_float("passmark") {
            content::set_meta(self.pool, quiz_id, "_quiz_passmark", &passmark.to_string())
                .await?;
        }
        if let Some(num_questions) = model.get_int("num questions") {
            content::set_meta(self.pool, quiz_id, "_show_questions", &num_questions.to_string())
                .await?;
        }
        if let Some(randomize) = model.get_bool("randomize") {
            content::set_meta(
                self.pool,
                quiz_id,
                "_random_question_order",
                bool_meta(randomize),
            )
            .await?;
        }
        if let Some(auto_grade) = model.get_bool("auto-grade") {
            content::set_meta(
                self.pool,
                quiz_id,
                "_quiz_grade_type",
                if auto_grade { "auto" } else { "manual" },
            )
            .await?;
        }
        if let Some(reset) = model.get_bool("quiz reset") {
            content::set_meta(self.pool, quiz_id, "_enable_quiz_reset", bool_meta(reset)).await?;
        }

        Ok(quiz_id)
    }
}
