//! Question synchronizer
//!
//! Derives the internal answer-storage shape from the declared question
//! type, then upserts the question item with its metadata and categories.

use sqlx::SqlitePool;
use tracing::debug;

use crate::db::{content, media, terms};
use crate::models::EntityModel;
use crate::schema::EntityKind;
use crate::services::course_sync::bool_meta;
use crate::services::{split_list, trim_quotes, IdResolver, SyncError, SyncOutcome};

/// Answers parsed from a multiple-choice answer list
#[derive(Debug, Default, PartialEq)]
pub struct ParsedAnswers {
    pub right: Vec<String>,
    pub wrong: Vec<String>,
    /// Entries with neither prefix; reported as warnings
    pub unlabeled: Vec<String>,
}

/// Parse a `right:`/`wrong:` prefixed answer list.
///
/// Prefixes match case-insensitively; values are trimmed of surrounding
/// quotes and whitespace. A list with no right answer is a hard error.
pub fn parse_multiple_choice(answer: &str) -> Result<ParsedAnswers, SyncError> {
    let mut parsed = ParsedAnswers::default();

    for entry in split_list(answer) {
        let lower = entry.to_lowercase();
        if lower.starts_with("right:") {
            parsed.right.push(trim_quotes(&entry["right:".len()..]));
        } else if lower.starts_with("wrong:") {
            parsed.wrong.push(trim_quotes(&entry["wrong:".len()..]));
        } else {
            parsed.unlabeled.push(entry);
        }
    }

    if parsed.right.is_empty() {
        return Err(SyncError::Validation(
            "A multiple-choice question needs at least one \"right:\" answer".to_string(),
        ));
    }

    Ok(parsed)
}

/// Map a boolean question's answer token
fn parse_boolean_answer(answer: &str) -> Result<bool, SyncError> {
    match answer.trim().to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(SyncError::Validation(format!(
            "\"{}\" is not a valid boolean answer (use true or false)",
            other
        ))),
    }
}

/// Segment separator used by the gap-fill storage format
const GAP_SEPARATOR: &str = "||";

pub struct QuestionSynchronizer<'a> {
    pool: &'a SqlitePool,
}

impl<'a> QuestionSynchronizer<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn sync(
        &self,
        model: &mut EntityModel,
        resolver: &mut IdResolver,
    ) -> Result<SyncOutcome, SyncError> {
        let answer = model.get_str("answer").unwrap_or_default();
        let question_type = match model.get_str("type").filter(|s| !s.is_empty()) {
            Some(t) => t,
            // Updates may omit the type column; fall back to the stored type
            None => match model.internal_id() {
                Some(id) => content::get_meta(self.pool, id, "_question_type")
                    .await?
                    .unwrap_or_else(|| "multiple-choice".to_string()),
                None => "multiple-choice".to_string(),
            },
        };

        // Parse answers before any write so a bad row leaves nothing behind
        enum AnswerShape {
            Choice(ParsedAnswers),
            Boolean(bool),
            GapFill(String),
            Raw(String),
        }

        let shape = match question_type.as_str() {
            "multiple-choice" => {
                let parsed = parse_multiple_choice(&answer)?;
                for entry in &parsed.unlabeled {
                    model.push_warning(
                        "answer",
                        format!(
                            "\"{}\" has neither a \"right:\" nor a \"wrong:\" prefix and was skipped",
                            entry
                        ),
                    );
                }
                AnswerShape::Choice(parsed)
            }
            "boolean" => AnswerShape::Boolean(parse_boolean_answer(&answer)?),
            "gap-fill" => {
                let before = model.get_str("text before gap").unwrap_or_default();
                let gap = model
                    .get_str("gap")
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| answer.clone());
                let after = model.get_str("text after gap").unwrap_or_default();
                AnswerShape::GapFill(format!(
                    "{}{}{}{}{}",
                    before, GAP_SEPARATOR, gap, GAP_SEPARATOR, after
                ))
            }
            // single-line, multi-line, file-upload store the raw text
            _ => AnswerShape::Raw(answer.clone()),
        };

        let fields = content::ContentFields {
            title: model.get_str("question"),
            slug: model.slug(),
            ..Default::default()
        };

        let created = model.is_new();
        let id = content::upsert_item(self.pool, "question", model.internal_id(), &fields).await?;

        content::set_meta(self.pool, id, "_question_type", &question_type).await?;

        match shape {
            AnswerShape::Choice(parsed) => {
                let right = serde_json::to_string(&parsed.right)
                    .map_err(|e| SyncError::Validation(format!("Unstorable answers: {}", e)))?;
                let wrong = serde_json::to_string(&parsed.wrong)
                    .map_err(|e| SyncError::Validation(format!("Unstorable answers: {}", e)))?;
                content::set_meta(self.pool, id, "_question_right_answers", &right).await?;
                content::set_meta(self.pool, id, "_question_wrong_answers", &wrong).await?;
                content::set_meta(
                    self.pool,
                    id,
                    "_right_answer_count",
                    &parsed.right.len().to_string(),
                )
                .await?;
                content::set_meta(
                    self.pool,
                    id,
                    "_wrong_answer_count",
                    &parsed.wrong.len().to_string(),
                )
                .await?;
            }
            AnswerShape::Boolean(value) => {
                content::set_meta(self.pool, id, "_question_answer", bool_meta(value)).await?;
            }
            AnswerShape::GapFill(stored) => {
                content::set_meta(self.pool, id, "_question_gap_fill", &stored).await?;
            }
            AnswerShape::Raw(text) => {
                content::set_meta(self.pool, id, "_question_answer", &text).await?;
            }
        }

        if let Some(grade) = model.get_int("grade") {
            content::set_meta(self.pool, id, "_question_grade", &grade.to_string()).await?;
        }
        if let Some(random_order) = model.get_bool("random order") {
            content::set_meta(self.pool, id, "_random_order", bool_meta(random_order)).await?;
        }
        if let Some(feedback) = model.get_str("feedback").filter(|s| !s.is_empty()) {
            content::set_meta(self.pool, id, "_answer_feedback", &feedback).await?;
        }
        if let Some(notes) = model.get_str("upload notes").filter(|s| !s.is_empty()) {
            content::set_meta(self.pool, id, "_upload_notes", &notes).await?;
        }
        if let Some(notes) = model.get_str("teacher notes").filter(|s| !s.is_empty()) {
            content::set_meta(self.pool, id, "_teacher_notes", &notes).await?;
        }

        if model.has_column("categories") {
            let names = split_list(&model.get_str("categories").unwrap_or_default());
            let mut term_ids = Vec::with_capacity(names.len());
            for name in &names {
                term_ids.push(
                    terms::get_or_create(self.pool, "question-category", name)
                        .await?
                        .id,
                );
            }
            terms::set_item_terms(self.pool, id, "question-category", &term_ids, false).await?;
        }

        // Question media is best-effort: a miss is reported but does not
        // reject the row
        if let Some(source) = model.get_str("media").filter(|s| !s.is_empty()) {
            match media::resolve(self.pool, &source, None).await {
                Ok(media_id) => {
                    content::set_meta(self.pool, id, "_question_media", &media_id.to_string())
                        .await?;
                }
                Err(e) => model.push_warning("media", e.to_string()),
            }
        }

        if let Some(import_id) = model.import_id() {
            resolver.register(EntityKind::Question, &import_id, id);
        }

        debug!(question_id = id, question_type = %question_type, created = created, "Question synchronized");

        Ok(SyncOutcome { id, created })
    }
}
