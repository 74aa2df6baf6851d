//! Import task orchestrator
//!
//! Drives one page of rows per tick through Schema → Model → Synchronizer,
//! collects per-line warnings and errors without ever aborting the job for a
//! single row, and persists the job cursor, the identifier mapping and the
//! log after every page. An external scheduler keeps ticking until the job
//! reports a terminal state.

use sqlx::SqlitePool;
use tracing::{error, info, warn};
use uuid::Uuid;

use courseport_common::{Error, Result};

use crate::db::jobs;
use crate::ingest;
use crate::models::{
    EntityModel, ImportJob, JobCounts, JobState, LogEntry, LogSeverity, RawRecord,
};
use crate::schema::{EntityKind, Schema};
use crate::services::{
    CourseSynchronizer, IdResolver, LessonSynchronizer, QuestionSynchronizer, SyncError,
};

pub struct Orchestrator {
    db: SqlitePool,
    page_size: usize,
}

impl Orchestrator {
    pub fn new(db: SqlitePool, page_size: usize) -> Self {
        Self {
            db,
            page_size: page_size.max(1),
        }
    }

    /// Process the next page of the job and persist the new cursor.
    ///
    /// Returns the updated job. Terminal jobs are returned unchanged, and a
    /// cancellation request is honored here, before any row of the new page
    /// is touched.
    pub async fn process_next_page(&self, job_id: Uuid) -> Result<ImportJob> {
        let mut job = jobs::load_job(&self.db, job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("import job {}", job_id)))?;

        if job.is_terminal() {
            return Ok(job);
        }

        if job.cancel_requested {
            job.transition_to(JobState::Cancelled);
            jobs::save_job(&self.db, &job).await?;
            info!(job_id = %job_id, "Import cancelled between pages");
            return Ok(job);
        }

        if job.state == JobState::Queued {
            job.transition_to(JobState::Running);
        }

        let mut resolver = IdResolver::load(&self.db, job_id).await?;
        let mut log = Vec::new();

        loop {
            let Some((index, kind)) = job.current_sheet() else {
                job.transition_to(JobState::Completed);
                info!(
                    job_id = %job_id,
                    created = job.counts.created,
                    updated = job.counts.updated,
                    failed = job.counts.failed,
                    "Import completed"
                );
                break;
            };
            job.sheet_index = index;

            let path = match job.sheets.path_for(kind) {
                Some(path) => path.to_path_buf(),
                None => {
                    job.advance_sheet(index);
                    continue;
                }
            };

            let page = match ingest::read_page(&path, job.next_row, self.page_size) {
                Ok(page) => page,
                Err(e) => {
                    error!(job_id = %job_id, sheet = %path.display(), error = %e, "Sheet unreadable; failing job");
                    log.push(LogEntry {
                        entity: kind,
                        line: 1,
                        severity: LogSeverity::Error,
                        code: "storage".to_string(),
                        field: None,
                        message: format!("Sheet could not be read: {}", e),
                        item_id: None,
                    });
                    job.transition_to(JobState::Failed);
                    break;
                }
            };

            if page.rows.is_empty() {
                job.advance_sheet(index);
                continue;
            }

            let processed = page.rows.len();
            for (line, record) in page.rows {
                self.process_row(kind, line, record, &mut resolver, &mut job.counts, &mut log)
                    .await;
            }

            if page.exhausted {
                job.advance_sheet(index);
            } else {
                job.next_row += processed;
            }
            break;
        }

        resolver.flush(&self.db).await?;
        jobs::append_log(&self.db, job_id, &log).await?;
        jobs::save_job(&self.db, &job).await?;

        info!(
            job_id = %job_id,
            state = job.state.as_str(),
            created = job.counts.created,
            updated = job.counts.updated,
            failed = job.counts.failed,
            "Page processed"
        );

        Ok(job)
    }

    /// Run one row end to end; failures are recorded, never propagated
    async fn process_row(
        &self,
        kind: EntityKind,
        line: u64,
        record: RawRecord,
        resolver: &mut IdResolver,
        counts: &mut JobCounts,
        log: &mut Vec<LogEntry>,
    ) {
        let schema = Schema::for_kind(kind);

        let mut model = match EntityModel::from_record(&self.db, record, schema).await {
            Ok(model) => model,
            Err(e) => {
                counts.failed += 1;
                log.push(LogEntry {
                    entity: kind,
                    line,
                    severity: LogSeverity::Error,
                    code: "storage".to_string(),
                    field: None,
                    message: e.to_string(),
                    item_id: None,
                });
                return;
            }
        };

        if let Err(problem) = model.validate() {
            counts.failed += 1;
            warn!(entity = %kind, line = line, problem = %problem, "Row rejected");
            log.push(LogEntry {
                entity: kind,
                line,
                severity: LogSeverity::Error,
                code: "validation".to_string(),
                field: None,
                message: problem,
                item_id: None,
            });
            return;
        }

        let result = match kind {
            EntityKind::Course => {
                CourseSynchronizer::new(&self.db)
                    .sync(&mut model, resolver)
                    .await
            }
            EntityKind::Question => {
                QuestionSynchronizer::new(&self.db)
                    .sync(&mut model, resolver)
                    .await
            }
            EntityKind::Lesson => {
                LessonSynchronizer::new(&self.db)
                    .sync(&mut model, resolver)
                    .await
            }
        };

        match result {
            Ok(outcome) => {
                if outcome.created {
                    counts.created += 1;
                } else {
                    counts.updated += 1;
                }
                // Deferred warnings are attributed to the internal id now
                // that it is known
                for warning in model.warnings() {
                    log.push(LogEntry {
                        entity: kind,
                        line,
                        severity: LogSeverity::Warning,
                        code: "sanitize".to_string(),
                        field: Some(warning.field.clone()),
                        message: warning.message.clone(),
                        item_id: Some(outcome.id),
                    });
                }
            }
            Err(e) => {
                counts.failed += 1;
                warn!(entity = %kind, line = line, error = %e, "Row failed");
                log.push(LogEntry {
                    entity: kind,
                    line,
                    severity: LogSeverity::Error,
                    code: e.code().to_string(),
                    field: None,
                    message: row_error_message(&e, &model),
                    item_id: None,
                });
            }
        }
    }
}

fn row_error_message(e: &SyncError, model: &EntityModel) -> String {
    format!("{}: {}", model.title(), e)
}
