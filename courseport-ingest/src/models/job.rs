//! Import job state machine
//!
//! A job progresses Queued → Running → Completed, or ends in Failed or
//! Cancelled. Each orchestrator tick processes one page of rows; the whole
//! job state (cursor position, counts, cancellation flag) is persisted
//! after every page so a restarted process resumes without reprocessing
//! committed rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::schema::EntityKind;

/// Import job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    /// Created, no page processed yet
    Queued,
    /// At least one page processed, more remain
    Running,
    /// All sheets drained
    Completed,
    /// Job-level failure (sheet unreadable, storage gone)
    Failed,
    /// Cancelled between pages; synchronized entities are kept
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(JobState::Queued),
            "running" => Some(JobState::Running),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            "cancelled" => Some(JobState::Cancelled),
            _ => None,
        }
    }
}

/// Sheet files attached to a job, one per entity type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetSet {
    pub courses: Option<PathBuf>,
    pub questions: Option<PathBuf>,
    pub lessons: Option<PathBuf>,
}

impl SheetSet {
    pub fn path_for(&self, kind: EntityKind) -> Option<&Path> {
        match kind {
            EntityKind::Course => self.courses.as_deref(),
            EntityKind::Question => self.questions.as_deref(),
            EntityKind::Lesson => self.lessons.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_none() && self.questions.is_none() && self.lessons.is_none()
    }
}

/// Cumulative row counts, exposed to the UI layer
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JobCounts {
    pub created: u64,
    pub updated: u64,
    pub failed: u64,
}

/// One import job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    pub job_id: Uuid,
    pub state: JobState,
    pub sheets: SheetSet,
    /// Position in `EntityKind::SHEET_ORDER`
    pub sheet_index: usize,
    /// 0-based data-row offset within the current sheet
    pub next_row: usize,
    pub counts: JobCounts,
    pub cancel_requested: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ImportJob {
    pub fn new(sheets: SheetSet) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            state: JobState::Queued,
            sheets,
            sheet_index: 0,
            next_row: 0,
            counts: JobCounts::default(),
            cancel_requested: false,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn transition_to(&mut self, new_state: JobState) {
        self.state = new_state;
        if self.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }

    /// Next sheet with an attached file, starting at the cursor
    pub fn current_sheet(&self) -> Option<(usize, EntityKind)> {
        EntityKind::SHEET_ORDER
            .iter()
            .enumerate()
            .skip(self.sheet_index)
            .find(|(_, kind)| self.sheets.path_for(**kind).is_some())
            .map(|(index, kind)| (index, *kind))
    }

    /// Move the cursor past the sheet at `index`
    pub fn advance_sheet(&mut self, index: usize) {
        self.sheet_index = index + 1;
        self.next_row = 0;
    }
}

/// Severity of a job log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Error,
    Warning,
}

impl LogSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSeverity::Error => "error",
            LogSeverity::Warning => "warning",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "error" => Some(LogSeverity::Error),
            "warning" => Some(LogSeverity::Warning),
            _ => None,
        }
    }
}

/// One per-line log entry, keyed by (entity type, line number)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub entity: EntityKind,
    /// 1-based file line; the header is line 1
    pub line: u64,
    pub severity: LogSeverity,
    /// Error taxonomy bucket: validation, reference, storage or sanitize
    pub code: String,
    pub field: Option<String>,
    pub message: String,
    /// Internal id, filled once the entity exists
    pub item_id: Option<i64>,
}
