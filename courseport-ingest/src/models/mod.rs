//! Data models for the import service

pub mod entity;
pub mod job;
pub mod record;

pub use entity::{EntityModel, PendingWarning};
pub use job::{ImportJob, JobCounts, JobState, LogEntry, LogSeverity, SheetSet};
pub use record::RawRecord;
