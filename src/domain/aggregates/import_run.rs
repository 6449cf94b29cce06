//! Import Run Aggregate

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use crate::{ImportError, ImportStatus, ImportSummary};
use crate::domain::events::{DomainEvent, ImportEvent};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRun {
    id: Uuid,
    file_name: String,
    file: String,
    status: ImportStatus,
    results: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl ImportRun {
    /// New run for a freshly uploaded file. `file` is the upload store key.
    pub fn create(file_name: impl Into<String>, file: impl Into<String>) -> Self {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let file_name = file_name.into();
        let mut run = Self {
            id, file_name: file_name.clone(), file: file.into(), status: ImportStatus::Uploaded,
            results: String::new(), created_at: now, updated_at: now, events: vec![],
        };
        run.raise_event(DomainEvent::Import(ImportEvent::Uploaded { run_id: id, file_name }));
        run
    }

    /// Rebuilds a run loaded from storage.
    pub fn restore(id: Uuid, file_name: String, file: String, status: ImportStatus, results: String, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self { id, file_name, file, status, results, created_at, updated_at, events: vec![] }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn file_name(&self) -> &str { &self.file_name }
    pub fn file(&self) -> &str { &self.file }
    pub fn status(&self) -> ImportStatus { self.status }
    pub fn results(&self) -> &str { &self.results }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn begin_processing(&mut self) -> Result<(), ImportError> {
        self.transition(ImportStatus::Processing)?;
        self.results = "Processing started".to_string();
        self.raise_event(DomainEvent::Import(ImportEvent::Started { run_id: self.id }));
        Ok(())
    }

    /// Progress text is only accepted while processing.
    pub fn record_progress(&mut self, summary: &ImportSummary) -> Result<(), ImportError> {
        self.ensure(ImportStatus::Processing, ImportStatus::Processing)?;
        self.results = summary.progress_text();
        self.touch();
        Ok(())
    }

    pub fn complete(&mut self, summary: &ImportSummary) -> Result<(), ImportError> {
        self.transition(ImportStatus::Completed)?;
        self.results = summary.final_text();
        self.raise_event(DomainEvent::Import(ImportEvent::Completed {
            run_id: self.id, created: summary.created, replaced: summary.replaced,
            skipped: summary.skipped, errors: summary.errors,
        }));
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), ImportError> {
        let reason = reason.into();
        self.transition(ImportStatus::Error)?;
        self.results = reason.clone();
        self.raise_event(DomainEvent::Import(ImportEvent::Failed { run_id: self.id, reason }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    fn transition(&mut self, to: ImportStatus) -> Result<(), ImportError> {
        let from = match to {
            ImportStatus::Processing => ImportStatus::Uploaded,
            _ => ImportStatus::Processing,
        };
        self.ensure(from, to)?;
        self.status = to;
        self.touch();
        Ok(())
    }

    fn ensure(&self, expected: ImportStatus, to: ImportStatus) -> Result<(), ImportError> {
        if self.status != expected { return Err(ImportError::InvalidTransition { from: self.status, to }); }
        Ok(())
    }

    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}
