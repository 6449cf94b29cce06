//! Import driver: runs one uploaded file through parse, map, duplicate check
//! and catalog write, and moves the run through its states.
//!
//! Rows are handled strictly in order with at most one catalog write each.
//! Row-level problems end up in the summary; only upload or store failures
//! move the run to `error`.

use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use validator::Validate;
use crate::domain::aggregates::ImportRun;
use crate::store::{CatalogStore, ImportRunStore, UploadStore};
use crate::{ImportError, ImportStatus, ImportSummary, ProductRecord, Result, StoreError};
use super::mapper::{looks_like_data_row, ColumnLayout, FieldMapper};
use super::parser::{parse_line, split_lines};
use super::resolver::{DuplicatePolicy, DuplicateResolver, Resolution};

pub const DEFAULT_PROGRESS_EVERY: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImportOptions {
    pub policy: DuplicatePolicy,
    /// Progress text is persisted after every this many processed rows.
    pub progress_every: usize,
}

impl Default for ImportOptions {
    fn default() -> Self { Self { policy: DuplicatePolicy::Skip, progress_every: DEFAULT_PROGRESS_EVERY } }
}

#[derive(Clone)]
pub struct ImportDriver {
    catalog: Arc<dyn CatalogStore>,
    runs: Arc<dyn ImportRunStore>,
    uploads: Arc<dyn UploadStore>,
    options: ImportOptions,
}

impl ImportDriver {
    pub fn new(catalog: Arc<dyn CatalogStore>, runs: Arc<dyn ImportRunStore>, uploads: Arc<dyn UploadStore>) -> Self {
        Self { catalog, runs, uploads, options: ImportOptions::default() }
    }

    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.options = ImportOptions { progress_every: options.progress_every.max(1), ..options };
        self
    }

    pub fn options(&self) -> ImportOptions { self.options }

    pub fn runs(&self) -> &Arc<dyn ImportRunStore> { &self.runs }

    /// Stores an uploaded file and records an `uploaded` run for it.
    pub async fn submit(&self, file_name: &str, contents: &[u8]) -> Result<ImportRun> {
        let key = self.uploads.put(file_name, contents).await?;
        let run = ImportRun::create(file_name, key);
        self.runs.insert(&run).await?;
        info!(run_id = %run.id(), file_name, bytes = contents.len(), "import file uploaded");
        Ok(run)
    }

    pub async fn load(&self, id: Uuid) -> Result<ImportRun> {
        self.runs.get(id).await?.ok_or(ImportError::RunNotFound(id))
    }

    pub async fn process(&self, run: &mut ImportRun) -> Result<ImportSummary> {
        self.process_with(run, self.options.policy).await
    }

    /// Runs the import to completion. Fails with `InvalidTransition` unless the
    /// stored run is still `uploaded`; any other error leaves the run in `error`.
    ///
    /// When another caller has already claimed the run, `run` is refreshed
    /// from the store before the error is returned.
    pub async fn process_with(&self, run: &mut ImportRun, policy: DuplicatePolicy) -> Result<ImportSummary> {
        run.begin_processing()?;

        let outcome = match self.runs.claim(run).await {
            Ok(true) => {
                info!(run_id = %run.id(), file = run.file(), ?policy, "import started");
                self.execute(run, policy).await
            }
            Ok(false) => {
                *run = self.load(run.id()).await?;
                warn!(run_id = %run.id(), status = %run.status(), "import run already claimed");
                return Err(ImportError::InvalidTransition { from: run.status(), to: ImportStatus::Processing });
            }
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(summary) => {
                run.complete(&summary)?;
                self.runs.save(run).await?;
                info!(
                    run_id = %run.id(), processed = summary.processed, created = summary.created,
                    replaced = summary.replaced, skipped = summary.skipped, errors = summary.errors,
                    ignored = summary.ignored, "import completed"
                );
                Ok(summary)
            }
            Err(e) => {
                error!(run_id = %run.id(), error = %e, "import failed");
                run.fail(e.to_string())?;
                if let Err(save_err) = self.runs.save(run).await {
                    error!(run_id = %run.id(), error = %save_err, "failed to persist import failure");
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, run: &mut ImportRun, policy: DuplicatePolicy) -> Result<ImportSummary> {
        let contents = self.uploads.read_to_string(run.file()).await
            .map_err(|source| ImportError::UploadUnavailable { file: run.file().to_string(), source })?;

        let mut summary = ImportSummary::default();
        let lines: Vec<(usize, &str)> = split_lines(&contents).filter(|(_, l)| !l.trim().is_empty()).collect();
        let mut lines = lines.into_iter().peekable();
        let Some(&(_, first_line)) = lines.peek() else {
            return Ok(summary);
        };
        let first = parse_line(first_line);
        let layout = if looks_like_data_row(&first) {
            debug!(run_id = %run.id(), "no header row, using default column order");
            ColumnLayout::positional()
        } else {
            lines.next();
            ColumnLayout::from_header_row(&first)
        };

        let mapper = FieldMapper::new(layout);
        let resolver = DuplicateResolver::new(self.catalog.clone());
        for (line_no, line) in lines {
            let row = parse_line(line);
            if row.len() < mapper.layout().min_columns() {
                debug!(line = line_no, columns = row.len(), "ignoring short row");
                summary.record_ignored();
                continue;
            }
            self.import_row(&mapper, &resolver, policy, line_no, &row, &mut summary).await?;
            if summary.processed % self.options.progress_every == 0 {
                self.report_progress(run, &summary).await;
            }
        }
        Ok(summary)
    }

    async fn import_row(
        &self, mapper: &FieldMapper, resolver: &DuplicateResolver, policy: DuplicatePolicy,
        line_no: usize, row: &[String], summary: &mut ImportSummary,
    ) -> Result<()> {
        let mapped = match mapper.map_row(row) {
            Ok(m) => m,
            Err(e) => {
                summary.record_error(format!("Row {line_no}: {e}"));
                return Ok(());
            }
        };
        if !mapped.defaults.is_empty() {
            debug!(line = line_no, fields = ?mapped.defaults, "defaults applied");
        }
        let record = mapped.record;
        if let Err(e) = record.validate() {
            summary.record_error(format!("Row {line_no}: invalid product \"{}\": {}", record.name, e.to_string().replace('\n', " ")));
            return Ok(());
        }

        match resolver.resolve(&record).await? {
            Resolution::NotFound => {
                let written = self.catalog.create(&record).await.map(|_| ());
                if Self::settle_write(written, line_no, &record, summary)? {
                    summary.record_created();
                }
            }
            Resolution::Exists(existing) => match policy {
                DuplicatePolicy::Skip => {
                    summary.record_skipped(format!("Row {line_no}: \"{}\" already exists", record.name));
                }
                DuplicatePolicy::Replace => {
                    let written = self.catalog.replace(existing.id, &record).await;
                    if Self::settle_write(written, line_no, &record, summary)? {
                        summary.record_replaced(format!("Row {line_no}: \"{}\" replaced existing \"{}\"", record.name, existing.name));
                    }
                }
            },
        }
        Ok(())
    }

    /// A uniqueness conflict on write is a row error. Returns whether the write went through.
    fn settle_write(
        written: std::result::Result<(), StoreError>, line_no: usize, record: &ProductRecord, summary: &mut ImportSummary,
    ) -> Result<bool> {
        match written {
            Ok(()) => Ok(true),
            Err(StoreError::Conflict(reason)) => {
                debug!(line = line_no, %reason, "catalog write conflict");
                summary.record_error(format!("Row {line_no}: \"{}\" conflicts with an existing product ({reason})", record.name));
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn report_progress(&self, run: &mut ImportRun, summary: &ImportSummary) {
        if let Err(e) = run.record_progress(summary) {
            warn!(run_id = %run.id(), error = %e, "progress rejected");
            return;
        }
        if let Err(e) = self.runs.save(run).await {
            warn!(run_id = %run.id(), error = %e, "failed to persist import progress");
        }
    }
}
