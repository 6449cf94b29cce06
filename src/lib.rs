//! O2 Nutrition Catalog Import
//!
//! Bulk CSV product import for the O2 Nutrition storefront catalog.
//!
//! ## Features
//! - Quote-aware CSV line parsing
//! - Field mapping with alias tables for categories, brands and goals
//! - Duplicate detection by name or slug (skip or replace)
//! - Tracked import runs with periodic progress text
//! - Postgres and in-memory catalog stores

pub mod api;
pub mod config;
pub mod domain;
pub mod import;
pub mod store;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

// =============================================================================
// Core Types
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub slug: String,
    pub price: f64,
    pub original_price: Option<f64>,
    pub category: String,
    pub subcategory: Option<String>,
    pub brand: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub images: Vec<String>,
    pub rating: Option<f64>,
    pub reviews: Option<u32>,
    pub featured: bool,
    pub trending: bool,
    pub best_seller: bool,
    pub loved_by_experts: bool,
    pub on_sale: bool,
    pub shop_by_goal: Option<String>,
    pub simple_flavors: Option<String>,
    pub variants: Vec<Variant>,
    pub weight: Option<String>,
    pub nutrition_info: Option<String>,
    pub ingredients: Option<String>,
    pub certifications: Option<String>,
    pub nutrition_image: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    #[serde(default)]
    pub flavor: String,
    #[serde(default)]
    pub weight: String,
    #[serde(default, deserialize_with = "import::mapper::deserialize_price")]
    pub price: f64,
}

pub type ProductId = Uuid;

/// Catalog entry matched by the duplicate check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExistingProduct {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    #[default]
    Uploaded,
    Processing,
    Completed,
    Error,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImportStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(Self::Uploaded),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            other => Err(StoreError::Serialization(format!("unknown import status `{other}`"))),
        }
    }
}

/// Messages shown in the run summary, per kind.
pub const SUMMARY_MESSAGE_LIMIT: usize = 5;

/// Running counters for one import run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub processed: usize,
    pub created: usize,
    pub replaced: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Rows dropped for having too few columns. Not part of `processed`.
    pub ignored: usize,
    pub error_messages: Vec<String>,
    pub duplicate_messages: Vec<String>,
}

impl ImportSummary {
    pub fn record_created(&mut self) { self.created += 1; self.processed += 1; }
    pub fn record_replaced(&mut self, message: String) { self.replaced += 1; self.processed += 1; self.duplicate_messages.push(message); }
    pub fn record_skipped(&mut self, message: String) { self.skipped += 1; self.processed += 1; self.duplicate_messages.push(message); }
    pub fn record_error(&mut self, message: String) { self.errors += 1; self.processed += 1; self.error_messages.push(message); }
    pub fn record_ignored(&mut self) { self.ignored += 1; }

    pub fn imported(&self) -> usize { self.created + self.replaced }

    pub fn progress_text(&self) -> String {
        format!(
            "Processing: {} rows processed ({} created, {} replaced, {} skipped, {} errors)",
            self.processed, self.created, self.replaced, self.skipped, self.errors
        )
    }

    pub fn final_text(&self) -> String {
        let mut text = format!(
            "Import completed: {} created, {} replaced, {} skipped, {} errors (total processed: {})",
            self.created, self.replaced, self.skipped, self.errors, self.processed
        );
        append_messages(&mut text, "Errors", &self.error_messages);
        append_messages(&mut text, "Duplicates", &self.duplicate_messages);
        text
    }
}

fn append_messages(text: &mut String, title: &str, messages: &[String]) {
    if messages.is_empty() { return; }
    text.push_str(&format!("\n{title}:"));
    for m in messages.iter().take(SUMMARY_MESSAGE_LIMIT) {
        text.push_str("\n- ");
        text.push_str(m);
    }
    if messages.len() > SUMMARY_MESSAGE_LIMIT {
        text.push_str(&format!("\n... and {} more", messages.len() - SUMMARY_MESSAGE_LIMIT));
    }
}

/// Response body of a process request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub success: bool,
    pub imported: usize,
    pub skipped: usize,
    pub errors: usize,
    pub error_details: String,
    pub message: String,
}

impl ImportReport {
    pub fn from_summary(summary: &ImportSummary) -> Self {
        Self {
            success: true,
            imported: summary.imported(),
            skipped: summary.skipped,
            errors: summary.errors,
            error_details: summary.error_messages.join("; "),
            message: format!(
                "Imported {} products ({} replaced), skipped {} duplicates, {} errors",
                summary.imported(), summary.replaced, summary.skipped, summary.errors
            ),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, imported: 0, skipped: 0, errors: 0, error_details: String::new(), message: message.into() }
    }
}

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record not found")]
    NotFound,

    #[error("Conflicting record: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Import run {0} not found")]
    RunNotFound(Uuid),

    #[error("Cannot move import run from {from} to {to}")]
    InvalidTransition { from: ImportStatus, to: ImportStatus },

    #[error("Uploaded file `{file}` could not be read: {source}")]
    UploadUnavailable { file: String, #[source] source: StoreError },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ImportError>;
