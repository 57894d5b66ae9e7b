// src/intake.rs

use crate::document::ExtractedDocument;
use crate::pdf_text::TextExtractor;
use crate::policy::{Status, StatusPolicy};
use crate::store::{DocumentStore, NewRecord, StoreError};
use crate::structuring::FallbackChain;
use crate::validator::{ValidationReport, Validator};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{Instrument, debug, info, info_span, warn};

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Cannot copy {} into the upload directory: {source}", .path.display())]
    Upload {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No text extracted from {}", .0.display())]
    NoText(PathBuf),

    #[error("Structured extraction failed for {}", .0.display())]
    Structuring(PathBuf),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happened to one submitted document.
#[derive(Debug)]
pub struct IntakeOutcome {
    pub id: i64,
    pub status: Status,
    pub report: ValidationReport,
    pub document: ExtractedDocument,
}

/// Upload → text → fields → validation → status → stored row.
pub struct Intake<'a> {
    pub text: &'a dyn TextExtractor,
    pub structurer: &'a FallbackChain,
    pub validator: &'a Validator,
    pub policy: &'a StatusPolicy,
    pub store: &'a dyn DocumentStore,
    /// Keep a copy of every submitted file here.
    pub upload_dir: Option<&'a Path>,
}

impl Intake<'_> {
    /// Process one file. Nothing is stored unless every step succeeded.
    pub async fn process(&self, path: &Path) -> Result<IntakeOutcome, IntakeError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let span = info_span!("intake", filename = %filename);
        self.run(path, &filename).instrument(span).await
    }

    async fn run(&self, path: &Path, filename: &str) -> Result<IntakeOutcome, IntakeError> {
        let staged;
        let path = match self.upload_dir {
            Some(dir) => {
                staged = stage_upload(path, dir).map_err(|source| IntakeError::Upload {
                    path: path.to_path_buf(),
                    source,
                })?;
                staged.as_path()
            }
            None => path,
        };

        let Some(text) = self.text.extract_text(path).filter(|t| !t.trim().is_empty()) else {
            warn!("No text extracted from PDF");
            return Err(IntakeError::NoText(path.to_path_buf()));
        };
        info!(chars = text.len(), "Extracted text");

        let Some(document) = self.structurer.structure(&text).await else {
            return Err(IntakeError::Structuring(path.to_path_buf()));
        };

        let report = self.validator.validate(&document);
        let status = self.policy.decide(document.overall_confidence, &report);
        info!(
            valid = report.is_valid,
            warnings = report.has_warnings(),
            confidence = document.overall_confidence,
            status = %status,
            "Routing decided"
        );

        let record = NewRecord::from_document(filename, &document)?;
        let id = self.store.append(record, status)?;

        Ok(IntakeOutcome {
            id,
            status,
            report,
            document,
        })
    }
}

/// Copy `path` into `dir` under its own file name; an existing copy is replaced.
fn stage_upload(path: &Path, dir: &Path) -> std::io::Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name")
    })?;
    fs::create_dir_all(dir)?;
    let target = dir.join(name);
    if target != path {
        fs::copy(path, &target)?;
    }
    debug!(from = %path.display(), to = %target.display(), "Upload staged");
    Ok(target)
}
