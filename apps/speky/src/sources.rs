//! # Input Sources
//!
//! Reads specification files from disk and hands the decoded documents to
//! the core [`Loader`].
//!
//! - YAML files: one document each, `kind` decides what it holds
//! - CSV files: comment tables with a header row of
//!   `about,from,date,text,external`

use speky_core::{LoadReport, Loader, SpekyError, Specification, Validator};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a single input file (100 MB).
pub const MAX_INPUT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), SpekyError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        SpekyError::Io(format!(
            "Cannot read file metadata of \"{}\": {}",
            path.display(),
            e
        ))
    })?;

    if metadata.len() > max_size {
        return Err(SpekyError::Io(format!(
            "File \"{}\" is {} bytes, more than the {} bytes allowed",
            path.display(),
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

// =============================================================================
// DECODING
// =============================================================================

/// Decode a YAML document from text.
///
/// Blank text is an empty document, not a parse error.
pub fn parse_yaml(text: &str, origin: &str) -> Result<serde_yaml::Value, SpekyError> {
    if text.trim().is_empty() {
        return Err(SpekyError::EmptyDocument {
            origin: origin.to_string(),
        });
    }
    serde_yaml::from_str(text).map_err(|e| SpekyError::Parse {
        origin: origin.to_string(),
        message: e.to_string(),
    })
}

/// Decode CSV text into one row map per record, keyed by header.
pub fn parse_comment_csv(
    text: &str,
    origin: &str,
) -> Result<Vec<BTreeMap<String, String>>, SpekyError> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    reader
        .deserialize::<BTreeMap<String, String>>()
        .map(|row| {
            row.map_err(|e| SpekyError::Parse {
                origin: origin.to_string(),
                message: e.to_string(),
            })
        })
        .collect()
}

fn read_text(path: &Path) -> Result<String, SpekyError> {
    validate_file_size(path, MAX_INPUT_FILE_SIZE)?;
    std::fs::read_to_string(path)
        .map_err(|e| SpekyError::Io(format!("Cannot read \"{}\": {}", path.display(), e)))
}

// =============================================================================
// LOADING
// =============================================================================

/// Read one YAML file into `spec`.
pub fn load_yaml_file(spec: &mut Specification, path: &Path) -> Result<LoadReport, SpekyError> {
    let origin = path.display().to_string();
    let document = parse_yaml(&read_text(path)?, &origin)?;
    Loader::load_document(spec, &document, &origin)
}

/// Read one CSV comment table into `spec`.
pub fn load_comment_csv(spec: &mut Specification, path: &Path) -> Result<LoadReport, SpekyError> {
    let origin = path.display().to_string();
    let rows = parse_comment_csv(&read_text(path)?, &origin)?;
    Loader::load_comment_rows(spec, rows, &origin)
}

/// The files making up one specification.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    /// YAML documents, loaded in order.
    pub documents: Vec<PathBuf>,
    /// CSV comment tables, loaded after every document.
    pub comment_tables: Vec<PathBuf>,
}

impl SourceSet {
    #[must_use]
    pub fn new(documents: Vec<PathBuf>, comment_tables: Vec<PathBuf>) -> Self {
        Self {
            documents,
            comment_tables,
        }
    }

    /// Load every source, then check references.
    ///
    /// Stops at the first failing file. Loader warnings are logged as they
    /// come and also accumulated in the returned report. When references
    /// dangle, the first is returned and the rest are logged.
    pub fn load(&self) -> Result<(Specification, LoadReport), SpekyError> {
        let mut spec = Specification::new();
        let mut total = LoadReport::default();

        for path in &self.documents {
            tracing::info!("Loading {}", path.display());
            total.merge(log_warnings(load_yaml_file(&mut spec, path)?));
        }
        for path in &self.comment_tables {
            tracing::info!("Loading {} as comments", path.display());
            total.merge(log_warnings(load_comment_csv(&mut spec, path)?));
        }

        if let Err(first) = Validator::check_references(&spec) {
            for other in Validator::dangling_references(&spec).iter().skip(1) {
                tracing::error!("{}", other);
            }
            return Err(first);
        }
        tracing::debug!(
            requirements = total.requirements,
            tests = total.tests,
            comments = total.comments,
            "Specification loaded"
        );
        Ok((spec, total))
    }
}

fn log_warnings(report: LoadReport) -> LoadReport {
    for warning in &report.warnings {
        tracing::warn!("{}", warning);
    }
    report
}

// =============================================================================
// TESTS
// =============================================================================
