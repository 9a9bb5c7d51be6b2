//! Report generation.
//!
//! Entry points that turn records and templates into finished documents.
//! They never return an error; every failure is folded into the outcome's
//! `success` flag and `message`.

use crate::compose::merge_shortlist;
use crate::docx::Document;
use crate::error::{Error, Result};
use crate::record::{combine_candidate, merge_candidates, Record, FULL_NAME};
use crate::template::{fill_document, FillReport, Replacements};
use chrono::Local;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub use crate::record::CandidateEntry;

/// Where generated documents go and how they are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillOptions {
    /// Directory for generated documents; created on demand
    pub output_dir: PathBuf,
    /// Append a timestamp to generated file names
    pub timestamp: bool,
    /// chrono format of the timestamp
    pub timestamp_format: String,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            timestamp: true,
            timestamp_format: "%Y%m%d_%H%M%S".to_string(),
        }
    }
}

impl FillOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Enable or disable timestamped file names.
    pub fn with_timestamp(mut self, enabled: bool) -> Self {
        self.timestamp = enabled;
        self
    }

    /// Set the timestamp format.
    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    /// `<stem>_<suffix>_<timestamp>.docx`, or without the timestamp.
    pub fn output_path(&self, stem: &str, suffix: &str) -> PathBuf {
        let name = if self.timestamp {
            format!(
                "{}_{}_{}.docx",
                stem,
                suffix,
                Local::now().format(&self.timestamp_format)
            )
        } else {
            format!("{}_{}.docx", stem, suffix)
        };
        self.output_dir.join(name)
    }

    /// `<base>.json` in the output directory, or the first free
    /// `<base>_<n>.json` counting from 2.
    fn record_path(&self, base: &str) -> PathBuf {
        let mut path = self.output_dir.join(format!("{}.json", base));
        let mut counter = 2;
        while path.exists() {
            path = self.output_dir.join(format!("{}_{}.json", base, counter));
            counter += 1;
        }
        path
    }

    fn shortlist_path(&self) -> PathBuf {
        let name = if self.timestamp {
            format!(
                "shortlist_report_{}.docx",
                Local::now().format(&self.timestamp_format)
            )
        } else {
            "shortlist_report.docx".to_string()
        };
        self.output_dir.join(name)
    }
}

/// Outcome of generating one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    pub success: bool,
    pub message: String,
    pub output_file: Option<PathBuf>,
}

impl ProcessOutcome {
    fn succeeded(message: String, output_file: PathBuf) -> Self {
        Self {
            success: true,
            message,
            output_file: Some(output_file),
        }
    }

    fn failed(message: String) -> Self {
        log::warn!("{}", message);
        Self {
            success: false,
            message,
            output_file: None,
        }
    }
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.output_file, self.success) {
            (Some(path), true) => write!(f, "{} Output: {}", self.message, path.display()),
            _ => f.write_str(&self.message),
        }
    }
}

/// Fill a template with the record stored at `record_path`.
///
/// The report is saved as `<record stem>_report_<timestamp>.docx` in the
/// output directory.
///
/// # Example
///
/// ```no_run
/// use exreport::report::{process_template, FillOptions};
///
/// let outcome = process_template(
///     "data/Jane_Doe_20250124_143022.json",
///     "templates/candidate.docx",
///     &FillOptions::new().with_output_dir("reports"),
/// );
/// println!("{}", outcome);
/// ```
pub fn process_template(
    record_path: impl AsRef<Path>,
    template_path: impl AsRef<Path>,
    options: &FillOptions,
) -> ProcessOutcome {
    let record_path = record_path.as_ref();
    let template_path = template_path.as_ref();

    if !record_path.exists() {
        return ProcessOutcome::failed(format!(
            "Candidate data file not found: {}",
            record_path.display()
        ));
    }
    if !template_path.exists() {
        return ProcessOutcome::failed(format!(
            "Template file not found: {}",
            template_path.display()
        ));
    }
    if let Err(e) = std::fs::create_dir_all(&options.output_dir) {
        return ProcessOutcome::failed(format!("Error processing document: {}", e));
    }

    let record = match Record::from_path(record_path) {
        Ok(record) => record,
        Err(e) => return record_failure(e),
    };

    let stem = file_stem(record_path);
    let result = Document::open(template_path)
        .and_then(|doc| fill_and_save(doc, &record, &stem, options));
    fill_outcome(result, record.len())
}

/// Only JSON syntax errors count as unreadable records; anything else
/// about the record is a processing error.
fn record_failure(e: Error) -> ProcessOutcome {
    match e {
        Error::Json(_) => ProcessOutcome::failed(format!("Error reading JSON file: {}", e)),
        e => ProcessOutcome::failed(format!("Error processing document: {}", e)),
    }
}

fn fill_outcome(result: Result<(PathBuf, FillReport)>, fields: usize) -> ProcessOutcome {
    match result {
        Ok((path, _)) => ProcessOutcome::succeeded(
            format!(
                "Document processed successfully. Replaced {} placeholders.",
                fields
            ),
            path,
        ),
        Err(e) => ProcessOutcome::failed(format!("Error processing document: {}", e)),
    }
}

/// Fill a template with an in-memory record and save it as
/// `<stem>_report[_<timestamp>].docx`.
pub fn generate_document(
    template_path: impl AsRef<Path>,
    record: &Record,
    stem: &str,
    options: &FillOptions,
) -> Result<PathBuf> {
    let template_path = template_path.as_ref();
    if !template_path.exists() {
        return Err(Error::NotFound(template_path.to_path_buf()));
    }
    std::fs::create_dir_all(&options.output_dir)?;
    fill_and_save(Document::open(template_path)?, record, stem, options).map(|(path, _)| path)
}

/// Fill `doc` and save it as `<stem>_report[_<timestamp>].docx`.
fn fill_and_save(
    mut doc: Document,
    record: &Record,
    stem: &str,
    options: &FillOptions,
) -> Result<(PathBuf, FillReport)> {
    let replacements = Replacements::from_record(record);
    let report = fill_document(&mut doc, &replacements);

    let path = options.output_path(stem, "report");
    doc.save(&path)?;
    log::info!(
        "generated {} ({} placeholders replaced)",
        path.display(),
        report.replacements
    );
    Ok((path, report))
}

/// Templates used to build a shortlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortlistTemplates {
    /// Overview template filled with the merged `c{i}_` record
    pub overview: PathBuf,
    /// Per-candidate template
    pub candidate: PathBuf,
    /// Closing page appended unchanged
    pub end_page: PathBuf,
}

impl ShortlistTemplates {
    pub fn new(
        overview: impl Into<PathBuf>,
        candidate: impl Into<PathBuf>,
        end_page: impl Into<PathBuf>,
    ) -> Self {
        Self {
            overview: overview.into(),
            candidate: candidate.into(),
            end_page: end_page.into(),
        }
    }
}

/// Outcome of assembling a shortlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortlistOutcome {
    pub success: bool,
    pub message: String,
    pub output_file: Option<PathBuf>,
    /// Intermediate documents, overview first
    pub generated: Vec<PathBuf>,
}

impl fmt::Display for ShortlistOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.output_file, self.success) {
            (Some(path), true) => write!(f, "{} Output: {}", self.message, path.display()),
            _ => f.write_str(&self.message),
        }
    }
}

/// Attach assessments to profiles by candidate name.
///
/// Names are compared after [`clean_name`]. When several assessments match
/// a candidate the last one wins.
pub fn pair_assessments(profiles: Vec<CandidateEntry>, assessments: &[Record]) -> Vec<CandidateEntry> {
    profiles
        .into_iter()
        .map(|mut entry| {
            let wanted = clean_name(entry.profile.get_str(FULL_NAME).unwrap_or_default());
            entry.assessment = assessments
                .iter()
                .rev()
                .find(|a| clean_name(a.get_str(FULL_NAME).unwrap_or_default()) == wanted)
                .cloned();
            entry
        })
        .collect()
}

/// File-name form of a person's name: alphanumerics, spaces, `-` and `_`
/// kept, trailing whitespace dropped, spaces replaced with `_`.
pub fn clean_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim_end()
        .replace(' ', "_")
}

/// Build a shortlist report.
///
/// Every candidate needs an assessment. The overview is filled from
/// [`merge_candidates`], each candidate page from [`combine_candidate`] in
/// source-name order, and the pages are composed as overview, candidates,
/// end page into `shortlist_report_<timestamp>.docx`.
pub fn assemble_shortlist(
    templates: &ShortlistTemplates,
    metadata: &Record,
    candidates: &[CandidateEntry],
    name: &str,
    options: &FillOptions,
) -> ShortlistOutcome {
    let mut generated = Vec::new();
    match build_shortlist(templates, metadata, candidates, name, options, &mut generated) {
        Ok(path) => {
            log::info!("shortlist written to {}", path.display());
            ShortlistOutcome {
                success: true,
                message: format!(
                    "Shortlist report complete. Candidates: {}.",
                    candidates.len()
                ),
                output_file: Some(path),
                generated,
            }
        }
        Err(message) => {
            log::warn!("{}", message);
            ShortlistOutcome {
                success: false,
                message,
                output_file: None,
                generated,
            }
        }
    }
}

fn build_shortlist(
    templates: &ShortlistTemplates,
    metadata: &Record,
    candidates: &[CandidateEntry],
    name: &str,
    options: &FillOptions,
    generated: &mut Vec<PathBuf>,
) -> std::result::Result<PathBuf, String> {
    if candidates.is_empty() {
        return Err(format!("No candidates found for {}", name));
    }
    let missing: Vec<String> = candidates
        .iter()
        .filter(|c| c.assessment.is_none())
        .map(|c| c.name().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingAssessment(missing).to_string());
    }

    let overview_record = merge_candidates(metadata, candidates);
    let base = format!("merged_candidates_{}", name);
    save_record(&overview_record, &options.record_path(&base), options)
        .map_err(|e| format!("Error saving merged data: {}", e))?;
    let overview = generate_document(&templates.overview, &overview_record, &base, options)
    .map_err(|e| format!("Error generating overview: {}", e))?;
    generated.push(overview.clone());

    let mut ordered: Vec<&CandidateEntry> = candidates.iter().collect();
    ordered.sort_by(|a, b| a.source.cmp(&b.source));

    let mut pages = Vec::with_capacity(ordered.len());
    for candidate in ordered {
        let empty = Record::new();
        let assessment = candidate.assessment.as_ref().unwrap_or(&empty);
        let record = combine_candidate(metadata, &candidate.profile, assessment);
        let page = generate_document(
            &templates.candidate,
            &record,
            &file_stem(Path::new(&candidate.source)),
            options,
        )
        .map_err(|e| format!("Error generating document for {}: {}", candidate.name(), e))?;
        generated.push(page.clone());
        pages.push(page);
    }

    let output = options.shortlist_path();
    let report = merge_shortlist(&overview, &pages, &templates.end_page, &output)
        .map_err(|e| format!("Error merging documents: {}", e))?;
    log::info!(
        "Successfully merged {} sections into report",
        report.documents
    );
    Ok(output)
}

fn save_record(record: &Record, path: &Path, options: &FillOptions) -> Result<()> {
    std::fs::create_dir_all(&options.output_dir)?;
    std::fs::write(path, record.to_json_pretty()?)?;
    log::info!("saved merged data to {}", path.display());
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

/// Async form of [`process_template`]: inputs are read with `tokio::fs`
/// and the fill runs on the blocking pool.
#[cfg(feature = "async")]
pub async fn process_template_async(
    record_path: impl AsRef<Path>,
    template_path: impl AsRef<Path>,
    options: &FillOptions,
) -> ProcessOutcome {
    let record_path = record_path.as_ref().to_path_buf();
    let template_path = template_path.as_ref().to_path_buf();

    if tokio::fs::metadata(&record_path).await.is_err() {
        return ProcessOutcome::failed(format!(
            "Candidate data file not found: {}",
            record_path.display()
        ));
    }
    let template = match tokio::fs::read(&template_path).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return ProcessOutcome::failed(format!(
                "Template file not found: {}",
                template_path.display()
            ))
        }
    };
    if let Err(e) = tokio::fs::create_dir_all(&options.output_dir).await {
        return ProcessOutcome::failed(format!("Error processing document: {}", e));
    }
    let record = match tokio::fs::read_to_string(&record_path).await {
        Ok(json) => match Record::from_json_str(&json) {
            Ok(record) => record,
            Err(e) => return record_failure(e),
        },
        Err(e) => return record_failure(e.into()),
    };

    let stem = file_stem(&record_path);
    let options = options.clone();
    let fields = record.len();
    let job = tokio::task::spawn_blocking(move || {
        Document::from_bytes(template).and_then(|doc| fill_and_save(doc, &record, &stem, &options))
    });

    match job.await {
        Ok(result) => fill_outcome(result, fields),
        Err(e) => ProcessOutcome::failed(format!("Error processing document: {}", e)),
    }
}
