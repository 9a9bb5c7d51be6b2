//! # exreport
//!
//! Executive search report generation from Word (.docx) templates.
//!
//! Templates carry `{field_name}` placeholders. Flat JSON records are
//! substituted into them run by run, so formatting around each placeholder
//! survives even when Word has split a placeholder across several runs.
//! Generated documents can then be composed into a single report.
//!
//! ## Quick Start
//!
//! ```no_run
//! use exreport::report::{process_template, FillOptions};
//!
//! // One candidate profile from a JSON record
//! let outcome = process_template(
//!     "data/Jane_Doe_20250124_143022.json",
//!     "templates/candidate.docx",
//!     &FillOptions::default(),
//! );
//! println!("{}", outcome);
//!
//! // Direct access to the document model
//! let mut doc = exreport::Document::open("templates/candidate.docx")?;
//! let replacements = exreport::Replacements::new().with("full_name", "Jane Doe");
//! exreport::fill_document(&mut doc, &replacements);
//! println!("still open: {:?}", doc.placeholders());
//! doc.save("output/jane.docx")?;
//! # Ok::<(), exreport::Error>(())
//! ```
//!
//! ## Composing
//!
//! ```no_run
//! let report = exreport::compose::compose_to(
//!     &["overview.docx", "candidate_1.docx", "end_page.docx"],
//!     "shortlist.docx",
//! )?;
//! println!("{} sections", report.sections);
//! # Ok::<(), exreport::Error>(())
//! ```
//!
//! ## Features
//!
//! - `async`: [`report::process_template_async`] with Tokio

pub mod compose;
pub mod container;
pub mod docx;
pub mod error;
pub mod record;
pub mod report;
pub mod template;
pub mod usage;
pub mod xml;

// Re-exports
pub use compose::{compose, compose_to, ComposeReport};
pub use container::{OoxmlContainer, Relationship, Relationships};
pub use docx::{Document, ScopeKind, Section};
pub use error::{Error, Result};
pub use record::{CandidateEntry, Record};
pub use report::{process_template, FillOptions, ProcessOutcome};
pub use template::{fill_document, FillReport, Replacements};
pub use usage::{invoke_logged, UsageEvent, UsageLogger, UsageSink};

use std::path::Path;

/// Fill a template with a record and save the result.
///
/// # Example
///
/// ```no_run
/// use exreport::{fill_template, Record};
///
/// let record = Record::from_path("data/jane.json")?;
/// let report = fill_template("templates/candidate.docx", &record, "output/jane.docx")?;
/// println!("{} placeholders replaced", report.replacements);
/// # Ok::<(), exreport::Error>(())
/// ```
pub fn fill_template(
    template: impl AsRef<Path>,
    record: &Record,
    output: impl AsRef<Path>,
) -> Result<FillReport> {
    let mut doc = Document::open(template)?;
    let report = fill_document(&mut doc, &Replacements::from_record(record));
    doc.save(output)?;
    Ok(report)
}

/// Extract the body text of a document, one line per paragraph.
///
/// # Example
///
/// ```no_run
/// let text = exreport::extract_text("output/jane.docx")?;
/// println!("{}", text);
/// # Ok::<(), exreport::Error>(())
/// ```
pub fn extract_text(path: impl AsRef<Path>) -> Result<String> {
    Ok(Document::open(path)?.plain_text())
}

/// Placeholders still present in a document.
pub fn find_placeholders(path: impl AsRef<Path>) -> Result<Vec<String>> {
    Ok(Document::open(path)?.placeholders())
}
