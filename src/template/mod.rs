//! Placeholder substitution for Word templates.
//!
//! Templates carry `{field_name}` tokens. [`Replacements`] maps each token to
//! its text and [`fill_document`] applies the mapping to every paragraph and
//! table cell of the body and of the section headers and footers.
//!
//! ```no_run
//! use exreport::template::{fill_document, Replacements};
//! use exreport::Document;
//!
//! let mut doc = Document::open("templates/candidate.docx")?;
//! let replacements = Replacements::new()
//!     .with("full_name", "Jane Doe")
//!     .with("current_title", "Chief Financial Officer");
//! let report = fill_document(&mut doc, &replacements);
//! println!("replaced {} placeholders", report.replacements);
//! doc.save("out/jane_doe.docx")?;
//! # Ok::<(), exreport::Error>(())
//! ```

mod engine;
mod replacements;

pub use engine::{fill_document, fill_paragraph, substitute_runs, FillReport, RunText};
pub use replacements::Replacements;
