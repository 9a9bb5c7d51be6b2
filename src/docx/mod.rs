//! DOCX (Word) document model.
//!
//! Loads a WordprocessingML package into editable trees and exposes the
//! substitution scopes of the document: body paragraphs, table cells, and the
//! paragraphs and tables of section headers and footers.

mod document;
mod run;

pub use document::{Document, ScopeKind, Section};
pub use run::{paragraph_runs, paragraph_text, run_text, Run};

use crate::container::Relationship;

/// Relationship type suffix of the main document part.
pub const REL_OFFICE_DOCUMENT: &str = "officeDocument";
/// Relationship type suffix of header parts.
pub const REL_HEADER: &str = "header";
/// Relationship type suffix of footer parts.
pub const REL_FOOTER: &str = "footer";
/// Relationship type suffix of the style definitions part.
pub const REL_STYLES: &str = "styles";
/// Relationship type suffix of the numbering definitions part.
pub const REL_NUMBERING: &str = "numbering";
/// Relationship type suffix of the footnotes part.
pub const REL_FOOTNOTES: &str = "footnotes";
/// Relationship type suffix of the endnotes part.
pub const REL_ENDNOTES: &str = "endnotes";

/// Whether a relationship has the given type, in either the transitional
/// (`http://schemas.openxmlformats.org/...`) or strict (`http://purl.oclc.org/...`) namespace.
pub fn is_rel_type(rel: &Relationship, suffix: &str) -> bool {
    rel.rel_type
        .rsplit_once('/')
        .is_some_and(|(_, last)| last == suffix)
}
