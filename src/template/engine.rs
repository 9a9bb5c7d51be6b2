//! Run-aware placeholder substitution.
//!
//! Word splits text into runs wherever formatting, spell-check state or edit
//! history changes, so a placeholder typed as `{full_name}` often ends up as
//! `{full_`, `name` and `}` in three runs. Substitution therefore works on
//! the text of a whole scope (one paragraph) while writing results back run
//! by run:
//!
//! 1. Tokens wholly inside one run are replaced in that run.
//! 2. Tokens split across runs are located in the concatenated text; the
//!    whole value goes into the first run the token touches and the token's
//!    characters are removed from the following runs. Emptied runs are kept.
//!
//! Text inserted by a replacement is never searched again, and tokens can
//! only match text that was contiguous before any replacement in the scope.

use super::Replacements;
use crate::docx::{paragraph_runs, Document, Run, ScopeKind};
use crate::xml::XmlElement;
use serde::Serialize;
use std::ops::Range;

/// Text access the engine needs from a run.
pub trait RunText {
    /// Current text of the run.
    fn text(&self) -> String;

    /// Replace the run's text without touching its formatting.
    fn set_text(&mut self, text: &str);
}

impl RunText for String {
    fn text(&self) -> String {
        self.clone()
    }

    fn set_text(&mut self, text: &str) {
        self.clear();
        self.push_str(text);
    }
}

impl RunText for Run<'_> {
    fn text(&self) -> String {
        Run::text(self)
    }

    fn set_text(&mut self, text: &str) {
        Run::set_text(self, text)
    }
}

/// Substitute every token in one scope, given as its runs in order.
///
/// Returns the number of placeholder occurrences replaced. Only runs whose
/// text changed are written back.
pub fn substitute_runs<R: RunText>(runs: &mut [R], replacements: &Replacements) -> usize {
    if runs.is_empty() || replacements.is_empty() {
        return 0;
    }

    let original: Vec<String> = runs.iter().map(RunText::text).collect();
    let mut texts = Vec::with_capacity(original.len());
    // Byte ranges of inserted values in the concatenated text
    let mut inserted: Vec<Range<usize>> = Vec::new();
    let mut count = 0;

    let mut offset = 0;
    for text in &original {
        let (replaced, spans) = replace_in_run(text, replacements);
        count += spans.len();
        inserted.extend(spans.into_iter().map(|s| s.start + offset..s.end + offset));
        offset += replaced.len();
        texts.push(replaced);
    }

    for (token, value) in replacements.iter() {
        loop {
            let full = texts.concat();
            let Some(start) = find_unprotected(&full, token, &inserted) else {
                break;
            };
            let end = start + token.len();
            splice(&mut texts, start..end, value);

            for span in inserted.iter_mut().filter(|s| s.start >= end) {
                span.start = span.start - token.len() + value.len();
                span.end = span.end - token.len() + value.len();
            }
            inserted.push(start..start + value.len());
            count += 1;
        }
    }

    for ((run, before), after) in runs.iter_mut().zip(&original).zip(&texts) {
        if before != after {
            run.set_text(after);
        }
    }
    count
}

/// Single left-to-right scan of one run's text. At each `{` the first token
/// in mapping order that matches is replaced; values are not rescanned.
fn replace_in_run(text: &str, replacements: &Replacements) -> (String, Vec<Range<usize>>) {
    let mut out = String::with_capacity(text.len());
    let mut spans = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        rest = &rest[open..];
        match replacements.iter().find(|(token, _)| rest.starts_with(token)) {
            Some((token, value)) => {
                spans.push(out.len()..out.len() + value.len());
                out.push_str(value);
                rest = &rest[token.len()..];
            }
            None => {
                out.push('{');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    (out, spans)
}

/// First occurrence of `token` in `full` not touching inserted text.
fn find_unprotected(full: &str, token: &str, inserted: &[Range<usize>]) -> Option<usize> {
    let mut from = 0;
    while let Some(pos) = full[from..].find(token) {
        let start = from + pos;
        let end = start + token.len();
        if !inserted.iter().any(|span| touches(start..end, span)) {
            return Some(start);
        }
        from = start + full[start..].chars().next().map_or(1, char::len_utf8);
    }
    None
}

/// A match may not overlap inserted text, nor straddle the point where an
/// empty value was inserted.
fn touches(candidate: Range<usize>, span: &Range<usize>) -> bool {
    if span.is_empty() {
        candidate.start < span.start && span.start < candidate.end
    } else {
        candidate.start < span.end && span.start < candidate.end
    }
}

/// Replace `range` of the concatenated text: the value goes into the first
/// run overlapping the range, later overlapping runs lose their share.
fn splice(texts: &mut [String], range: Range<usize>, value: &str) {
    let mut offset = 0;
    let mut first = true;

    for text in texts.iter_mut() {
        let run_start = offset;
        let run_end = offset + text.len();
        offset = run_end;

        if run_start >= range.end || run_end <= range.start {
            continue;
        }

        let local_start = range.start.saturating_sub(run_start);
        let local_end = (range.end - run_start).min(text.len());
        let mut spliced = String::with_capacity(text.len() + value.len());
        spliced.push_str(&text[..local_start]);
        if first {
            spliced.push_str(value);
            first = false;
        }
        spliced.push_str(&text[local_end..]);
        *text = spliced;
    }
}

/// Substitute within one paragraph. Paragraphs without runs are left alone.
pub fn fill_paragraph(paragraph: &mut XmlElement, replacements: &Replacements) -> usize {
    let mut runs = paragraph_runs(paragraph);
    if runs.is_empty() {
        return 0;
    }
    substitute_runs(&mut runs, replacements)
}

/// Totals of one [`fill_document`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FillReport {
    /// Scopes visited
    pub scopes: usize,
    /// Placeholder occurrences replaced
    pub replacements: usize,
    /// Occurrences replaced in headers and footers
    pub header_footer_replacements: usize,
}

/// Substitute every token in every scope of the document.
pub fn fill_document(doc: &mut Document, replacements: &Replacements) -> FillReport {
    let mut report = FillReport::default();

    doc.for_each_scope_mut(|kind, paragraph| {
        report.scopes += 1;
        let n = fill_paragraph(paragraph, replacements);
        report.replacements += n;
        if !matches!(kind, ScopeKind::BodyParagraph | ScopeKind::BodyTableCell) {
            report.header_footer_replacements += n;
        }
    });

    log::debug!(
        "filled {} placeholders across {} scopes",
        report.replacements,
        report.scopes
    );
    report
}
