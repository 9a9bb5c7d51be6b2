//! Footnotes and endnotes of appended documents.

use super::{add_definitions, find_definitions, import_references, DefinitionsPart, PartImporter};
use crate::docx::{Document, REL_ENDNOTES, REL_FOOTNOTES};
use crate::error::Result;
use crate::xml::{XmlElement, XmlNode};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum NoteKind {
    Footnote,
    Endnote,
}

impl NoteKind {
    fn rel_suffix(self) -> &'static str {
        match self {
            NoteKind::Footnote => REL_FOOTNOTES,
            NoteKind::Endnote => REL_ENDNOTES,
        }
    }

    fn note(self) -> &'static str {
        match self {
            NoteKind::Footnote => "w:footnote",
            NoteKind::Endnote => "w:endnote",
        }
    }

    fn reference(self) -> &'static str {
        match self {
            NoteKind::Footnote => "w:footnoteReference",
            NoteKind::Endnote => "w:endnoteReference",
        }
    }
}

/// Notes copied from an appended document, waiting to be written into the
/// master's notes part.
pub(super) struct NoteImport {
    part: DefinitionsPart,
    pub(super) notes: Vec<XmlElement>,
}

impl NoteImport {
    pub(super) fn write(mut self, master: &mut Document) -> Result<()> {
        log::debug!("importing {} notes into {}", self.notes.len(), self.part.path);
        self.part
            .xml
            .root
            .children
            .extend(self.notes.into_iter().map(XmlNode::Element));
        master
            .container_mut()
            .write_xml_document(&self.part.path, &self.part.xml)
    }
}

/// Note ids referenced from `elements`, in first-use order.
fn referenced_notes(elements: &[XmlElement], kind: NoteKind) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for element in elements {
        element.visit(&mut |e: &XmlElement| {
            if e.name == kind.reference() {
                if let Some(id) = e.attr("w:id") {
                    if !ids.iter().any(|i| i == id) {
                        ids.push(id.to_string());
                    }
                }
            }
        });
    }
    ids
}

/// Copy the notes referenced from `blocks` under fresh ids and point the
/// references at them. Parts the notes refer to are copied as well.
pub(super) fn collect(
    master: &mut Document,
    importer: &mut PartImporter<'_>,
    source: &Document,
    kind: NoteKind,
    blocks: &mut [XmlElement],
) -> Result<Option<NoteImport>> {
    let used = referenced_notes(blocks, kind);
    if used.is_empty() {
        return Ok(None);
    }
    let Some(source_part) = find_definitions(
        importer.source,
        source.main_path(),
        source.relationships(),
        kind.rel_suffix(),
    )?
    else {
        log::warn!("appended content references {} notes that do not exist", kind.rel_suffix());
        return Ok(None);
    };

    let part = match find_definitions(
        master.container(),
        master.main_path(),
        master.relationships(),
        kind.rel_suffix(),
    )? {
        Some(part) => part,
        // Separator notes carry a w:type and are kept
        None => add_definitions(master, importer, &source_part, |e| e.attr("w:type").is_some()),
    };

    let mut next = part
        .xml
        .root
        .elements(kind.note())
        .filter_map(|n| n.attr("w:id"))
        .filter_map(|id| id.parse::<i64>().ok())
        .max()
        .unwrap_or(0)
        .max(0)
        + 1;
    let mut notes = Vec::new();
    let mut ids = HashMap::new();
    for id in used {
        let Some(note) = source_part
            .xml
            .root
            .elements(kind.note())
            .find(|n| n.attr("w:id") == Some(id.as_str()))
        else {
            log::warn!("{} {} is not defined", kind.note(), id);
            continue;
        };
        let mut note = note.clone();
        note.set_attr("w:id", next.to_string());
        ids.insert(id, next.to_string());
        notes.push(note);
        next += 1;
    }

    let source_rels = importer.source.read_relationships(&source_part.path)?;
    let mut target_rels = master.container().read_relationships(&part.path)?;
    import_references(
        importer,
        master.container_mut(),
        &part.path,
        &mut target_rels,
        &source_part.path,
        &source_rels,
        &mut notes,
    )?;
    if !target_rels.is_empty() {
        master
            .container_mut()
            .write_relationships(&part.path, &target_rels)?;
    }

    for block in blocks.iter_mut() {
        block.visit_mut(&mut |e: &mut XmlElement| {
            if e.name == kind.reference() {
                if let Some(new_id) = e.attr("w:id").and_then(|id| ids.get(id)).cloned() {
                    e.set_attr("w:id", new_id);
                }
            }
        });
    }

    Ok(Some(NoteImport { part, notes }))
}
