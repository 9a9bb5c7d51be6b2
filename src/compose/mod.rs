//! Document concatenation.
//!
//! Appends whole Word documents onto a first one, each starting on a new
//! page. Parts referenced from appended content (images, hyperlinks, headers,
//! footers, charts) are copied with fresh relationship ids. Styles, list
//! definitions and notes the appended content uses are merged into the
//! master's definitions.

mod notes;
mod numbering;
mod styles;

use crate::container::{relative_target, resolve_path, ContentTypes, OoxmlContainer, Relationship, Relationships};
use crate::docx::{is_rel_type, Document, REL_NUMBERING, REL_STYLES};
use crate::error::{Error, Result};
use crate::xml::{XmlDocument, XmlElement, XmlNode};
use notes::NoteKind;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Result of writing a composed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposeReport {
    /// Where the document was saved
    pub output_file: PathBuf,
    /// Number of input documents combined
    pub documents: usize,
    /// Sections in the composed document
    pub sections: usize,
}

/// Concatenate documents in order.
///
/// Every path is checked before anything is loaded; if any is missing the
/// call fails with [`Error::MissingInputs`] listing all of them.
pub fn compose<P: AsRef<Path>>(paths: &[P]) -> Result<Document> {
    let paths: Vec<&Path> = paths.iter().map(AsRef::as_ref).collect();
    let Some((first, rest)) = paths.split_first() else {
        return Err(Error::InvalidData("no documents to compose".to_string()));
    };

    let missing: Vec<PathBuf> = paths
        .iter()
        .filter(|p| !p.exists())
        .map(|p| p.to_path_buf())
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingInputs(missing));
    }

    let mut master = Document::open(first)?;
    for path in rest {
        let source = Document::open(path)?;
        append_document(&mut master, &source)?;
        log::debug!("appended {}", path.display());
    }

    // Reload so appended headers and footers become part of the model
    Document::from_container(master.to_container()?)
}

/// Concatenate documents and save the result.
pub fn compose_to<P: AsRef<Path>>(paths: &[P], output: impl AsRef<Path>) -> Result<ComposeReport> {
    let output = output.as_ref();
    let doc = compose(paths)?;
    doc.save(output)?;
    log::info!("composed {} documents into {}", paths.len(), output.display());
    Ok(ComposeReport {
        output_file: output.to_path_buf(),
        documents: paths.len(),
        sections: doc.sections().len(),
    })
}

/// Assemble a shortlist: overview, candidate documents in order, end page.
pub fn merge_shortlist<P: AsRef<Path>>(
    overview: impl AsRef<Path>,
    candidates: &[P],
    end_page: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<ComposeReport> {
    let mut paths = Vec::with_capacity(candidates.len() + 2);
    paths.push(overview.as_ref().to_path_buf());
    paths.extend(candidates.iter().map(|p| p.as_ref().to_path_buf()));
    paths.push(end_page.as_ref().to_path_buf());
    compose_to(&paths, output)
}

/// Append `source` to the end of `master`, starting on a new page.
pub fn append_document(master: &mut Document, source: &Document) -> Result<()> {
    let source_pkg = source.to_container()?;
    let mut importer = PartImporter::new(&source_pkg, master.container().content_types()?)?;

    let mut blocks: Vec<XmlElement> = source
        .main()
        .root
        .first_element("w:body")
        .ok_or_else(|| Error::MissingComponent("w:body".to_string()))?
        .child_elements()
        .cloned()
        .collect();

    let main_path = master.main_path().to_string();
    let mut rels = std::mem::take(master.relationships_mut());
    let imported = import_references(
        &mut importer,
        master.container_mut(),
        &main_path,
        &mut rels,
        source.main_path(),
        source.relationships(),
        &mut blocks,
    );
    *master.relationships_mut() = rels;
    imported?;

    merge_definitions(master, &mut importer, source, &mut blocks)?;

    let types = importer.finish();
    master.container_mut().write_content_types(&types)?;

    let (source_sect, content): (Vec<XmlElement>, Vec<XmlElement>) =
        blocks.into_iter().partition(|e| e.name == "w:sectPr");

    let root = &mut master.main_mut().root;
    merge_namespaces(root, &source.main().root);

    let body = root
        .first_element_mut("w:body")
        .ok_or_else(|| Error::MissingComponent("w:body".to_string()))?;
    let master_sect = body.take_elements("w:sectPr").pop();
    match master_sect {
        Some(ref sect) => body.children.push(section_break_paragraph(sect.clone()).into()),
        None => body.children.push(page_break_paragraph().into()),
    }
    body.children.extend(content.into_iter().map(XmlNode::Element));
    if let Some(mut last) = source_sect.into_iter().last().or(master_sect) {
        set_section_type(&mut last, "nextPage");
        body.children.push(last.into());
    }

    renumber_drawings(body);
    Ok(())
}

/// Attributes in the relationships namespace (`r:id`, `r:embed`, `r:link`, ...).
fn is_relationship_attr(key: &str) -> bool {
    key.starts_with("r:")
}

/// Re-create in `target_rels` every relationship that `elements` reference
/// through `r:` attributes, copying internal targets into `target`, and
/// rewrite the attributes to the new ids.
fn import_references(
    importer: &mut PartImporter<'_>,
    target: &mut OoxmlContainer,
    target_part: &str,
    target_rels: &mut Relationships,
    source_part: &str,
    source_rels: &Relationships,
    elements: &mut [XmlElement],
) -> Result<()> {
    let mut ids: Vec<String> = Vec::new();
    for e in elements.iter() {
        e.visit(&mut |el: &XmlElement| {
            for (key, value) in &el.attributes {
                if is_relationship_attr(key) && !ids.contains(value) {
                    ids.push(value.clone());
                }
            }
        });
    }

    let mut id_map: HashMap<String, String> = HashMap::new();
    for old_id in ids {
        let Some(rel) = source_rels.get(&old_id) else {
            log::warn!("appended content references unknown relationship {}", old_id);
            continue;
        };
        let mut imported = rel.clone();
        if !rel.external {
            let part = resolve_path(source_part, &rel.target);
            if importer.source.exists(&part) {
                let copied = importer.copy_part(target, &part)?;
                imported.target = relative_target(target_part, &copied);
            } else {
                log::warn!("relationship {} points at missing part {}", rel.id, part);
            }
        }
        imported.id = target_rels.next_id();
        id_map.insert(old_id, imported.id.clone());
        target_rels.add(imported);
    }

    for e in elements.iter_mut() {
        e.visit_mut(&mut |el: &mut XmlElement| {
            for (key, value) in el.attributes.iter_mut() {
                if is_relationship_attr(key) {
                    if let Some(new_id) = id_map.get(value.as_str()) {
                        *value = new_id.clone();
                    }
                }
            }
        });
    }
    Ok(())
}

/// A styles, numbering or notes part of a main document part.
struct DefinitionsPart {
    rel: Relationship,
    path: String,
    xml: XmlDocument,
}

/// The part related to `main_path` by a relationship of type `suffix`.
fn find_definitions(
    pkg: &OoxmlContainer,
    main_path: &str,
    rels: &Relationships,
    suffix: &str,
) -> Result<Option<DefinitionsPart>> {
    let Some(rel) = rels.iter().find(|r| !r.external && is_rel_type(r, suffix)) else {
        return Ok(None);
    };
    let path = resolve_path(main_path, &rel.target);
    if !pkg.exists(&path) {
        log::warn!("{} part {} is missing", suffix, path);
        return Ok(None);
    }
    let xml = pkg.read_xml_document(&path)?;
    Ok(Some(DefinitionsPart {
        rel: rel.clone(),
        path,
        xml,
    }))
}

/// Give the master a part modelled on `source`, holding only the root
/// children `keep` selects. The part is registered but not yet written.
fn add_definitions(
    master: &mut Document,
    importer: &mut PartImporter<'_>,
    source: &DefinitionsPart,
    keep: impl Fn(&XmlElement) -> bool,
) -> DefinitionsPart {
    let (stem, ext) = split_part_name(&source.path);
    let path = if master.container().exists(&source.path) {
        master.container().unique_part_name(&stem, &ext)
    } else {
        source.path.clone()
    };

    let mut root = source.xml.root.clone();
    root.children
        .retain(|n| n.as_element().map_or(true, |e| keep(e)));

    importer.register_content_type(&source.path, &path, &ext);
    let rel = Relationship {
        id: master.relationships().next_id(),
        rel_type: source.rel.rel_type.clone(),
        target: relative_target(master.main_path(), &path),
        external: false,
    };
    master.relationships_mut().add(rel.clone());
    log::debug!("added {} to the composed document", path);

    DefinitionsPart {
        rel,
        path,
        xml: XmlDocument {
            declaration: source.xml.declaration.clone(),
            prolog: Vec::new(),
            root,
        },
    }
}

/// Bring the notes, styles and lists `blocks` use into the master and point
/// `blocks` at the imported copies.
fn merge_definitions(
    master: &mut Document,
    importer: &mut PartImporter<'_>,
    source: &Document,
    blocks: &mut [XmlElement],
) -> Result<()> {
    let mut note_imports = Vec::new();
    for kind in [NoteKind::Footnote, NoteKind::Endnote] {
        if let Some(import) = notes::collect(master, importer, source, kind, blocks)? {
            note_imports.push(import);
        }
    }

    let source_styles = find_definitions(
        importer.source,
        source.main_path(),
        source.relationships(),
        REL_STYLES,
    )?;
    let master_styles = find_definitions(
        master.container(),
        master.main_path(),
        master.relationships(),
        REL_STYLES,
    )?;
    let mut new_styles = match source_styles {
        Some(ref part) => {
            let used = styles::referenced_styles(
                blocks
                    .iter()
                    .chain(note_imports.iter().flat_map(|n| n.notes.iter())),
            );
            styles::missing_styles(
                &part.xml.root,
                master_styles.as_ref().map(|p| &p.xml.root),
                &used,
            )
        }
        None => Vec::new(),
    };

    let num_ids = numbering::referenced_num_ids(
        blocks
            .iter()
            .chain(new_styles.iter())
            .chain(note_imports.iter().flat_map(|n| n.notes.iter())),
    );
    if !num_ids.is_empty() {
        let source_numbering = find_definitions(
            importer.source,
            source.main_path(),
            source.relationships(),
            REL_NUMBERING,
        )?;
        if let Some(source_numbering) = source_numbering {
            let mut target = match find_definitions(
                master.container(),
                master.main_path(),
                master.relationships(),
                REL_NUMBERING,
            )? {
                Some(part) => part,
                None => add_definitions(master, importer, &source_numbering, |_| false),
            };
            let map = numbering::import(&source_numbering.xml.root, &mut target.xml.root, &num_ids);
            numbering::renumber(
                blocks
                    .iter_mut()
                    .chain(new_styles.iter_mut())
                    .chain(note_imports.iter_mut().flat_map(|n| n.notes.iter_mut())),
                &map,
            );
            master
                .container_mut()
                .write_xml_document(&target.path, &target.xml)?;
        }
    }

    if let (Some(source_part), false) = (source_styles, new_styles.is_empty()) {
        let mut target = match master_styles {
            Some(part) => part,
            None => add_definitions(master, importer, &source_part, |e| e.name != "w:style"),
        };
        log::debug!("importing {} styles into {}", new_styles.len(), target.path);
        target
            .xml
            .root
            .children
            .extend(new_styles.into_iter().map(XmlNode::Element));
        master
            .container_mut()
            .write_xml_document(&target.path, &target.xml)?;
    }

    for import in note_imports {
        import.write(master)?;
    }
    Ok(())
}

/// Copies parts from one package into another under fresh names.
struct PartImporter<'a> {
    source: &'a OoxmlContainer,
    source_types: ContentTypes,
    target_types: ContentTypes,
    copied: HashMap<String, String>,
}

impl<'a> PartImporter<'a> {
    fn new(source: &'a OoxmlContainer, target_types: ContentTypes) -> Result<Self> {
        Ok(Self {
            source,
            source_types: source.content_types()?,
            target_types,
            copied: HashMap::new(),
        })
    }

    /// Copy a part and, recursively, the parts it references. Returns the
    /// part's name in the target package.
    fn copy_part(&mut self, target: &mut OoxmlContainer, part: &str) -> Result<String> {
        if let Some(done) = self.copied.get(part) {
            return Ok(done.clone());
        }

        let (stem, ext) = split_part_name(part);
        let new_name = target.unique_part_name(&stem, &ext);
        target.write_part(&new_name, self.source.read_binary(part)?);
        self.copied.insert(part.to_string(), new_name.clone());
        self.register_content_type(part, &new_name, &ext);

        let rels = self.source.read_relationships(part)?;
        if !rels.is_empty() {
            let mut copied_rels = Relationships::new();
            for rel in rels.iter() {
                let mut rel = rel.clone();
                if !rel.external {
                    let child = resolve_path(part, &rel.target);
                    if self.source.exists(&child) {
                        let copied = self.copy_part(target, &child)?;
                        rel.target = relative_target(&new_name, &copied);
                    }
                }
                copied_rels.add(rel);
            }
            target.write_relationships(&new_name, &copied_rels)?;
        }

        Ok(new_name)
    }

    fn register_content_type(&mut self, part: &str, new_name: &str, ext: &str) {
        if self.source_types.has_override(part) {
            if let Some(ct) = self.source_types.content_type_for(part) {
                self.target_types.add_override(new_name, ct);
            }
            return;
        }
        let ct = self
            .source_types
            .default_for(ext)
            .map(str::to_string)
            .or_else(|| guess_content_type(ext).map(str::to_string));
        match ct {
            Some(ct) => self.target_types.ensure_default(ext, &ct),
            None => log::warn!("no content type known for {}", new_name),
        }
    }

    fn finish(self) -> ContentTypes {
        self.target_types
    }
}

/// `word/media/image12.png` splits into `word/media/image` and `png`.
fn split_part_name(part: &str) -> (String, String) {
    let (dir, file) = match part.rsplit_once('/') {
        Some((dir, file)) => (format!("{}/", dir), file),
        None => (String::new(), part),
    };
    let (stem, ext) = file.rsplit_once('.').unwrap_or((file, ""));
    let stem = stem.trim_end_matches(|c: char| c.is_ascii_digit());
    (format!("{}{}", dir, stem), ext.to_string())
}

/// Content type for common media extensions.
fn guess_content_type(ext: &str) -> Option<&'static str> {
    Some(match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tiff" | "tif" => "image/tiff",
        "svg" => "image/svg+xml",
        "emf" => "image/x-emf",
        "wmf" => "image/x-wmf",
        "xml" => "application/xml",
        _ => return None,
    })
}

fn merge_namespaces(master: &mut XmlElement, source: &XmlElement) {
    for (key, value) in &source.attributes {
        if key.starts_with("xmlns:") && master.attr(key).is_none() {
            master.set_attr(key.clone(), value.clone());
        }
    }

    if let Some(source_ignorable) = source.attr("mc:Ignorable") {
        let mut prefixes: Vec<String> = master
            .attr("mc:Ignorable")
            .map(|v| v.split_whitespace().map(String::from).collect())
            .unwrap_or_default();
        for prefix in source_ignorable.split_whitespace() {
            if !prefixes.iter().any(|p| p == prefix) {
                prefixes.push(prefix.to_string());
            }
        }
        master.set_attr("mc:Ignorable", prefixes.join(" "));
    }
}

/// An empty paragraph that closes a section with `sect_pr`.
fn section_break_paragraph(sect_pr: XmlElement) -> XmlElement {
    XmlElement::new("w:p").with_child(XmlElement::new("w:pPr").with_child(sect_pr))
}

fn page_break_paragraph() -> XmlElement {
    XmlElement::new("w:p").with_child(
        XmlElement::new("w:r").with_child(XmlElement::new("w:br").with_attr("w:type", "page")),
    )
}

/// Set how the section starts; `w:type` follows the header/footer
/// references and note properties.
fn set_section_type(sect_pr: &mut XmlElement, value: &str) {
    if let Some(t) = sect_pr.first_element_mut("w:type") {
        t.set_attr("w:val", value);
        return;
    }
    let index = sect_pr
        .children
        .iter()
        .rposition(|n| {
            n.as_element().is_some_and(|e| {
                matches!(
                    e.name.as_str(),
                    "w:headerReference" | "w:footerReference" | "w:footnotePr" | "w:endnotePr"
                )
            })
        })
        .map_or(0, |i| i + 1);
    sect_pr
        .children
        .insert(index, XmlElement::new("w:type").with_attr("w:val", value).into());
}

/// Drawing ids must be unique within the document.
fn renumber_drawings(body: &mut XmlElement) {
    let mut next = 1u32;
    body.visit_mut(&mut |e: &mut XmlElement| {
        if e.name == "wp:docPr" {
            e.set_attr("id", next.to_string());
            next += 1;
        }
    });
}
