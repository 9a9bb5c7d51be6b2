//! Editable Word document.

use super::run::{paragraph_text, run_text};
use super::{is_rel_type, REL_FOOTER, REL_HEADER, REL_OFFICE_DOCUMENT};
use crate::container::{resolve_path, OoxmlContainer, Relationships};
use crate::error::{Error, Result};
use crate::xml::{XmlDocument, XmlElement};
use std::path::Path;

/// Where a substitution scope lives in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// A direct paragraph of the body
    BodyParagraph,
    /// A paragraph in a cell of a body table
    BodyTableCell,
    /// A paragraph of a section header
    HeaderParagraph,
    /// A paragraph of a section footer
    FooterParagraph,
    /// A paragraph in a cell of a footer table
    FooterTableCell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoryKind {
    Header,
    Footer,
}

/// A header or footer part loaded for editing.
#[derive(Debug, Clone)]
struct StoryPart {
    path: String,
    kind: StoryKind,
    xml: XmlDocument,
}

/// Header and footer parts in effect for one section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    /// Package path of the default header, if any
    pub header: Option<String>,
    /// Package path of the default footer, if any
    pub footer: Option<String>,
}

/// A Word document loaded for in-place editing.
///
/// Holds the main document part and every header/footer part as editable
/// trees; all other parts stay as bytes and are written back untouched.
#[derive(Debug, Clone)]
pub struct Document {
    container: OoxmlContainer,
    main_path: String,
    main: XmlDocument,
    rels: Relationships,
    stories: Vec<StoryPart>,
}

impl Document {
    /// Load a document from a file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use exreport::Document;
    ///
    /// let doc = Document::open("templates/candidate.docx")?;
    /// println!("{} sections", doc.sections().len());
    /// # Ok::<(), exreport::Error>(())
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_container(OoxmlContainer::open(path)?)
    }

    /// Load a document from bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_container(OoxmlContainer::from_bytes(data)?)
    }

    /// Load a document from an opened package.
    pub fn from_container(container: OoxmlContainer) -> Result<Self> {
        let package_rels = container.read_package_relationships()?;
        let main_rel = package_rels
            .iter()
            .find(|r| !r.external && is_rel_type(r, REL_OFFICE_DOCUMENT))
            .ok_or_else(|| {
                Error::UnsupportedFormat("package has no main document part".to_string())
            })?;
        let main_path = resolve_path("", &main_rel.target);

        if let Ok(types) = container.content_types() {
            if let Some(ct) = types.content_type_for(&main_path) {
                if !ct.contains("wordprocessingml") {
                    return Err(Error::UnsupportedFormat(format!(
                        "main part {} is {}",
                        main_path, ct
                    )));
                }
            }
        }

        let main = container.read_xml_document(&main_path)?;
        if main.root.first_element("w:body").is_none() {
            return Err(Error::MissingComponent(format!("w:body in {}", main_path)));
        }

        let rels = container.read_relationships(&main_path)?;
        let mut stories = Vec::new();
        for rel in rels.iter().filter(|r| !r.external) {
            let kind = if is_rel_type(rel, REL_HEADER) {
                StoryKind::Header
            } else if is_rel_type(rel, REL_FOOTER) {
                StoryKind::Footer
            } else {
                continue;
            };
            let path = resolve_path(&main_path, &rel.target);
            if stories.iter().any(|s: &StoryPart| s.path == path) {
                continue;
            }
            if !container.exists(&path) {
                log::warn!("skipping missing {:?} part {}", kind, path);
                continue;
            }
            let xml = container.read_xml_document(&path)?;
            stories.push(StoryPart { path, kind, xml });
        }

        log::debug!(
            "loaded {} with {} header/footer parts",
            main_path,
            stories.len()
        );

        Ok(Self {
            container,
            main_path,
            main,
            rels,
            stories,
        })
    }

    /// Package with every edited part written back.
    pub fn to_container(&self) -> Result<OoxmlContainer> {
        let mut container = self.container.clone();
        container.write_xml_document(&self.main_path, &self.main)?;
        container.write_relationships(&self.main_path, &self.rels)?;
        for story in &self.stories {
            container.write_xml_document(&story.path, &story.xml)?;
        }
        Ok(container)
    }

    /// Serialize the document to .docx bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_container()?.to_bytes()
    }

    /// Save the document, creating the parent directory if needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_container()?.save(path)
    }

    /// Sections in document order with the header and footer each one shows.
    ///
    /// Only `default` references are followed. A section without its own
    /// reference inherits the previous section's part.
    pub fn sections(&self) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut current = Section::default();

        for sect_pr in self.section_properties() {
            if let Some(path) = self.reference_target(sect_pr, "w:headerReference") {
                current.header = Some(path);
            }
            if let Some(path) = self.reference_target(sect_pr, "w:footerReference") {
                current.footer = Some(path);
            }
            sections.push(current.clone());
        }
        sections
    }

    /// Every `w:p/w:pPr/w:sectPr` of the body followed by the body `w:sectPr`.
    fn section_properties(&self) -> Vec<&XmlElement> {
        let Some(body) = self.body() else {
            return Vec::new();
        };
        body.child_elements()
            .filter_map(|e| match e.name.as_str() {
                "w:p" => e
                    .first_element("w:pPr")
                    .and_then(|ppr| ppr.first_element("w:sectPr")),
                "w:sectPr" => Some(e),
                _ => None,
            })
            .collect()
    }

    fn reference_target(&self, sect_pr: &XmlElement, reference: &str) -> Option<String> {
        let rel_id = sect_pr
            .elements(reference)
            .find(|r| matches!(r.attr("w:type"), None | Some("default")))?
            .attr("r:id")?;
        let rel = self.rels.get(rel_id)?;
        let path = resolve_path(&self.main_path, &rel.target);
        self.stories
            .iter()
            .any(|s| s.path == path)
            .then_some(path)
    }

    /// Distinct header/footer parts in the order sections show them.
    fn story_order(&self) -> Vec<usize> {
        let mut order = Vec::new();
        for section in self.sections() {
            for path in [section.header, section.footer].into_iter().flatten() {
                if let Some(i) = self.stories.iter().position(|s| s.path == path) {
                    if !order.contains(&i) {
                        order.push(i);
                    }
                }
            }
        }
        order
    }

    /// Visit every substitution scope mutably.
    ///
    /// Order: body paragraphs, body table cells (row-major), then per section
    /// the header paragraphs, footer paragraphs and footer table cells. A part
    /// shared by several sections is visited once. Header tables are not
    /// visited.
    pub fn for_each_scope_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(ScopeKind, &mut XmlElement),
    {
        let order = self.story_order();

        if let Some(body) = self.main.root.first_element_mut("w:body") {
            for p in body.elements_mut("w:p") {
                f(ScopeKind::BodyParagraph, p);
            }
            for tbl in body.elements_mut("w:tbl") {
                visit_cells_mut(tbl, ScopeKind::BodyTableCell, &mut f);
            }
        }

        for i in order {
            let story = &mut self.stories[i];
            match story.kind {
                StoryKind::Header => {
                    for p in story.xml.root.elements_mut("w:p") {
                        f(ScopeKind::HeaderParagraph, p);
                    }
                }
                StoryKind::Footer => {
                    for p in story.xml.root.elements_mut("w:p") {
                        f(ScopeKind::FooterParagraph, p);
                    }
                    for tbl in story.xml.root.elements_mut("w:tbl") {
                        visit_cells_mut(tbl, ScopeKind::FooterTableCell, &mut f);
                    }
                }
            }
        }
    }

    /// Visit every substitution scope, in the same order as
    /// [`for_each_scope_mut`](Self::for_each_scope_mut).
    pub fn for_each_scope<F>(&self, mut f: F)
    where
        F: FnMut(ScopeKind, &XmlElement),
    {
        if let Some(body) = self.body() {
            for p in body.elements("w:p") {
                f(ScopeKind::BodyParagraph, p);
            }
            for tbl in body.elements("w:tbl") {
                visit_cells(tbl, ScopeKind::BodyTableCell, &mut f);
            }
        }

        for i in self.story_order() {
            let story = &self.stories[i];
            let root = &story.xml.root;
            match story.kind {
                StoryKind::Header => {
                    for p in root.elements("w:p") {
                        f(ScopeKind::HeaderParagraph, p);
                    }
                }
                StoryKind::Footer => {
                    for p in root.elements("w:p") {
                        f(ScopeKind::FooterParagraph, p);
                    }
                    for tbl in root.elements("w:tbl") {
                        visit_cells(tbl, ScopeKind::FooterTableCell, &mut f);
                    }
                }
            }
        }
    }

    /// Plain text of the body, one line per paragraph, tables depth-first.
    pub fn plain_text(&self) -> String {
        let mut lines = Vec::new();
        if let Some(body) = self.body() {
            collect_block_text(body, &mut lines);
        }
        lines.join("\n")
    }

    /// Distinct `{identifier}` tokens still present in any scope, in scope order.
    pub fn placeholders(&self) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        self.for_each_scope(|_, p| {
            for token in scan_tokens(&paragraph_text(p)) {
                if !found.iter().any(|t| *t == token) {
                    found.push(token);
                }
            }
        });
        found
    }

    fn body(&self) -> Option<&XmlElement> {
        self.main.root.first_element("w:body")
    }

    /// Package path of the main document part.
    pub fn main_path(&self) -> &str {
        &self.main_path
    }

    /// The main document part.
    pub fn main(&self) -> &XmlDocument {
        &self.main
    }

    pub(crate) fn main_mut(&mut self) -> &mut XmlDocument {
        &mut self.main
    }

    /// Relationships of the main document part.
    pub fn relationships(&self) -> &Relationships {
        &self.rels
    }

    pub(crate) fn relationships_mut(&mut self) -> &mut Relationships {
        &mut self.rels
    }

    /// The underlying package, without pending edits.
    pub fn container(&self) -> &OoxmlContainer {
        &self.container
    }

    pub(crate) fn container_mut(&mut self) -> &mut OoxmlContainer {
        &mut self.container
    }
}

fn visit_cells_mut<F>(tbl: &mut XmlElement, kind: ScopeKind, f: &mut F)
where
    F: FnMut(ScopeKind, &mut XmlElement),
{
    for tr in tbl.elements_mut("w:tr") {
        for tc in tr.elements_mut("w:tc") {
            for p in tc.elements_mut("w:p") {
                f(kind, p);
            }
        }
    }
}

fn visit_cells<F>(tbl: &XmlElement, kind: ScopeKind, f: &mut F)
where
    F: FnMut(ScopeKind, &XmlElement),
{
    for tr in tbl.elements("w:tr") {
        for tc in tr.elements("w:tc") {
            for p in tc.elements("w:p") {
                f(kind, p);
            }
        }
    }
}

fn collect_block_text(container: &XmlElement, lines: &mut Vec<String>) {
    for child in container.child_elements() {
        match child.name.as_str() {
            "w:p" => {
                let mut line = String::new();
                child.visit(&mut |e: &XmlElement| {
                    if e.name == "w:r" {
                        line.push_str(&run_text(e));
                    }
                });
                lines.push(line);
            }
            "w:tbl" => {
                for tr in child.elements("w:tr") {
                    for tc in tr.elements("w:tc") {
                        collect_block_text(tc, lines);
                    }
                }
            }
            "w:sdt" => {
                if let Some(content) = child.first_element("w:sdtContent") {
                    collect_block_text(content, lines);
                }
            }
            _ => {}
        }
    }
}

/// Find `{identifier}` tokens, identifier being ASCII alphanumerics or `_`.
fn scan_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let ident_len = after
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
            .count();
        if ident_len > 0 && after.as_bytes().get(ident_len) == Some(&b'}') {
            tokens.push(format!("{{{}}}", &after[..ident_len]));
            rest = &after[ident_len + 1..];
        } else {
            rest = after;
        }
    }
    tokens
}
