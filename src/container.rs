//! ZIP container abstraction for OOXML packages.
//!
//! The whole package is held in memory as an ordered list of entries so parts
//! can be rewritten and the archive saved again with its original entry order.

use crate::error::{Error, Result};
use crate::xml::{XmlDocument, XmlElement};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

const RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

/// Path of the content-types listing inside every package.
pub const CONTENT_TYPES_PATH: &str = "[Content_Types].xml";

/// A relationship entry from a .rels file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1")
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target path (relative or absolute)
    pub target: String,
    /// Whether the target is external
    pub external: bool,
}

/// Relationships of one part, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Relationships {
    items: Vec<Relationship>,
}

impl Relationships {
    /// Create a new empty relationships collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the content of a .rels part.
    pub fn parse(content: &str) -> Result<Self> {
        let mut rels = Relationships::new();
        if content.trim().is_empty() {
            return Ok(rels);
        }

        let mut reader = quick_xml::Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(quick_xml::events::Event::Empty(e)) | Ok(quick_xml::events::Event::Start(e))
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let mut rel = Relationship {
                        id: String::new(),
                        rel_type: String::new(),
                        target: String::new(),
                        external: false,
                    };

                    for attr in e.attributes().flatten() {
                        let value = attr.unescape_value()?.into_owned();
                        match attr.key.as_ref() {
                            b"Id" => rel.id = value,
                            b"Type" => rel.rel_type = value,
                            b"Target" => rel.target = value,
                            b"TargetMode" => rel.external = value.eq_ignore_ascii_case("external"),
                            _ => {}
                        }
                    }

                    if !rel.id.is_empty() {
                        rels.add(rel);
                    }
                }
                Ok(quick_xml::events::Event::Eof) => break,
                Err(e) => return Err(Error::XmlParse(e.to_string())),
                _ => {}
            }
            buf.clear();
        }

        Ok(rels)
    }

    /// Serialize back to .rels XML.
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut root = XmlElement::new("Relationships").with_attr("xmlns", RELS_NS);
        for rel in &self.items {
            let mut e = XmlElement::new("Relationship")
                .with_attr("Id", rel.id.as_str())
                .with_attr("Type", rel.rel_type.as_str())
                .with_attr("Target", rel.target.as_str());
            if rel.external {
                e.set_attr("TargetMode", "External");
            }
            root = root.with_child(e);
        }
        XmlDocument::new(root).to_bytes()
    }

    /// Get a relationship by ID.
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.id == id)
    }

    /// Get relationships by type.
    pub fn get_by_type(&self, rel_type: &str) -> Vec<&Relationship> {
        self.items.iter().filter(|r| r.rel_type == rel_type).collect()
    }

    /// Add a relationship, replacing one with the same ID.
    pub fn add(&mut self, rel: Relationship) {
        match self.items.iter_mut().find(|r| r.id == rel.id) {
            Some(slot) => *slot = rel,
            None => self.items.push(rel),
        }
    }

    /// Smallest `rIdN` not yet in use.
    pub fn next_id(&self) -> String {
        let mut n = self
            .items
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        loop {
            let id = format!("rId{}", n);
            if self.get(&id).is_none() {
                return id;
            }
            n += 1;
        }
    }

    /// Iterate in file order.
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.items.iter()
    }

    /// Number of relationships.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no relationships.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The `[Content_Types].xml` listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    /// (extension, content type)
    defaults: Vec<(String, String)>,
    /// (part name with leading slash, content type)
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    /// Parse a content-types listing.
    pub fn parse(content: &str) -> Result<Self> {
        let doc = XmlDocument::parse(content)?;
        let mut types = ContentTypes::default();
        for e in doc.root.child_elements() {
            match (e.local_name(), e.attr("ContentType")) {
                ("Default", Some(ct)) => {
                    if let Some(ext) = e.attr("Extension") {
                        types.defaults.push((ext.to_string(), ct.to_string()));
                    }
                }
                ("Override", Some(ct)) => {
                    if let Some(part) = e.attr("PartName") {
                        types.overrides.push((part.to_string(), ct.to_string()));
                    }
                }
                _ => {}
            }
        }
        Ok(types)
    }

    /// Serialize to XML.
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut root = XmlElement::new("Types").with_attr("xmlns", CONTENT_TYPES_NS);
        for (ext, ct) in &self.defaults {
            root = root.with_child(
                XmlElement::new("Default")
                    .with_attr("Extension", ext.as_str())
                    .with_attr("ContentType", ct.as_str()),
            );
        }
        for (part, ct) in &self.overrides {
            root = root.with_child(
                XmlElement::new("Override")
                    .with_attr("PartName", part.as_str())
                    .with_attr("ContentType", ct.as_str()),
            );
        }
        XmlDocument::new(root).to_bytes()
    }

    /// Content type of a part: its override, else the default for its extension.
    pub fn content_type_for(&self, part: &str) -> Option<&str> {
        let part_name = format!("/{}", part.trim_start_matches('/'));
        if let Some((_, ct)) = self
            .overrides
            .iter()
            .find(|(p, _)| p.eq_ignore_ascii_case(&part_name))
        {
            return Some(ct);
        }
        self.default_for(&extension_of(part))
    }

    /// Whether the part's type comes from an explicit override.
    pub fn has_override(&self, part: &str) -> bool {
        let part_name = format!("/{}", part.trim_start_matches('/'));
        self.overrides
            .iter()
            .any(|(p, _)| p.eq_ignore_ascii_case(&part_name))
    }

    /// Default content type registered for an extension.
    pub fn default_for(&self, ext: &str) -> Option<&str> {
        self.defaults
            .iter()
            .find(|(e, _)| e.eq_ignore_ascii_case(ext))
            .map(|(_, ct)| ct.as_str())
    }

    /// Register or replace the override for a part.
    pub fn add_override(&mut self, part: &str, content_type: &str) {
        let part_name = format!("/{}", part.trim_start_matches('/'));
        match self.overrides.iter_mut().find(|(p, _)| *p == part_name) {
            Some(slot) => slot.1 = content_type.to_string(),
            None => self.overrides.push((part_name, content_type.to_string())),
        }
    }

    /// Register a default for an extension unless one exists.
    pub fn ensure_default(&mut self, ext: &str, content_type: &str) {
        if self.default_for(ext).is_none() {
            self.defaults.push((ext.to_string(), content_type.to_string()));
        }
    }
}

fn extension_of(part: &str) -> String {
    Path::new(part)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Fix XML encoding declaration from UTF-16 to UTF-8.
///
/// Once decoded into a Rust string the declaration would otherwise still
/// claim UTF-16 and quick-xml would try to decode it a second time.
fn fix_xml_encoding_declaration(content: &str) -> String {
    if content.starts_with("<?xml") {
        if let Some(end_decl) = content.find("?>") {
            let (decl, rest) = content.split_at(end_decl + 2);
            let fixed = ["\"UTF-16\"", "'UTF-16'", "\"utf-16\"", "'utf-16'"]
                .iter()
                .fold(decl.to_string(), |d, enc| {
                    d.replace(&format!("encoding={}", enc), "encoding=\"UTF-8\"")
                });
            return format!("{}{}", fixed, rest);
        }
    }
    content.to_string()
}

/// Decode XML bytes handling different encodings (UTF-8, UTF-16 LE/BE).
pub fn decode_xml_bytes(bytes: &[u8]) -> Result<String> {
    match bytes {
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8(rest.to_vec())
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))),
        [0xFF, 0xFE, rest @ ..] => Ok(fix_xml_encoding_declaration(&decode_utf16(rest, u16::from_le_bytes)?)),
        [0xFE, 0xFF, rest @ ..] => Ok(fix_xml_encoding_declaration(&decode_utf16(rest, u16::from_be_bytes)?)),
        _ => match std::str::from_utf8(bytes) {
            Ok(s) => Ok(s.to_string()),
            // No BOM: ASCII markup in UTF-16 has a zero in every other byte
            Err(_) if bytes.len() >= 4 && bytes[1] == 0 && bytes[3] == 0 => {
                Ok(fix_xml_encoding_declaration(&decode_utf16(bytes, u16::from_le_bytes)?))
            }
            Err(_) if bytes.len() >= 4 && bytes[0] == 0 && bytes[2] == 0 => {
                Ok(fix_xml_encoding_declaration(&decode_utf16(bytes, u16::from_be_bytes)?))
            }
            Err(_) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        },
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> Result<String> {
    let units = bytes.chunks_exact(2).map(|pair| to_unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// OOXML package held in memory.
///
/// Provides methods to read and replace XML parts, binary data, relationships
/// and content types, and to write the package back out as a ZIP archive.
#[derive(Clone)]
pub struct OoxmlContainer {
    entries: Vec<(String, Vec<u8>)>,
}

impl OoxmlContainer {
    /// Open an OOXML container from a file path.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use exreport::container::OoxmlContainer;
    ///
    /// let container = OoxmlContainer::open("template.docx")?;
    /// assert!(container.exists("word/document.xml"));
    /// # Ok::<(), exreport::Error>(())
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Create an OOXML container from a byte vector.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_reader(Cursor::new(data))
    }

    /// Create an OOXML container from a reader.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push((name, data));
        }
        Ok(Self { entries })
    }

    /// Read an XML part as a string, decoding UTF-8 or UTF-16.
    pub fn read_xml(&self, path: &str) -> Result<String> {
        decode_xml_bytes(self.bytes(path)?)
    }

    /// Read and parse an XML part into an editable tree.
    pub fn read_xml_document(&self, path: &str) -> Result<XmlDocument> {
        XmlDocument::parse(&self.read_xml(path)?)
    }

    /// Read a binary part.
    pub fn read_binary(&self, path: &str) -> Result<Vec<u8>> {
        self.bytes(path).map(<[u8]>::to_vec)
    }

    fn bytes(&self, path: &str) -> Result<&[u8]> {
        self.entries
            .iter()
            .find(|(name, _)| name == path)
            .map(|(_, data)| data.as_slice())
            .ok_or_else(|| Error::MissingComponent(path.to_string()))
    }

    /// Check if a part exists.
    pub fn exists(&self, path: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == path)
    }

    /// List all parts in archive order.
    pub fn list_files(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Replace a part in place, or append it if new.
    pub fn write_part(&mut self, path: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|(name, _)| name == path) {
            Some(entry) => entry.1 = data,
            None => self.entries.push((path.to_string(), data)),
        }
    }

    /// Serialize and store an XML part.
    pub fn write_xml_document(&mut self, path: &str, doc: &XmlDocument) -> Result<()> {
        let bytes = doc.to_bytes()?;
        self.write_part(path, bytes);
        Ok(())
    }

    /// A part name not yet used, built from `stem`, a counter and `ext`.
    ///
    /// `unique_part_name("word/media/image", "png")` yields `word/media/image1.png`
    /// or the next free number.
    pub fn unique_part_name(&self, stem: &str, ext: &str) -> String {
        let mut n = 1;
        loop {
            let candidate = if ext.is_empty() {
                format!("{}{}", stem, n)
            } else {
                format!("{}{}.{}", stem, n, ext)
            };
            if !self.exists(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Read relationships of a part; a part without a .rels file has none.
    pub fn read_relationships(&self, part_path: &str) -> Result<Relationships> {
        let rels_path = rels_path_for(part_path);
        if !self.exists(&rels_path) {
            return Ok(Relationships::new());
        }
        Relationships::parse(&self.read_xml(&rels_path)?)
    }

    /// Read package-level relationships (_rels/.rels).
    pub fn read_package_relationships(&self) -> Result<Relationships> {
        self.read_relationships("")
    }

    /// Store relationships of a part.
    pub fn write_relationships(&mut self, part_path: &str, rels: &Relationships) -> Result<()> {
        let bytes = rels.to_xml()?;
        self.write_part(&rels_path_for(part_path), bytes);
        Ok(())
    }

    /// Read the content-types listing.
    pub fn content_types(&self) -> Result<ContentTypes> {
        ContentTypes::parse(&self.read_xml(CONTENT_TYPES_PATH)?)
    }

    /// Store the content-types listing.
    pub fn write_content_types(&mut self, types: &ContentTypes) -> Result<()> {
        let bytes = types.to_xml()?;
        self.write_part(CONTENT_TYPES_PATH, bytes);
        Ok(())
    }

    /// Write the package as a ZIP archive into memory.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        // Media is already compressed
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        for (name, data) in &self.entries {
            let options = if name.contains("/media/") {
                stored
            } else {
                deflated
            };
            zip.start_file(name.as_str(), options)?;
            zip.write_all(data)?;
        }

        Ok(zip.finish()?.into_inner())
    }

    /// Save the package to a file, creating the parent directory.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Resolve a relative path from a base path.
    pub fn resolve_path(base: &str, relative: &str) -> String {
        resolve_path(base, relative)
    }
}

impl std::fmt::Debug for OoxmlContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OoxmlContainer")
            .field("files", &self.entries.len())
            .finish()
    }
}

/// Resolve a relationship target against the part that owns it.
pub fn resolve_path(base: &str, relative: &str) -> String {
    if let Some(stripped) = relative.strip_prefix('/') {
        return stripped.to_string();
    }

    let mut parts: Vec<&str> = base.split('/').collect();
    parts.pop();
    for component in relative.split('/') {
        match component {
            ".." => {
                parts.pop();
            }
            "." | "" => {}
            c => parts.push(c),
        }
    }
    parts.retain(|p| !p.is_empty());
    parts.join("/")
}

/// Express an absolute part name as a target relative to `base`'s directory.
pub fn relative_target(base: &str, absolute: &str) -> String {
    let mut base_dir: Vec<&str> = base.split('/').filter(|p| !p.is_empty()).collect();
    base_dir.pop();
    let target: Vec<&str> = absolute.split('/').filter(|p| !p.is_empty()).collect();

    let common = base_dir
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = std::iter::repeat("..").take(base_dir.len() - common).collect();
    parts.extend_from_slice(&target[common..]);
    parts.join("/")
}

/// Location of the .rels file for a part; the package itself is `""`.
pub fn rels_path_for(part_path: &str) -> String {
    let part_path = part_path.trim_start_matches('/');
    if part_path.is_empty() {
        return "_rels/.rels".to_string();
    }
    match part_path.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part_path),
    }
}
