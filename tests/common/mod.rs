//! Synthetic .docx packages for integration tests.

#![allow(dead_code)]

use exreport::{Document, ScopeKind};
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const NAMESPACES: &str = concat!(
    r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" "#,
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture""#,
);

const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Builds a minimal Word package.
#[derive(Default)]
pub struct DocxBuilder {
    body: String,
    root_attrs: String,
    parts: Vec<Part>,
}

struct Part {
    rid: String,
    rel_type: &'static str,
    target: String,
    content_type: Option<String>,
    data: Option<Vec<u8>>,
    external: bool,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw XML placed inside `w:body`.
    pub fn body(mut self, xml: impl Into<String>) -> Self {
        self.body = xml.into();
        self
    }

    /// Extra attributes on the document root, e.g. namespace declarations.
    pub fn root_attrs(mut self, attrs: &str) -> Self {
        self.root_attrs = format!(" {}", attrs);
        self
    }

    /// Header part `word/<file>` with the given inner XML.
    pub fn header(self, rid: &str, file: &str, inner: &str) -> Self {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:hdr {}>{}</w:hdr>"#,
            NAMESPACES, inner
        );
        self.part(
            rid,
            "header",
            file,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml",
            xml.into_bytes(),
        )
    }

    /// Footer part `word/<file>` with the given inner XML.
    pub fn footer(self, rid: &str, file: &str, inner: &str) -> Self {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:ftr {}>{}</w:ftr>"#,
            NAMESPACES, inner
        );
        self.part(
            rid,
            "footer",
            file,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml",
            xml.into_bytes(),
        )
    }

    /// Style definitions part `word/styles.xml` holding `inner`.
    pub fn styles(self, rid: &str, inner: &str) -> Self {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:styles {}>{}</w:styles>"#,
            NAMESPACES, inner
        );
        self.part(
            rid,
            "styles",
            "styles.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml",
            xml.into_bytes(),
        )
    }

    /// Numbering definitions part `word/numbering.xml` holding `inner`.
    pub fn numbering(self, rid: &str, inner: &str) -> Self {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:numbering {}>{}</w:numbering>"#,
            NAMESPACES, inner
        );
        self.part(
            rid,
            "numbering",
            "numbering.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml",
            xml.into_bytes(),
        )
    }

    /// Footnotes part `word/footnotes.xml` with the two separator notes
    /// followed by `inner`.
    pub fn footnotes(self, rid: &str, inner: &str) -> Self {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:footnotes {}><w:footnote w:type="separator" w:id="-1"><w:p><w:r><w:separator/></w:r></w:p></w:footnote><w:footnote w:type="continuationSeparator" w:id="0"><w:p><w:r><w:continuationSeparator/></w:r></w:p></w:footnote>{}</w:footnotes>"#,
            NAMESPACES, inner
        );
        self.part(
            rid,
            "footnotes",
            "footnotes.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.footnotes+xml",
            xml.into_bytes(),
        )
    }

    /// Image part `word/media/<file>`, typed through a `png` default.
    pub fn image(mut self, rid: &str, file: &str, data: &[u8]) -> Self {
        self.parts.push(Part {
            rid: rid.to_string(),
            rel_type: "image",
            target: format!("media/{}", file),
            content_type: None,
            data: Some(data.to_vec()),
            external: false,
        });
        self
    }

    /// External hyperlink relationship.
    pub fn hyperlink(mut self, rid: &str, url: &str) -> Self {
        self.parts.push(Part {
            rid: rid.to_string(),
            rel_type: "hyperlink",
            target: url.to_string(),
            content_type: None,
            data: None,
            external: true,
        });
        self
    }

    fn part(mut self, rid: &str, rel_type: &'static str, file: &str, ct: &str, data: Vec<u8>) -> Self {
        self.parts.push(Part {
            rid: rid.to_string(),
            rel_type,
            target: file.to_string(),
            content_type: Some(ct.to_string()),
            data: Some(data),
            external: false,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let mut types = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
        );
        for part in &self.parts {
            if let Some(ref ct) = part.content_type {
                types.push_str(&format!(
                    r#"<Override PartName="/word/{}" ContentType="{}"/>"#,
                    part.target, ct
                ));
            }
        }
        types.push_str("</Types>");
        write_entry(&mut zip, "[Content_Types].xml", types.as_bytes(), options);

        write_entry(
            &mut zip,
            "_rels/.rels",
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#,
            options,
        );

        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document {}{}><w:body>{}</w:body></w:document>"#,
            NAMESPACES, self.root_attrs, self.body
        );
        write_entry(&mut zip, "word/document.xml", document.as_bytes(), options);

        let mut rels = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for part in &self.parts {
            let mode = if part.external { r#" TargetMode="External""# } else { "" };
            rels.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}/{}" Target="{}"{}/>"#,
                part.rid, REL_NS, part.rel_type, part.target, mode
            ));
            if let Some(ref data) = part.data {
                write_entry(&mut zip, &format!("word/{}", part.target), data, options);
            }
        }
        rels.push_str("</Relationships>");
        write_entry(&mut zip, "word/_rels/document.xml.rels", rels.as_bytes(), options);

        zip.finish().unwrap();
        buffer
    }

    pub fn write(&self, path: &Path) {
        std::fs::write(path, self.build()).unwrap();
    }
}

fn write_entry<W: Write + std::io::Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    data: &[u8],
    options: SimpleFileOptions,
) {
    zip.start_file(name, options).unwrap();
    zip.write_all(data).unwrap();
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// A run with optional bold formatting.
pub fn run(text: &str, bold: bool) -> String {
    let props = if bold { "<w:rPr><w:b/></w:rPr>" } else { "" };
    format!(
        r#"<w:r>{}<w:t xml:space="preserve">{}</w:t></w:r>"#,
        props,
        escape(text)
    )
}

/// A paragraph with one plain run per entry.
pub fn para(runs: &[&str]) -> String {
    let runs: String = runs.iter().map(|t| run(t, false)).collect();
    format!("<w:p>{}</w:p>", runs)
}

/// A table with one single-run paragraph per cell.
pub fn table(rows: &[&[&str]]) -> String {
    let mut xml = String::from("<w:tbl><w:tblPr/>");
    for row in rows {
        xml.push_str("<w:tr>");
        for cell in *row {
            xml.push_str(&format!("<w:tc><w:tcPr/>{}</w:tc>", para(&[cell])));
        }
        xml.push_str("</w:tr>");
    }
    xml.push_str("</w:tbl>");
    xml
}

/// Section properties with optional default header and footer references.
pub fn sect_pr(header: Option<&str>, footer: Option<&str>) -> String {
    let mut xml = String::from("<w:sectPr>");
    if let Some(rid) = header {
        xml.push_str(&format!(r#"<w:headerReference w:type="default" r:id="{}"/>"#, rid));
    }
    if let Some(rid) = footer {
        xml.push_str(&format!(r#"<w:footerReference w:type="default" r:id="{}"/>"#, rid));
    }
    xml.push_str(r#"<w:pgSz w:w="11906" w:h="16838"/></w:sectPr>"#);
    xml
}

/// An inline picture referencing `rid`.
pub fn picture(rid: &str) -> String {
    format!(
        r#"<w:p><w:r><w:drawing><wp:inline><wp:docPr id="1" name="Picture 1"/><a:graphic><a:graphicData><pic:pic><pic:blipFill><a:blip r:embed="{}"/></pic:blipFill></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#,
        rid
    )
}

/// Paragraph texts grouped by scope kind, in visiting order.
pub fn scope_texts(doc: &Document, kind: ScopeKind) -> Vec<String> {
    let mut texts = Vec::new();
    doc.for_each_scope(|k, p| {
        if k == kind {
            texts.push(exreport::docx::paragraph_text(p));
        }
    });
    texts
}

/// Tiny PNG signature used as image payload.
pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3, 4];
