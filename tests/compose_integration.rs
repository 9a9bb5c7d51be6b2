//! Document concatenation over synthetic packages.

mod common;

use common::{para, picture, scope_texts, sect_pr, DocxBuilder, PNG};
use exreport::compose::{compose, compose_to, merge_shortlist};
use exreport::container::resolve_path;
use exreport::xml::XmlElement;
use exreport::{fill_document, Document, Error, Replacements, ScopeKind};
use std::path::{Path, PathBuf};

fn simple_doc(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    DocxBuilder::new()
        .body(format!("{}{}", para(&[text]), sect_pr(None, None)))
        .write(&path);
    path
}

fn body_names(doc: &Document) -> Vec<String> {
    doc.main()
        .root
        .first_element("w:body")
        .unwrap()
        .child_elements()
        .map(|e| e.name.clone())
        .collect()
}

#[test]
fn test_documents_start_on_new_pages() {
    let dir = tempfile::tempdir().unwrap();
    let a = simple_doc(dir.path(), "a.docx", "Overview");
    let b = simple_doc(dir.path(), "b.docx", "Candidate");
    let c = simple_doc(dir.path(), "c.docx", "End");

    let doc = compose(&[&a, &b, &c]).unwrap();
    assert_eq!(doc.plain_text(), "Overview\n\nCandidate\n\nEnd");
    assert_eq!(doc.sections().len(), 3);
    assert_eq!(
        body_names(&doc),
        vec!["w:p", "w:p", "w:p", "w:p", "w:p", "w:sectPr"]
    );

    let body = doc.main().root.first_element("w:body").unwrap();
    let last = body.first_element("w:sectPr").unwrap();
    assert_eq!(
        last.first_element("w:type").unwrap().attr("w:val"),
        Some("nextPage")
    );
}

#[test]
fn test_page_break_without_section_properties() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.docx");
    let b = dir.path().join("b.docx");
    DocxBuilder::new().body(para(&["First"])).write(&a);
    DocxBuilder::new().body(para(&["Second"])).write(&b);

    let doc = compose(&[&a, &b]).unwrap();
    let body = doc.main().root.first_element("w:body").unwrap();
    let breaks: Vec<_> = body
        .elements("w:p")
        .filter_map(|p| p.first_element("w:r"))
        .filter_map(|r| r.first_element("w:br"))
        .collect();
    assert_eq!(breaks.len(), 1);
    assert_eq!(breaks[0].attr("w:type"), Some("page"));
    assert!(body.first_element("w:sectPr").is_none());
}

#[test]
fn test_relationships_and_media_are_copied() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.docx");
    let b = dir.path().join("b.docx");

    DocxBuilder::new()
        .body(format!("{}{}{}", para(&["A"]), picture("rId5"), sect_pr(Some("rId10"), None)))
        .image("rId5", "image1.png", PNG)
        .header("rId10", "header1.xml", &para(&["Header A"]))
        .write(&a);

    let b_image = [PNG, &b"second"[..]].concat();
    DocxBuilder::new()
        .root_attrs(r#"xmlns:w14="http://schemas.microsoft.com/office/word/2010/wordml""#)
        .body(format!(
            r#"{}<w:p><w:hyperlink r:id="rId6">{}</w:hyperlink></w:p>{}"#,
            picture("rId5"),
            common::run("link", false),
            sect_pr(Some("rId10"), None)
        ))
        .image("rId5", "image1.png", &b_image)
        .hyperlink("rId6", "https://example.com/")
        .header("rId10", "header1.xml", &para(&["Header {x}"]))
        .write(&b);

    let out = dir.path().join("out.docx");
    let report = compose_to(&[&a, &b], &out).unwrap();
    assert_eq!(report.documents, 2);
    assert_eq!(report.sections, 2);

    let mut doc = Document::open(&out).unwrap();
    let container = doc.container();
    assert_eq!(container.read_binary("word/media/image1.png").unwrap(), PNG);
    assert_eq!(container.read_binary("word/media/image2.png").unwrap(), b_image);
    assert!(container.exists("word/header2.xml"));
    let types = container.content_types().unwrap();
    assert!(types.has_override("word/header2.xml"));
    assert_eq!(
        types.content_type_for("word/media/image2.png"),
        Some("image/png")
    );

    // Every r: attribute resolves to a relationship of the composed document
    let mut blips = Vec::new();
    doc.main().root.visit(&mut |e: &XmlElement| {
        if e.name == "a:blip" {
            blips.push(e.attr("r:embed").unwrap_or_default().to_string());
        }
    });
    let targets: Vec<String> = blips
        .iter()
        .map(|id| {
            let rel = doc.relationships().get(id).unwrap();
            resolve_path(doc.main_path(), &rel.target)
        })
        .collect();
    assert_eq!(targets, vec!["word/media/image1.png", "word/media/image2.png"]);

    let link = doc
        .relationships()
        .iter()
        .find(|r| r.external)
        .unwrap();
    assert_eq!(link.target, "https://example.com/");
    assert_ne!(link.id, "rId6");

    // Drawing ids stay unique
    let mut ids = Vec::new();
    doc.main().root.visit(&mut |e: &XmlElement| {
        if e.name == "wp:docPr" {
            ids.push(e.attr("id").unwrap_or_default().to_string());
        }
    });
    assert_eq!(ids, vec!["1", "2"]);

    assert!(doc.main().root.attr("xmlns:w14").is_some());

    // The appended section shows the copied header, which fills like any other
    let sections = doc.sections();
    assert_eq!(sections[0].header.as_deref(), Some("word/header1.xml"));
    assert_eq!(sections[1].header.as_deref(), Some("word/header2.xml"));
    fill_document(&mut doc, &Replacements::new().with("x", "B"));
    assert_eq!(
        scope_texts(&doc, ScopeKind::HeaderParagraph),
        vec!["Header A", "Header B"]
    );
}

#[test]
fn test_missing_inputs_fail_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let a = simple_doc(dir.path(), "a.docx", "A");
    let missing_b = dir.path().join("b.docx");
    let missing_c = dir.path().join("c.docx");
    let out = dir.path().join("out.docx");

    let err = compose_to(&[a, missing_b.clone(), missing_c.clone()], &out).unwrap_err();
    match err {
        Error::MissingInputs(paths) => assert_eq!(paths, vec![missing_b, missing_c]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!out.exists());
}

#[test]
fn test_merge_shortlist_order() {
    let dir = tempfile::tempdir().unwrap();
    let overview = simple_doc(dir.path(), "overview.docx", "Overview");
    let c1 = simple_doc(dir.path(), "c1.docx", "Amy");
    let c2 = simple_doc(dir.path(), "c2.docx", "Bob");
    let end = simple_doc(dir.path(), "end.docx", "Thank you");
    let out = dir.path().join("reports").join("shortlist.docx");

    let report = merge_shortlist(&overview, &[c1, c2], &end, &out).unwrap();
    assert_eq!(report.documents, 4);
    assert_eq!(report.output_file, out);

    let text = exreport::extract_text(&out).unwrap();
    let lines: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
    assert_eq!(lines, vec!["Overview", "Amy", "Bob", "Thank you"]);
}

fn style_ids(doc: &Document) -> Vec<String> {
    let styles = doc.container().read_xml_document("word/styles.xml").unwrap();
    styles
        .root
        .elements("w:style")
        .map(|s| s.attr("w:styleId").unwrap_or_default().to_string())
        .collect()
}

#[test]
fn test_styles_lists_and_notes_are_merged() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.docx");
    let b = dir.path().join("b.docx");

    DocxBuilder::new()
        .body(format!("{}{}", para(&["Overview"]), sect_pr(None, None)))
        .styles(
            "rId1",
            r#"<w:docDefaults/><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>"#,
        )
        .numbering(
            "rId2",
            r#"<w:abstractNum w:abstractNumId="0"><w:lvl w:ilvl="0"><w:numFmt w:val="decimal"/></w:lvl></w:abstractNum><w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>"#,
        )
        .write(&a);

    DocxBuilder::new()
        .body(format!(
            r#"<w:p><w:pPr><w:pStyle w:val="CandidateHeading"/><w:numPr><w:ilvl w:val="0"/><w:numId w:val="7"/></w:numPr></w:pPr>{}<w:r><w:footnoteReference w:id="1"/></w:r></w:p>{}"#,
            common::run("Amy Wu", false),
            sect_pr(None, None)
        ))
        .styles(
            "rId1",
            r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:rPr><w:sz w:val="40"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="CandidateBase"><w:basedOn w:val="Normal"/></w:style><w:style w:type="paragraph" w:styleId="CandidateHeading"><w:basedOn w:val="CandidateBase"/><w:rPr><w:b/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Unused"/>"#,
        )
        .numbering(
            "rId2",
            r#"<w:abstractNum w:abstractNumId="3"><w:lvl w:ilvl="0"><w:numFmt w:val="bullet"/></w:lvl></w:abstractNum><w:num w:numId="7"><w:abstractNumId w:val="3"/></w:num>"#,
        )
        .footnotes("rId3", &format!(r#"<w:footnote w:id="1">{}</w:footnote>"#, para(&["Source: interview"])))
        .write(&b);

    let doc = compose(&[&a, &b]).unwrap();

    // Appended-only styles arrive with their base; the master keeps its Normal
    assert_eq!(style_ids(&doc), vec!["Normal", "CandidateHeading", "CandidateBase"]);
    let styles = doc.container().read_xml_document("word/styles.xml").unwrap();
    let normal = styles.root.first_element("w:style").unwrap();
    assert!(normal.first_element("w:rPr").is_none());

    // The appended list gets its own instance and definition
    let numbering = doc.container().read_xml_document("word/numbering.xml").unwrap();
    let num = numbering
        .root
        .elements("w:num")
        .find(|n| n.attr("w:numId") == Some("2"))
        .unwrap();
    assert_eq!(
        num.first_element("w:abstractNumId").unwrap().attr("w:val"),
        Some("1")
    );
    let definition = numbering
        .root
        .elements("w:abstractNum")
        .find(|a| a.attr("w:abstractNumId") == Some("1"))
        .unwrap();
    let format = definition
        .first_element("w:lvl")
        .and_then(|l| l.first_element("w:numFmt"))
        .and_then(|f| f.attr("w:val"));
    assert_eq!(format, Some("bullet"));

    let mut num_ids = Vec::new();
    let mut note_refs = Vec::new();
    doc.main().root.visit(&mut |e: &XmlElement| match e.name.as_str() {
        "w:numId" => num_ids.push(e.attr("w:val").unwrap_or_default().to_string()),
        "w:footnoteReference" => note_refs.push(e.attr("w:id").unwrap_or_default().to_string()),
        _ => {}
    });
    assert_eq!(num_ids, vec!["2"]);

    // The master had no footnotes part: one is created with the separators
    let types = doc.container().content_types().unwrap();
    assert!(types.has_override("word/footnotes.xml"));
    assert!(doc
        .relationships()
        .iter()
        .any(|r| r.rel_type.ends_with("/footnotes")));
    let footnotes = doc.container().read_xml_document("word/footnotes.xml").unwrap();
    let ids: Vec<&str> = footnotes
        .root
        .elements("w:footnote")
        .filter_map(|n| n.attr("w:id"))
        .collect();
    assert_eq!(ids, vec!["-1", "0", "1"]);
    assert_eq!(note_refs, vec!["1"]);
    assert_eq!(
        footnotes.root.elements("w:footnote").last().unwrap().text_content(),
        "Source: interview"
    );
}
