//! Text access for `w:r` runs.

use crate::xml::{XmlElement, XmlNode};

/// Children of a run that carry text. Everything else (`w:rPr`, drawings,
/// page breaks, field characters) belongs to the run's formatting or layout.
fn is_text_bearing(e: &XmlElement) -> bool {
    match e.name.as_str() {
        "w:t" | "w:tab" | "w:ptab" | "w:cr" | "w:noBreakHyphen" => true,
        "w:br" => is_line_break(e),
        _ => false,
    }
}

fn is_line_break(br: &XmlElement) -> bool {
    matches!(br.attr("w:type"), None | Some("textWrapping"))
}

/// Text of a run element as Word renders it inline.
pub fn run_text(run: &XmlElement) -> String {
    let mut text = String::new();
    for child in run.child_elements() {
        push_child_text(child, &mut text);
    }
    text
}

fn push_child_text(child: &XmlElement, text: &mut String) {
    match child.name.as_str() {
        "w:t" => text.push_str(&child.text_content()),
        "w:tab" | "w:ptab" => text.push('\t'),
        "w:br" if is_line_break(child) => text.push('\n'),
        "w:cr" => text.push('\n'),
        "w:noBreakHyphen" => text.push('-'),
        _ => {}
    }
}

/// Text of a paragraph as one substitution scope: its direct runs, in order.
pub fn paragraph_text(paragraph: &XmlElement) -> String {
    paragraph.elements("w:r").map(run_text).collect()
}

/// A formatting run inside a paragraph.
///
/// Only the run's text is ever read or written; its `w:rPr` is opaque.
#[derive(Debug)]
pub struct Run<'a> {
    element: &'a mut XmlElement,
}

impl<'a> Run<'a> {
    /// Wrap a `w:r` element.
    pub fn new(element: &'a mut XmlElement) -> Self {
        Self { element }
    }

    /// Rendered text of the run.
    pub fn text(&self) -> String {
        run_text(&*self.element)
    }

    /// Replace the run's text, keeping its properties and non-text content.
    ///
    /// Adjacent text-bearing children form groups, separated by page breaks,
    /// drawings and the like. Text the old and new values share at either
    /// end stays in its group, and changed text goes to the group where the
    /// change starts. A run without text gets the new text at its end. Tabs
    /// and line feeds become `w:tab` and `w:br` elements.
    pub fn set_text(&mut self, text: &str) {
        let children = std::mem::take(&mut self.element.children);
        let mut kept = Vec::with_capacity(children.len());
        // Position in `kept` and old text of each group
        let mut groups: Vec<(usize, String)> = Vec::new();
        let mut in_group = false;

        for node in children {
            match node {
                XmlNode::Element(ref e) if is_text_bearing(e) => {
                    if !in_group {
                        groups.push((kept.len(), String::new()));
                    }
                    if let Some((_, old)) = groups.last_mut() {
                        push_child_text(e, old);
                    }
                    in_group = true;
                }
                XmlNode::Element(_) => {
                    in_group = false;
                    kept.push(node);
                }
                other => kept.push(other),
            }
        }

        if groups.is_empty() {
            kept.extend(text_elements(text));
        } else {
            let old: Vec<&str> = groups.iter().map(|(_, t)| t.as_str()).collect();
            let pieces = split_like(&old, text);
            // Back to front, so earlier positions stay valid
            for ((index, _), piece) in groups.iter().zip(pieces).rev() {
                kept.splice(*index..*index, text_elements(&piece));
            }
        }
        self.element.children = kept;
    }
}

/// Split `new` into one piece per entry of `old`.
///
/// Text that `new` shares with the start or the end of the joined `old`
/// stays in the piece it came from. The changed middle goes to the piece
/// where the change starts.
fn split_like(old: &[&str], new: &str) -> Vec<String> {
    let old_chars: Vec<char> = old.concat().chars().collect();
    let new_chars: Vec<char> = new.chars().collect();

    let prefix = old_chars
        .iter()
        .zip(&new_chars)
        .take_while(|(a, b)| a == b)
        .count();
    let limit = old_chars.len().min(new_chars.len()) - prefix;
    let suffix = old_chars
        .iter()
        .rev()
        .zip(new_chars.iter().rev())
        .take(limit)
        .take_while(|(a, b)| a == b)
        .count();
    let changed_end = old_chars.len() - suffix;

    let mut pieces = Vec::with_capacity(old.len());
    let mut start = 0;
    let mut boundary = 0;
    for (i, piece) in old.iter().enumerate() {
        boundary += piece.chars().count();
        let end = if i + 1 == old.len() {
            new_chars.len()
        } else if boundary <= prefix {
            boundary
        } else if boundary >= changed_end {
            new_chars.len() - (old_chars.len() - boundary)
        } else {
            new_chars.len() - suffix
        };
        pieces.push(new_chars[start..end].iter().collect());
        start = end;
    }
    pieces
}

fn text_elements(text: &str) -> Vec<XmlNode> {
    let mut nodes = Vec::new();
    let mut pending = String::new();

    for c in text.chars() {
        match c {
            '\t' | '\n' | '\r' => {
                flush_text(&mut pending, &mut nodes);
                let name = if c == '\t' { "w:tab" } else { "w:br" };
                nodes.push(XmlNode::Element(XmlElement::new(name)));
            }
            _ => pending.push(c),
        }
    }
    flush_text(&mut pending, &mut nodes);
    nodes
}

fn flush_text(pending: &mut String, nodes: &mut Vec<XmlNode>) {
    if pending.is_empty() {
        return;
    }
    let mut t = XmlElement::new("w:t");
    if pending.trim().len() < pending.len() {
        t.set_attr("xml:space", "preserve");
    }
    t.children.push(XmlNode::Text(std::mem::take(pending)));
    nodes.push(XmlNode::Element(t));
}

/// Mutable runs of a paragraph: its direct `w:r` children.
pub fn paragraph_runs(paragraph: &mut XmlElement) -> Vec<Run<'_>> {
    paragraph.elements_mut("w:r").map(Run::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::XmlDocument;

    fn parse(xml: &str) -> XmlElement {
        XmlDocument::parse(xml).unwrap().root
    }

    #[test]
    fn test_run_text() {
        let r = parse(
            r#"<w:r><w:rPr><w:b/></w:rPr><w:t>Dear</w:t><w:tab/><w:t xml:space="preserve"> Sir </w:t><w:br/><w:br w:type="page"/><w:noBreakHyphen/><w:cr/></w:r>"#,
        );
        assert_eq!(run_text(&r), "Dear\t Sir \n-\n");
    }

    #[test]
    fn test_paragraph_text_uses_direct_runs() {
        let p = parse(
            r#"<w:p><w:r><w:t>Hello </w:t></w:r><w:hyperlink><w:r><w:t>link</w:t></w:r></w:hyperlink><w:r><w:t>!</w:t></w:r></w:p>"#,
        );
        assert_eq!(paragraph_text(&p), "Hello !");
    }

    #[test]
    fn test_set_text_keeps_properties() {
        let mut r = parse(
            r#"<w:r><w:rPr><w:color w:val="FF0000"/></w:rPr><w:t>{na</w:t><w:t>me}</w:t><w:br w:type="page"/></w:r>"#,
        );
        let mut run = Run::new(&mut r);
        run.set_text("Jane Doe");
        assert_eq!(run.text(), "Jane Doe");

        let names: Vec<&str> = r.child_elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["w:rPr", "w:t", "w:br"]);
        assert_eq!(r.first_element("w:br").unwrap().attr("w:type"), Some("page"));
    }

    #[test]
    fn test_set_text_around_page_break() {
        let mut r = parse(r#"<w:r><w:t>a</w:t><w:br w:type="page"/><w:t>b</w:t></w:r>"#);
        Run::new(&mut r).set_text("Ab");
        let texts: Vec<String> = r.elements("w:t").map(|t| t.text_content()).collect();
        assert_eq!(texts, vec!["A", "b"]);
        let names: Vec<&str> = r.child_elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["w:t", "w:br", "w:t"]);

        let mut r = parse(
            r#"<w:r><w:t>{name}</w:t><w:br w:type="page"/><w:t>Next</w:t><w:t>{role}</w:t></w:r>"#,
        );
        Run::new(&mut r).set_text("Jane DoeNext{role}");
        let texts: Vec<String> = r.elements("w:t").map(|t| t.text_content()).collect();
        assert_eq!(texts, vec!["Jane Doe", "Next{role}"]);

        let mut r = parse(r#"<w:r><w:t>{a}</w:t><w:br w:type="page"/><w:t>{b}</w:t></w:r>"#);
        Run::new(&mut r).set_text("");
        let names: Vec<&str> = r.child_elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["w:br"]);
    }

    #[test]
    fn test_split_like() {
        assert_eq!(split_like(&["a", "b"], "Ab"), vec!["A", "b"]);
        assert_eq!(split_like(&["x{v}", "y"], "xValuey"), vec!["xValue", "y"]);
        // A change crossing the boundary stays before it
        assert_eq!(split_like(&["{na", "me}!"], "Jane!"), vec!["Jane", "!"]);
        assert_eq!(split_like(&["ab", "cd"], ""), vec!["", ""]);
    }

    #[test]
    fn test_set_text_whitespace_and_breaks() {
        let mut r = parse(r#"<w:r><w:t>x</w:t></w:r>"#);
        let mut run = Run::new(&mut r);
        run.set_text(" a\tb\nc");
        assert_eq!(run.text(), " a\tb\nc");

        let first_t = r.first_element("w:t").unwrap();
        assert_eq!(first_t.attr("xml:space"), Some("preserve"));
        assert_eq!(r.elements("w:tab").count(), 1);
        assert_eq!(r.elements("w:br").count(), 1);
    }

    #[test]
    fn test_set_empty_text() {
        let mut r = parse(r#"<w:r><w:rPr><w:i/></w:rPr><w:t>gone</w:t></w:r>"#);
        let mut run = Run::new(&mut r);
        run.set_text("");
        assert_eq!(run.text(), "");
        // The run itself survives with its properties
        assert_eq!(r.child_elements().count(), 1);
    }

    #[test]
    fn test_set_text_on_run_without_text() {
        let mut r = parse(r#"<w:r><w:rPr><w:i/></w:rPr><w:drawing/></w:r>"#);
        Run::new(&mut r).set_text("caption");
        let names: Vec<&str> = r.child_elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["w:rPr", "w:drawing", "w:t"]);
    }

    #[test]
    fn test_paragraph_runs() {
        let mut p = parse(r#"<w:p><w:pPr/><w:r><w:t>a</w:t></w:r><w:r><w:t>b</w:t></w:r></w:p>"#);
        let runs = paragraph_runs(&mut p);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].text(), "b");
    }
}
