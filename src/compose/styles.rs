//! Style definitions of appended documents.
//!
//! A style used by appended content is copied into the master when the master
//! has no style with the same id, together with the styles it is based on or
//! linked to. Styles the master already defines keep the master's definition.

use crate::xml::XmlElement;

/// Elements whose `w:val` names a style.
const STYLE_REFERENCES: [&str; 3] = ["w:pStyle", "w:rStyle", "w:tblStyle"];

/// Children of `w:style` that name another style.
const STYLE_LINKS: [&str; 3] = ["w:basedOn", "w:link", "w:next"];

/// Style ids referenced from `elements`, in first-use order.
pub(super) fn referenced_styles<'a>(elements: impl IntoIterator<Item = &'a XmlElement>) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for element in elements {
        element.visit(&mut |e: &XmlElement| {
            if STYLE_REFERENCES.contains(&e.name.as_str()) {
                if let Some(id) = e.attr("w:val") {
                    if !ids.iter().any(|i| i == id) {
                        ids.push(id.to_string());
                    }
                }
            }
        });
    }
    ids
}

fn find_style<'a>(styles: &'a XmlElement, id: &str) -> Option<&'a XmlElement> {
    styles
        .elements("w:style")
        .find(|s| s.attr("w:styleId") == Some(id))
}

/// Styles of `source` that `used` needs and `master` lacks, with their
/// dependencies, in discovery order.
///
/// With an existing master styles part, imported styles lose their
/// `w:default` flag so the master's defaults stay in effect.
pub(super) fn missing_styles(
    source: &XmlElement,
    master: Option<&XmlElement>,
    used: &[String],
) -> Vec<XmlElement> {
    let mut pending: Vec<String> = used.to_vec();
    let mut imported = Vec::new();
    let mut i = 0;

    while i < pending.len() {
        let id = pending[i].clone();
        i += 1;
        if master.is_some_and(|m| find_style(m, &id).is_some()) {
            continue;
        }
        let Some(style) = find_style(source, &id) else {
            log::debug!("style {} is not defined by the appended document", id);
            continue;
        };

        for link in STYLE_LINKS {
            if let Some(dep) = style.first_element(link).and_then(|e| e.attr("w:val")) {
                if !pending.iter().any(|p| p == dep) {
                    pending.push(dep.to_string());
                }
            }
        }

        let mut style = style.clone();
        if master.is_some() {
            style.remove_attr("w:default");
        }
        imported.push(style);
    }

    imported
}
