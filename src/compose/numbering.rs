//! Numbering definitions of appended documents.
//!
//! Every list instance (`w:num`) used by appended content is copied into the
//! master under a fresh `w:numId`, with its abstract definition under a fresh
//! `w:abstractNumId`, so appended lists keep their own formatting and
//! counters.

use crate::xml::XmlElement;
use std::collections::HashMap;

/// `w:numId` values referenced from `elements`, in first-use order.
///
/// `0` means "no numbering" and is skipped.
pub(super) fn referenced_num_ids<'a>(elements: impl IntoIterator<Item = &'a XmlElement>) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for element in elements {
        element.visit(&mut |e: &XmlElement| {
            if e.name == "w:numId" {
                if let Some(id) = e.attr("w:val").filter(|v| *v != "0") {
                    if !ids.iter().any(|i| i == id) {
                        ids.push(id.to_string());
                    }
                }
            }
        });
    }
    ids
}

/// Point every `w:numId` in `elements` at its imported instance.
pub(super) fn renumber<'a>(
    elements: impl IntoIterator<Item = &'a mut XmlElement>,
    map: &HashMap<String, String>,
) {
    for element in elements {
        element.visit_mut(&mut |e: &mut XmlElement| {
            if e.name == "w:numId" {
                if let Some(new_id) = e.attr("w:val").and_then(|v| map.get(v)).cloned() {
                    e.set_attr("w:val", new_id);
                }
            }
        });
    }
}

/// Copy the instances `num_ids` of the `source` numbering root into
/// `target`. Returns the old to new `w:numId` map.
pub(super) fn import(
    source: &XmlElement,
    target: &mut XmlElement,
    num_ids: &[String],
) -> HashMap<String, String> {
    let mut next_num = max_id(target, "w:num", "w:numId") + 1;
    let mut next_abstract = max_id(target, "w:abstractNum", "w:abstractNumId") + 1;
    let mut abstracts: HashMap<String, String> = HashMap::new();
    let mut nums = HashMap::new();

    for id in num_ids {
        let Some(num) = source
            .elements("w:num")
            .find(|n| n.attr("w:numId") == Some(id.as_str()))
        else {
            log::warn!("appended content uses undefined list {}", id);
            continue;
        };
        let Some(abstract_id) = num
            .first_element("w:abstractNumId")
            .and_then(|a| a.attr("w:val"))
        else {
            continue;
        };

        let new_abstract = match abstracts.get(abstract_id) {
            Some(done) => done.clone(),
            None => {
                let Some(definition) = source
                    .elements("w:abstractNum")
                    .find(|a| a.attr("w:abstractNumId") == Some(abstract_id))
                else {
                    log::warn!("list {} refers to undefined definition {}", id, abstract_id);
                    continue;
                };
                let new_id = next_abstract.to_string();
                next_abstract += 1;
                let mut definition = definition.clone();
                definition.set_attr("w:abstractNumId", new_id.clone());
                insert_abstract(target, definition);
                abstracts.insert(abstract_id.to_string(), new_id.clone());
                new_id
            }
        };

        let new_num = next_num.to_string();
        next_num += 1;
        let mut num = num.clone();
        num.set_attr("w:numId", new_num.clone());
        if let Some(link) = num.first_element_mut("w:abstractNumId") {
            link.set_attr("w:val", new_abstract);
        }
        insert_num(target, num);
        nums.insert(id.clone(), new_num);
    }

    nums
}

fn max_id(root: &XmlElement, element: &str, attr: &str) -> u32 {
    root.elements(element)
        .filter_map(|e| e.attr(attr))
        .filter_map(|v| v.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

fn last_position(root: &XmlElement, name: &str) -> Option<usize> {
    root.children
        .iter()
        .rposition(|n| n.as_element().is_some_and(|e| e.name == name))
}

fn first_position(root: &XmlElement, names: &[&str]) -> Option<usize> {
    root.children
        .iter()
        .position(|n| n.as_element().is_some_and(|e| names.contains(&e.name.as_str())))
}

/// Abstract definitions precede every `w:num`.
fn insert_abstract(target: &mut XmlElement, definition: XmlElement) {
    let index = match last_position(target, "w:abstractNum") {
        Some(i) => i + 1,
        None => first_position(target, &["w:num", "w:numIdMacAtCleanup"])
            .unwrap_or(target.children.len()),
    };
    target.children.insert(index, definition.into());
}

fn insert_num(target: &mut XmlElement, num: XmlElement) {
    let index = match last_position(target, "w:num") {
        Some(i) => i + 1,
        None => first_position(target, &["w:numIdMacAtCleanup"]).unwrap_or(target.children.len()),
    };
    target.children.insert(index, num.into());
}
