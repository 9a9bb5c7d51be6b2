//! Flat JSON data records.
//!
//! A record is one JSON object of field name to value, in file order. Every
//! value becomes text when it is substituted into a template.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Sort key used for candidates whose source name carries no number.
pub const UNNUMBERED_CANDIDATE: u32 = 999;

/// Field dropped from assessments when they are merged into a candidate.
pub const FULL_NAME: &str = "full_name";

/// A flat key/value record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a record from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Parse a record from JSON text. The top level must be an object.
    pub fn from_json_str(json: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(json)? {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(Error::MalformedInput(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }

    /// Wrap an existing JSON object.
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Get a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a field that holds a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Set a field; an existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Copy every field of `other` into this record, overriding existing keys.
    pub fn extend_from(&mut self, other: &Record) {
        for (key, value) in other.iter() {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// Fields in order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Pretty JSON, as written next to generated reports.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.fields)?)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Text a value contributes to a document.
///
/// Strings are verbatim, numbers use their JSON form, booleans are `True`
/// or `False`, null is `None`, arrays and objects are compact JSON.
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "None".to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// One shortlisted candidate: profile plus optional assessment.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateEntry {
    /// File name the profile came from; drives ordering and output names
    pub source: String,
    /// Candidate profile record
    pub profile: Record,
    /// Consultant assessment record
    pub assessment: Option<Record>,
}

impl CandidateEntry {
    /// Create an entry without an assessment.
    pub fn new(source: impl Into<String>, profile: Record) -> Self {
        Self {
            source: source.into(),
            profile,
            assessment: None,
        }
    }

    /// Builder: attach an assessment.
    pub fn with_assessment(mut self, assessment: Record) -> Self {
        self.assessment = Some(assessment);
        self
    }

    /// Display name: the profile's `full_name`, else the source name.
    pub fn name(&self) -> &str {
        self.profile.get_str(FULL_NAME).unwrap_or(&self.source)
    }

    /// Profile with assessment fields merged in, `full_name` excepted.
    pub fn merged_profile(&self) -> Record {
        let mut merged = self.profile.clone();
        if let Some(ref assessment) = self.assessment {
            merge_assessment(&mut merged, assessment);
        }
        merged
    }
}

fn merge_assessment(target: &mut Record, assessment: &Record) {
    for (key, value) in assessment.iter().filter(|(k, _)| *k != FULL_NAME) {
        target.insert(key.clone(), value.clone());
    }
}

/// Record for one candidate page: metadata, then profile, then assessment
/// minus `full_name`. Later sources override earlier keys.
pub fn combine_candidate(metadata: &Record, profile: &Record, assessment: &Record) -> Record {
    let mut combined = metadata.clone();
    combined.extend_from(profile);
    merge_assessment(&mut combined, assessment);
    combined
}

/// Ordering number of a candidate file: `candidate_<n>_...` yields `n`,
/// anything else [`UNNUMBERED_CANDIDATE`].
pub fn candidate_sort_key(file_name: &str) -> u32 {
    let base = Path::new(file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut parts = base.split('_');
    match (parts.next(), parts.next()) {
        (Some("candidate"), Some(n)) => n.parse().unwrap_or(UNNUMBERED_CANDIDATE),
        _ => UNNUMBERED_CANDIDATE,
    }
}

/// Record for the shortlist overview.
///
/// Metadata keys go in unprefixed. Candidates are ordered by
/// [`candidate_sort_key`] (stable, so equal keys keep the given order) and
/// candidate `i`, counted from 1, contributes its merged profile with every
/// key prefixed `c{i}_`.
pub fn merge_candidates(metadata: &Record, candidates: &[CandidateEntry]) -> Record {
    let mut ordered: Vec<&CandidateEntry> = candidates.iter().collect();
    ordered.sort_by_key(|c| candidate_sort_key(&c.source));

    let mut merged = metadata.clone();
    for (i, candidate) in ordered.into_iter().enumerate() {
        let prefix = format!("c{}_", i + 1);
        for (key, value) in candidate.merged_profile().iter() {
            merged.insert(format!("{}{}", prefix, key), value.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => Record::from_map(map),
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn test_stringify_value() {
        assert_eq!(stringify_value(&json!("Jane")), "Jane");
        assert_eq!(stringify_value(&json!(42)), "42");
        assert_eq!(stringify_value(&json!(-3.5)), "-3.5");
        assert_eq!(stringify_value(&json!(true)), "True");
        assert_eq!(stringify_value(&json!(false)), "False");
        assert_eq!(stringify_value(&json!(null)), "None");
        assert_eq!(stringify_value(&json!(["a", 1])), r#"["a",1]"#);
        assert_eq!(stringify_value(&json!({"k": "v"})), r#"{"k":"v"}"#);
    }

    #[test]
    fn test_from_json_str() {
        let r = Record::from_json_str(r#"{"b": 1, "a": "x"}"#).unwrap();
        let keys: Vec<&String> = r.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(r.get_str("a"), Some("x"));

        assert!(matches!(
            Record::from_json_str("[1, 2]"),
            Err(Error::MalformedInput(_))
        ));
        assert!(matches!(
            Record::from_json_str("{\"a\": "),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jane.json");
        assert!(matches!(Record::from_path(&path), Err(Error::NotFound(_))));

        std::fs::write(&path, r#"{"full_name": "Jane Doe"}"#).unwrap();
        let r = Record::from_path(&path).unwrap();
        assert_eq!(r.get_str("full_name"), Some("Jane Doe"));
    }

    #[test]
    fn test_candidate_sort_key() {
        assert_eq!(candidate_sort_key("candidate_3_jane.json"), 3);
        assert_eq!(candidate_sort_key("data/candidate_12_x.json"), 12);
        assert_eq!(candidate_sort_key("candidate_x_jane.json"), UNNUMBERED_CANDIDATE);
        assert_eq!(candidate_sort_key("candidate_3.json"), UNNUMBERED_CANDIDATE);
        assert_eq!(
            candidate_sort_key("Jane_Doe_20250124_143022.json"),
            UNNUMBERED_CANDIDATE
        );
    }

    #[test]
    fn test_combine_candidate() {
        let metadata = record(json!({"client_company_name": "Acme", "full_name": "meta"}));
        let profile = record(json!({"full_name": "Jane Doe", "position": "CFO"}));
        let assessment = record(json!({"full_name": "J. Doe", "assess_1": "8"}));

        let combined = combine_candidate(&metadata, &profile, &assessment);
        assert_eq!(combined.get_str("full_name"), Some("Jane Doe"));
        assert_eq!(combined.get_str("client_company_name"), Some("Acme"));
        assert_eq!(combined.get_str("assess_1"), Some("8"));
        assert_eq!(combined.len(), 4);
    }

    #[test]
    fn test_merge_candidates_prefixes_and_order() {
        let metadata = record(json!({"candidate_target_role": "CEO"}));
        let candidates = vec![
            CandidateEntry::new("candidate_2_bob.json", record(json!({"full_name": "Bob"}))),
            CandidateEntry::new("Zed_20250101_000000.json", record(json!({"full_name": "Zed"}))),
            CandidateEntry::new("candidate_1_amy.json", record(json!({"full_name": "Amy"})))
                .with_assessment(record(json!({"full_name": "Amy X", "assess_1": "9"}))),
        ];

        let merged = merge_candidates(&metadata, &candidates);
        assert_eq!(merged.get_str("candidate_target_role"), Some("CEO"));
        assert_eq!(merged.get_str("c1_full_name"), Some("Amy"));
        assert_eq!(merged.get_str("c1_assess_1"), Some("9"));
        assert_eq!(merged.get_str("c2_full_name"), Some("Bob"));
        assert_eq!(merged.get_str("c3_full_name"), Some("Zed"));
    }

    #[test]
    fn test_unnumbered_candidates_keep_order() {
        let candidates: Vec<CandidateEntry> = ["Zed", "Amy", "Kim"]
            .iter()
            .map(|n| {
                CandidateEntry::new(format!("{}_20250101_000000.json", n), record(json!({"full_name": n})))
            })
            .collect();
        let merged = merge_candidates(&Record::new(), &candidates);
        assert_eq!(merged.get_str("c1_full_name"), Some("Zed"));
        assert_eq!(merged.get_str("c2_full_name"), Some("Amy"));
        assert_eq!(merged.get_str("c3_full_name"), Some("Kim"));
    }
}
