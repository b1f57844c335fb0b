//! Versioned workspace document codec.
//!
//! The same document shape is used for routine persistence (cache, linked file,
//! app-data file) and for manual import/export.

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::AnalysisRecord;

pub const SNAPSHOT_VERSION: &str = "1.1.0";
const SUPPORTED_MAJOR: u64 = 1;
const REQUIRED_FIELDS: [&str; 3] = ["version", "library", "history"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSnapshot {
    pub version: String,
    pub library: Vec<AnalysisRecord>,
    pub history: Vec<AnalysisRecord>,
    /// Written as `""` when unknown; cleared documents carry an empty string.
    #[serde(default, with = "last_synced_format")]
    pub last_synced: Option<DateTime<Utc>>,
}

impl WorkspaceSnapshot {
    pub fn new(
        library: Vec<AnalysisRecord>,
        history: Vec<AnalysisRecord>,
        last_synced: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            library,
            history,
            last_synced,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), None)
    }

    pub fn is_empty(&self) -> bool {
        self.library.is_empty() && self.history.is_empty()
    }
}

/// A document ready to be handed to the user as a download.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedDocument {
    pub file_name: String,
    pub contents: String,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("not valid JSON: {0}")]
    Syntax(#[source] serde_json::Error),

    #[error("top-level value must be an object")]
    NotAnObject,

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unsupported document version '{0}'")]
    UnsupportedVersion(String),

    #[error("duplicate record id '{id}' in {collection}")]
    DuplicateId { collection: &'static str, id: String },

    #[error("malformed document: {0}")]
    Shape(#[source] serde_json::Error),
}

pub fn encode(snapshot: &WorkspaceSnapshot) -> Result<String> {
    serde_json::to_string_pretty(snapshot).context("failed to serialize workspace snapshot")
}

pub fn decode(text: &str) -> std::result::Result<WorkspaceSnapshot, CodecError> {
    let value: Value = serde_json::from_str(text).map_err(CodecError::Syntax)?;
    let object = value.as_object().ok_or(CodecError::NotAnObject)?;

    for field in REQUIRED_FIELDS {
        if !object.contains_key(field) {
            return Err(CodecError::MissingField(field));
        }
    }

    let snapshot: WorkspaceSnapshot = serde_json::from_value(value).map_err(CodecError::Shape)?;
    check_version(&snapshot.version)?;
    check_unique_ids("library", &snapshot.library)?;
    check_unique_ids("history", &snapshot.history)?;

    Ok(snapshot)
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("smartlex_workspace_{}.lex", date.format("%Y-%m-%d"))
}

fn check_version(version: &str) -> std::result::Result<(), CodecError> {
    let major = version
        .split('.')
        .next()
        .and_then(|part| part.trim().parse::<u64>().ok())
        .ok_or_else(|| CodecError::UnsupportedVersion(version.to_string()))?;

    if major > SUPPORTED_MAJOR || major == 0 {
        return Err(CodecError::UnsupportedVersion(version.to_string()));
    }
    Ok(())
}

fn check_unique_ids(
    collection: &'static str,
    records: &[AnalysisRecord],
) -> std::result::Result<(), CodecError> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id.as_str()) {
            return Err(CodecError::DuplicateId {
                collection,
                id: record.id.clone(),
            });
        }
    }
    Ok(())
}

mod last_synced_format {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => DateTime::parse_from_rfc3339(value)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|err| D::Error::custom(format!("invalid lastSynced '{value}': {err}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnalysisType;

    fn sample() -> WorkspaceSnapshot {
        let mut saved = AnalysisRecord::new("ephemeral", AnalysisType::Word);
        saved.add_tag("time");
        let recent = AnalysisRecord::new("kick the bucket", AnalysisType::Idiom);
        WorkspaceSnapshot::new(vec![saved.clone()], vec![recent, saved], Some(Utc::now()))
    }

    #[test]
    fn test_encode_uses_document_field_names() {
        let text = encode(&sample()).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["version"], SNAPSHOT_VERSION);
        assert!(value["lastSynced"].is_string());
        assert_eq!(value["library"].as_array().map(Vec::len), Some(1));
        assert_eq!(value["history"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_decode_restores_collections() {
        let snapshot = sample();
        let decoded = decode(&encode(&snapshot).unwrap()).unwrap();
        assert_eq!(decoded.library, snapshot.library);
        assert_eq!(decoded.history, snapshot.history);
    }

    #[test]
    fn test_empty_last_synced_decodes_as_none() {
        let decoded =
            decode(r#"{"version":"1.1.0","library":[],"history":[],"lastSynced":""}"#).unwrap();
        assert!(decoded.last_synced.is_none());
        assert!(decoded.is_empty());

        let decoded = decode(r#"{"version":"1.0.0","library":[],"history":[]}"#).unwrap();
        assert!(decoded.last_synced.is_none());
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let err = decode(r#"{"version":"1.1.0","history":[]}"#).unwrap_err();
        assert!(matches!(err, CodecError::MissingField("library")));

        let err = decode(r#"{"library":[],"history":[]}"#).unwrap_err();
        assert!(matches!(err, CodecError::MissingField("version")));
    }

    #[test]
    fn test_non_object_and_garbage_are_rejected() {
        assert!(matches!(decode("[1,2,3]"), Err(CodecError::NotAnObject)));
        assert!(matches!(decode("not json"), Err(CodecError::Syntax(_))));
        assert!(matches!(
            decode(r#"{"version":"1.1.0","library":{},"history":[]}"#),
            Err(CodecError::Shape(_))
        ));
    }

    #[test]
    fn test_newer_major_version_is_rejected() {
        let err = decode(r#"{"version":"2.0.0","library":[],"history":[]}"#).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedVersion(v) if v == "2.0.0"));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let record = AnalysisRecord::new("twice", AnalysisType::Word);
        let snapshot = WorkspaceSnapshot::new(vec![record.clone(), record], Vec::new(), None);
        let err = decode(&encode(&snapshot).unwrap()).unwrap_err();
        assert!(matches!(err, CodecError::DuplicateId { collection: "library", .. }));
    }

    #[test]
    fn test_export_file_name_embeds_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(export_file_name(date), "smartlex_workspace_2024-03-09.lex");
    }
}
