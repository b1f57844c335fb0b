//! Analysis record data models.
//!
//! Field names follow the persisted `.lex` document, which mixes camelCase with a
//! handful of `_cn` suffixed keys. Optional fields are skipped when absent so a
//! decoded document re-encodes to the same shape.

use std::collections::BTreeSet;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AnalysisType {
    Metaphor,
    Idiom,
    #[default]
    Word,
    Slang,
    Term,
    Chat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BilingualText {
    pub en: String,
    pub cn: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SemanticCore {
    pub en: String,
    pub cn: String,
    #[serde(
        rename = "cn_definition",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cn_definition: Option<String>,
    pub contextual_meaning: BilingualText,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Pragmatics {
    pub tone: String,
    pub register: String,
    pub nuance_cn: String,
}

/// Source/target domains of a conceptual metaphor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConceptMapping {
    pub source: String,
    pub target: String,
    pub explanation_cn: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UsageExample {
    pub category: String,
    /// Source sentence.
    pub en: String,
    /// Translated sentence.
    pub cn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

/// Provenance of a record: which provider/model produced it and how long it took.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMeta {
    pub provider: String,
    pub model: String,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: String,
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_form: Option<String>,
    pub part_of_speech: String,
    pub context: String,
    #[serde(rename = "type")]
    pub analysis_type: AnalysisType,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub semantic_core: SemanticCore,
    pub pragmatics: Pragmatics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<ConceptMapping>,
    pub origin_story: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub antonyms: Option<Vec<String>>,
    #[serde(default)]
    pub collocations: Vec<String>,
    #[serde(default)]
    pub usage_examples: Vec<UsageExample>,
    pub impact_score: f64,
    #[serde(with = "timestamp_millis")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_sources: Option<Vec<GroundingSource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<AnalysisMeta>,
}

impl AnalysisRecord {
    /// Creates an empty record for `term` with a fresh identity.
    pub fn new(term: impl Into<String>, analysis_type: AnalysisType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            term: term.into(),
            root_form: None,
            part_of_speech: String::new(),
            context: String::new(),
            analysis_type,
            tags: BTreeSet::new(),
            semantic_core: SemanticCore::default(),
            pragmatics: Pragmatics::default(),
            mapping: None,
            origin_story: String::new(),
            synonyms: Vec::new(),
            antonyms: None,
            collocations: Vec::new(),
            usage_examples: Vec::new(),
            impact_score: 0.0,
            timestamp: Utc::now().trunc_subsecs(3),
            grounding_sources: None,
            visual_context: None,
            meta: None,
        }
    }

    /// Returns true if the tag was not already present. Blank tags are ignored.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() {
            return false;
        }
        self.tags.insert(tag.to_string())
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(tag.trim())
    }

    pub fn add_synonym(&mut self, synonym: &str) -> bool {
        let synonym = synonym.trim();
        if synonym.is_empty() || self.synonyms.iter().any(|s| s == synonym) {
            return false;
        }
        self.synonyms.push(synonym.to_string());
        true
    }

    pub fn add_usage_example(&mut self, example: UsageExample) {
        self.usage_examples.push(example);
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix, the shape stored
/// documents already use.
mod timestamp_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(raw.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|err| D::Error::custom(format!("invalid timestamp '{raw}': {err}")))
    }
}
