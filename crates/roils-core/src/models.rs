//! Record data model, model-namespaced field keys, and generation value objects.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};

// =============================================================================
// MODEL IDENTIFIER
// =============================================================================

/// Name of the generation model that produced a field (e.g. `mistral`, `llama3:8b`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelId(String);

impl ModelId {
    /// Create a model identifier; rejects empty or whitespace-only names.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput(
                "model identifier cannot be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Built-in default names are known to be valid.
    pub(crate) fn from_default(name: &'static str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ModelId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ModelId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ModelId> for String {
    fn from(value: ModelId) -> Self {
        value.0
    }
}

// =============================================================================
// FIELD KEYS
// =============================================================================

/// Kind of generated field stored on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Summary,
    Evaluation,
}

impl FieldKind {
    pub const ALL: [FieldKind; 2] = [FieldKind::Summary, FieldKind::Evaluation];

    /// Label used in the stored field name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Summary => "LLM Summary",
            Self::Evaluation => "LLM Evaluation",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Summary => write!(f, "summary"),
            Self::Evaluation => write!(f, "evaluation"),
        }
    }
}

impl FromStr for FieldKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(Self::Summary),
            "evaluation" | "eval" => Ok(Self::Evaluation),
            _ => Err(Error::InvalidInput(format!("unknown field kind: {}", s))),
        }
    }
}

/// Model-namespaced generated field, stored as `"{model}:{kind label}"`.
///
/// Always go through [`FieldKey::parse`] to decide which model a stored field
/// belongs to; prefix matching on the raw name would let `mistral` claim
/// `mistral:7b:LLM Summary`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldKey {
    pub model: ModelId,
    pub kind: FieldKind,
}

impl FieldKey {
    pub fn new(model: ModelId, kind: FieldKind) -> Self {
        Self { model, kind }
    }

    pub fn summary(model: &ModelId) -> Self {
        Self::new(model.clone(), FieldKind::Summary)
    }

    pub fn evaluation(model: &ModelId) -> Self {
        Self::new(model.clone(), FieldKind::Evaluation)
    }

    /// Stored hash field name.
    pub fn field_name(&self) -> String {
        format!("{}:{}", self.model, self.kind.label())
    }

    /// Parse a stored field name. Returns `None` for fields that are not
    /// model-generated (e.g. `Narrative`).
    pub fn parse(field: &str) -> Option<Self> {
        FieldKind::ALL.iter().find_map(|kind| {
            let model = field.strip_suffix(kind.label())?.strip_suffix(':')?;
            ModelId::new(model)
                .ok()
                .filter(|m| m.as_str() == model)
                .map(|m| Self::new(m, *kind))
        })
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.model, self.kind.label())
    }
}

/// Record key for an incident id.
pub fn event_key(event_id: &str) -> String {
    if event_id.starts_with(defaults::EVENT_PREFIX) {
        event_id.to_string()
    } else {
        format!("{}{}", defaults::EVENT_PREFIX, event_id)
    }
}

// =============================================================================
// RECORD
// =============================================================================

/// Snapshot of one incident record as read from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub narrative: Option<String>,
    pub generated: BTreeMap<FieldKey, String>,
}

impl Record {
    /// Build a snapshot from raw `(field, value)` pairs. Unrecognized fields are ignored.
    pub fn from_fields<I>(key: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut record = Record {
            key: key.into(),
            ..Default::default()
        };
        for (field, value) in fields {
            if field == defaults::NARRATIVE_FIELD {
                record.narrative = Some(value);
            } else if let Some(fk) = FieldKey::parse(&field) {
                record.generated.insert(fk, value);
            }
        }
        record
    }

    /// Narrative if present and not blank.
    pub fn narrative(&self) -> Option<&str> {
        non_blank(self.narrative.as_deref())
    }

    pub fn summary(&self, model: &ModelId) -> Option<&str> {
        non_blank(self.generated.get(&FieldKey::summary(model)).map(String::as_str))
    }

    pub fn evaluation(&self, model: &ModelId) -> Option<&str> {
        non_blank(
            self.generated
                .get(&FieldKey::evaluation(model))
                .map(String::as_str),
        )
    }
}

/// Treat blank stored values as absent.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

// =============================================================================
// GENERATION
// =============================================================================

/// Decoding options sent to the generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default = "GenerationOptions::default_num_predict")]
    pub num_predict: i32,
    #[serde(default = "GenerationOptions::default_top_k")]
    pub top_k: i32,
    #[serde(default = "GenerationOptions::default_top_p")]
    pub top_p: f32,
    #[serde(default = "GenerationOptions::default_temperature")]
    pub temperature: f32,
    #[serde(default = "GenerationOptions::default_num_gpu")]
    pub num_gpu: i32,
    #[serde(default = "GenerationOptions::default_num_thread")]
    pub num_thread: i32,
    #[serde(default = "GenerationOptions::default_num_ctx")]
    pub num_ctx: i32,
}

impl GenerationOptions {
    fn default_num_predict() -> i32 {
        defaults::NUM_PREDICT
    }
    fn default_top_k() -> i32 {
        defaults::TOP_K
    }
    fn default_top_p() -> f32 {
        defaults::TOP_P
    }
    fn default_temperature() -> f32 {
        defaults::TEMPERATURE
    }
    fn default_num_gpu() -> i32 {
        defaults::NUM_GPU
    }
    fn default_num_thread() -> i32 {
        defaults::NUM_THREAD
    }
    fn default_num_ctx() -> i32 {
        defaults::NUM_CTX
    }

    /// Check that sampling options are in range.
    pub fn validate(&self) -> Result<()> {
        if self.num_predict <= 0 {
            return Err(Error::InvalidInput("num_predict must be positive".into()));
        }
        if self.top_k <= 0 {
            return Err(Error::InvalidInput("top_k must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(Error::InvalidInput("top_p must be within [0, 1]".into()));
        }
        if self.temperature < 0.0 {
            return Err(Error::InvalidInput("temperature cannot be negative".into()));
        }
        if self.num_ctx <= 0 {
            return Err(Error::InvalidInput("num_ctx must be positive".into()));
        }
        Ok(())
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            num_predict: defaults::NUM_PREDICT,
            top_k: defaults::TOP_K,
            top_p: defaults::TOP_P,
            temperature: defaults::TEMPERATURE,
            num_gpu: defaults::NUM_GPU,
            num_thread: defaults::NUM_THREAD,
            num_ctx: defaults::NUM_CTX,
        }
    }
}

/// One generation call. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Record key, forwarded to the backend for its request logs.
    pub key: String,
    pub model: ModelId,
    pub prompt: String,
    pub options: GenerationOptions,
}

/// Result of one generation call that reached the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// HTTP 200 with a completion and `done: true`.
    Completed { text: String },
    /// HTTP 200 but the body was malformed or incomplete.
    InvalidFormat { body: String },
    /// Non-200 status.
    RequestFailed { status: u16, body: String },
    /// The fixed deadline elapsed. Recoverable via a backend restart.
    Timeout { elapsed_ms: u64 },
}

impl GenerationOutcome {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn completion(&self) -> Option<&str> {
        match self {
            Self::Completed { text } => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for GenerationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { text } => write!(f, "completed ({} bytes)", text.len()),
            Self::InvalidFormat { body } => write!(f, "invalid response format: {}", body),
            Self::RequestFailed { status, body } => {
                write!(f, "request failed with status {}: {}", status, body)
            }
            Self::Timeout { elapsed_ms } => write!(f, "timed out after {}ms", elapsed_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str) -> ModelId {
        ModelId::new(name).unwrap()
    }

    #[test]
    fn test_model_id_rejects_blank() {
        assert!(ModelId::new("").is_err());
        assert!(ModelId::new("   ").is_err());
        assert_eq!(model(" mistral ").as_str(), "mistral");
    }

    #[test]
    fn test_field_key_names() {
        let m = model("mistral");
        assert_eq!(FieldKey::summary(&m).field_name(), "mistral:LLM Summary");
        assert_eq!(
            FieldKey::evaluation(&m).to_string(),
            "mistral:LLM Evaluation"
        );
    }

    #[test]
    fn test_field_key_parse_roundtrip_with_tagged_model() {
        let m = model("llama3:8b");
        let key = FieldKey::summary(&m);
        assert_eq!(FieldKey::parse(&key.field_name()), Some(key));
    }

    #[test]
    fn test_field_key_parse_keeps_models_distinct() {
        let parsed = FieldKey::parse("mistral:7b:LLM Summary").unwrap();
        assert_eq!(parsed.model.as_str(), "mistral:7b");
        assert_ne!(parsed.model, model("mistral"));
    }

    #[test]
    fn test_field_key_parse_rejects_other_fields() {
        assert_eq!(FieldKey::parse("Narrative"), None);
        assert_eq!(FieldKey::parse("LLM Summary"), None);
        assert_eq!(FieldKey::parse(":LLM Summary"), None);
        assert_eq!(FieldKey::parse("mistral:Cleaned Summary"), None);
    }

    #[test]
    fn test_field_kind_from_str() {
        assert_eq!("summary".parse::<FieldKind>().unwrap(), FieldKind::Summary);
        assert_eq!("Eval".parse::<FieldKind>().unwrap(), FieldKind::Evaluation);
        assert!("title".parse::<FieldKind>().is_err());
    }

    #[test]
    fn test_event_key() {
        assert_eq!(event_key("17"), "event:17");
        assert_eq!(event_key("event:17"), "event:17");
    }

    #[test]
    fn test_record_from_fields() {
        let m = model("mistral");
        let record = Record::from_fields(
            "event:1",
            vec![
                ("Narrative".to_string(), "Wrong dose delivered.".to_string()),
                ("mistral:LLM Summary".to_string(), "Dose error.".to_string()),
                ("mistral:LLM Evaluation".to_string(), "  ".to_string()),
                ("Lemmatized Summary".to_string(), "dose".to_string()),
            ],
        );
        assert_eq!(record.narrative(), Some("Wrong dose delivered."));
        assert_eq!(record.summary(&m), Some("Dose error."));
        assert_eq!(record.evaluation(&m), None);
        assert_eq!(record.generated.len(), 2);
    }

    #[test]
    fn test_generation_options_defaults_match_constants() {
        let opts = GenerationOptions::default();
        assert_eq!(opts.num_predict, 500);
        assert_eq!(opts.top_k, 25);
        assert_eq!(opts.num_ctx, 16_000);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_generation_options_partial_deserialize() {
        let opts: GenerationOptions = serde_json::from_str(r#"{"num_predict": 64}"#).unwrap();
        assert_eq!(opts.num_predict, 64);
        assert_eq!(opts.top_k, defaults::TOP_K);
    }

    #[test]
    fn test_generation_options_validate_rejects_bad_top_p() {
        let opts = GenerationOptions {
            top_p: 1.5,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_outcome_display() {
        let o = GenerationOutcome::RequestFailed {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(o.to_string(), "request failed with status 500: boom");
        assert!(GenerationOutcome::Timeout { elapsed_ms: 45_000 }.is_timeout());
        assert_eq!(
            GenerationOutcome::Completed { text: "ok".into() }.completion(),
            Some("ok")
        );
    }
}
