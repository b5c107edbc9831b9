//! Prompt templates and completion text normalization.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Prompt template with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptTemplate(String);

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the template references `{name}`.
    pub fn has_placeholder(&self, name: &str) -> bool {
        self.0.contains(&format!("{{{}}}", name))
    }

    /// Fail unless every named placeholder is present.
    pub fn require(&self, names: &[&str]) -> Result<()> {
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|n| !self.has_placeholder(n))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "prompt template is missing placeholder(s): {}",
                missing
                    .iter()
                    .map(|n| format!("{{{}}}", n))
                    .collect::<Vec<_>>()
                    .join(", ")
            )))
        }
    }

    /// Substitute placeholders in a single left-to-right scan, so values that
    /// themselves contain `{summary}` are never expanded again.
    pub fn render(&self, values: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(self.0.len());
        let mut rest = self.0.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let replaced = after.find('}').and_then(|close| {
                let name = &after[..close];
                values
                    .iter()
                    .find(|(k, _)| *k == name)
                    .map(|(_, v)| (*v, close))
            });
            match replaced {
                Some((value, close)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

fn newline_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n+").expect("static regex"))
}

/// Normalize a generated summary: strip leading whitespace on every line,
/// collapse runs of newlines into one, and trim the ends.
pub fn normalize_summary(text: &str) -> String {
    let stripped = text
        .replace("\r\n", "\n")
        .split('\n')
        .map(str::trim_start)
        .collect::<Vec<_>>()
        .join("\n");
    newline_runs().replace_all(&stripped, "\n").trim().to_string()
}

/// Normalize a generated evaluation: strip leading whitespace and newlines.
pub fn normalize_evaluation(text: &str) -> String {
    text.trim_start().trim_end().to_string()
}

/// Cleanup applied to every cell in the export.
pub fn clean_export_text(text: &str) -> String {
    newline_runs()
        .replace_all(&text.replace("\r\n", "\n"), "\n")
        .trim()
        .to_string()
}
