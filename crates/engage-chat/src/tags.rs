//! In-band analytics directives carried in assistant replies.
//!
//! The assistant is briefed to tag barriers to care as
//! `[NEEDS_IDENTIFIED: KEYWORD]` and care-team notes as `[NOTE: free text]`.
//! Both are pulled out into typed lists and stripped before the reply is
//! shown. Anything that does not match the grammar exactly is left in the
//! visible text untouched.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

// =============================================================================
// Grammar
// =============================================================================

// One alternation so needs and notes come out in order of appearance.
// Horizontal whitespace in front of a directive goes with it, so a tag in the
// middle of a sentence does not leave a double space behind.
static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t]*\[(?:NEEDS_IDENTIFIED:\s*([A-Za-z0-9_]+)\s*|NOTE:\s*(.*?)\s*)\]")
        .expect("Invalid directive regex")
});

/// A single directive found in assistant text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Directive {
    /// Upper-cased need keyword, e.g. `TRANSPORTATION`.
    Need(String),
    /// Verbatim note text.
    Note(String),
}

/// Assistant text split into what the patient sees and what analytics keeps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedReply {
    /// Visible text with directives removed, trimmed.
    pub text: String,
    /// Need keywords in order of appearance, duplicates kept.
    pub needs: Vec<String>,
    /// Notes in order of appearance.
    pub notes: Vec<String>,
}

impl ExtractedReply {
    pub fn has_tags(&self) -> bool {
        !self.needs.is_empty() || !self.notes.is_empty()
    }
}

// =============================================================================
// TagExtractor
// =============================================================================

/// Stateless directive parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagExtractor;

impl TagExtractor {
    /// All directives in `raw`, in order of appearance.
    pub fn directives(&self, raw: &str) -> Vec<Directive> {
        DIRECTIVE_RE
            .captures_iter(raw)
            .filter_map(|caps| {
                if let Some(word) = caps.get(1) {
                    Some(Directive::Need(word.as_str().to_uppercase()))
                } else {
                    caps.get(2).map(|note| Directive::Note(note.as_str().to_string()))
                }
            })
            .collect()
    }

    /// Split `raw` into visible text plus needs and notes.
    pub fn extract(&self, raw: &str) -> ExtractedReply {
        let mut needs = Vec::new();
        let mut notes = Vec::new();
        for directive in self.directives(raw) {
            match directive {
                Directive::Need(word) => needs.push(word),
                Directive::Note(text) => notes.push(text),
            }
        }

        let text = DIRECTIVE_RE.replace_all(raw, "").trim().to_string();

        ExtractedReply { text, needs, notes }
    }
}
