//! Cross-document mismatch correlation
//!
//! Resolves `"Unknown"` placeholder keys to a real filename and picks which
//! document's text becomes the comment on the other document's highlight.

use tracing::debug;

use crate::mismatch::{DocumentPair, MismatchRecord, MismatchSet, PLACEHOLDER_FILENAME};

/// Rename the `"Unknown"` key in every category to whichever document of the
/// pair is not already present in the first category.
///
/// Only the first category is inspected: when it has no placeholder the set
/// is left untouched.
pub fn resolve_placeholders(mismatches: &mut MismatchSet, documents: &DocumentPair) {
    let Some(first) = mismatches.records().first() else {
        return;
    };
    if !first.contains(PLACEHOLDER_FILENAME) {
        return;
    }

    let replacement = if first.contains(&documents.primary) {
        documents.secondary.clone()
    } else {
        documents.primary.clone()
    };
    debug!(replacement = %replacement, "Resolving placeholder filename");

    for record in mismatches.records_mut() {
        if let Some(entry) = record.remove(PLACEHOLDER_FILENAME) {
            record.insert(replacement.clone(), entry);
        }
    }
}

/// Categories whose comment text comes from a fixed source entry rather than
/// the counterpart document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentOverrides {
    sources: Vec<(String, String)>,
}

impl CommentOverrides {
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn with(mut self, category: impl Into<String>, source_key: impl Into<String>) -> Self {
        self.sources.push((category.into(), source_key.into()));
        self
    }

    pub fn source_for(&self, category: &str) -> Option<&str> {
        self.sources
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, source)| source.as_str())
    }
}

impl Default for CommentOverrides {
    /// Container fields are checked against the container manifest.
    fn default() -> Self {
        Self::empty()
            .with("container_number", "container.json")
            .with("seal", "container.json")
            .with("tare_weight", "container.json")
    }
}

/// Selects the comment shown next to a highlight.
#[derive(Debug, Clone, Default)]
pub struct MismatchCorrelator {
    overrides: CommentOverrides,
}

impl MismatchCorrelator {
    pub fn new(overrides: CommentOverrides) -> Self {
        Self { overrides }
    }

    /// Comment text for the highlight of `record` on `current`.
    ///
    /// The primary document never gets callouts. Returns `None` when no
    /// non-empty text resolves.
    pub fn comment_for<'a>(
        &self,
        record: &'a MismatchRecord,
        documents: &DocumentPair,
        current: &str,
    ) -> Option<&'a str> {
        if documents.is_primary(current) {
            return None;
        }

        let text = match self.overrides.source_for(&record.category) {
            Some(source) => record.entry(source).map(|e| e.text.as_str()),
            None => match record.entry(&documents.primary) {
                Some(entry) => Some(entry.text.as_str()),
                None => record
                    .entries
                    .iter()
                    .find(|(key, entry)| key != current && entry.has_text())
                    .map(|(_, entry)| entry.text.as_str()),
            },
        };

        text.filter(|t| !t.trim().is_empty())
    }
}
