//! Grounding sources and the answer returned to callers.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Excerpt of a page handed to the model as grounding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReference {
    pub content: String,
    pub url: String,
    pub title: String,
}

impl SourceReference {
    pub fn new(
        content: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            url: url.into(),
            title: title.into(),
        }
    }

    /// Length of the excerpt in characters.
    pub fn len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Page id → source excerpt, iterated in ranking order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    entries: Vec<(String, SourceReference)>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a source. Returns `false` and keeps the existing entry if the
    /// id is already present.
    pub fn insert(&mut self, id: impl Into<String>, reference: SourceReference) -> bool {
        let id = id.into();
        if self.contains_key(&id) {
            return false;
        }
        self.entries.push((id, reference));
        true
    }

    pub fn get(&self, id: &str) -> Option<&SourceReference> {
        self.entries
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, reference)| reference)
    }

    pub fn contains_key(&self, id: &str) -> bool {
        self.entries.iter().any(|(key, _)| key == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceReference)> {
        self.entries.iter().map(|(id, r)| (id.as_str(), r))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    /// Combined excerpt length in characters.
    pub fn total_len(&self) -> usize {
        self.entries.iter().map(|(_, r)| r.len()).sum()
    }
}

impl FromIterator<(String, SourceReference)> for SourceMap {
    fn from_iter<I: IntoIterator<Item = (String, SourceReference)>>(iter: I) -> Self {
        let mut map = SourceMap::new();
        for (id, reference) in iter {
            map.insert(id, reference);
        }
        map
    }
}

impl Serialize for SourceMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, reference) in &self.entries {
            map.serialize_entry(id, reference)?;
        }
        map.end()
    }
}

/// What a strategy hands back to the copilot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StrategyResponse {
    pub sources: SourceMap,
    /// Provenance note, e.g. "Answered using Direct Wiki Search".
    pub notes: String,
    pub search_term: Option<String>,
}

impl StrategyResponse {
    pub fn new(sources: SourceMap, notes: impl Into<String>, search_term: Option<String>) -> Self {
        Self {
            sources,
            notes: notes.into(),
            search_term,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerReference {
    pub page_id: String,
    pub title: String,
    pub url: String,
}

impl AnswerReference {
    pub fn from_source(page_id: &str, source: &SourceReference) -> Self {
        Self {
            page_id: page_id.to_string(),
            title: source.title.clone(),
            url: source.url.clone(),
        }
    }
}

/// Final, citation-resolved answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub answer: String,
    /// Citation number → cited page. Serialized with string keys (`"1"`).
    pub references: BTreeMap<u32, AnswerReference>,
    pub notes: String,
    /// Every source offered to the model, cited or not.
    pub all_references: Vec<AnswerReference>,
    pub search_query: Option<String>,
}
