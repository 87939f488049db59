//! Data models shared by the engine, the data sources, and the sinks.
//!
//! This module contains the graph dataset exchanged with the visualization,
//! autocomplete suggestions, and the small enums naming query fields and
//! fetch channels.

use crate::error::SyncError;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

// ============================================================================
// Graph Dataset
// ============================================================================

/// A node of the linked-data graph. Anything beyond the well-known fields is
/// kept verbatim in `attributes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            group: None,
            color: None,
            attributes: serde_json::Map::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Text drawn for the node; unlabelled nodes are shown by id.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

/// A directed link. `predicate` also accepts the `label` key used by many
/// force-graph datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphLink {
    #[serde(deserialize_with = "string_or_number")]
    pub source: String,
    #[serde(deserialize_with = "string_or_number")]
    pub target: String,
    #[serde(default, alias = "label", skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl GraphLink {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            predicate: None,
            attributes: serde_json::Map::new(),
        }
    }

    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }
}

/// A complete graph as handed to the visualization. Every update replaces the
/// previous dataset wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub links: Vec<GraphLink>,
}

impl Dataset {
    pub fn new(nodes: Vec<GraphNode>, links: Vec<GraphLink>) -> Self {
        Self { nodes, links }
    }

    /// Check that every link endpoint exists in the node set.
    ///
    /// A violating dataset is rejected as a whole; it is never repaired by
    /// dropping the offending links.
    pub fn validate(&self) -> Result<(), SyncError> {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        for link in &self.links {
            for endpoint in [&link.source, &link.target] {
                if !ids.contains(endpoint.as_str()) {
                    return Err(SyncError::Integrity {
                        link_source: link.source.clone(),
                        link_target: link.target.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    pub fn stats(&self) -> DatasetStats {
        let groups: HashSet<&str> = self
            .nodes
            .iter()
            .filter_map(|n| n.group.as_deref())
            .collect();
        DatasetStats {
            total_nodes: self.nodes.len(),
            total_links: self.links.len(),
            group_count: groups.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatasetStats {
    pub total_nodes: usize,
    pub total_links: usize,
    pub group_count: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<Scalar> for String {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Text(s) => s,
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
        }
    }
}

/// Ids and groups show up as either JSON strings or JSON numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Scalar::deserialize(deserializer).map(String::from)
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
}

// ============================================================================
// Suggestions
// ============================================================================

/// RDF-style literal: `"value"@lang` or `"value"^^<datatype>`.
static LITERAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^"(.*)"(?:@([A-Za-z]+(?:-[A-Za-z0-9]+)*)|\^\^<[^>]*>)?$"#)
        .expect("literal pattern is valid")
});

/// One autocomplete entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    /// Display text with any literal quoting and language tag removed.
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Suggestion {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            lang: None,
            source: None,
        }
    }

    /// Parse a raw value, stripping the quoting and language tag of an RDF
    /// literal for display.
    pub fn from_literal(raw: &str) -> Self {
        let raw = raw.trim();
        match LITERAL_RE.captures(raw) {
            Some(caps) => Self {
                value: caps.get(1).map(|m| m.as_str()).unwrap_or_default().to_string(),
                lang: caps.get(2).map(|m| m.as_str().to_string()),
                source: None,
            },
            None => Self::new(raw),
        }
    }
}

/// Suggestions arrive either as bare strings or as objects with metadata.
impl<'de> Deserialize<'de> for Suggestion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Plain(String),
            Detailed {
                value: String,
                #[serde(default)]
                lang: Option<String>,
                #[serde(default)]
                source: Option<String>,
            },
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Plain(raw) => Suggestion::from_literal(&raw),
            Wire::Detailed { value, lang, source } => {
                let parsed = Suggestion::from_literal(&value);
                Suggestion {
                    value: parsed.value,
                    lang: lang.or(parsed.lang),
                    source,
                }
            }
        })
    }
}

// ============================================================================
// Query Fields and Channels
// ============================================================================

/// A filter input. `Keyword` is free text; the others are structured
/// positions of a (subject, predicate, object) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryField {
    Keyword,
    Subject,
    Predicate,
    Object,
}

impl QueryField {
    pub const ALL: [QueryField; 4] = [
        QueryField::Keyword,
        QueryField::Subject,
        QueryField::Predicate,
        QueryField::Object,
    ];

    pub const STRUCTURED: [QueryField; 3] =
        [QueryField::Subject, QueryField::Predicate, QueryField::Object];

    /// Query-string parameter carrying this field's value.
    pub fn param_name(self) -> &'static str {
        match self {
            QueryField::Keyword => "q",
            QueryField::Subject => "subject",
            QueryField::Predicate => "predicate",
            QueryField::Object => "object",
        }
    }

    pub fn is_structured(self) -> bool {
        !matches!(self, QueryField::Keyword)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "q" | "keyword" => Some(QueryField::Keyword),
            "subject" | "s" => Some(QueryField::Subject),
            "predicate" | "p" => Some(QueryField::Predicate),
            "object" | "o" => Some(QueryField::Object),
            _ => None,
        }
    }
}

impl fmt::Display for QueryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryField::Keyword => "keyword",
            other => other.param_name(),
        };
        f.write_str(name)
    }
}

/// Independent stream of debounce and sequencing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Search,
    Suggest,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Search, Channel::Suggest];

    pub fn index(self) -> usize {
        match self {
            Channel::Search => 0,
            Channel::Suggest => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Search => "search",
            Channel::Suggest => "suggest",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
