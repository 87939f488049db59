//! Reference query semantics for the bundled data sources.
//!
//! The sync engine does not care how filters combine; this module is what the
//! static-file source and the `serve` endpoint use to answer a query. Each link
//! is read as a triple (subject = source node, predicate = link predicate,
//! object = target node). Structured filters are case-insensitive substring
//! matches combined with AND. The keyword is matched against the active
//! structured positions (all three when none is active) and against node
//! ids and labels.

use crate::models::{Dataset, GraphLink, GraphNode, QueryField, Suggestion};
use crate::query::QueryParams;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Maximum number of autocomplete entries returned.
pub const MAX_SUGGESTIONS: usize = 10;

/// Attribute marking a node as visible to authenticated sessions only.
pub const PRIVATE_ATTR: &str = "private";

// ============================================================================
// Parsed Filter
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphFilter {
    pub keyword: Option<String>,
    pub subject: Option<String>,
    pub predicate: Option<String>,
    pub object: Option<String>,
    pub fields: BTreeSet<QueryField>,
}

impl GraphFilter {
    /// Build a filter from request parameters; unknown keys and unknown
    /// `field` values are ignored.
    pub fn from_params(params: &QueryParams) -> Self {
        let take = |key: &str| {
            params
                .get(key)
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
        };
        Self {
            keyword: take("q"),
            subject: take("subject"),
            predicate: take("predicate"),
            object: take("object"),
            fields: params
                .get_all("field")
                .into_iter()
                .filter_map(QueryField::parse)
                .filter(|f| f.is_structured())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keyword.is_none()
            && self.subject.is_none()
            && self.predicate.is_none()
            && self.object.is_none()
    }

    fn has_structured(&self) -> bool {
        self.subject.is_some() || self.predicate.is_some() || self.object.is_some()
    }

    fn keyword_positions(&self) -> Vec<QueryField> {
        if self.fields.is_empty() {
            QueryField::STRUCTURED.to_vec()
        } else {
            self.fields.iter().copied().collect()
        }
    }
}

// ============================================================================
// Matching
// ============================================================================

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn node_matches(node: Option<&GraphNode>, id: &str, needle: &str) -> bool {
    contains(id, needle) || node.and_then(|n| n.label.as_deref()).is_some_and(|l| contains(l, needle))
}

fn link_matches(
    link: &GraphLink,
    nodes: &HashMap<&str, &GraphNode>,
    filter: &GraphFilter,
) -> bool {
    let subject = nodes.get(link.source.as_str()).copied();
    let object = nodes.get(link.target.as_str()).copied();
    let predicate = link.predicate.as_deref().unwrap_or("");

    if let Some(ref s) = filter.subject {
        if !node_matches(subject, &link.source, s) {
            return false;
        }
    }
    if let Some(ref p) = filter.predicate {
        if !contains(predicate, p) {
            return false;
        }
    }
    if let Some(ref o) = filter.object {
        if !node_matches(object, &link.target, o) {
            return false;
        }
    }
    if let Some(ref k) = filter.keyword {
        let hit = filter.keyword_positions().iter().any(|pos| match pos {
            QueryField::Subject => node_matches(subject, &link.source, k),
            QueryField::Predicate => contains(predicate, k),
            QueryField::Object => node_matches(object, &link.target, k),
            QueryField::Keyword => false,
        });
        if !hit {
            return false;
        }
    }
    true
}

fn is_private(node: &GraphNode) -> bool {
    node.attributes
        .get(PRIVATE_ATTR)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// Remove nodes reserved for authenticated sessions, and the links touching them.
pub fn visible_to(dataset: &Dataset, authenticated: bool) -> Dataset {
    if authenticated {
        return dataset.clone();
    }
    let nodes: Vec<GraphNode> = dataset
        .nodes
        .iter()
        .filter(|n| !is_private(n))
        .cloned()
        .collect();
    let kept: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let links = dataset
        .links
        .iter()
        .filter(|l| kept.contains(l.source.as_str()) && kept.contains(l.target.as_str()))
        .cloned()
        .collect();
    Dataset::new(nodes, links)
}

/// Answer a search query against a full dataset.
///
/// Node order follows the source dataset. The result always satisfies
/// `Dataset::validate` when the input does.
pub fn apply(dataset: &Dataset, filter: &GraphFilter) -> Dataset {
    if filter.is_empty() {
        return dataset.clone();
    }

    let by_id: HashMap<&str, &GraphNode> =
        dataset.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    let links: Vec<GraphLink> = dataset
        .links
        .iter()
        .filter(|l| link_matches(l, &by_id, filter))
        .cloned()
        .collect();

    let mut included: HashSet<&str> = links
        .iter()
        .flat_map(|l| [l.source.as_str(), l.target.as_str()])
        .collect();

    // Isolated keyword hits only make sense without structured constraints
    if let (Some(k), false) = (&filter.keyword, filter.has_structured()) {
        for node in &dataset.nodes {
            if node_matches(Some(node), &node.id, k) {
                included.insert(node.id.as_str());
            }
        }
    }

    let nodes = dataset
        .nodes
        .iter()
        .filter(|n| included.contains(n.id.as_str()))
        .cloned()
        .collect();

    Dataset::new(nodes, links)
}

/// Distinct node labels and predicates starting with `prefix`, sorted and
/// capped at `MAX_SUGGESTIONS`.
pub fn suggest(dataset: &Dataset, prefix: &str) -> Vec<Suggestion> {
    let needle = prefix.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut seen = BTreeSet::new();
    let node_labels = dataset
        .nodes
        .iter()
        .map(|n| (n.display_label().to_string(), "node"));
    let predicates = dataset
        .links
        .iter()
        .filter_map(|l| l.predicate.clone())
        .map(|p| (p, "predicate"));

    let mut out: Vec<Suggestion> = Vec::new();
    for (raw, source) in node_labels.chain(predicates) {
        let parsed = Suggestion::from_literal(&raw);
        if parsed.value.to_lowercase().starts_with(&needle) && seen.insert(parsed.value.clone()) {
            out.push(Suggestion {
                source: Some(source.to_string()),
                ..parsed
            });
        }
    }
    out.sort_by(|a, b| a.value.to_lowercase().cmp(&b.value.to_lowercase()));
    out.truncate(MAX_SUGGESTIONS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        let mut secret = GraphNode::new("lake_x").with_label("Lake X");
        secret
            .attributes
            .insert(PRIVATE_ATTR.to_string(), serde_json::Value::Bool(true));
        Dataset::new(
            vec![
                GraphNode::new("nile").with_label("\"Nile\"@en").with_group("river"),
                GraphNode::new("egypt").with_label("Egypt").with_group("country"),
                GraphNode::new("sudan").with_label("Sudan").with_group("country"),
                GraphNode::new("africa").with_label("Africa").with_group("continent"),
                GraphNode::new("niger").with_label("Niger").with_group("river"),
                secret,
            ],
            vec![
                GraphLink::new("nile", "egypt").with_predicate("flowsThrough"),
                GraphLink::new("nile", "sudan").with_predicate("flowsThrough"),
                GraphLink::new("egypt", "africa").with_predicate("locatedIn"),
                GraphLink::new("lake_x", "nile").with_predicate("feeds"),
            ],
        )
    }

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        let mut p = QueryParams::new();
        for (k, v) in pairs {
            p.push(k, *v);
        }
        p
    }

    fn ids(ds: &Dataset) -> Vec<&str> {
        ds.node_ids()
    }

    #[test]
    fn test_empty_filter_returns_everything() {
        let ds = sample();
        assert_eq!(apply(&ds, &GraphFilter::default()), ds);
    }

    #[test]
    fn test_keyword_matches_links_and_isolated_nodes() {
        let ds = sample();
        let f = GraphFilter::from_params(&params(&[("q", "nig")]));
        let out = apply(&ds, &f);
        assert_eq!(ids(&out), vec!["niger"]);
        assert!(out.links.is_empty());

        let f = GraphFilter::from_params(&params(&[("q", "Africa")]));
        let out = apply(&ds, &f);
        assert_eq!(ids(&out), vec!["egypt", "africa"]);
        assert_eq!(out.links.len(), 1);
        assert!(out.validate().is_ok());
    }

    #[test]
    fn test_structured_filters_are_conjunctive() {
        let ds = sample();
        let f = GraphFilter::from_params(&params(&[
            ("subject", "nile"),
            ("predicate", "flows"),
            ("object", "sud"),
        ]));
        let out = apply(&ds, &f);
        assert_eq!(out.links.len(), 1);
        assert_eq!(out.links[0].target, "sudan");
        assert_eq!(ids(&out), vec!["nile", "sudan"]);
    }

    #[test]
    fn test_keyword_limited_to_active_fields() {
        let ds = sample();
        let f = GraphFilter::from_params(&params(&[("q", "egypt"), ("field", "subject")]));
        let out = apply(&ds, &f);
        assert_eq!(out.links.len(), 1);
        assert_eq!(out.links[0].source, "egypt");

        let f = GraphFilter::from_params(&params(&[("q", "located"), ("field", "predicate")]));
        assert_eq!(apply(&ds, &f).links.len(), 1);
    }

    #[test]
    fn test_private_nodes_hidden_from_anonymous() {
        let ds = sample();
        let anon = visible_to(&ds, false);
        assert!(anon.node("lake_x").is_none());
        assert_eq!(anon.links.len(), 3);
        assert!(anon.validate().is_ok());
        assert_eq!(visible_to(&ds, true), ds);
    }

    #[test]
    fn test_suggest_prefix_and_literal_stripping() {
        let ds = sample();
        let out = suggest(&ds, "ni");
        let values: Vec<&str> = out.iter().map(|s| s.value.as_str()).collect();
        assert_eq!(values, vec!["Niger", "Nile"]);
        let nile = out.iter().find(|s| s.value == "Nile").unwrap();
        assert_eq!(nile.lang.as_deref(), Some("en"));

        let out = suggest(&ds, "flow");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source.as_deref(), Some("predicate"));

        assert!(suggest(&ds, "  ").is_empty());
    }
}
