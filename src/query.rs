//! Query model: the canonical filter state behind every fetch.
//!
//! The model never performs I/O. It turns field edits into an ordered,
//! deterministic parameter list so that identical state always serializes
//! identically.

use crate::models::QueryField;
use std::collections::{BTreeMap, BTreeSet};
use url::Url;

/// Snapshot of every filter input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryState {
    pub keyword: String,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    /// Structured fields the keyword is searched against.
    pub active_fields: BTreeSet<QueryField>,
}

impl QueryState {
    pub fn get(&self, field: QueryField) -> &str {
        match field {
            QueryField::Keyword => &self.keyword,
            QueryField::Subject => &self.subject,
            QueryField::Predicate => &self.predicate,
            QueryField::Object => &self.object,
        }
    }

    fn slot(&mut self, field: QueryField) -> &mut String {
        match field {
            QueryField::Keyword => &mut self.keyword,
            QueryField::Subject => &mut self.subject,
            QueryField::Predicate => &mut self.predicate,
            QueryField::Object => &mut self.object,
        }
    }

    /// Non-empty fields in canonical order.
    pub fn non_empty_fields(&self) -> BTreeMap<QueryField, String> {
        QueryField::ALL
            .iter()
            .filter(|f| !self.get(**f).is_empty())
            .map(|f| (*f, self.get(*f).to_string()))
            .collect()
    }
}

/// Ordered query-string parameters. Repeated keys (`field`) are allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, key: &str, value: impl Into<String>) {
        self.0.push((key.to_string(), value.into()));
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Append the parameters to `base`, keeping any query it already has.
    pub fn apply_to(&self, base: &Url) -> Url {
        let mut url = base.clone();
        if !self.0.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &self.0 {
                pairs.append_pair(k, v);
            }
        }
        url
    }

    /// Rebuild parameters from a raw query string, preserving order.
    pub fn parse(query: &str) -> Self {
        Self(
            url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        )
    }
}

/// Mutable holder of the current `QueryState`.
#[derive(Debug, Clone, Default)]
pub struct QueryModel {
    state: QueryState,
    /// Non-empty keywords shorter than this are left out of the params.
    min_keyword_chars: usize,
}

impl QueryModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a pre-seeded keyword.
    pub fn with_keyword(keyword: Option<&str>) -> Self {
        let mut model = Self::new();
        if let Some(k) = keyword {
            model.set(QueryField::Keyword, k);
        }
        model
    }

    pub fn with_min_keyword_chars(mut self, min: usize) -> Self {
        self.min_keyword_chars = min;
        self
    }

    /// The keyword as sent, or `""` while it is below the minimum length.
    fn effective_keyword(&self) -> &str {
        let keyword = self.state.keyword.as_str();
        if keyword.chars().count() < self.min_keyword_chars {
            ""
        } else {
            keyword
        }
    }

    /// Update one field and return the field set with empties pruned.
    ///
    /// Values are trimmed; a whitespace-only value counts as empty.
    pub fn set(&mut self, field: QueryField, value: &str) -> BTreeMap<QueryField, String> {
        *self.state.slot(field) = value.trim().to_string();
        self.state.non_empty_fields()
    }

    /// Include or exclude a structured field from keyword matching. Returns
    /// whether the active set changed.
    pub fn set_active(&mut self, field: QueryField, active: bool) -> bool {
        if !field.is_structured() {
            return false;
        }
        if active {
            self.state.active_fields.insert(field)
        } else {
            self.state.active_fields.remove(&field)
        }
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn keyword(&self) -> &str {
        &self.state.keyword
    }

    /// Clear every filter.
    pub fn reset(&mut self) {
        self.state = QueryState::default();
    }

    /// Ordered mapping of non-empty parameters: `q`, `subject`, `predicate`,
    /// `object`, then one `field` entry per active structured field.
    pub fn to_query_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        for field in QueryField::ALL {
            let value = match field {
                QueryField::Keyword => self.effective_keyword(),
                _ => self.state.get(field),
            };
            if !value.is_empty() {
                params.push(field.param_name(), value);
            }
        }
        for field in &self.state.active_fields {
            params.push("field", field.param_name());
        }
        params
    }

    /// Parameters for the autocomplete variant of the endpoint.
    pub fn to_suggest_params(prefix: &str) -> QueryParams {
        let mut params = QueryParams::new();
        params.push("suggest", prefix.trim());
        params
    }
}
