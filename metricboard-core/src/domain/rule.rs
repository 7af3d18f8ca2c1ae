//! Rules: configured metric definitions that drive data requests.

use serde::{Deserialize, Serialize};

use super::granularity_set::GranularitySet;
use crate::granularity::Granularity;

/// A queryable metric. Read-only input to the engine; the runner uses
/// `index` to address the backend and `label()` to name the chart series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Where the backend reads the raw events from (`database.collection`).
    pub source_ref: String,
    pub value_field: String,
    #[serde(alias = "granularities")]
    pub supported_granularities: GranularitySet,
    /// When set, the rule is scoped to one string value of `value_field`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default)]
    pub index: usize,
}

impl Rule {
    pub fn new(
        source_ref: impl Into<String>,
        value_field: impl Into<String>,
        supported_granularities: GranularitySet,
    ) -> Self {
        Self {
            source_ref: source_ref.into(),
            value_field: value_field.into(),
            supported_granularities,
            value_type: None,
            index: 0,
        }
    }

    pub fn label(&self) -> String {
        match &self.value_type {
            Some(value) => format!("{} - {}", self.value_field, value),
            None => self.value_field.clone(),
        }
    }

    pub fn supports(&self, granularity: Granularity) -> bool {
        self.supported_granularities.contains(granularity)
    }

    /// A copy of this rule restricted to one sub-dimension value.
    pub fn scoped_to(&self, value: impl Into<String>) -> Rule {
        Rule {
            value_type: Some(value.into()),
            ..self.clone()
        }
    }
}

/// Number rules by position.
pub fn index_rules(rules: &mut [Rule]) {
    for (i, rule) in rules.iter_mut().enumerate() {
        rule.index = i;
    }
}

/// Expand each rule with one scoped copy per known sub-dimension value.
///
/// `values_for` is asked once per rule (typically backed by the provider's
/// metadata endpoint); an empty answer leaves the rule unexpanded. Scoped
/// rules keep the backend index of the rule they came from, since that is
/// what the data routes address.
pub fn expand_rule_values<F>(rules: &[Rule], mut values_for: F) -> Vec<Rule>
where
    F: FnMut(&Rule) -> Vec<String>,
{
    let mut expanded = Vec::with_capacity(rules.len());
    for rule in rules {
        expanded.push(rule.clone());
        for value in values_for(rule) {
            expanded.push(rule.scoped_to(value));
        }
    }
    expanded
}
