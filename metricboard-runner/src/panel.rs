//! Chart panel: one chart's rules, granularity and window, refreshed as a unit.
//!
//! Each refresh computes the live window ending at `now`, fetches every
//! selected rule in parallel, turns each response into a dense series and
//! returns one frame with shared labels. A rule whose fetch fails keeps its
//! last good values in the frame (marked stale); the failure is reported
//! next to the frame rather than aborting the refresh.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use metricboard_core::domain::expand_rule_values;
use metricboard_core::{
    align_live_window, materialize, Granularity, MaterializedSeries, Rule, SeriesError,
};

use crate::config::{DashboardConfig, FetchMode};
use crate::provider::{DataProvider, ProviderError};

/// Why one rule produced no fresh series.
#[derive(Debug, Clone, Error)]
pub enum RuleError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// One rule's values in a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedSeries {
    pub label: String,
    /// `source_ref` of the rule, so same-named fields from different
    /// sources stay distinguishable.
    pub source: String,
    pub values: Vec<f64>,
    /// True when the values were carried over from an earlier refresh.
    pub stale: bool,
}

/// Everything a chart needs to draw one refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelFrame {
    pub granularity: Granularity,
    pub labels: Vec<String>,
    pub series: Vec<NamedSeries>,
}

impl PanelFrame {
    /// First series with this label. Use `series_from` when two sources
    /// share a field name.
    pub fn series(&self, label: &str) -> Option<&NamedSeries> {
        self.series.iter().find(|s| s.label == label)
    }

    pub fn series_from(&self, source: &str, label: &str) -> Option<&NamedSeries> {
        self.series
            .iter()
            .find(|s| s.source == source && s.label == label)
    }
}

#[derive(Debug, Clone)]
pub struct RuleFailure {
    pub label: String,
    pub error: RuleError,
}

#[derive(Debug, Clone)]
pub struct PanelRefresh {
    pub frame: PanelFrame,
    pub failures: Vec<RuleFailure>,
}

/// Identity of a rule for retained series. Labels alone collide across
/// sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RuleKey {
    source_ref: String,
    value_field: String,
    value_type: Option<String>,
    index: usize,
}

impl RuleKey {
    fn of(rule: &Rule) -> Self {
        Self {
            source_ref: rule.source_ref.clone(),
            value_field: rule.value_field.clone(),
            value_type: rule.value_type.clone(),
            index: rule.index,
        }
    }
}

pub struct ChartPanel {
    provider: Arc<dyn DataProvider>,
    rules: Vec<Rule>,
    granularity: Granularity,
    range: usize,
    mode: FetchMode,
    last_good: HashMap<RuleKey, Vec<f64>>,
}

impl ChartPanel {
    pub fn new(
        provider: Arc<dyn DataProvider>,
        granularity: Granularity,
        range: usize,
        mode: FetchMode,
    ) -> Result<Self, SeriesError> {
        if range == 0 {
            return Err(SeriesError::NonPositiveRange);
        }
        Ok(Self {
            provider,
            rules: Vec::new(),
            granularity,
            range,
            mode,
            last_good: HashMap::new(),
        })
    }

    /// Panel over every configured rule at the configured granularity.
    pub fn from_config(
        config: &DashboardConfig,
        provider: Arc<dyn DataProvider>,
    ) -> Result<Self, SeriesError> {
        let mut panel = Self::new(provider, config.granularity, config.range, config.mode)?;
        panel.rules = config.rules.clone();
        Ok(panel)
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn range(&self) -> usize {
        self.range
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Switching granularity invalidates every retained series.
    pub fn set_granularity(&mut self, granularity: Granularity) {
        if granularity != self.granularity {
            self.granularity = granularity;
            self.last_good.clear();
        }
    }

    pub fn set_rules(&mut self, rules: Vec<Rule>) {
        self.last_good
            .retain(|key, _| rules.iter().any(|r| RuleKey::of(r) == *key));
        self.rules = rules;
    }

    /// Add one scoped rule per metadata value of each unscoped rule.
    ///
    /// Metadata is asked for at the rule's coarsest granularity. Failures
    /// leave that rule unexpanded and are returned.
    pub fn expand_rule_values(&mut self) -> Vec<RuleFailure> {
        let provider = Arc::clone(&self.provider);
        let fallback = self.granularity;
        let mut failures = Vec::new();

        let base: Vec<Rule> = self
            .rules
            .iter()
            .filter(|r| r.value_type.is_none())
            .cloned()
            .collect();
        let expanded = expand_rule_values(&base, |rule| {
            let granularity = rule.supported_granularities.first().unwrap_or(fallback);
            match provider.fetch_metadata(rule.index, granularity) {
                Ok(values) => values,
                Err(e) => {
                    warn!(rule = %rule.label(), error = %e, "metadata fetch failed");
                    failures.push(RuleFailure {
                        label: rule.label(),
                        error: e.into(),
                    });
                    Vec::new()
                }
            }
        });
        self.set_rules(expanded);
        failures
    }

    /// `[start, end]` of the window ending at `now`: `range` ticks with the
    /// tick containing `now` last.
    pub fn window(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>), SeriesError> {
        let g = self.granularity;
        let start = g.add_ticks(g.floor(now), 1 - self.range as i64)?;
        Ok((start, now))
    }

    pub fn refresh(&mut self, now: DateTime<Utc>) -> Result<PanelRefresh, SeriesError> {
        let (start, end) = self.window(now)?;
        let labels = MaterializedSeries::zeros(self.granularity, start, self.range)?
            .into_parts()
            .0;

        let g = self.granularity;
        let outcomes: Vec<(&Rule, Result<Vec<f64>, RuleError>)> = self
            .rules
            .par_iter()
            .filter(|rule| rule.supports(g))
            .map(|rule| (rule, self.fetch_rule(rule, start, end)))
            .collect();
        debug!(
            granularity = %g,
            charted = outcomes.len(),
            skipped = self.rules.len() - outcomes.len(),
            "refreshed panel rules"
        );

        let mut series = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        let mut fresh = Vec::new();
        for (rule, outcome) in outcomes {
            let label = rule.label();
            let source = rule.source_ref.clone();
            match outcome {
                Ok(values) => {
                    fresh.push((RuleKey::of(rule), values.clone()));
                    series.push(NamedSeries {
                        label,
                        source,
                        values,
                        stale: false,
                    });
                }
                Err(error) => {
                    warn!(rule = %label, %source, %error, "refresh failed, keeping last good series");
                    let values = self
                        .last_good
                        .get(&RuleKey::of(rule))
                        .cloned()
                        .unwrap_or_else(|| vec![0.0; self.range]);
                    series.push(NamedSeries {
                        label: label.clone(),
                        source,
                        values,
                        stale: true,
                    });
                    failures.push(RuleFailure { label, error });
                }
            }
        }
        self.last_good.extend(fresh);

        Ok(PanelRefresh {
            frame: PanelFrame {
                granularity: g,
                labels,
                series,
            },
            failures,
        })
    }

    fn fetch_rule(
        &self,
        rule: &Rule,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<f64>, RuleError> {
        let g = self.granularity;
        let value_type = rule.value_type.as_deref();

        let series = match self.mode {
            FetchMode::Tabular => {
                let points = self
                    .provider
                    .fetch_tabular(rule.index, g, start, end, value_type)?;
                align_live_window(&points, g, start, end, self.range)?
            }
            FetchMode::Bucketed => {
                // The first document covering the window starts at its parent.
                let fetch_start = g.parent_start(start);
                let documents = match value_type {
                    Some(value) => self
                        .provider
                        .fetch_bucketed_by_value(rule.index, g, fetch_start, end, value)?,
                    None => self.provider.fetch_bucketed(rule.index, g, fetch_start, end)?,
                };
                materialize(&documents, g, start, self.range)?
            }
        };
        Ok(series.into_parts().1)
    }
}
