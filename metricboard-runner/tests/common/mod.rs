//! In-memory data provider shared by the runner integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use metricboard_core::{BucketDocument, Granularity, GranularitySet, RawPoint, Rule};
use metricboard_runner::{DataProvider, ProviderError};

type Key = (usize, Option<String>);

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub route: &'static str,
    pub rule_index: usize,
    pub granularity: Granularity,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub value_type: Option<String>,
}

#[derive(Default)]
struct State {
    documents: HashMap<Key, Vec<BucketDocument>>,
    points: HashMap<Key, Vec<RawPoint>>,
    metadata: HashMap<usize, Vec<String>>,
    failing: HashSet<usize>,
    calls: Vec<Call>,
}

#[derive(Default)]
pub struct MockProvider {
    state: Mutex<State>,
    delay: Duration,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch sleeps for `delay` first.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn set_documents(&self, rule: usize, value: Option<&str>, docs: Vec<BucketDocument>) {
        self.state
            .lock()
            .unwrap()
            .documents
            .insert((rule, value.map(str::to_string)), docs);
    }

    pub fn set_points(&self, rule: usize, value: Option<&str>, points: Vec<RawPoint>) {
        self.state
            .lock()
            .unwrap()
            .points
            .insert((rule, value.map(str::to_string)), points);
    }

    pub fn set_metadata(&self, rule: usize, values: &[&str]) {
        self.state
            .lock()
            .unwrap()
            .metadata
            .insert(rule, values.iter().map(|v| v.to_string()).collect());
    }

    pub fn fail(&self, rule: usize) {
        self.state.lock().unwrap().failing.insert(rule);
    }

    pub fn recover(&self, rule: usize) {
        self.state.lock().unwrap().failing.remove(&rule);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, call: Call) -> Result<(), ProviderError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let mut state = self.state.lock().unwrap();
        let failing = state.failing.contains(&call.rule_index);
        state.calls.push(call);
        if failing {
            return Err(ProviderError::Server {
                status: 500,
                message: "backend unavailable".into(),
            });
        }
        Ok(())
    }
}

impl DataProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch_bucketed(
        &self,
        rule_index: usize,
        granularity: Granularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BucketDocument>, ProviderError> {
        self.record(Call {
            route: "data",
            rule_index,
            granularity,
            start: Some(start),
            end: Some(end),
            value_type: None,
        })?;
        let state = self.state.lock().unwrap();
        Ok(state
            .documents
            .get(&(rule_index, None))
            .cloned()
            .unwrap_or_default())
    }

    fn fetch_bucketed_by_value(
        &self,
        rule_index: usize,
        granularity: Granularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        value_type: &str,
    ) -> Result<Vec<BucketDocument>, ProviderError> {
        self.record(Call {
            route: "data",
            rule_index,
            granularity,
            start: Some(start),
            end: Some(end),
            value_type: Some(value_type.to_string()),
        })?;
        let state = self.state.lock().unwrap();
        Ok(state
            .documents
            .get(&(rule_index, Some(value_type.to_string())))
            .cloned()
            .unwrap_or_default())
    }

    fn fetch_metadata(
        &self,
        rule_index: usize,
        granularity: Granularity,
    ) -> Result<Vec<String>, ProviderError> {
        self.record(Call {
            route: "metadata",
            rule_index,
            granularity,
            start: None,
            end: None,
            value_type: None,
        })?;
        let state = self.state.lock().unwrap();
        Ok(state.metadata.get(&rule_index).cloned().unwrap_or_default())
    }

    fn fetch_tabular(
        &self,
        rule_index: usize,
        granularity: Granularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        value_type: Option<&str>,
    ) -> Result<Vec<RawPoint>, ProviderError> {
        let value_type = value_type.map(str::to_string);
        self.record(Call {
            route: "tabular",
            rule_index,
            granularity,
            start: Some(start),
            end: Some(end),
            value_type: value_type.clone(),
        })?;
        let state = self.state.lock().unwrap();
        Ok(state
            .points
            .get(&(rule_index, value_type))
            .cloned()
            .unwrap_or_default())
    }
}

pub fn at(h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, h, mi, s).unwrap()
}

pub fn rule(index: usize, field: &str, codes: &[&str]) -> Rule {
    let mut rule = Rule::new("app.events", field, GranularitySet::from_codes(codes).unwrap());
    rule.index = index;
    rule
}
