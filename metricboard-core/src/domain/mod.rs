//! Domain types for metricboard

pub mod document;
pub mod granularity_set;
pub mod rule;
pub mod series;

pub use document::{BucketDocument, RawPoint};
pub use granularity_set::{GranularityFlags, GranularitySet};
pub use rule::{expand_rule_values, index_rules, Rule};
pub use series::MaterializedSeries;
