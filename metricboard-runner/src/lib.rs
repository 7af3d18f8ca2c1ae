//! metricboard runner: everything around the engine that talks to the world.
//!
//! This crate builds on `metricboard-core` to provide:
//! - The data provider trait and its HTTP implementation
//! - TOML dashboard configuration
//! - Chart panels (parallel per-rule refresh with last-good retention)
//! - The background refresh task and its caller-owned handle
//! - CSV and JSON export

pub mod config;
pub mod export;
pub mod http;
pub mod panel;
pub mod provider;
pub mod refresh;

pub use config::{ConfigError, DashboardConfig, FetchMode, MAX_RANGE};
pub use export::{export_frame_csv, export_json, export_series_csv, write_export};
pub use http::HttpProvider;
pub use panel::{ChartPanel, NamedSeries, PanelFrame, PanelRefresh, RuleError, RuleFailure};
pub use provider::{DataProvider, ProviderError};
pub use refresh::{Clock, RefreshEvent, RefreshTask};
