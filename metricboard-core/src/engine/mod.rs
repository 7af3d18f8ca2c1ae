//! Materialization engine: three ways to turn backend data into a dense,
//! calendar-aligned series.
//!
//! - `materialize`: bucket documents onto a fixed window at any granularity
//! - `align_live_window`: a flat point stream matched against a tick cursor
//! - `slice_window`: a fixed-length minute slice padded to the newest data
//!
//! All of them are pure functions of their inputs. Only static arguments
//! (a zero range or length) are rejected; odd data never is.

pub mod align;
pub mod materialize;
pub mod slice;

pub use align::align_live_window;
pub use materialize::{materialize, Materializer, OverlapPolicy};
pub use slice::{slice_window, WindowSlicer};
