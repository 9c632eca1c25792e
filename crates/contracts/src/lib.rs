//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Data Flow
//! - A `ReadingSource` is pulled by exactly one collector task
//! - The collector hands each `Reading` to a `ReadingHandoff`
//!   (the shared channel in batched mode, the retry pipeline in immediate mode)
//! - Readings end up in a `DataSink`, one rendered line per reading

mod config;
mod error;
mod handoff;
mod reading;
mod sink;
mod source;

pub use config::*;
pub use error::*;
pub use handoff::{LocalReadingHandoff, ReadingHandoff};
pub use reading::Reading;
pub use sink::*;
pub use source::{BoxedSource, ReadingSource};
