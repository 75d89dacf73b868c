//! upcheck-lib: incremental up-to-date checks for multi-project builds
//!
//! This crate decides whether a project's previous build outputs are still
//! current, and can bring a project up to date by copying files from the
//! projects it references instead of building it:
//! - `ProjectChecker`: runs the ordered checks for one project
//! - `SolutionBuildContext`: state shared by every project of a build
//! - `CopyItemAggregator`: the cross-project copy-item graph
//! - `StateStore`: durable last-build and item-set state

pub mod check;
pub mod config;
pub mod consts;
pub mod copy;
pub mod fs;
pub mod persistence;
pub mod platform;
pub mod project;
pub mod session;
pub mod solution;
pub mod source;
pub mod timestamp;
pub mod util;

pub use check::{BuildAction, CheckError, CheckOutcome, CheckRequest, ProjectChecker};
pub use session::SolutionBuildContext;
