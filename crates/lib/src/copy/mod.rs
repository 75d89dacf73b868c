//! Copy-to-output items: the cross-project graph and the staged copies that
//! build acceleration applies.

mod aggregator;
mod operations;
mod types;

pub use aggregator::CopyItemAggregator;
pub use operations::{CopyError, CopyOperation, FileSystemOperationAggregator};
pub use types::{CopyItem, CopyItemsResult, CopyType, ProjectCopyData};
