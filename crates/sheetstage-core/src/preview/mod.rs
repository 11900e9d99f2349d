//! Preview transactions: stage a plan as a draft, then accept or reject.

mod manager;
mod snapshot;

pub use manager::{PreviewManager, PreviewPolicy};
pub use snapshot::{
    RangeFormatting, RangeSnapshot, capture_range_formatting, capture_range_snapshot,
    restore_range_snapshot,
};
