pub mod merge;
pub mod window;

pub use merge::{merge_batch, MergedBatch};
pub use window::{next_bucket, ReplayError, ReplayRange, ReplaySummary, WindowAdvancer, WindowState};
