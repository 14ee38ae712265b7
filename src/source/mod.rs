pub mod discovery;
pub mod reader;

pub use discovery::{enumerate_sources, DiscoveryError, SourceId};
pub use reader::{IncrementalReader, OffsetTable, Record, ScanOutcome};
