pub mod layout;
pub mod record;

pub use layout::{BucketLayout, HourlyLayout};
pub use record::{FramedRecordFormat, RecordError, RecordReader, StoredRecord};
