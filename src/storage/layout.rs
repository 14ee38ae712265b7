use crate::source::discovery::SourceId;
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::path::{Path, PathBuf};

/// Seconds in one storage bucket.
pub const HOUR_SECS: i64 = 3600;

/// Maps a (directory, bucket time, source) triple onto the file that holds
/// that source's records for the bucket.
pub trait BucketLayout {
    /// Width of one bucket in seconds. Bucket starts are multiples of this.
    fn span(&self) -> i64 {
        HOUR_SECS
    }

    /// Path of the bucket file covering `at` for `source`.
    ///
    /// Returns `None` when `at` cannot be rendered as a calendar time.
    fn bucket_path(&self, dir: &Path, at: i64, source: SourceId) -> Option<PathBuf>;

    /// Start of the bucket containing `at`.
    fn align(&self, at: i64) -> i64 {
        at - at.rem_euclid(self.span())
    }
}

/// Collector layout: `<dir>/<source:08x>/<YYYY>/<MM>/<DD>/<HH>.pb`, UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct HourlyLayout;

impl BucketLayout for HourlyLayout {
    fn bucket_path(&self, dir: &Path, at: i64, source: SourceId) -> Option<PathBuf> {
        let when = DateTime::<Utc>::from_timestamp(self.align(at), 0)?;
        Some(
            dir.join(source.to_string())
                .join(format!("{:04}", when.year()))
                .join(format!("{:02}", when.month()))
                .join(format!("{:02}", when.day()))
                .join(format!("{:02}.pb", when.hour())),
        )
    }
}
