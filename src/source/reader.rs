use crate::source::discovery::SourceId;
use crate::storage::layout::{BucketLayout, HourlyLayout};
use crate::storage::record::{FramedRecordFormat, RecordReader};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// A monitoring record harvested from one source's bucket file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub source: SourceId,
    pub timestamp: DateTime<Utc>,
    pub payload: Vec<u8>,
}

/// Byte offset already consumed from each bucket file during this run.
///
/// Offsets live only in memory; a path never seen before starts at zero.
#[derive(Debug, Default)]
pub struct OffsetTable {
    offsets: HashMap<PathBuf, u64>,
}

impl OffsetTable {
    pub fn get(&self, path: &Path) -> u64 {
        self.offsets.get(path).copied().unwrap_or(0)
    }

    /// Record progress on `path`. Offsets never move backwards.
    fn advance(&mut self, path: PathBuf, offset: u64) {
        let slot = self.offsets.entry(path).or_insert(0);
        if offset > *slot {
            *slot = offset;
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, u64)> {
        self.offsets.iter().map(|(p, o)| (p.as_path(), *o))
    }
}

/// What happened when one source's bucket file was scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The layout could not name a file for this bucket.
    Unresolved,
    /// No file for this bucket yet.
    Missing,
    /// The file exists but could not be opened or positioned this pass.
    Skipped,
    Drained { looked: usize, harvested: usize },
}

/// Reads newly appended records from bucket files, remembering per path how
/// far it got so each record is read once per run.
pub struct IncrementalReader<L = HourlyLayout, F = FramedRecordFormat> {
    layout: L,
    format: F,
    retention_slack: i64,
    offsets: OffsetTable,
}

impl IncrementalReader<HourlyLayout, FramedRecordFormat> {
    /// Reader over the collector's hourly layout and stored record format.
    pub fn hourly(retention_slack: Duration) -> Self {
        Self::new(HourlyLayout, FramedRecordFormat, retention_slack)
    }
}

impl<L: BucketLayout, F: RecordReader> IncrementalReader<L, F> {
    pub fn new(layout: L, format: F, retention_slack: Duration) -> Self {
        Self {
            layout,
            format,
            retention_slack: i64::try_from(retention_slack.as_secs()).unwrap_or(i64::MAX),
            offsets: OffsetTable::default(),
        }
    }

    pub fn layout(&self) -> &L {
        &self.layout
    }

    pub fn offsets(&self) -> &OffsetTable {
        &self.offsets
    }

    /// Whether a record stamped `timestamp` is recent enough to emit for a
    /// window starting at `window_start`. Anything older than the retention
    /// slack was already delivered by an earlier window.
    pub fn retains(&self, timestamp: &DateTime<Utc>, window_start: i64) -> bool {
        timestamp.timestamp().saturating_add(self.retention_slack) >= window_start
    }

    /// Scan the bucket at `bucket_start` for every source, in the given order.
    pub fn scan_bucket(
        &mut self,
        dir: &Path,
        bucket_start: i64,
        sources: &[SourceId],
        window_start: i64,
    ) -> Vec<Record> {
        let mut harvest = Vec::new();
        for &source in sources {
            self.scan_source(dir, bucket_start, source, window_start, &mut harvest);
        }
        harvest
    }

    /// Drain whatever `source` has appended to its bucket file since the last
    /// scan, pushing retained records onto `harvest`.
    ///
    /// Missing or unreadable files are skipped without error and retried on
    /// the next scan. The stored offset is updated even when every record was
    /// filtered out.
    pub fn scan_source(
        &mut self,
        dir: &Path,
        bucket_start: i64,
        source: SourceId,
        window_start: i64,
        harvest: &mut Vec<Record>,
    ) -> ScanOutcome {
        let Some(path) = self.layout.bucket_path(dir, bucket_start, source) else {
            debug!(source = %source, bucket_start, "No bucket path for time, skipping");
            return ScanOutcome::Unresolved;
        };

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return ScanOutcome::Missing;
            }
            Err(e) => {
                warn!(source = %source, path = %path.display(), error = %e, "Failed to open bucket file");
                return ScanOutcome::Skipped;
            }
        };

        let start = self.offsets.get(&path);
        let mut input = BufReader::new(file);
        if let Err(e) = input.seek(SeekFrom::Start(start)) {
            warn!(path = %path.display(), offset = start, error = %e, "Error seeking");
            return ScanOutcome::Skipped;
        }
        debug!(path = %path.display(), offset = start, "Seeked to stored offset");

        let mut offset = start;
        let mut looked = 0;
        let mut harvested = 0;
        loop {
            match self.format.read_record(&mut input, &mut offset) {
                Ok(Some(stored)) => {
                    looked += 1;
                    if self.retains(&stored.timestamp, window_start) {
                        harvest.push(Record {
                            source,
                            timestamp: stored.timestamp,
                            payload: stored.payload,
                        });
                        harvested += 1;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(path = %path.display(), offset, error = %e, "Unreadable record, stopping at last good offset");
                    break;
                }
            }
        }
        debug!(source = %source, harvested, looked, "Harvested records");

        self.offsets.advance(path, offset);
        ScanOutcome::Drained { looked, harvested }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::record::{StoredRecord, RECORD_HEADER_LEN};
    use std::fs::{self, OpenOptions};
    use tempfile::TempDir;

    const SOURCE: SourceId = SourceId(0xa);

    fn append(dir: &Path, bucket: i64, source: SourceId, records: &[(i64, &str)]) -> PathBuf {
        let path = HourlyLayout.bucket_path(dir, bucket, source).unwrap();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .unwrap();
        for (seconds, payload) in records {
            let record = StoredRecord {
                timestamp: DateTime::from_timestamp(*seconds, 0).unwrap(),
                payload: payload.as_bytes().to_vec(),
            };
            FramedRecordFormat.append(&mut file, &record).unwrap();
        }
        path
    }

    fn reader() -> IncrementalReader {
        IncrementalReader::hourly(Duration::from_secs(5))
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut reader = reader();
        let mut harvest = Vec::new();

        let outcome = reader.scan_source(dir.path(), 0, SOURCE, 0, &mut harvest);

        assert_eq!(outcome, ScanOutcome::Missing);
        assert!(harvest.is_empty());
        assert!(reader.offsets().is_empty());
    }

    #[test]
    fn test_rescan_reads_only_new_records() {
        let dir = TempDir::new().unwrap();
        let path = append(dir.path(), 0, SOURCE, &[(100, "a"), (101, "b")]);
        let mut reader = reader();

        let first = reader.scan_bucket(dir.path(), 0, &[SOURCE], 0);
        assert_eq!(first.len(), 2);
        let after_first = reader.offsets().get(&path);
        assert_eq!(after_first, fs::metadata(&path).unwrap().len());

        // Nothing new
        assert!(reader.scan_bucket(dir.path(), 0, &[SOURCE], 0).is_empty());
        assert_eq!(reader.offsets().get(&path), after_first);

        append(dir.path(), 0, SOURCE, &[(102, "c")]);
        let second = reader.scan_bucket(dir.path(), 0, &[SOURCE], 0);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].payload, b"c");
        assert_eq!(second[0].source, SOURCE);
        assert!(reader.offsets().get(&path) > after_first);
    }

    #[test]
    fn test_retention_filter_still_advances_offset() {
        let dir = TempDir::new().unwrap();
        let path = append(
            dir.path(),
            3600,
            SOURCE,
            &[(3590, "old"), (3594, "edge-1"), (3595, "edge"), (3700, "new")],
        );
        let mut reader = reader();
        let mut harvest = Vec::new();

        let outcome = reader.scan_source(dir.path(), 3600, SOURCE, 3600, &mut harvest);

        assert_eq!(outcome, ScanOutcome::Drained { looked: 4, harvested: 2 });
        let payloads: Vec<_> = harvest.iter().map(|r| r.payload.as_slice()).collect();
        assert_eq!(payloads, vec![&b"edge"[..], &b"new"[..]]);
        assert_eq!(reader.offsets().get(&path), fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn test_truncated_tail_is_reread_next_scan() {
        let dir = TempDir::new().unwrap();
        let path = append(dir.path(), 0, SOURCE, &[(100, "whole")]);
        let complete_len = fs::metadata(&path).unwrap().len();

        // Half of a second record, as if the collector were mid-write
        let mut partial = Vec::new();
        FramedRecordFormat
            .append(
                &mut partial,
                &StoredRecord {
                    timestamp: DateTime::from_timestamp(101, 0).unwrap(),
                    payload: b"late".to_vec(),
                },
            )
            .unwrap();
        let (head, tail) = partial.split_at(10);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        std::io::Write::write_all(&mut file, head).unwrap();

        let mut reader = reader();
        let first = reader.scan_bucket(dir.path(), 0, &[SOURCE], 0);
        assert_eq!(first.len(), 1);
        assert_eq!(reader.offsets().get(&path), complete_len);

        std::io::Write::write_all(&mut file, tail).unwrap();
        let second = reader.scan_bucket(dir.path(), 0, &[SOURCE], 0);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].payload, b"late");
        assert_eq!(
            reader.offsets().get(&path),
            complete_len + RECORD_HEADER_LEN + 4
        );
    }

    #[test]
    fn test_corrupt_record_keeps_earlier_records() {
        let dir = TempDir::new().unwrap();
        let path = append(dir.path(), 0, SOURCE, &[(100, "good")]);
        let good_len = fs::metadata(&path).unwrap().len();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        std::io::Write::write_all(&mut file, b"garbage that is not a record").unwrap();

        let mut reader = reader();
        let mut harvest = Vec::new();
        let outcome = reader.scan_source(dir.path(), 0, SOURCE, 0, &mut harvest);

        assert_eq!(outcome, ScanOutcome::Drained { looked: 1, harvested: 1 });
        assert_eq!(reader.offsets().get(&path), good_len);
    }

    #[test]
    fn test_each_bucket_path_has_its_own_offset() {
        let dir = TempDir::new().unwrap();
        let first = append(dir.path(), 0, SOURCE, &[(10, "a")]);
        let second = append(dir.path(), 3600, SOURCE, &[(3610, "b"), (3620, "c")]);
        let mut reader = reader();

        assert_eq!(reader.scan_bucket(dir.path(), 0, &[SOURCE], 0).len(), 1);
        assert_eq!(reader.scan_bucket(dir.path(), 3600, &[SOURCE], 3600).len(), 2);

        assert_eq!(reader.offsets().len(), 2);
        assert_eq!(reader.offsets().get(&first), fs::metadata(&first).unwrap().len());
        assert_eq!(reader.offsets().get(&second), fs::metadata(&second).unwrap().len());
        for (path, offset) in reader.offsets().iter() {
            assert_eq!(offset, fs::metadata(path).unwrap().len());
        }
    }

    #[test]
    fn test_open_failure_is_skipped_and_retried() {
        let dir = TempDir::new().unwrap();
        // A plain file where the source directory should be: opening the
        // bucket path under it fails with something other than NotFound
        let blocker = dir.path().join(SOURCE.to_string());
        fs::write(&blocker, b"not a directory").unwrap();
        let mut reader = reader();
        let mut harvest = Vec::new();

        let outcome = reader.scan_source(dir.path(), 0, SOURCE, 0, &mut harvest);

        assert_eq!(outcome, ScanOutcome::Skipped);
        assert!(harvest.is_empty());
        assert!(reader.offsets().is_empty());

        fs::remove_file(&blocker).unwrap();
        let path = append(dir.path(), 0, SOURCE, &[(100, "a"), (101, "b")]);

        let outcome = reader.scan_source(dir.path(), 0, SOURCE, 0, &mut harvest);

        assert_eq!(outcome, ScanOutcome::Drained { looked: 2, harvested: 2 });
        assert_eq!(harvest.len(), 2);
        assert_eq!(reader.offsets().get(&path), fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn test_harvest_follows_source_order() {
        let dir = TempDir::new().unwrap();
        append(dir.path(), 0, SourceId(1), &[(50, "one")]);
        append(dir.path(), 0, SourceId(2), &[(20, "two")]);
        let mut reader = reader();

        let harvest = reader.scan_bucket(dir.path(), 0, &[SourceId(1), SourceId(2), SourceId(3)], 0);

        let sources: Vec<_> = harvest.iter().map(|r| r.source).collect();
        assert_eq!(sources, vec![SourceId(1), SourceId(2)]);
    }
}
