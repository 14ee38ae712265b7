use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Utc};
use std::io::{self, Read, Write};
use thiserror::Error;

/// Tag at the start of every stored record.
pub const RECORD_MAGIC: [u8; 4] = *b"bert";

/// Magic(4) + PayloadLen(2) + Seconds(8) + Nanos(4)
pub const RECORD_HEADER_LEN: u64 = 18;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("bad record magic {found:02x?} at offset {offset}")]
    BadMagic { offset: u64, found: [u8; 4] },

    #[error("invalid timestamp {seconds}.{nanos:09} at offset {offset}")]
    BadTimestamp { offset: u64, seconds: i64, nanos: u32 },

    #[error("payload of {0} bytes does not fit a stored record")]
    PayloadTooLarge(usize),
}

/// One record as it sits in a bucket file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub timestamp: DateTime<Utc>,
    pub payload: Vec<u8>,
}

/// Reads stored records one at a time from a bucket file.
pub trait RecordReader {
    /// Read the record starting at `*offset`.
    ///
    /// `input` must be positioned at `*offset`. On success the offset is moved
    /// past the record. `Ok(None)` means no complete record is available yet
    /// (end of file, or a record still being appended) and leaves the offset
    /// where it was.
    fn read_record(
        &self,
        input: &mut dyn Read,
        offset: &mut u64,
    ) -> Result<Option<StoredRecord>, RecordError>;
}

/// Length-prefixed on-disk format written by the collector:
/// `MAGIC | LEN u16 | SECONDS i64 | NANOS u32 | PAYLOAD`, big-endian.
#[derive(Debug, Clone, Copy, Default)]
pub struct FramedRecordFormat;

impl FramedRecordFormat {
    /// Append one record in the stored format.
    pub fn append(&self, out: &mut dyn Write, record: &StoredRecord) -> Result<(), RecordError> {
        let len = u16::try_from(record.payload.len())
            .map_err(|_| RecordError::PayloadTooLarge(record.payload.len()))?;

        let mut buf = Vec::with_capacity(RECORD_HEADER_LEN as usize + record.payload.len());
        buf.extend_from_slice(&RECORD_MAGIC);
        buf.write_u16::<BigEndian>(len)?;
        buf.write_i64::<BigEndian>(record.timestamp.timestamp())?;
        buf.write_u32::<BigEndian>(record.timestamp.timestamp_subsec_nanos())?;
        buf.extend_from_slice(&record.payload);
        out.write_all(&buf)?;
        Ok(())
    }
}

impl RecordReader for FramedRecordFormat {
    fn read_record(
        &self,
        input: &mut dyn Read,
        offset: &mut u64,
    ) -> Result<Option<StoredRecord>, RecordError> {
        let mut header = [0u8; RECORD_HEADER_LEN as usize];
        if !fill(input, &mut header)? {
            return Ok(None);
        }

        let mut cursor = &header[..];
        let mut magic = [0u8; 4];
        cursor.read_exact(&mut magic)?;
        if magic != RECORD_MAGIC {
            return Err(RecordError::BadMagic {
                offset: *offset,
                found: magic,
            });
        }
        let len = cursor.read_u16::<BigEndian>()?;
        let seconds = cursor.read_i64::<BigEndian>()?;
        let nanos = cursor.read_u32::<BigEndian>()?;

        let timestamp = if nanos < 1_000_000_000 {
            DateTime::<Utc>::from_timestamp(seconds, nanos)
        } else {
            None
        };
        let Some(timestamp) = timestamp else {
            return Err(RecordError::BadTimestamp {
                offset: *offset,
                seconds,
                nanos,
            });
        };

        let mut payload = vec![0u8; len as usize];
        if !fill(input, &mut payload)? {
            return Ok(None);
        }

        *offset += RECORD_HEADER_LEN + u64::from(len);
        Ok(Some(StoredRecord { timestamp, payload }))
    }
}

/// Fill `buf` completely. Returns `false` if the input ran out first.
fn fill(input: &mut dyn Read, buf: &mut [u8]) -> io::Result<bool> {
    match input.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}
