use byteorder::{BigEndian, WriteBytesExt};
use std::io::{self, Write};
use thiserror::Error;

/// Tag that opens every payload frame unless configured otherwise.
pub const DEFAULT_FRAME_TAG: [u8; 4] = *b"bert";

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("payload of {len} bytes exceeds the {max} byte frame limit")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("output closed after {frames} frames")]
    SinkClosed { frames: u64 },

    #[error("failed writing frame: {0}")]
    Io(#[from] io::Error),
}

/// Writes records as `TAG | LEN u16 BE | PAYLOAD` frames.
///
/// A frame either reaches the sink whole or the call fails; after a failure
/// the writer must not be used again.
pub struct FrameWriter<W: Write> {
    sink: W,
    tag: [u8; 4],
    buf: Vec<u8>,
    frames: u64,
    bytes: u64,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(sink: W) -> Self {
        Self::with_tag(sink, DEFAULT_FRAME_TAG)
    }

    pub fn with_tag(sink: W, tag: [u8; 4]) -> Self {
        Self {
            sink,
            tag,
            buf: Vec::new(),
            frames: 0,
            bytes: 0,
        }
    }

    /// Write one payload frame and flush it to the sink.
    pub fn write_frame(&mut self, payload: &[u8]) -> Result<(), FrameError> {
        let len = u16::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        })?;

        self.buf.clear();
        self.buf.extend_from_slice(&self.tag);
        self.buf.write_u16::<BigEndian>(len)?;
        self.buf.extend_from_slice(payload);

        // write_all retries short writes and EINTR; a zero-length write means
        // the consumer went away.
        self.sink
            .write_all(&self.buf)
            .and_then(|()| self.sink.flush())
            .map_err(|e| match e.kind() {
                io::ErrorKind::WriteZero => FrameError::SinkClosed {
                    frames: self.frames,
                },
                _ => FrameError::Io(e),
            })?;

        self.frames += 1;
        self.bytes += self.buf.len() as u64;
        Ok(())
    }

    /// Frames written so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Bytes written so far, headers included.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}
