pub mod frame;

pub use frame::{FrameError, FrameWriter, DEFAULT_FRAME_TAG, MAX_PAYLOAD_LEN};
