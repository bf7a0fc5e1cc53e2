//! Protocol layer: frame grammar, buffering, normalization, classification.

pub mod classify;
pub mod frame;
pub mod frame_buffer;
pub mod headers;

pub use classify::{classify, Classified};
pub use frame::Frame;
pub use frame_buffer::{FrameBuffer, DEFAULT_MAX_FRAME_SIZE};
pub use headers::{canonical_key, decode_value, normalize};
