//! Pointwise band transforms
//!
//! Transforms that need no statistics across pixels run as a stream of
//! rows, holding one scanline per band in memory.

mod streaming;

pub use streaming::{identity, offset, stream_transform};
