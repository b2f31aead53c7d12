//! Transfer codings
//!
//! Codecs here are pull-based: they wrap a [`std::io::Read`] and are read
//! like any other stream.
pub mod chunked;

pub use chunked::{ChunkedDecoder, ChunkedEncoder};
