//! Low-level HTTP/1.x messages with byte-exact framing
//!
//! - [`header`]: ordered, case-insensitive, multi-value header table
//! - [`body`]: body framing and lazily read bodies
//! - [`codec`]: chunked transfer coding
//! - [`message`]: requests and responses
//! - [`parser`]: reading messages from streams
//! - [`client`]: keep-alive connection reuse and a blocking client
pub mod body;
pub mod client;
pub mod codec;
pub mod error;
pub mod header;
pub mod io;
pub mod message;
pub mod parser;

mod parse;
mod util;

#[cfg(feature = "bin")]
#[doc(hidden)]
pub mod app;
