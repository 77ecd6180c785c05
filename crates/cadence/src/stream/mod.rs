//! # Stream Proxy
//!
//! Re-streams resolved media to clients. Bytes are pulled from upstream only
//! as fast as the consumer reads them, in chunks of bounded size.

mod chunked;
pub mod disposition;
mod proxy;

pub use chunked::ChunkedStream;
pub use proxy::{ByteStream, StreamHead, StreamProxy};
