//! Codec backend traits.
//!
//! A backend transforms bytes incrementally: callers hand it bounded input
//! and output chunks and it reports how much of each it used. A backend
//! never requires the full payload to be resident at once, and never writes
//! past the output slice it is given.

use crate::error::Result;
use crate::stream::Flush;
use crate::types::CompressionLevel;

/// Incremental compression.
pub trait StreamCompress {
    /// Get the configured compression level.
    fn level(&self) -> CompressionLevel;

    /// Compress a chunk of data.
    ///
    /// Consumes bytes from `input`, writes compressed bytes to `output`, and
    /// returns `(consumed, produced)`. Either count may be zero when the
    /// opposite buffer is the bottleneck; callers drain `output` and call
    /// again.
    ///
    /// `Flush::Sync` and `Flush::Finish` are only meaningful once all input
    /// has been consumed; callers pass an empty `input` when flushing.
    /// After `Flush::Finish`, keep calling with an empty input until
    /// [`is_finished`](StreamCompress::is_finished) reports true.
    fn compress(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<(usize, usize)>;

    /// Whether the stream has been finished and fully drained.
    fn is_finished(&self) -> bool;

    /// Reset state for a new stream.
    fn reset(&mut self);
}

/// Incremental decompression.
pub trait StreamDecompress {
    /// Decompress a chunk of data.
    ///
    /// Consumes bytes from `input`, writes decompressed bytes to `output`,
    /// and returns `(consumed, produced)`. `(0, 0)` with a non-empty output
    /// buffer means more input is needed. Bytes past the end of the
    /// compressed stream are never consumed, so enveloping formats can read
    /// their trailers from the same source.
    ///
    /// Malformed input fails the moment the inconsistency is observed.
    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize)>;

    /// Whether the final block has been fully decoded.
    fn is_finished(&self) -> bool;

    /// Reset state for a new stream.
    fn reset(&mut self);
}
