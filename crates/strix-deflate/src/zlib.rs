//! zlib-style codec backend bridged through `flate2`.
//!
//! Raw DEFLATE framing (no zlib header); envelopes are layered above the
//! backend. Behaviorally interchangeable with the self-contained
//! [`RustCompressor`](crate::RustCompressor)/[`RustDecompressor`](crate::RustDecompressor)
//! pair.

use strix_core::{CompressionLevel, Error, Flush, Result, StreamCompress, StreamDecompress};

use flate2::{Compression, FlushCompress, FlushDecompress, Status};

fn map_flush(flush: Flush) -> FlushCompress {
    match flush {
        Flush::None => FlushCompress::None,
        Flush::Sync => FlushCompress::Sync,
        Flush::Finish => FlushCompress::Finish,
    }
}

/// Incremental compressor bridged to `flate2::Compress`.
pub struct ZlibCompressor {
    raw: flate2::Compress,
    level: CompressionLevel,
    finished: bool,
}

impl ZlibCompressor {
    pub fn new(level: CompressionLevel) -> Self {
        Self {
            raw: flate2::Compress::new(Compression::new(level.to_level()), false),
            level,
            finished: false,
        }
    }
}

impl StreamCompress for ZlibCompressor {
    fn level(&self) -> CompressionLevel {
        self.level
    }

    fn compress(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<(usize, usize)> {
        if self.finished {
            return Ok((0, 0));
        }

        let in_before = self.raw.total_in();
        let out_before = self.raw.total_out();

        let status = self
            .raw
            .compress(input, output, map_flush(flush))
            .map_err(|e| Error::corrupted(e.to_string()))?;

        if status == Status::StreamEnd {
            self.finished = true;
        }

        Ok((
            (self.raw.total_in() - in_before) as usize,
            (self.raw.total_out() - out_before) as usize,
        ))
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn reset(&mut self) {
        self.raw.reset();
        self.finished = false;
    }
}

/// Incremental decompressor bridged to `flate2::Decompress`.
pub struct ZlibDecompressor {
    raw: flate2::Decompress,
    finished: bool,
}

impl ZlibDecompressor {
    pub fn new() -> Self {
        Self {
            raw: flate2::Decompress::new(false),
            finished: false,
        }
    }
}

impl Default for ZlibDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecompress for ZlibDecompressor {
    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize)> {
        if self.finished {
            return Ok((0, 0));
        }

        let in_before = self.raw.total_in();
        let out_before = self.raw.total_out();

        let status = self
            .raw
            .decompress(input, output, FlushDecompress::None)
            .map_err(|e| Error::corrupted(e.to_string()))?;

        if status == Status::StreamEnd {
            self.finished = true;
        }

        Ok((
            (self.raw.total_in() - in_before) as usize,
            (self.raw.total_out() - out_before) as usize,
        ))
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn reset(&mut self) {
        self.raw.reset(false);
        self.finished = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compress_all(codec: &mut dyn StreamCompress, input: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 1024];
        let mut pos = 0;
        loop {
            let flush = if pos == input.len() {
                Flush::Finish
            } else {
                Flush::None
            };
            let (consumed, produced) = codec.compress(&input[pos..], &mut chunk, flush).unwrap();
            pos += consumed;
            out.extend_from_slice(&chunk[..produced]);
            if codec.is_finished() {
                return out;
            }
        }
    }

    fn decompress_all(codec: &mut dyn StreamDecompress, input: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 1024];
        let mut pos = 0;
        while !codec.is_finished() {
            let (consumed, produced) = codec.decompress(&input[pos..], &mut chunk).unwrap();
            pos += consumed;
            out.extend_from_slice(&chunk[..produced]);
            if consumed == 0 && produced == 0 && pos == input.len() {
                panic!("decoder stalled before end of stream");
            }
        }
        out
    }

    #[test]
    fn test_zlib_roundtrip() {
        let pattern = b"zlib backend roundtrip content. ";
        let input: Vec<u8> = pattern.iter().cycle().take(50_000).copied().collect();

        for level in [
            CompressionLevel::NoCompression,
            CompressionLevel::Fastest,
            CompressionLevel::Optimal,
        ] {
            let mut compressor = ZlibCompressor::new(level);
            let compressed = compress_all(&mut compressor, &input);

            let mut decompressor = ZlibDecompressor::new();
            let output = decompress_all(&mut decompressor, &compressed);
            assert_eq!(output, input);
        }
    }

    #[test]
    fn test_backends_are_interchangeable() {
        let pattern = b"cross-backend interchange. ";
        let input: Vec<u8> = pattern.iter().cycle().take(30_000).copied().collect();

        // Rust-compressed, zlib-decompressed.
        let compressed = crate::deflate(&input, CompressionLevel::Optimal).unwrap();
        let mut decompressor = ZlibDecompressor::new();
        assert_eq!(decompress_all(&mut decompressor, &compressed), input);

        // zlib-compressed, Rust-decompressed.
        let mut compressor = ZlibCompressor::new(CompressionLevel::Optimal);
        let compressed = compress_all(&mut compressor, &input);
        let mut output = Vec::new();
        crate::inflate(&compressed, &mut output).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_zlib_decompress_leaves_trailing_bytes() {
        let mut compressor = ZlibCompressor::new(CompressionLevel::Fastest);
        let mut compressed = compress_all(&mut compressor, b"payload");
        let deflate_len = compressed.len();
        compressed.extend_from_slice(&[1, 2, 3, 4]);

        let mut decompressor = ZlibDecompressor::new();
        let mut out = [0u8; 64];
        let mut pos = 0;
        while !decompressor.is_finished() {
            let (consumed, _) = decompressor.decompress(&compressed[pos..], &mut out).unwrap();
            pos += consumed;
        }
        assert_eq!(pos, deflate_len);
    }

    #[test]
    fn test_zlib_rejects_garbage() {
        let mut decompressor = ZlibDecompressor::new();
        let mut out = [0u8; 64];
        let garbage = b"not compressed data, definitely plain text all the way through";
        let mut pos = 0;
        let result = loop {
            match decompressor.decompress(&garbage[pos..], &mut out) {
                Ok((consumed, _)) => {
                    pos += consumed;
                    if decompressor.is_finished() || pos >= garbage.len() {
                        break Ok(());
                    }
                }
                Err(e) => break Err(e),
            }
        };
        assert!(result.is_err() || !decompressor.is_finished());
    }
}
