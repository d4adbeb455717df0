//! DEFLATE compression (RFC 1951).
//!
//! [`RustCompressor`] is an incremental encoder. Input accumulates into
//! 32 KiB blocks; each full block is emitted as one DEFLATE block
//! (stored, or fixed-Huffman with LZ77 matches found inside the block), so
//! memory stays bounded no matter how large the payload is. Blocks are
//! bit-contiguous: completed bytes drain to the caller while the partial
//! byte carries over.

use strix_core::{CompressionLevel, Flush, Result, StreamCompress};

use crate::huffman::{
    BitSink, HuffmanEncoder, DISTANCE_BASE, DISTANCE_EXTRA_BITS, FIXED_DIST_LENGTHS,
    FIXED_LIT_LENGTHS, LENGTH_BASE, LENGTH_EXTRA_BITS,
};

/// Minimum match length.
const MIN_MATCH: usize = 3;

/// Maximum match length.
const MAX_MATCH: usize = 258;

/// Input block size. Matches are found within one block, so this also
/// bounds the back-reference distance.
const BLOCK_SIZE: usize = 32 * 1024;

/// Hash table size (power of 2).
const HASH_SIZE: usize = 32768;

/// Chain search depth for the optimal level.
const MAX_CHAIN: usize = 128;

/// Empty slot marker in the hash table and chains.
const EMPTY: u32 = u32::MAX;

/// Self-contained incremental DEFLATE encoder.
pub struct RustCompressor {
    level: CompressionLevel,
    block: Vec<u8>,
    bits: BitSink,
    lit_encoder: HuffmanEncoder,
    dist_encoder: HuffmanEncoder,
    finished: bool,
}

impl RustCompressor {
    pub fn new(level: CompressionLevel) -> Self {
        Self {
            level,
            block: Vec::with_capacity(BLOCK_SIZE),
            bits: BitSink::new(),
            lit_encoder: HuffmanEncoder::from_lengths(&FIXED_LIT_LENGTHS),
            dist_encoder: HuffmanEncoder::from_lengths(&FIXED_DIST_LENGTHS),
            finished: false,
        }
    }

    /// Encode whatever input is pending. Always emits a block when `last`
    /// is set, so even an empty stream gets its final (empty stored) block.
    fn encode_pending(&mut self, last: bool) {
        if self.block.is_empty() {
            if last {
                self.empty_stored(true);
            }
            return;
        }
        match self.level {
            CompressionLevel::NoCompression => self.encode_stored(last),
            CompressionLevel::Fastest => self.encode_fixed(last, false),
            CompressionLevel::Optimal => self.encode_fixed(last, true),
        }
        self.block.clear();
    }

    /// Emit a zero-length stored block. With `last` unset this is the
    /// classic sync-flush marker: it byte-aligns the stream and leaves it
    /// continuable.
    fn empty_stored(&mut self, last: bool) {
        self.bits.push_bits(last as u32, 1);
        self.bits.push_bits(0, 2);
        self.bits.align();
        self.bits.push_bytes(&[0x00, 0x00, 0xFF, 0xFF]);
    }

    fn encode_stored(&mut self, last: bool) {
        self.bits.push_bits(last as u32, 1);
        self.bits.push_bits(0, 2);
        self.bits.align();
        let len = self.block.len() as u16;
        self.bits.push_bytes(&len.to_le_bytes());
        self.bits.push_bytes(&(!len).to_le_bytes());
        self.bits.push_bytes(&self.block);
    }

    fn encode_fixed(&mut self, last: bool, chained: bool) {
        self.bits.push_bits(last as u32, 1);
        self.bits.push_bits(1, 2); // BTYPE = 01 (fixed)

        let n = self.block.len();
        let mut head = vec![EMPTY; HASH_SIZE];
        let mut chain = vec![EMPTY; n];

        let mut pos = 0;
        while pos < n {
            let mut best_len = 0;
            let mut best_dist = 0;

            if pos + MIN_MATCH <= n {
                let max_len = (n - pos).min(MAX_MATCH);
                let hash = hash3(&self.block, pos);

                let mut candidate = head[hash];
                let mut depth = 0;
                while candidate != EMPTY && depth < MAX_CHAIN {
                    let cpos = candidate as usize;
                    let len = match_len(&self.block, cpos, pos, max_len);
                    if len > best_len {
                        best_len = len;
                        best_dist = pos - cpos;
                        if len == max_len {
                            break;
                        }
                    }
                    if !chained {
                        break;
                    }
                    candidate = chain[cpos];
                    depth += 1;
                }

                chain[pos] = head[hash];
                head[hash] = pos as u32;
            }

            if best_len >= MIN_MATCH {
                // Lazy matching: a better match starting one byte later is
                // worth a literal now.
                if chained && best_len < MAX_MATCH && pos + 1 + MIN_MATCH <= n {
                    let max_len = (n - pos - 1).min(MAX_MATCH);
                    let hash = hash3(&self.block, pos + 1);
                    let mut candidate = head[hash];
                    let mut depth = 0;
                    let mut next_len = 0;
                    while candidate != EMPTY && depth < MAX_CHAIN {
                        let cpos = candidate as usize;
                        let len = match_len(&self.block, cpos, pos + 1, max_len);
                        if len > next_len {
                            next_len = len;
                            if len == max_len {
                                break;
                            }
                        }
                        candidate = chain[cpos];
                        depth += 1;
                    }
                    if next_len > best_len + 1 {
                        let byte = self.block[pos];
                        self.emit_literal(byte);
                        pos += 1;
                        continue;
                    }
                }

                self.emit_match(best_len, best_dist);

                for i in 1..best_len {
                    let p = pos + i;
                    if p + MIN_MATCH <= n {
                        let hash = hash3(&self.block, p);
                        chain[p] = head[hash];
                        head[hash] = p as u32;
                    }
                }
                pos += best_len;
            } else {
                let byte = self.block[pos];
                self.emit_literal(byte);
                pos += 1;
            }
        }

        // End of block.
        let (code, len) = self.lit_encoder.get(256);
        self.bits.push_code(code, len);
    }

    #[inline]
    fn emit_literal(&mut self, byte: u8) {
        let (code, len) = self.lit_encoder.get(byte as usize);
        self.bits.push_code(code, len);
    }

    fn emit_match(&mut self, length: usize, distance: usize) {
        let len_code = length_code(length);
        let (code, clen) = self.lit_encoder.get(257 + len_code);
        self.bits.push_code(code, clen);

        let extra = LENGTH_EXTRA_BITS[len_code];
        if extra > 0 {
            let value = length - LENGTH_BASE[len_code] as usize;
            self.bits.push_bits(value as u32, extra as u32);
        }

        let dist_code = distance_code(distance);
        let (code, clen) = self.dist_encoder.get(dist_code);
        self.bits.push_code(code, clen);

        let extra = DISTANCE_EXTRA_BITS[dist_code];
        if extra > 0 {
            let value = distance - DISTANCE_BASE[dist_code] as usize;
            self.bits.push_bits(value as u32, extra as u32);
        }
    }
}

impl StreamCompress for RustCompressor {
    fn level(&self) -> CompressionLevel {
        self.level
    }

    fn compress(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<(usize, usize)> {
        let mut produced = self.bits.drain(output);
        if self.finished {
            return Ok((0, produced));
        }

        let mut consumed = 0;
        // Absorb input block by block; stop absorbing while compressed
        // bytes are backed up so memory stays bounded.
        while consumed < input.len() && self.bits.pending() == 0 {
            let space = BLOCK_SIZE - self.block.len();
            let take = space.min(input.len() - consumed);
            self.block.extend_from_slice(&input[consumed..consumed + take]);
            consumed += take;

            if self.block.len() == BLOCK_SIZE {
                self.encode_pending(false);
                produced += self.bits.drain(&mut output[produced..]);
            }
        }

        // Flush modes apply once all input has been handed over; callers
        // flush with an empty input slice.
        if consumed == input.len() {
            match flush {
                Flush::None => {}
                Flush::Sync => {
                    self.encode_pending(false);
                    self.empty_stored(false);
                    produced += self.bits.drain(&mut output[produced..]);
                }
                Flush::Finish => {
                    self.encode_pending(true);
                    self.bits.finish();
                    self.finished = true;
                    produced += self.bits.drain(&mut output[produced..]);
                }
            }
        }

        Ok((consumed, produced))
    }

    fn is_finished(&self) -> bool {
        self.finished && self.bits.pending() == 0
    }

    fn reset(&mut self) {
        self.block.clear();
        self.bits.clear();
        self.finished = false;
    }
}

/// Find the length code index (0-28) for a match length.
fn length_code(length: usize) -> usize {
    for (i, &base) in LENGTH_BASE.iter().enumerate().rev() {
        if length >= base as usize {
            return i;
        }
    }
    0
}

/// Find the distance code (0-29) for a match distance.
fn distance_code(distance: usize) -> usize {
    for (i, &base) in DISTANCE_BASE.iter().enumerate().rev() {
        if distance >= base as usize {
            return i;
        }
    }
    0
}

/// Hash of 3 bytes at `pos`.
#[inline]
fn hash3(data: &[u8], pos: usize) -> usize {
    let b0 = data[pos] as usize;
    let b1 = data[pos + 1] as usize;
    let b2 = data[pos + 2] as usize;
    ((b0 << 10) ^ (b1 << 5) ^ b2) & (HASH_SIZE - 1)
}

/// Length of the common prefix of `block[a..]` and `block[b..]`, capped.
#[inline]
fn match_len(block: &[u8], a: usize, b: usize, max: usize) -> usize {
    let mut len = 0;
    while len < max && block[a + len] == block[b + len] {
        len += 1;
    }
    len
}

/// Compress a complete buffer in one call.
pub fn deflate(input: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
    let mut encoder = RustCompressor::new(level);
    let mut out = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut pos = 0;

    loop {
        let flush = if pos == input.len() {
            Flush::Finish
        } else {
            Flush::None
        };
        let (consumed, produced) = encoder.compress(&input[pos..], &mut chunk, flush)?;
        pos += consumed;
        out.extend_from_slice(&chunk[..produced]);

        if encoder.is_finished() {
            return Ok(out);
        }
    }
}
