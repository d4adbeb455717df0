//! DEFLATE decompression (RFC 1951).
//!
//! [`RustDecompressor`] is an incremental decoder: it accepts compressed
//! bytes in chunks of any size, writes decompressed bytes into bounded
//! output slices, and suspends mid-block (even mid-symbol) whenever either
//! side runs dry. Back-references resolve against a 32 KiB window of
//! recent output, so the full payload is never resident.

use strix_core::{Error, Result, StreamDecompress};

use crate::huffman::{
    BitSource, HuffmanDecoder, CL_CODE_ORDER, DISTANCE_BASE, DISTANCE_EXTRA_BITS,
    FIXED_DIST_LENGTHS, FIXED_LIT_LENGTHS, LENGTH_BASE, LENGTH_EXTRA_BITS, MAX_DIST_CODES,
    MAX_LIT_CODES,
};

/// Back-reference window size.
const WINDOW_SIZE: usize = 32 * 1024;
const WINDOW_MASK: usize = WINDOW_SIZE - 1;

/// Where decoding resumes when input or output space reappears.
///
/// Every bit-consuming step has its own state so a chunk boundary can fall
/// anywhere in the stream without losing or re-reading bits.
#[derive(Debug, Clone, Copy)]
enum State {
    BlockHeader,
    StoredHeader,
    StoredBody { remaining: u16 },
    DynHeader,
    DynClLens { index: usize },
    DynSymLens,
    DynRepeat { symbol: u16 },
    Block,
    LenExtra { code: u8 },
    DistSym { length: u16 },
    DistExtra { length: u16, code: u8 },
    Copy { length: u16, distance: u16 },
    Done,
}

/// Self-contained incremental DEFLATE decoder.
pub struct RustDecompressor {
    bits: BitSource,
    state: State,
    last_block: bool,
    window: Vec<u8>,
    win_pos: usize,
    total_out: u64,
    lit_decoder: Option<HuffmanDecoder>,
    dist_decoder: Option<HuffmanDecoder>,
    // Dynamic header scratch.
    hlit: usize,
    hdist: usize,
    hclen: usize,
    cl_lengths: [u8; 19],
    cl_decoder: Option<HuffmanDecoder>,
    sym_lengths: Vec<u8>,
}

impl RustDecompressor {
    pub fn new() -> Self {
        Self {
            bits: BitSource::new(),
            state: State::BlockHeader,
            last_block: false,
            window: vec![0u8; WINDOW_SIZE],
            win_pos: 0,
            total_out: 0,
            lit_decoder: None,
            dist_decoder: None,
            hlit: 0,
            hdist: 0,
            hclen: 0,
            cl_lengths: [0; 19],
            cl_decoder: None,
            sym_lengths: Vec::new(),
        }
    }

    #[inline]
    fn emit(&mut self, byte: u8, output: &mut [u8], out_pos: &mut usize) {
        output[*out_pos] = byte;
        *out_pos += 1;
        self.window[self.win_pos] = byte;
        self.win_pos = (self.win_pos + 1) & WINDOW_MASK;
        self.total_out += 1;
    }

    fn end_of_block(&self) -> State {
        if self.last_block {
            State::Done
        } else {
            State::BlockHeader
        }
    }

    fn build_dynamic_decoders(&mut self) -> Result<()> {
        self.lit_decoder = Some(HuffmanDecoder::from_lengths(&self.sym_lengths[..self.hlit])?);
        self.dist_decoder = Some(HuffmanDecoder::from_lengths(&self.sym_lengths[self.hlit..])?);
        Ok(())
    }

    /// Advance the state machine until input, output, or the stream ends.
    fn run(
        &mut self,
        input: &[u8],
        in_pos: &mut usize,
        output: &mut [u8],
        out_pos: &mut usize,
    ) -> Result<()> {
        loop {
            match self.state {
                State::Done => return Ok(()),

                State::BlockHeader => {
                    self.bits.pull(input, in_pos, 3);
                    if self.bits.count() < 3 {
                        return Ok(());
                    }
                    self.last_block = self.bits.take(1) == 1;
                    match self.bits.take(2) {
                        0 => {
                            self.bits.align();
                            self.state = State::StoredHeader;
                        }
                        1 => {
                            self.lit_decoder =
                                Some(HuffmanDecoder::from_lengths(&FIXED_LIT_LENGTHS)?);
                            self.dist_decoder =
                                Some(HuffmanDecoder::from_lengths(&FIXED_DIST_LENGTHS)?);
                            self.state = State::Block;
                        }
                        2 => self.state = State::DynHeader,
                        _ => return Err(Error::corrupted("invalid block type 3")),
                    }
                }

                State::StoredHeader => {
                    self.bits.pull(input, in_pos, 32);
                    if self.bits.count() < 32 {
                        return Ok(());
                    }
                    let len = self.bits.take(16) as u16;
                    let nlen = self.bits.take(16) as u16;
                    if len != !nlen {
                        return Err(Error::corrupted("stored block length mismatch"));
                    }
                    self.state = if len == 0 {
                        self.end_of_block()
                    } else {
                        State::StoredBody { remaining: len }
                    };
                }

                State::StoredBody { mut remaining } => {
                    while remaining > 0 {
                        if *out_pos == output.len() {
                            self.state = State::StoredBody { remaining };
                            return Ok(());
                        }
                        // Aligned, so buffered bits are whole bytes; past
                        // them, bytes come straight from the input.
                        let byte = if self.bits.count() >= 8 {
                            self.bits.take(8) as u8
                        } else if *in_pos < input.len() {
                            let b = input[*in_pos];
                            *in_pos += 1;
                            b
                        } else {
                            self.state = State::StoredBody { remaining };
                            return Ok(());
                        };
                        self.emit(byte, output, out_pos);
                        remaining -= 1;
                    }
                    self.state = self.end_of_block();
                }

                State::DynHeader => {
                    self.bits.pull(input, in_pos, 14);
                    if self.bits.count() < 14 {
                        return Ok(());
                    }
                    self.hlit = self.bits.take(5) as usize + 257;
                    self.hdist = self.bits.take(5) as usize + 1;
                    self.hclen = self.bits.take(4) as usize + 4;
                    if self.hlit > MAX_LIT_CODES || self.hdist > MAX_DIST_CODES {
                        return Err(Error::corrupted("invalid code count"));
                    }
                    self.cl_lengths = [0; 19];
                    self.state = State::DynClLens { index: 0 };
                }

                State::DynClLens { mut index } => {
                    while index < self.hclen {
                        self.bits.pull(input, in_pos, 3);
                        if self.bits.count() < 3 {
                            self.state = State::DynClLens { index };
                            return Ok(());
                        }
                        self.cl_lengths[CL_CODE_ORDER[index]] = self.bits.take(3) as u8;
                        index += 1;
                    }
                    self.cl_decoder = Some(HuffmanDecoder::from_lengths(&self.cl_lengths)?);
                    self.sym_lengths.clear();
                    self.state = State::DynSymLens;
                }

                State::DynSymLens => {
                    if self.sym_lengths.len() == self.hlit + self.hdist {
                        self.build_dynamic_decoders()?;
                        self.state = State::Block;
                        continue;
                    }
                    let sym = {
                        let Self {
                            ref cl_decoder,
                            ref mut bits,
                            ..
                        } = *self;
                        match cl_decoder {
                            Some(decoder) => decoder.decode(bits, input, in_pos)?,
                            None => {
                                return Err(Error::InvalidState {
                                    expected: "code length tables",
                                    actual: "none",
                                })
                            }
                        }
                    };
                    match sym {
                        None => return Ok(()),
                        Some(s) if s <= 15 => self.sym_lengths.push(s as u8),
                        Some(s) if s <= 18 => self.state = State::DynRepeat { symbol: s },
                        Some(_) => return Err(Error::corrupted("invalid code length symbol")),
                    }
                }

                State::DynRepeat { symbol } => {
                    let (extra, base) = match symbol {
                        16 => (2u32, 3usize),
                        17 => (3, 3),
                        _ => (7, 11),
                    };
                    self.bits.pull(input, in_pos, extra);
                    if self.bits.count() < extra {
                        return Ok(());
                    }
                    let count = self.bits.take(extra) as usize + base;
                    let fill = if symbol == 16 {
                        match self.sym_lengths.last() {
                            Some(&prev) => prev,
                            None => {
                                return Err(Error::corrupted("length repeat at start of table"))
                            }
                        }
                    } else {
                        0
                    };
                    if self.sym_lengths.len() + count > self.hlit + self.hdist {
                        return Err(Error::corrupted("code length repeat overflow"));
                    }
                    for _ in 0..count {
                        self.sym_lengths.push(fill);
                    }
                    self.state = State::DynSymLens;
                }

                State::Block => {
                    if *out_pos == output.len() {
                        return Ok(());
                    }
                    let sym = {
                        let Self {
                            ref lit_decoder,
                            ref mut bits,
                            ..
                        } = *self;
                        match lit_decoder {
                            Some(decoder) => decoder.decode(bits, input, in_pos)?,
                            None => {
                                return Err(Error::InvalidState {
                                    expected: "literal tables",
                                    actual: "none",
                                })
                            }
                        }
                    };
                    match sym {
                        None => return Ok(()),
                        Some(s) if s < 256 => self.emit(s as u8, output, out_pos),
                        Some(256) => self.state = self.end_of_block(),
                        Some(s) if s <= 285 => {
                            self.state = State::LenExtra {
                                code: (s - 257) as u8,
                            }
                        }
                        Some(_) => return Err(Error::corrupted("invalid literal/length code")),
                    }
                }

                State::LenExtra { code } => {
                    let code = code as usize;
                    let extra = LENGTH_EXTRA_BITS[code] as u32;
                    self.bits.pull(input, in_pos, extra);
                    if self.bits.count() < extra {
                        return Ok(());
                    }
                    let length = LENGTH_BASE[code] + self.bits.take(extra) as u16;
                    self.state = State::DistSym { length };
                }

                State::DistSym { length } => {
                    let sym = {
                        let Self {
                            ref dist_decoder,
                            ref mut bits,
                            ..
                        } = *self;
                        match dist_decoder {
                            Some(decoder) => decoder.decode(bits, input, in_pos)?,
                            None => {
                                return Err(Error::InvalidState {
                                    expected: "distance tables",
                                    actual: "none",
                                })
                            }
                        }
                    };
                    match sym {
                        None => return Ok(()),
                        Some(s) if (s as usize) < DISTANCE_BASE.len() => {
                            self.state = State::DistExtra {
                                length,
                                code: s as u8,
                            }
                        }
                        Some(_) => return Err(Error::corrupted("invalid distance code")),
                    }
                }

                State::DistExtra { length, code } => {
                    let code = code as usize;
                    let extra = DISTANCE_EXTRA_BITS[code] as u32;
                    self.bits.pull(input, in_pos, extra);
                    if self.bits.count() < extra {
                        return Ok(());
                    }
                    let distance = DISTANCE_BASE[code] as u32 + self.bits.take(extra);
                    if distance as u64 > self.total_out || distance as usize > WINDOW_SIZE {
                        return Err(Error::corrupted("distance beyond produced output"));
                    }
                    self.state = State::Copy {
                        length,
                        distance: distance as u16,
                    };
                }

                State::Copy {
                    mut length,
                    distance,
                } => {
                    while length > 0 {
                        if *out_pos == output.len() {
                            self.state = State::Copy { length, distance };
                            return Ok(());
                        }
                        let byte = self.window
                            [(self.win_pos + WINDOW_SIZE - distance as usize) & WINDOW_MASK];
                        self.emit(byte, output, out_pos);
                        length -= 1;
                    }
                    self.state = State::Block;
                }
            }
        }
    }
}

impl Default for RustDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecompress for RustDecompressor {
    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize)> {
        let mut in_pos = 0;
        let mut out_pos = 0;
        self.run(input, &mut in_pos, output, &mut out_pos)?;
        // Whole unread bytes go back to the caller; only a sub-byte
        // remainder persists.
        self.bits.give_back(&mut in_pos);
        Ok((in_pos, out_pos))
    }

    fn is_finished(&self) -> bool {
        matches!(self.state, State::Done)
    }

    fn reset(&mut self) {
        self.bits.clear();
        self.state = State::BlockHeader;
        self.last_block = false;
        self.win_pos = 0;
        self.total_out = 0;
        self.lit_decoder = None;
        self.dist_decoder = None;
        self.cl_decoder = None;
        self.sym_lengths.clear();
    }
}

/// Inflate a complete DEFLATE stream in one call.
pub fn inflate(input: &[u8], output: &mut Vec<u8>) -> Result<()> {
    let mut decoder = RustDecompressor::new();
    let mut pos = 0;
    let mut chunk = [0u8; 4096];

    loop {
        let (consumed, produced) = decoder.decompress(&input[pos..], &mut chunk)?;
        pos += consumed;
        output.extend_from_slice(&chunk[..produced]);

        if decoder.is_finished() {
            return Ok(());
        }
        if consumed == 0 && produced == 0 {
            return Err(Error::unexpected_eof(pos));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flate2_deflate(input: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        std::io::Write::write_all(&mut encoder, input).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_inflate_stored() {
        // Stored block: BFINAL=1, BTYPE=00, LEN=5, NLEN=!5, "Hello"
        let data = [
            0b00000001, // BFINAL=1, BTYPE=00
            5, 0, // LEN = 5
            250, 255, // NLEN = !5
            b'H', b'e', b'l', b'l', b'o',
        ];

        let mut output = Vec::new();
        inflate(&data, &mut output).unwrap();
        assert_eq!(&output, b"Hello");
    }

    #[test]
    fn test_inflate_fixed_literal() {
        let compressed = flate2_deflate(b"A");

        let mut output = Vec::new();
        inflate(&compressed, &mut output).unwrap();
        assert_eq!(&output, b"A");
    }

    #[test]
    fn test_inflate_repetitive() {
        let input = b"AAAAAAAAAAAAAAAAAAAA";
        let compressed = flate2_deflate(input);

        let mut output = Vec::new();
        inflate(&compressed, &mut output).unwrap();
        assert_eq!(&output, input);
    }

    #[test]
    fn test_inflate_mixed() {
        let input = b"Hello, World! This is a test of DEFLATE decompression.";
        let compressed = flate2_deflate(input);

        let mut output = Vec::new();
        inflate(&compressed, &mut output).unwrap();
        assert_eq!(&output, input);
    }

    #[test]
    fn test_inflate_dynamic_block() {
        // Large repetitive payload; flate2 uses dynamic Huffman tables.
        let pattern = b"The quick brown fox jumps over the lazy dog. ";
        let input: Vec<u8> = pattern.iter().cycle().take(20000).copied().collect();
        let compressed = flate2_deflate(&input);

        let mut output = Vec::new();
        inflate(&compressed, &mut output).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_inflate_one_byte_at_a_time() {
        let pattern = b"abcabcabcabc-streaming-";
        let input: Vec<u8> = pattern.iter().cycle().take(5000).copied().collect();
        let compressed = flate2_deflate(&input);

        let mut decoder = RustDecompressor::new();
        let mut output = Vec::new();
        let mut chunk = [0u8; 7];
        let mut pos = 0;
        let mut avail = 1;

        while !decoder.is_finished() {
            let end = (pos + avail).min(compressed.len());
            let (consumed, produced) =
                decoder.decompress(&compressed[pos..end], &mut chunk).unwrap();
            pos += consumed;
            output.extend_from_slice(&chunk[..produced]);
            assert!(pos <= compressed.len(), "decoder over-consumed");
            // A symbol can straddle byte boundaries; widen the window until
            // the decoder makes progress, as the stream adapter's refill does.
            if consumed == 0 && produced == 0 {
                avail += 1;
            } else {
                avail = 1;
            }
        }
        assert_eq!(output, input);
    }

    #[test]
    fn test_inflate_leaves_trailing_bytes() {
        let mut compressed = flate2_deflate(b"payload");
        let deflate_len = compressed.len();
        compressed.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

        let mut decoder = RustDecompressor::new();
        let mut out = [0u8; 64];
        let (consumed, produced) = decoder.decompress(&compressed, &mut out).unwrap();

        assert!(decoder.is_finished());
        assert_eq!(consumed, deflate_len);
        assert_eq!(&out[..produced], b"payload");
    }

    #[test]
    fn test_inflate_garbage_rejected() {
        // Plaintext is not a valid DEFLATE stream.
        let garbage = b"this is definitely not compressed data at all, not even close";
        let mut output = Vec::new();
        let err = inflate(garbage, &mut output).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_inflate_truncated() {
        let compressed = flate2_deflate(b"some data that will be cut short");
        let truncated = &compressed[..compressed.len() / 2];

        let mut output = Vec::new();
        let err = inflate(truncated, &mut output).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_inflate_stored_length_mismatch() {
        let data = [0b00000001, 5, 0, 0, 0, b'H', b'e', b'l', b'l', b'o'];
        let mut output = Vec::new();
        let err = inflate(&data, &mut output).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_reset_reuses_decoder() {
        let mut decoder = RustDecompressor::new();
        let compressed = flate2_deflate(b"first stream");

        let mut out = [0u8; 64];
        let (_, produced) = decoder.decompress(&compressed, &mut out).unwrap();
        assert!(decoder.is_finished());
        assert_eq!(&out[..produced], b"first stream");

        decoder.reset();
        assert!(!decoder.is_finished());

        let compressed = flate2_deflate(b"second stream");
        let (_, produced) = decoder.decompress(&compressed, &mut out).unwrap();
        assert!(decoder.is_finished());
        assert_eq!(&out[..produced], b"second stream");
    }
}
