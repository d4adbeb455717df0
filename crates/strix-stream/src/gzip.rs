//! Gzip envelope adapters (RFC 1952).
//!
//! A gzip member is a 10-byte header, a raw DEFLATE payload, and an 8-byte
//! trailer (CRC-32 of the plaintext, then its length mod 2^32, both
//! little-endian). The envelope adapters compose the deflate adapters:
//! payload bytes flow through the wrapped adapter while header and trailer
//! bytes move directly between the envelope and the underlying stream.

use strix_core::{Backend, ByteStream, CompressionLevel, Error, Result};
use tracing::debug;

use crate::reader::DeflateReader;
use crate::writer::DeflateWriter;
use crate::{MemoryStream, DEFAULT_BUFFER_SIZE};

/// Gzip magic number.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compression method: DEFLATE.
const CM_DEFLATE: u8 = 8;

/// Header flag bits.
const FHCRC: u8 = 2;
const FEXTRA: u8 = 4;
const FNAME: u8 = 8;
const FCOMMENT: u8 = 16;

/// OS identifier: Unix.
const OS_UNIX: u8 = 3;

/// Build the fixed 10-byte member header.
pub(crate) fn encode_header(level: CompressionLevel) -> [u8; 10] {
    let xfl = match level {
        CompressionLevel::Optimal => 2,
        CompressionLevel::Fastest => 4,
        CompressionLevel::NoCompression => 0,
    };
    [
        GZIP_MAGIC[0],
        GZIP_MAGIC[1],
        CM_DEFLATE,
        0, // FLG: no optional fields
        0,
        0,
        0,
        0, // MTIME: not available
        xfl,
        OS_UNIX,
    ]
}

pub(crate) fn encode_trailer(crc: u32, total: u64) -> [u8; 8] {
    let mut trailer = [0u8; 8];
    trailer[..4].copy_from_slice(&crc.to_le_bytes());
    trailer[4..].copy_from_slice(&(total as u32).to_le_bytes());
    trailer
}

pub(crate) fn verify_trailer(trailer: &[u8; 8], crc: u32, total: u64) -> Result<()> {
    let stored_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    if stored_crc != crc {
        return Err(Error::checksum_mismatch(stored_crc, crc));
    }
    let stored_len = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);
    if stored_len != total as u32 {
        return Err(Error::corrupted("gzip size mismatch"));
    }
    Ok(())
}

/// Incremental gzip header parser, shared by the sync and async readers.
///
/// Bytes are pushed in as they arrive; optional FEXTRA/FNAME/FCOMMENT/FHCRC
/// fields are validated enough to skip.
pub(crate) struct HeaderParser {
    state: HeaderState,
    flags: u8,
}

enum HeaderState {
    Fixed { buf: [u8; 10], got: usize },
    ExtraLen { buf: [u8; 2], got: usize },
    ExtraSkip { remaining: usize },
    Name,
    Comment,
    HeaderCrc { got: usize },
    Done,
}

impl HeaderParser {
    pub(crate) fn new() -> Self {
        Self {
            state: HeaderState::Fixed {
                buf: [0; 10],
                got: 0,
            },
            flags: 0,
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        matches!(self.state, HeaderState::Done)
    }

    /// Consume header bytes from `input`, returning how many were used.
    pub(crate) fn push(&mut self, input: &[u8]) -> Result<usize> {
        let mut pos = 0;
        loop {
            match &mut self.state {
                HeaderState::Fixed { buf, got } => {
                    while *got < 10 && pos < input.len() {
                        buf[*got] = input[pos];
                        pos += 1;
                        *got += 1;
                    }
                    if *got < 10 {
                        return Ok(pos);
                    }
                    if buf[0] != GZIP_MAGIC[0] || buf[1] != GZIP_MAGIC[1] {
                        return Err(Error::corrupted("invalid gzip magic"));
                    }
                    if buf[2] != CM_DEFLATE {
                        return Err(Error::corrupted("unsupported compression method"));
                    }
                    self.flags = buf[3];
                    self.advance(HeaderField::Extra);
                }
                HeaderState::ExtraLen { buf, got } => {
                    while *got < 2 && pos < input.len() {
                        buf[*got] = input[pos];
                        pos += 1;
                        *got += 1;
                    }
                    if *got < 2 {
                        return Ok(pos);
                    }
                    let len = u16::from_le_bytes(*buf) as usize;
                    self.state = HeaderState::ExtraSkip { remaining: len };
                }
                HeaderState::ExtraSkip { remaining } => {
                    let take = (*remaining).min(input.len() - pos);
                    pos += take;
                    *remaining -= take;
                    if *remaining > 0 {
                        return Ok(pos);
                    }
                    self.advance(HeaderField::Name);
                }
                HeaderState::Name | HeaderState::Comment => {
                    let mut terminated = false;
                    while pos < input.len() {
                        let byte = input[pos];
                        pos += 1;
                        if byte == 0 {
                            terminated = true;
                            break;
                        }
                    }
                    if !terminated {
                        return Ok(pos);
                    }
                    let next = if matches!(self.state, HeaderState::Name) {
                        HeaderField::Comment
                    } else {
                        HeaderField::Crc
                    };
                    self.advance(next);
                }
                HeaderState::HeaderCrc { got } => {
                    // Two CRC16 bytes; presence is all that matters here.
                    while *got < 2 && pos < input.len() {
                        pos += 1;
                        *got += 1;
                    }
                    if *got < 2 {
                        return Ok(pos);
                    }
                    self.state = HeaderState::Done;
                }
                HeaderState::Done => return Ok(pos),
            }
        }
    }

    /// Move to `from` or the first later field the flag byte enables.
    fn advance(&mut self, from: HeaderField) {
        let mut field = from;
        loop {
            match field {
                HeaderField::Extra => {
                    if self.flags & FEXTRA != 0 {
                        self.state = HeaderState::ExtraLen {
                            buf: [0; 2],
                            got: 0,
                        };
                        return;
                    }
                    field = HeaderField::Name;
                }
                HeaderField::Name => {
                    if self.flags & FNAME != 0 {
                        self.state = HeaderState::Name;
                        return;
                    }
                    field = HeaderField::Comment;
                }
                HeaderField::Comment => {
                    if self.flags & FCOMMENT != 0 {
                        self.state = HeaderState::Comment;
                        return;
                    }
                    field = HeaderField::Crc;
                }
                HeaderField::Crc => {
                    if self.flags & FHCRC != 0 {
                        self.state = HeaderState::HeaderCrc { got: 0 };
                        return;
                    }
                    self.state = HeaderState::Done;
                    return;
                }
            }
        }
    }
}

#[derive(Clone, Copy)]
enum HeaderField {
    Extra,
    Name,
    Comment,
    Crc,
}

/// A writer that produces a gzip member into an underlying [`ByteStream`].
///
/// The header goes out on the first write (or flush/finish, whichever comes
/// first); the trailer is written when the stream is finalized. Even a
/// member with no payload bytes finalizes into a complete, valid stream.
pub struct GzipWriter<S: ByteStream> {
    core: DeflateWriter<S>,
    crc: crc32fast::Hasher,
    total: u64,
    header_written: bool,
    finished: bool,
}

impl<S: ByteStream> GzipWriter<S> {
    pub fn new(inner: S, level: CompressionLevel) -> Result<Self> {
        Self::with_options(inner, level, Backend::default(), DEFAULT_BUFFER_SIZE)
    }

    pub fn with_backend(inner: S, level: CompressionLevel, backend: Backend) -> Result<Self> {
        Self::with_options(inner, level, backend, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_options(
        inner: S,
        level: CompressionLevel,
        backend: Backend,
        buffer_size: usize,
    ) -> Result<Self> {
        Ok(Self {
            core: DeflateWriter::with_options(inner, level, backend, buffer_size)?,
            crc: crc32fast::Hasher::new(),
            total: 0,
            header_written: false,
            finished: false,
        })
    }

    pub fn get_ref(&self) -> Option<&S> {
        self.core.get_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut S> {
        self.core.get_mut()
    }

    fn ensure_header(&mut self) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        let header = encode_header(self.core.level());
        match self.core.get_mut() {
            Some(inner) => inner.write(&header)?,
            None => return Err(Error::disposed("write")),
        }
        self.header_written = true;
        Ok(())
    }

    /// Compress `buf` into the member, updating the CRC and length
    /// accumulators. A zero-length write is a no-op.
    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        if !self.is_open() {
            return Err(Error::disposed("write"));
        }
        if buf.is_empty() {
            return Ok(());
        }
        self.ensure_header()?;
        self.crc.update(buf);
        self.total += buf.len() as u64;
        self.core.write(buf)
    }

    /// Flush compressed bytes produced so far through to the underlying
    /// stream.
    pub fn flush(&mut self) -> Result<()> {
        if !self.is_open() {
            return Err(Error::disposed("flush"));
        }
        self.ensure_header()?;
        self.core.flush()
    }

    /// Finalize the member: final deflate block, then the CRC/length
    /// trailer. Idempotent.
    pub fn finish(&mut self) -> Result<()> {
        if !self.is_open() {
            return Err(Error::disposed("finish"));
        }
        if self.finished {
            return Ok(());
        }
        self.ensure_header()?;
        self.core.finish()?;

        let trailer = encode_trailer(self.crc.clone().finalize(), self.total);
        match self.core.get_mut() {
            Some(inner) => inner.write(&trailer)?,
            None => return Err(Error::disposed("finish")),
        }
        self.finished = true;
        debug!(bytes = self.total, "gzip member finalized");
        Ok(())
    }

    /// Finalize and release the underlying stream. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        let finished = self.finish();
        finished.and(self.core.close())
    }
}

impl<S: ByteStream> ByteStream for GzipWriter<S> {
    fn can_read(&self) -> bool {
        false
    }

    fn can_write(&self) -> bool {
        self.core.is_open()
    }

    fn is_open(&self) -> bool {
        self.core.is_open()
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::invalid_operation(
            "cannot read from a compression stream",
        ))
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        GzipWriter::write(self, buf)
    }

    fn flush(&mut self) -> Result<()> {
        GzipWriter::flush(self)
    }
}

impl<S: ByteStream> std::io::Write for GzipWriter<S> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        GzipWriter::write(self, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        GzipWriter::flush(self)?;
        Ok(())
    }
}

impl<S: ByteStream> Drop for GzipWriter<S> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

enum ReaderState {
    Header(HeaderParser),
    Body,
    Done,
}

/// A reader that decodes a gzip member from an underlying [`ByteStream`].
///
/// The header is parsed and validated before any payload byte is released;
/// the trailer is verified the moment the codec reports the end of the
/// deflate payload. Bytes after the member are left untouched.
pub struct GzipReader<S: ByteStream> {
    core: DeflateReader<S>,
    state: ReaderState,
    crc: crc32fast::Hasher,
    total: u64,
}

impl<S: ByteStream> GzipReader<S> {
    pub fn new(inner: S) -> Result<Self> {
        Self::with_options(inner, Backend::default(), DEFAULT_BUFFER_SIZE)
    }

    pub fn with_backend(inner: S, backend: Backend) -> Result<Self> {
        Self::with_options(inner, backend, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_options(inner: S, backend: Backend, buffer_size: usize) -> Result<Self> {
        Ok(Self {
            core: DeflateReader::with_options(inner, backend, buffer_size)?,
            state: ReaderState::Header(HeaderParser::new()),
            crc: crc32fast::Hasher::new(),
            total: 0,
        })
    }

    pub fn get_ref(&self) -> Option<&S> {
        self.core.get_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut S> {
        self.core.get_mut()
    }

    /// Read decompressed payload bytes, returning 0 once the member (and
    /// its verified trailer) is complete.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.core.is_open() {
            return Err(Error::disposed("read"));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            match &mut self.state {
                ReaderState::Header(parser) => {
                    while !parser.is_done() {
                        if self.core.stage_readable().is_empty() && self.core.refill()? == 0 {
                            return Err(Error::corrupted("truncated gzip header"));
                        }
                        let n = parser.push(self.core.stage_readable())?;
                        self.core.stage_consume(n);
                    }
                    self.state = ReaderState::Body;
                }
                ReaderState::Body => {
                    let n = self.core.read(buf)?;
                    self.crc.update(&buf[..n]);
                    self.total += n as u64;

                    if self.core.decoder_finished() {
                        self.read_and_verify_trailer()?;
                        self.state = ReaderState::Done;
                    }
                    return Ok(n);
                }
                ReaderState::Done => return Ok(0),
            }
        }
    }

    fn read_and_verify_trailer(&mut self) -> Result<()> {
        let mut trailer = [0u8; 8];
        let mut got = 0;
        while got < 8 {
            if self.core.stage_readable().is_empty() && self.core.refill()? == 0 {
                return Err(Error::corrupted("truncated gzip trailer"));
            }
            let available = self.core.stage_readable();
            let take = available.len().min(8 - got);
            trailer[got..got + take].copy_from_slice(&available[..take]);
            self.core.stage_consume(take);
            got += take;
        }
        verify_trailer(&trailer, self.crc.clone().finalize(), self.total)
    }

    /// Release the underlying stream. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        self.core.close()
    }

    /// Hand the underlying stream back.
    pub fn into_inner(self) -> Result<S> {
        self.core.into_inner()
    }
}

impl<S: ByteStream> ByteStream for GzipReader<S> {
    fn can_read(&self) -> bool {
        self.core.is_open()
    }

    fn can_write(&self) -> bool {
        false
    }

    fn is_open(&self) -> bool {
        self.core.is_open()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        GzipReader::read(self, buf)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<()> {
        Err(Error::invalid_operation(
            "cannot write to a decompression stream",
        ))
    }

    fn flush(&mut self) -> Result<()> {
        Err(Error::invalid_operation(
            "cannot flush a decompression stream",
        ))
    }
}

impl<S: ByteStream> std::io::Read for GzipReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(GzipReader::read(self, buf)?)
    }
}

/// Compress a complete buffer into a gzip member.
pub fn gzip_compress(input: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
    let mut sink = MemoryStream::new();
    {
        let mut writer = GzipWriter::new(&mut sink, level)?;
        writer.write(input)?;
        writer.close()?;
    }
    Ok(sink.into_vec())
}

/// Decompress a complete gzip member.
pub fn gzip_decompress(input: &[u8]) -> Result<Vec<u8>> {
    let mut reader = GzipReader::new(MemoryStream::read_only(input.to_vec()))?;
    let mut out = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&chunk[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::SeekFrom;

    #[test]
    fn test_gzip_roundtrip_empty() {
        let compressed = gzip_compress(b"", CompressionLevel::Optimal).unwrap();
        // Header + empty deflate + trailer.
        assert!(compressed.len() >= 18);
        let decompressed = gzip_decompress(&compressed).unwrap();
        assert!(decompressed.is_empty());
    }

    #[test]
    fn test_gzip_roundtrip_small() {
        let input = b"Hello, World!";
        let compressed = gzip_compress(input, CompressionLevel::Optimal).unwrap();
        let decompressed = gzip_decompress(&compressed).unwrap();
        assert_eq!(decompressed, input);
    }

    #[test]
    fn test_gzip_roundtrip_large_all_backends() {
        let pattern = b"The quick brown fox jumps over the lazy dog. ";
        let input: Vec<u8> = pattern.iter().cycle().take(100_000).copied().collect();

        for backend in [Backend::Zlib, Backend::Rust] {
            let mut sink = MemoryStream::new();
            {
                let mut writer = GzipWriter::with_backend(
                    &mut sink,
                    CompressionLevel::Optimal,
                    backend,
                )
                .unwrap();
                for chunk in input.chunks(4096) {
                    writer.write(chunk).unwrap();
                }
                writer.close().unwrap();
            }
            assert!(sink.as_slice().len() < input.len());

            sink.seek(SeekFrom::Start(0)).unwrap();
            let mut reader = GzipReader::with_backend(sink, backend).unwrap();
            let mut out = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = reader.read(&mut chunk).unwrap();
                if n == 0 {
                    break;
                }
                out.extend_from_slice(&chunk[..n]);
            }
            assert_eq!(out, input);
        }
    }

    #[test]
    fn test_gzip_header_format() {
        let compressed = gzip_compress(b"x", CompressionLevel::Optimal).unwrap();
        assert_eq!(&compressed[..4], &[0x1f, 0x8b, 8, 0]);
        assert_eq!(compressed[9], OS_UNIX);
    }

    #[test]
    fn test_gzip_interop_with_flate2() {
        let input = b"gzip interoperability with the reference implementation";

        // Ours -> flate2.
        let compressed = gzip_compress(input, CompressionLevel::Optimal).unwrap();
        let mut decoder = flate2::read::GzDecoder::new(&compressed[..]);
        let mut out = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut out).unwrap();
        assert_eq!(out, input);

        // flate2 -> ours.
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        std::io::Write::write_all(&mut encoder, input).unwrap();
        let compressed = encoder.finish().unwrap();
        let out = gzip_decompress(&compressed).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_gzip_header_with_name_field() {
        // flate2 writes an FNAME field when asked; our parser must skip it.
        let input = b"payload behind a named header";
        let mut encoder = flate2::GzBuilder::new()
            .filename("data.bin")
            .write(Vec::new(), flate2::Compression::default());
        std::io::Write::write_all(&mut encoder, input).unwrap();
        let compressed = encoder.finish().unwrap();

        let out = gzip_decompress(&compressed).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut compressed = gzip_compress(b"data", CompressionLevel::Optimal).unwrap();
        compressed[0] = 0x1e;
        let err = gzip_decompress(&compressed).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_bad_method_rejected() {
        let mut compressed = gzip_compress(b"data", CompressionLevel::Optimal).unwrap();
        compressed[2] = 7;
        let err = gzip_decompress(&compressed).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_corrupted_crc_rejected() {
        let mut compressed = gzip_compress(b"checksummed data", CompressionLevel::Optimal).unwrap();
        let crc_offset = compressed.len() - 8;
        compressed[crc_offset] ^= 0xFF;
        let err = gzip_decompress(&compressed).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_corrupted_length_rejected() {
        let mut compressed = gzip_compress(b"sized data", CompressionLevel::Optimal).unwrap();
        let len_offset = compressed.len() - 4;
        compressed[len_offset] ^= 0xFF;
        let err = gzip_decompress(&compressed).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_truncated_trailer_rejected() {
        let mut compressed = gzip_compress(b"data", CompressionLevel::Optimal).unwrap();
        compressed.truncate(compressed.len() - 3);
        let err = gzip_decompress(&compressed).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_zero_write_flush_close_produces_valid_member() {
        let mut sink = MemoryStream::new();
        {
            let mut writer = GzipWriter::new(&mut sink, CompressionLevel::Optimal).unwrap();
            writer.write(&[]).unwrap();
            writer.flush().unwrap();
            writer.close().unwrap();
        }

        // flate2 agrees the member is valid and empty.
        let mut decoder = flate2::read::GzDecoder::new(sink.as_slice());
        let mut out = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_trailing_bytes_left_on_stream() {
        let mut compressed = gzip_compress(b"member", CompressionLevel::Optimal).unwrap();
        let member_len = compressed.len();
        compressed.extend_from_slice(b"AFTER");

        let mut reader =
            GzipReader::new(MemoryStream::read_only(compressed)).unwrap();
        let mut chunk = [0u8; 64];
        let n = reader.read(&mut chunk).unwrap();
        assert_eq!(&chunk[..n], b"member");
        assert_eq!(reader.read(&mut chunk).unwrap(), 0);

        // The member ends at the trailer; everything the reader took from
        // the stream beyond it is still staged, not lost.
        let staged = reader.core.stage_readable().len();
        let position = reader.get_ref().unwrap().position().unwrap() as usize;
        assert_eq!(position - staged, member_len);
    }

    #[test]
    fn test_gzip_close_idempotent() {
        let mut writer = GzipWriter::new(MemoryStream::new(), CompressionLevel::Optimal).unwrap();
        writer.write(b"x").unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
        assert!(matches!(writer.write(b"y"), Err(Error::Disposed { .. })));
    }
}
