//! End-to-end round-trip scenarios across levels, backends, and envelopes.

use std::io::SeekFrom;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use strix_core::{Backend, ByteStream, CompressionLevel, Mode};
use strix_stream::{
    DeflateReader, DeflateStream, DeflateWriter, GzipReader, GzipWriter, MemoryStream,
};

fn pseudo_random(len: usize, seed: u64) -> Vec<u8> {
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut data);
    data
}

fn compress_chunked(
    payload: &[u8],
    level: CompressionLevel,
    backend: Backend,
    chunk: usize,
) -> Vec<u8> {
    let mut sink = MemoryStream::new();
    {
        let mut writer = DeflateWriter::with_backend(&mut sink, level, backend).unwrap();
        for piece in payload.chunks(chunk) {
            writer.write(piece).unwrap();
        }
        writer.close().unwrap();
    }
    sink.into_vec()
}

fn decompress_chunked(compressed: Vec<u8>, backend: Backend, chunk: usize) -> Vec<u8> {
    let mut reader =
        DeflateReader::with_backend(MemoryStream::read_only(compressed), backend).unwrap();
    let mut out = Vec::new();
    let mut buf = vec![0u8; chunk];
    loop {
        let n = reader.read(&mut buf).unwrap();
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}

#[test]
fn random_payload_1024_byte_chunks() {
    // 8 KiB of pseudo-random data, compressed at Optimal in 1 KiB chunks,
    // decompressed through 1 KiB copies.
    let payload = pseudo_random(8192, 42);

    for backend in [Backend::Zlib, Backend::Rust] {
        let compressed = compress_chunked(&payload, CompressionLevel::Optimal, backend, 1024);
        let output = decompress_chunked(compressed, backend, 1024);
        assert_eq!(output, payload, "backend {backend:?}");
    }
}

#[test]
fn all_levels_and_backends_roundtrip() {
    let payloads: Vec<Vec<u8>> = vec![
        Vec::new(),
        b"x".to_vec(),
        b"short".to_vec(),
        pseudo_random(777, 7),
        b"repetition repetition repetition "
            .iter()
            .cycle()
            .take(60_000)
            .copied()
            .collect(),
    ];

    for payload in &payloads {
        for level in [
            CompressionLevel::Optimal,
            CompressionLevel::Fastest,
            CompressionLevel::NoCompression,
        ] {
            for backend in [Backend::Zlib, Backend::Rust] {
                let compressed = compress_chunked(payload, level, backend, 313);
                let output = decompress_chunked(compressed, backend, 101);
                assert_eq!(
                    &output, payload,
                    "roundtrip failed: {level:?} {backend:?} len {}",
                    payload.len()
                );
            }
        }
    }
}

#[test]
fn cross_backend_streams_are_interchangeable() {
    let payload = pseudo_random(20_000, 99);

    for (enc, dec) in [(Backend::Zlib, Backend::Rust), (Backend::Rust, Backend::Zlib)] {
        let compressed = compress_chunked(&payload, CompressionLevel::Optimal, enc, 512);
        let output = decompress_chunked(compressed, dec, 512);
        assert_eq!(output, payload, "compressed {enc:?}, decompressed {dec:?}");
    }
}

#[test]
fn gzip_roundtrip_with_chunked_io() {
    let payload = pseudo_random(8192, 1234);

    for backend in [Backend::Zlib, Backend::Rust] {
        let mut sink = MemoryStream::new();
        {
            let mut writer =
                GzipWriter::with_backend(&mut sink, CompressionLevel::Optimal, backend).unwrap();
            for piece in payload.chunks(1024) {
                writer.write(piece).unwrap();
            }
            writer.close().unwrap();
        }

        sink.seek(SeekFrom::Start(0)).unwrap();
        let mut reader = GzipReader::with_backend(sink, backend).unwrap();
        let mut out = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, payload, "backend {backend:?}");
    }
}

#[test]
fn flush_points_do_not_disturb_the_stream() {
    let payload = pseudo_random(10_000, 5);

    let mut sink = MemoryStream::new();
    {
        let mut writer = DeflateWriter::new(&mut sink, CompressionLevel::Optimal).unwrap();
        for piece in payload.chunks(700) {
            writer.write(piece).unwrap();
            writer.flush().unwrap();
        }
        writer.close().unwrap();
    }

    let output = decompress_chunked(sink.into_vec(), Backend::default(), 4096);
    assert_eq!(output, payload);
}

#[test]
fn dynamic_mode_roundtrip_via_capability_surface() {
    // Drive both directions exclusively through the ByteStream surface.
    let payload = b"driven through the generic capability interface".to_vec();

    let mut sink = MemoryStream::new();
    {
        let mut stream =
            DeflateStream::compress(&mut sink, CompressionLevel::Fastest).unwrap();
        ByteStream::write(&mut stream, &payload).unwrap();
        ByteStream::flush(&mut stream).unwrap();
        stream.close().unwrap();
    }

    sink.seek(SeekFrom::Start(0)).unwrap();
    let mut stream = DeflateStream::new(sink, Mode::Decompress).unwrap();
    assert!(stream.can_read());
    assert!(!stream.can_write());
    assert!(!stream.can_seek());

    let mut out = Vec::new();
    let mut buf = [0u8; 13];
    loop {
        let n = ByteStream::read(&mut stream, &mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out, payload);
}

#[test]
fn large_payload_stays_bounded() {
    // A payload much larger than any internal buffer; the adapters must
    // stream it without ever holding it whole.
    let pattern = b"bounded memory streaming across many internal blocks. ";
    let payload: Vec<u8> = pattern.iter().cycle().take(3_000_000).copied().collect();

    for backend in [Backend::Zlib, Backend::Rust] {
        let compressed = compress_chunked(&payload, CompressionLevel::Fastest, backend, 8192);
        assert!(compressed.len() < payload.len());
        let output = decompress_chunked(compressed, backend, 8192);
        assert_eq!(output, payload);
    }
}
