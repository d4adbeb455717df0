//! Async adapters for streaming compression.
//!
//! Mirrors the synchronous adapters over tokio's `AsyncRead`/`AsyncWrite`:
//! same codecs, same staging discipline, same malformed-data semantics.
//! Each adapter additionally offers `*_cancellable` variants that race a
//! [`CancellationToken`]: a token observed cancelled at entry returns
//! immediately without touching the stream, and cancellation at a
//! suspension point leaves the adapter consistent and retryable.
//!
//! One outstanding operation per direction is enforced the Rust way: every
//! operation takes `&mut self`.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::ready;
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_util::sync::CancellationToken;

use strix_core::{Backend, CompressionLevel, Error, Flush, StreamCompress, StreamDecompress};

use crate::gzip::{encode_header, encode_trailer, verify_trailer, HeaderParser};
use crate::{clamp_buffer_size, StageBuffer, DEFAULT_BUFFER_SIZE};

/// Pull more bytes from `inner` into the staging buffer. Ready(0) is end
/// of stream.
fn poll_refill<R: AsyncRead>(
    inner: Pin<&mut R>,
    cx: &mut Context<'_>,
    stage: &mut StageBuffer,
) -> Poll<io::Result<usize>> {
    stage.compact();
    let mut read_buf = ReadBuf::new(stage.spare());
    ready!(inner.poll_read(cx, &mut read_buf))?;
    let n = read_buf.filled().len();
    stage.commit(n);
    Poll::Ready(Ok(n))
}

pin_project! {
    /// An async reader that decompresses a raw DEFLATE stream.
    pub struct AsyncDeflateReader<R> {
        #[pin]
        inner: R,
        codec: Box<dyn StreamDecompress + Send>,
        stage: StageBuffer,
        total_in: usize,
    }
}

impl<R: AsyncRead> AsyncDeflateReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_backend(inner, Backend::default())
    }

    pub fn with_backend(inner: R, backend: Backend) -> Self {
        Self::with_options(inner, backend, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_options(inner: R, backend: Backend, buffer_size: usize) -> Self {
        Self {
            inner,
            codec: strix_deflate::decompressor(backend),
            stage: StageBuffer::with_capacity(clamp_buffer_size(buffer_size)),
            total_in: 0,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncDeflateReader<R> {
    /// Cancellable read. Checks the token before touching the stream and
    /// races it at every suspension point.
    pub async fn read_cancellable(
        &mut self,
        buf: &mut [u8],
        token: &CancellationToken,
    ) -> io::Result<usize> {
        if token.is_cancelled() {
            return Err(Error::Cancelled.into());
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled.into()),
            result = tokio::io::AsyncReadExt::read(self, buf) => result,
        }
    }
}

impl<R: AsyncRead> AsyncRead for AsyncDeflateReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut this = self.project();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        loop {
            let dst = buf.initialize_unfilled();
            let (consumed, produced) = this
                .codec
                .decompress(this.stage.readable(), dst)
                .map_err(io::Error::from)?;
            this.stage.consume(consumed);
            *this.total_in += consumed;

            if produced > 0 {
                buf.advance(produced);
                return Poll::Ready(Ok(()));
            }
            if this.codec.is_finished() {
                return Poll::Ready(Ok(()));
            }

            let n = ready!(poll_refill(this.inner.as_mut(), cx, this.stage))?;
            if n == 0 {
                return Poll::Ready(Err(Error::unexpected_eof(*this.total_in).into()));
            }
        }
    }
}

pin_project! {
    /// An async writer that compresses into a raw DEFLATE stream.
    ///
    /// `poll_shutdown` finalizes the stream; dropping the writer without
    /// shutting it down leaves the stream unterminated, as with any tokio
    /// writer.
    pub struct AsyncDeflateWriter<W> {
        #[pin]
        inner: W,
        codec: Box<dyn StreamCompress + Send>,
        stage: StageBuffer,
        sync_queued: bool,
    }
}

impl<W: AsyncWrite> AsyncDeflateWriter<W> {
    pub fn new(inner: W, level: CompressionLevel) -> Self {
        Self::with_backend(inner, level, Backend::default())
    }

    pub fn with_backend(inner: W, level: CompressionLevel, backend: Backend) -> Self {
        Self::with_options(inner, level, backend, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_options(
        inner: W,
        level: CompressionLevel,
        backend: Backend,
        buffer_size: usize,
    ) -> Self {
        Self {
            inner,
            codec: strix_deflate::compressor(backend, level),
            stage: StageBuffer::with_capacity(clamp_buffer_size(buffer_size)),
            sync_queued: false,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }
}

impl<W: AsyncWrite + Unpin> AsyncDeflateWriter<W> {
    pub async fn write_cancellable(
        &mut self,
        buf: &[u8],
        token: &CancellationToken,
    ) -> io::Result<usize> {
        if token.is_cancelled() {
            return Err(Error::Cancelled.into());
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled.into()),
            result = tokio::io::AsyncWriteExt::write(self, buf) => result,
        }
    }

    pub async fn flush_cancellable(&mut self, token: &CancellationToken) -> io::Result<()> {
        if token.is_cancelled() {
            return Err(Error::Cancelled.into());
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled.into()),
            result = tokio::io::AsyncWriteExt::flush(self) => result,
        }
    }

    pub async fn shutdown_cancellable(&mut self, token: &CancellationToken) -> io::Result<()> {
        if token.is_cancelled() {
            return Err(Error::Cancelled.into());
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled.into()),
            result = tokio::io::AsyncWriteExt::shutdown(self) => result,
        }
    }
}

impl<W: AsyncWrite> AsyncWrite for AsyncDeflateWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut this = self.project();
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        loop {
            while !this.stage.is_empty() {
                let n = ready!(this.inner.as_mut().poll_write(cx, this.stage.readable()))?;
                if n == 0 {
                    return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
                }
                this.stage.consume(n);
            }

            let spare = this.stage.spare();
            let (consumed, produced) = this
                .codec
                .compress(buf, spare, Flush::None)
                .map_err(io::Error::from)?;
            this.stage.commit(produced);

            if consumed > 0 {
                // New data invalidates a half-finished flush.
                *this.sync_queued = false;
                return Poll::Ready(Ok(consumed));
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut this = self.project();

        loop {
            while !this.stage.is_empty() {
                let n = ready!(this.inner.as_mut().poll_write(cx, this.stage.readable()))?;
                if n == 0 {
                    return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
                }
                this.stage.consume(n);
            }

            let flush = if *this.sync_queued {
                Flush::None
            } else {
                Flush::Sync
            };
            let spare = this.stage.spare();
            let (_, produced) = this
                .codec
                .compress(&[], spare, flush)
                .map_err(io::Error::from)?;
            this.stage.commit(produced);

            if flush == Flush::Sync {
                *this.sync_queued = true;
            } else if produced == 0 {
                break;
            }
        }

        ready!(this.inner.poll_flush(cx))?;
        *this.sync_queued = false;
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut this = self.project();

        loop {
            while !this.stage.is_empty() {
                let n = ready!(this.inner.as_mut().poll_write(cx, this.stage.readable()))?;
                if n == 0 {
                    return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
                }
                this.stage.consume(n);
            }
            if this.codec.is_finished() {
                break;
            }

            let spare = this.stage.spare();
            let (_, produced) = this
                .codec
                .compress(&[], spare, Flush::Finish)
                .map_err(io::Error::from)?;
            this.stage.commit(produced);
        }

        ready!(this.inner.as_mut().poll_flush(cx))?;
        this.inner.poll_shutdown(cx)
    }
}

pin_project! {
    /// An async reader that decodes a gzip member.
    pub struct AsyncGzipReader<R> {
        #[pin]
        inner: R,
        codec: Box<dyn StreamDecompress + Send>,
        stage: StageBuffer,
        header: HeaderParser,
        crc: crc32fast::Hasher,
        total: u64,
        trailer: [u8; 8],
        trailer_got: usize,
        done: bool,
        total_in: usize,
    }
}

impl<R: AsyncRead> AsyncGzipReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_backend(inner, Backend::default())
    }

    pub fn with_backend(inner: R, backend: Backend) -> Self {
        Self::with_options(inner, backend, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_options(inner: R, backend: Backend, buffer_size: usize) -> Self {
        Self {
            inner,
            codec: strix_deflate::decompressor(backend),
            stage: StageBuffer::with_capacity(clamp_buffer_size(buffer_size)),
            header: HeaderParser::new(),
            crc: crc32fast::Hasher::new(),
            total: 0,
            trailer: [0; 8],
            trailer_got: 0,
            done: false,
            total_in: 0,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncGzipReader<R> {
    pub async fn read_cancellable(
        &mut self,
        buf: &mut [u8],
        token: &CancellationToken,
    ) -> io::Result<usize> {
        if token.is_cancelled() {
            return Err(Error::Cancelled.into());
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled.into()),
            result = tokio::io::AsyncReadExt::read(self, buf) => result,
        }
    }
}

impl<R: AsyncRead> AsyncRead for AsyncGzipReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut this = self.project();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        loop {
            if !this.header.is_done() {
                if this.stage.is_empty() {
                    let n = ready!(poll_refill(this.inner.as_mut(), cx, this.stage))?;
                    if n == 0 {
                        return Poll::Ready(Err(
                            Error::corrupted("truncated gzip header").into()
                        ));
                    }
                }
                let n = this
                    .header
                    .push(this.stage.readable())
                    .map_err(io::Error::from)?;
                this.stage.consume(n);
                *this.total_in += n;
                continue;
            }

            if *this.done {
                return Poll::Ready(Ok(()));
            }

            if this.codec.is_finished() {
                while *this.trailer_got < 8 {
                    if this.stage.is_empty() {
                        let n = ready!(poll_refill(this.inner.as_mut(), cx, this.stage))?;
                        if n == 0 {
                            return Poll::Ready(Err(
                                Error::corrupted("truncated gzip trailer").into()
                            ));
                        }
                    }
                    let available = this.stage.readable();
                    let take = available.len().min(8 - *this.trailer_got);
                    this.trailer[*this.trailer_got..*this.trailer_got + take]
                        .copy_from_slice(&available[..take]);
                    this.stage.consume(take);
                    *this.trailer_got += take;
                }
                verify_trailer(this.trailer, this.crc.clone().finalize(), *this.total)
                    .map_err(io::Error::from)?;
                *this.done = true;
                return Poll::Ready(Ok(()));
            }

            let dst = buf.initialize_unfilled();
            let (consumed, produced) = this
                .codec
                .decompress(this.stage.readable(), dst)
                .map_err(io::Error::from)?;
            this.stage.consume(consumed);
            *this.total_in += consumed;

            if produced > 0 {
                this.crc.update(&dst[..produced]);
                *this.total += produced as u64;
                buf.advance(produced);
                return Poll::Ready(Ok(()));
            }
            if this.codec.is_finished() {
                continue;
            }

            let n = ready!(poll_refill(this.inner.as_mut(), cx, this.stage))?;
            if n == 0 {
                return Poll::Ready(Err(Error::unexpected_eof(*this.total_in).into()));
            }
        }
    }
}

pin_project! {
    /// An async writer that produces a gzip member.
    ///
    /// The header is staged at construction and precedes the first
    /// compressed byte; `poll_shutdown` finalizes the deflate payload and
    /// appends the CRC/length trailer.
    pub struct AsyncGzipWriter<W> {
        #[pin]
        inner: W,
        codec: Box<dyn StreamCompress + Send>,
        stage: StageBuffer,
        crc: crc32fast::Hasher,
        total: u64,
        sync_queued: bool,
        trailer_staged: bool,
    }
}

impl<W: AsyncWrite> AsyncGzipWriter<W> {
    pub fn new(inner: W, level: CompressionLevel) -> Self {
        Self::with_backend(inner, level, Backend::default())
    }

    pub fn with_backend(inner: W, level: CompressionLevel, backend: Backend) -> Self {
        Self::with_options(inner, level, backend, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_options(
        inner: W,
        level: CompressionLevel,
        backend: Backend,
        buffer_size: usize,
    ) -> Self {
        let mut stage = StageBuffer::with_capacity(clamp_buffer_size(buffer_size));
        let header = encode_header(level);
        stage.spare()[..header.len()].copy_from_slice(&header);
        stage.commit(header.len());

        Self {
            inner,
            codec: strix_deflate::compressor(backend, level),
            stage,
            crc: crc32fast::Hasher::new(),
            total: 0,
            sync_queued: false,
            trailer_staged: false,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }
}

impl<W: AsyncWrite + Unpin> AsyncGzipWriter<W> {
    pub async fn write_cancellable(
        &mut self,
        buf: &[u8],
        token: &CancellationToken,
    ) -> io::Result<usize> {
        if token.is_cancelled() {
            return Err(Error::Cancelled.into());
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled.into()),
            result = tokio::io::AsyncWriteExt::write(self, buf) => result,
        }
    }

    pub async fn shutdown_cancellable(&mut self, token: &CancellationToken) -> io::Result<()> {
        if token.is_cancelled() {
            return Err(Error::Cancelled.into());
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled.into()),
            result = tokio::io::AsyncWriteExt::shutdown(self) => result,
        }
    }
}

impl<W: AsyncWrite> AsyncWrite for AsyncGzipWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut this = self.project();
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        loop {
            while !this.stage.is_empty() {
                let n = ready!(this.inner.as_mut().poll_write(cx, this.stage.readable()))?;
                if n == 0 {
                    return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
                }
                this.stage.consume(n);
            }

            let spare = this.stage.spare();
            let (consumed, produced) = this
                .codec
                .compress(buf, spare, Flush::None)
                .map_err(io::Error::from)?;
            this.stage.commit(produced);

            if consumed > 0 {
                this.crc.update(&buf[..consumed]);
                *this.total += consumed as u64;
                *this.sync_queued = false;
                return Poll::Ready(Ok(consumed));
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut this = self.project();

        loop {
            while !this.stage.is_empty() {
                let n = ready!(this.inner.as_mut().poll_write(cx, this.stage.readable()))?;
                if n == 0 {
                    return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
                }
                this.stage.consume(n);
            }

            let flush = if *this.sync_queued {
                Flush::None
            } else {
                Flush::Sync
            };
            let spare = this.stage.spare();
            let (_, produced) = this
                .codec
                .compress(&[], spare, flush)
                .map_err(io::Error::from)?;
            this.stage.commit(produced);

            if flush == Flush::Sync {
                *this.sync_queued = true;
            } else if produced == 0 {
                break;
            }
        }

        ready!(this.inner.poll_flush(cx))?;
        *this.sync_queued = false;
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut this = self.project();

        loop {
            while !this.stage.is_empty() {
                let n = ready!(this.inner.as_mut().poll_write(cx, this.stage.readable()))?;
                if n == 0 {
                    return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
                }
                this.stage.consume(n);
            }

            if !this.codec.is_finished() {
                let spare = this.stage.spare();
                let (_, produced) = this
                    .codec
                    .compress(&[], spare, Flush::Finish)
                    .map_err(io::Error::from)?;
                this.stage.commit(produced);
                continue;
            }

            if !*this.trailer_staged {
                let trailer = encode_trailer(this.crc.clone().finalize(), *this.total);
                this.stage.spare()[..trailer.len()].copy_from_slice(&trailer);
                this.stage.commit(trailer.len());
                *this.trailer_staged = true;
                continue;
            }
            break;
        }

        ready!(this.inner.as_mut().poll_flush(cx))?;
        this.inner.poll_shutdown(cx)
    }
}
