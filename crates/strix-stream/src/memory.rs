//! In-memory byte stream and std I/O adapters.

use std::io::{self, SeekFrom};

use strix_core::{ByteStream, Error, Result};

/// A growable, seekable in-memory [`ByteStream`].
///
/// Capabilities are fixed at construction so tests and callers can model
/// read-only or write-only collaborators. `close()` makes every subsequent
/// operation fail with a disposed error, mirroring a released OS handle.
#[derive(Debug, Default)]
pub struct MemoryStream {
    data: Vec<u8>,
    pos: usize,
    readable: bool,
    writable: bool,
    open: bool,
}

impl MemoryStream {
    /// Create an empty read/write stream.
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            pos: 0,
            readable: true,
            writable: true,
            open: true,
        }
    }

    /// Create a read/write stream over existing bytes, positioned at 0.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Self::new()
        }
    }

    /// Create a read-only stream over existing bytes.
    pub fn read_only(data: Vec<u8>) -> Self {
        Self {
            data,
            writable: false,
            ..Self::new()
        }
    }

    /// Create an empty write-only stream.
    pub fn write_only() -> Self {
        Self {
            readable: false,
            ..Self::new()
        }
    }

    /// Release the stream. Subsequent operations fail with a disposed
    /// error. Idempotent.
    pub fn close(&mut self) {
        self.open = false;
    }

    /// The bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consume the stream, returning its contents.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    fn check_open(&self, operation: &'static str) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::disposed(operation))
        }
    }
}

impl ByteStream for MemoryStream {
    fn can_read(&self) -> bool {
        self.readable && self.open
    }

    fn can_write(&self) -> bool {
        self.writable && self.open
    }

    fn can_seek(&self) -> bool {
        self.open
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.check_open("read")?;
        if !self.readable {
            return Err(Error::invalid_operation("stream is not readable"));
        }
        let available = self.data.len().saturating_sub(self.pos);
        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.check_open("write")?;
        if !self.writable {
            return Err(Error::invalid_operation("stream is not writable"));
        }
        let end = self.pos + buf.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.check_open("flush")
    }

    fn stream_len(&self) -> Result<u64> {
        self.check_open("query length")?;
        Ok(self.data.len() as u64)
    }

    fn position(&self) -> Result<u64> {
        self.check_open("query position")?;
        Ok(self.pos as u64)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.check_open("seek")?;
        let base = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => self.data.len() as i64 + offset,
            SeekFrom::Current(offset) => self.pos as i64 + offset,
        };
        if base < 0 {
            return Err(Error::invalid_argument(
                "position",
                "seek before start of stream",
            ));
        }
        self.pos = base as usize;
        Ok(self.pos as u64)
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        self.check_open("resize")?;
        if !self.writable {
            return Err(Error::invalid_operation("stream is not writable"));
        }
        self.data.resize(len as usize, 0);
        self.pos = self.pos.min(self.data.len());
        Ok(())
    }
}

/// Adapter exposing any [`io::Read`] as a read-only [`ByteStream`].
#[derive(Debug)]
pub struct IoReader<R>(pub R);

impl<R: io::Read> ByteStream for IoReader<R> {
    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        false
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.0.read(buf)?)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<()> {
        Err(Error::invalid_operation("stream is not writable"))
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Adapter exposing any [`io::Write`] as a write-only [`ByteStream`].
#[derive(Debug)]
pub struct IoWriter<W>(pub W);

impl<W: io::Write> ByteStream for IoWriter<W> {
    fn can_read(&self) -> bool {
        false
    }

    fn can_write(&self) -> bool {
        true
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::invalid_operation("stream is not readable"))
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        Ok(self.0.write_all(buf)?)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.0.flush()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_stream_read_write_seek() {
        let mut stream = MemoryStream::new();
        stream.write(b"hello world").unwrap();
        assert_eq!(stream.position().unwrap(), 11);

        stream.seek(SeekFrom::Start(6)).unwrap();
        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"world");

        // Read at end returns 0.
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_memory_stream_overwrite() {
        let mut stream = MemoryStream::from_vec(b"aaaa".to_vec());
        stream.seek(SeekFrom::Start(1)).unwrap();
        stream.write(b"bb").unwrap();
        assert_eq!(stream.as_slice(), b"abba");
    }

    #[test]
    fn test_memory_stream_capabilities() {
        let ro = MemoryStream::read_only(vec![1, 2, 3]);
        assert!(ro.can_read() && !ro.can_write() && ro.can_seek());

        let wo = MemoryStream::write_only();
        assert!(!wo.can_read() && wo.can_write());

        let mut wo = wo;
        let mut buf = [0u8; 1];
        assert!(wo.read(&mut buf).is_err());
    }

    #[test]
    fn test_memory_stream_close() {
        let mut stream = MemoryStream::new();
        stream.close();
        stream.close(); // idempotent

        assert!(!stream.is_open());
        assert!(!stream.can_read());
        assert!(matches!(
            stream.write(b"x"),
            Err(Error::Disposed { operation: "write" })
        ));
    }

    #[test]
    fn test_seek_before_start_rejected() {
        let mut stream = MemoryStream::from_vec(vec![0; 4]);
        assert!(stream.seek(SeekFrom::Current(-1)).is_err());
    }

    #[test]
    fn test_io_adapters() {
        let mut reader = IoReader(std::io::Cursor::new(b"data".to_vec()));
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert!(reader.write(b"x").is_err());

        let mut writer = IoWriter(Vec::new());
        writer.write(b"out").unwrap();
        assert!(!writer.can_read());
        assert_eq!(writer.0, b"out");
    }
}
