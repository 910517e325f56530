//! Buffered I/O streams for the RFB handshake.
//!
//! [`RfbInStream`] and [`RfbOutStream`] wrap any tokio reader/writer and
//! provide exact-length reads and buffered writes in network byte order.
//!
//! # Examples
//!
//! ```no_run
//! use rfb_protocol::io::{RfbInStream, RfbOutStream};
//! use tokio::net::TcpStream;
//!
//! # async fn example() -> std::io::Result<()> {
//! let stream = TcpStream::connect("localhost:5900").await?;
//! let (reader, writer) = tokio::io::split(stream);
//!
//! let mut input = RfbInStream::new(reader);
//! let mut banner = [0u8; 12];
//! input.read_bytes(&mut banner).await?;
//!
//! let mut output = RfbOutStream::new(writer);
//! output.write_bytes(b"RFB 003.008\n");
//! output.flush().await?;
//! # Ok(())
//! # }
//! ```

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default buffer capacity. Handshake messages are tiny.
const DEFAULT_CAPACITY: usize = 4096;

/// Buffered input stream for reading RFB protocol data.
///
/// Reads are exact: a method either returns the requested number of bytes or
/// fails. Hitting end-of-stream early yields an
/// [`UnexpectedEof`](std::io::ErrorKind::UnexpectedEof) error, and the bytes
/// that did arrive stay in the buffer so the caller can report
/// [`available()`](Self::available).
///
/// # Buffer Management
///
/// The buffer grows only with bytes actually received from the peer. A
/// length announced by the server never causes an up-front allocation.
pub struct RfbInStream<R> {
    reader: R,
    buffer: BytesMut,
}

impl<R: AsyncRead + Unpin> RfbInStream<R> {
    /// Create a new input stream with the default buffer size.
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, DEFAULT_CAPACITY)
    }

    /// Create a new input stream with specified buffer capacity.
    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Ensure at least `n` bytes are available in the buffer.
    ///
    /// Reads from the underlying reader until the buffer contains at least
    /// `n` bytes. Returns an error if EOF is reached before `n` bytes are
    /// available.
    async fn ensure_bytes(&mut self, n: usize) -> std::io::Result<()> {
        while self.buffer.len() < n {
            let bytes_read = self.reader.read_buf(&mut self.buffer).await?;
            if bytes_read == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("expected {} bytes, got {}", n, self.buffer.len()),
                ));
            }
        }
        Ok(())
    }

    /// Read a single byte (u8).
    ///
    /// # Errors
    ///
    /// Returns an error if EOF is reached or an I/O error occurs.
    pub async fn read_u8(&mut self) -> std::io::Result<u8> {
        self.ensure_bytes(1).await?;
        Ok(self.buffer.get_u8())
    }

    /// Read a 32-bit unsigned integer in network byte order (big-endian).
    ///
    /// # Errors
    ///
    /// Returns an error if EOF is reached or an I/O error occurs.
    pub async fn read_u32(&mut self) -> std::io::Result<u32> {
        self.ensure_bytes(4).await?;
        Ok(self.buffer.get_u32())
    }

    /// Read exactly `buf.len()` bytes into the provided buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if EOF is reached before the buffer is filled,
    /// or if an I/O error occurs.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use rfb_protocol::io::RfbInStream;
    /// # async fn example<R: tokio::io::AsyncRead + Unpin>(mut stream: RfbInStream<R>) -> std::io::Result<()> {
    /// let mut banner = [0u8; 12];
    /// stream.read_bytes(&mut banner).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn read_bytes(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        self.ensure_bytes(buf.len()).await?;
        self.buffer.copy_to_slice(buf);
        Ok(())
    }

    /// Read exactly `len` bytes into a new vector.
    ///
    /// Unlike allocating `vec![0; len]` and calling
    /// [`read_bytes()`](Self::read_bytes), memory is only committed as data
    /// arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if EOF is reached before `len` bytes are read,
    /// or if an I/O error occurs.
    pub async fn read_vec(&mut self, len: usize) -> std::io::Result<Vec<u8>> {
        self.ensure_bytes(len).await?;
        Ok(self.buffer.split_to(len).to_vec())
    }

    /// Get the number of bytes currently available in the buffer.
    ///
    /// After a failed exact read this is the number of bytes that arrived
    /// before the stream ended.
    pub fn available(&self) -> usize {
        self.buffer.len()
    }

    /// Consume the stream and return the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Buffered output stream for writing RFB protocol data.
///
/// Data is buffered internally and only written when
/// [`flush()`](Self::flush) is called.
pub struct RfbOutStream<W> {
    writer: W,
    buffer: BytesMut,
}

impl<W: AsyncWrite + Unpin> RfbOutStream<W> {
    /// Create a new output stream with the default buffer size.
    pub fn new(writer: W) -> Self {
        Self::with_capacity(writer, DEFAULT_CAPACITY)
    }

    /// Create a new output stream with specified buffer capacity.
    pub fn with_capacity(writer: W, capacity: usize) -> Self {
        Self {
            writer,
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Write a single byte (u8).
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.put_u8(value);
    }

    /// Write a 32-bit unsigned integer in network byte order (big-endian).
    pub fn write_u32(&mut self, value: u32) {
        self.buffer.put_u32(value);
    }

    /// Write a byte slice to the buffer.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Flush all buffered data to the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails or if the underlying writer's
    /// `flush()` method returns an error.
    pub async fn flush(&mut self) -> std::io::Result<()> {
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer).await?;
            self.buffer.clear();
        }
        self.writer.flush().await
    }

    /// Flush pending data and shut down the write side of the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing or shutting down fails.
    pub async fn shutdown(&mut self) -> std::io::Result<()> {
        self.flush().await?;
        self.writer.shutdown().await
    }

    /// Get the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Consume the stream and return the underlying writer.
    ///
    /// **Warning:** Any buffered data will be lost. Call [`flush()`](Self::flush)
    /// first if you need to send buffered data.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
