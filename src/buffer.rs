//! Growable byte buffer with independent read and write cursors.
//!
//! The layout follows the classic "prependable | readable | writable" split:
//!
//! ```text
//! +-------------------+------------------+------------------+
//! | prependable bytes |  readable bytes  |  writable bytes  |
//! +-------------------+------------------+------------------+
//! 0      <=       read_pos    <=     write_pos    <=     capacity
//! ```
//!
//! Every connection owns two of these: one filled from the socket and consumed
//! by the request parser, one filled by the response builder and drained into
//! the socket.

use std::io::{self, IoSliceMut, Read, Write};

/// Initial capacity of a connection buffer.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Size of the stack area that catches socket bytes the buffer cannot hold yet.
const OVERFLOW_LEN: usize = 65535;

#[derive(Debug, Clone)]
pub struct ByteBuffer {
    buf: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
            read_pos: 0,
            write_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes that can be written without growing.
    pub fn writable(&self) -> usize {
        self.buf.len() - self.write_pos
    }

    /// Bytes appended but not yet retrieved.
    pub fn readable(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Bytes already retrieved; reclaimable by sliding.
    pub fn prependable(&self) -> usize {
        self.read_pos
    }

    /// The readable region.
    pub fn peek(&self) -> &[u8] {
        &self.buf[self.read_pos..self.write_pos]
    }

    /// The writable tail. Pair with [`has_written`](Self::has_written).
    pub fn begin_write(&mut self) -> &mut [u8] {
        &mut self.buf[self.write_pos..]
    }

    /// Makes room for at least `len` more bytes, sliding or reallocating.
    pub fn ensure_writable(&mut self, len: usize) {
        if len > self.writable() {
            self.make_space(len);
        }
        debug_assert!(len <= self.writable());
    }

    pub fn has_written(&mut self, len: usize) {
        debug_assert!(len <= self.writable());
        self.write_pos += len.min(self.writable());
    }

    /// Consumes `len` readable bytes (clamped to what is readable).
    pub fn retrieve(&mut self, len: usize) {
        self.read_pos += len.min(self.readable());
    }

    /// Consumes everything before `end`, an offset into [`peek`](Self::peek).
    pub fn retrieve_until(&mut self, end: usize) {
        self.retrieve(end);
    }

    /// Resets both cursors and zeroes the backing store so nothing from a
    /// previous connection can surface in a later read.
    pub fn retrieve_all(&mut self) {
        self.buf.fill(0);
        self.read_pos = 0;
        self.write_pos = 0;
    }

    pub fn retrieve_all_to_string(&mut self) -> String {
        let s = String::from_utf8_lossy(self.peek()).into_owned();
        self.retrieve_all();
        s
    }

    pub fn append(&mut self, data: &[u8]) {
        self.ensure_writable(data.len());
        self.begin_write()[..data.len()].copy_from_slice(data);
        self.has_written(data.len());
    }

    /// Offset of the first CRLF in the readable region.
    pub fn find_crlf(&self) -> Option<usize> {
        self.peek().windows(2).position(|w| w == b"\r\n")
    }

    /// One scatter read into the writable tail plus a stack overflow area.
    ///
    /// A single call can therefore take in more bytes than currently fit;
    /// the overflow is appended afterwards, growing the buffer.
    pub fn read_from<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<usize> {
        let mut overflow = [0u8; OVERFLOW_LEN];
        let writable = self.writable();

        let n = {
            let tail = &mut self.buf[self.write_pos..];
            let mut iov = [IoSliceMut::new(tail), IoSliceMut::new(&mut overflow)];
            reader.read_vectored(&mut iov)?
        };

        if n <= writable {
            self.write_pos += n;
        } else {
            self.write_pos = self.buf.len();
            self.append(&overflow[..n - writable]);
        }
        Ok(n)
    }

    /// One write of the readable region. Unchanged on error.
    pub fn write_to<W: Write + ?Sized>(&mut self, writer: &mut W) -> io::Result<usize> {
        let n = writer.write(self.peek())?;
        self.retrieve(n);
        Ok(n)
    }

    fn make_space(&mut self, len: usize) {
        if self.writable() + self.prependable() < len {
            self.buf.resize(self.write_pos + len + 1, 0);
        } else {
            let readable = self.readable();
            self.buf.copy_within(self.read_pos..self.write_pos, 0);
            self.read_pos = 0;
            self.write_pos = readable;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slides_before_growing() {
        let mut buf = ByteBuffer::with_capacity(8);
        buf.append(b"abcdef");
        buf.retrieve(4);
        buf.append(b"ghij");

        // 2 readable + 4 new fit into 8 once the consumed prefix is reclaimed
        assert_eq!(buf.capacity(), 8);
        assert_eq!(buf.peek(), b"efghij");
        assert_eq!(buf.prependable(), 0);
    }

    #[test]
    fn grows_to_write_pos_plus_needed() {
        let mut buf = ByteBuffer::with_capacity(4);
        buf.append(b"abc");
        buf.append(b"defgh");

        assert_eq!(buf.capacity(), 3 + 5 + 1);
        assert_eq!(buf.peek(), b"abcdefgh");
    }

    #[test]
    fn retrieve_all_zeroes_storage() {
        let mut buf = ByteBuffer::with_capacity(4);
        buf.append(b"xyz");
        buf.retrieve_all();

        assert_eq!(buf.readable(), 0);
        assert!(buf.begin_write().iter().all(|b| *b == 0));
    }
}
