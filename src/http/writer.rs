use std::io::{self, IoSlice, Write};

use crate::buffer::ByteBuffer;

/// Cursor over the two parts of a response: header bytes in the write buffer,
/// then the (optional) mapped file body.
///
/// Partial writes retire bytes from the header first and then from the file,
/// so the next call resumes exactly where the socket stopped accepting.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    file_sent: usize,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts over for a freshly built response.
    pub fn reset(&mut self) {
        self.file_sent = 0;
    }

    pub fn to_write_bytes(&self, header: &ByteBuffer, file: Option<&[u8]>) -> usize {
        header.readable() + file.map_or(0, |f| f.len().saturating_sub(self.file_sent))
    }

    /// One gather write of whatever is left.
    pub fn write_to<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
        header: &mut ByteBuffer,
        file: Option<&[u8]>,
    ) -> io::Result<usize> {
        let body = file.map_or(&[][..], |f| &f[self.file_sent.min(f.len())..]);
        let n = {
            let iov = [IoSlice::new(header.peek()), IoSlice::new(body)];
            writer.write_vectored(&iov)?
        };
        self.advance(n, header);
        Ok(n)
    }

    fn advance(&mut self, n: usize, header: &mut ByteBuffer) {
        let from_header = n.min(header.readable());
        header.retrieve(from_header);
        self.file_sent += n - from_header;
    }
}
