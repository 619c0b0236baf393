use std::io::Cursor;

use staticd::buffer::ByteBuffer;

/// Small deterministic generator so the interleaving is reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

fn assert_regions_cover_capacity(buf: &ByteBuffer) {
    assert_eq!(
        buf.readable() + buf.writable() + buf.prependable(),
        buf.capacity()
    );
}

/// Random mix of appends, socket-style reads, partial retrieves and resets.
/// Bytes come out in the order they went in and the three regions always
/// add up to the capacity.
fn interleave(initial_capacity: usize, seed: u64) {
    let mut rng = Lcg(seed);
    let mut buf = ByteBuffer::with_capacity(initial_capacity);
    let mut written = Vec::new();
    let mut read = Vec::new();
    let mut next_byte = 0u8;
    assert_regions_cover_capacity(&buf);

    for _ in 0..1500 {
        let len = (rng.next() % 3000) as usize;
        let mut chunk = || -> Vec<u8> {
            (0..len)
                .map(|_| {
                    next_byte = next_byte.wrapping_add(1);
                    next_byte
                })
                .collect()
        };

        match rng.next() % 8 {
            0..=2 => {
                let data = chunk();
                buf.append(&data);
                written.extend_from_slice(&data);
            }
            3 | 4 => {
                let data = chunk();
                let mut src = &data[..];
                let n = buf.read_from(&mut src).unwrap();
                assert_eq!(n, data.len());
                written.extend_from_slice(&data);
            }
            5 | 6 => {
                let take = (rng.next() as usize) % (buf.readable() + 1);
                read.extend_from_slice(&buf.peek()[..take]);
                buf.retrieve(take);
            }
            _ => {
                read.extend_from_slice(buf.peek());
                buf.retrieve_all();
                assert_eq!(buf.readable(), 0);
                assert_eq!(buf.prependable(), 0);
            }
        }

        assert_regions_cover_capacity(&buf);
        assert_eq!(read.len() + buf.readable(), written.len());
    }

    read.extend_from_slice(buf.peek());
    assert_eq!(read, written);
}

#[test]
fn test_interleaved_operations_preserve_order_and_regions() {
    for (i, capacity) in [0usize, 1, 7, 1024].into_iter().enumerate() {
        interleave(capacity, 7 + i as u64);
    }
}

#[test]
fn test_retrieve_past_end_is_clamped() {
    let mut buf = ByteBuffer::new();
    buf.append(b"abc");
    buf.retrieve(10);
    assert_eq!(buf.readable(), 0);
}

#[test]
fn test_retrieve_all_to_string() {
    let mut buf = ByteBuffer::new();
    buf.append(b"hello ");
    buf.append(b"world");
    assert_eq!(buf.retrieve_all_to_string(), "hello world");
    assert_eq!(buf.readable(), 0);
}

#[test]
fn test_find_crlf() {
    let mut buf = ByteBuffer::new();
    buf.append(b"GET / HTTP/1.1\r\nHost");
    assert_eq!(buf.find_crlf(), Some(14));
    buf.retrieve_until(16);
    assert_eq!(buf.find_crlf(), None);
    assert_eq!(buf.peek(), b"Host");
}

#[test]
fn test_read_from_spills_into_overflow() {
    let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let mut src = Cursor::new(data.clone());
    let mut buf = ByteBuffer::with_capacity(16);

    let n = buf.read_from(&mut src).unwrap();
    assert_eq!(n, data.len());
    assert_eq!(buf.peek(), &data[..]);
}

#[test]
fn test_read_from_eof_reports_zero() {
    let mut src: &[u8] = &[];
    let mut buf = ByteBuffer::new();
    assert_eq!(buf.read_from(&mut src).unwrap(), 0);
}

#[test]
fn test_write_to_drains_readable_bytes() {
    let mut buf = ByteBuffer::new();
    buf.append(b"response bytes");
    let mut out = Vec::new();
    let n = buf.write_to(&mut out).unwrap();
    assert_eq!(n, 14);
    assert_eq!(out, b"response bytes");
    assert_eq!(buf.readable(), 0);
}
