//! Fixed-capacity read and write buffers used by every connection.
//!
//! Both buffers are sized to hold exactly one frame of the wire protocol
//! (a 3 byte header plus an 8189 byte body). `ReadBuffer` tracks how much of
//! the frame it currently expects and how much has arrived so far;
//! `WriteBuffer` is a ring buffer that queues encoded responses until the
//! socket is ready to take them.

use std::io::{self, Read, Write};

use thiserror::Error;

/// Capacity, in bytes, of both the read and write buffers. Matches the
/// maximum frame size (header + body) the protocol allows.
pub const BUFFER_CAPACITY: usize = 8192;

/// Size in bytes of a frame header: one type byte plus a little-endian u16
/// body length.
pub const HEADER_SIZE: usize = 3;

/// Largest body a single frame may carry.
pub const MAX_BODY_SIZE: usize = BUFFER_CAPACITY - HEADER_SIZE;

/// Transport-level outcome of a socket read or write attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("operation would block")]
    WouldBlock,
    #[error("peer reset the connection")]
    PeerReset,
    #[error("peer closed the connection")]
    PeerClosed,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Returned when an encoder would overrun the write buffer's free space.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("write buffer is full")]
pub struct WriteBufferFull;

/// Accumulates bytes for a single frame (header, then body) read from a
/// socket. Reset between phases with a new expected length.
pub struct ReadBuffer {
    buf: [u8; BUFFER_CAPACITY],
    processed: usize,
    filled: usize,
    expected: usize,
}

impl ReadBuffer {
    /// A freshly constructed buffer expects a header.
    pub fn new() -> Self {
        Self {
            buf: [0; BUFFER_CAPACITY],
            processed: 0,
            filled: 0,
            expected: HEADER_SIZE,
        }
    }

    /// True once exactly `expected` bytes have arrived.
    pub fn is_ready(&self) -> bool {
        self.filled == self.expected
    }

    /// Begin a new phase expecting `expected` bytes (at most
    /// `BUFFER_CAPACITY`).
    pub fn reset(&mut self, expected: usize) {
        debug_assert!(expected <= BUFFER_CAPACITY);
        self.processed = 0;
        self.filled = 0;
        self.expected = expected;
    }

    /// Attempt a single read into the unfilled portion of the buffer.
    /// Partial progress is kept even when the call ultimately errors.
    pub fn pull(&mut self, socket: &mut impl Read) -> Result<(), TransportError> {
        if self.filled >= self.expected {
            return Ok(());
        }

        match socket.read(&mut self.buf[self.filled..self.expected]) {
            Ok(0) => Err(TransportError::PeerClosed),
            Ok(n) => {
                self.filled += n;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(TransportError::WouldBlock),
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => Err(TransportError::PeerReset),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => self.pull(socket),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        if self.processed + 1 > self.filled {
            return None;
        }
        let byte = self.buf[self.processed];
        self.processed += 1;
        Some(byte)
    }

    /// Little-endian u16, per the wire protocol's fixed byte order.
    pub fn read_u16(&mut self) -> Option<u16> {
        if self.processed + 2 > self.filled {
            return None;
        }
        let bytes = [self.buf[self.processed], self.buf[self.processed + 1]];
        self.processed += 2;
        Some(u16::from_le_bytes(bytes))
    }
}

impl Default for ReadBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Ring buffer of encoded bytes waiting to be written to a socket.
pub struct WriteBuffer {
    buf: [u8; BUFFER_CAPACITY],
    head: usize,
    tail: usize,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self {
            buf: [0; BUFFER_CAPACITY],
            head: 0,
            tail: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    fn free_space(&self) -> usize {
        if self.head >= self.tail {
            BUFFER_CAPACITY - (self.head - self.tail) - 1
        } else {
            self.tail - self.head - 1
        }
    }

    /// Check that `n` bytes can be pushed before committing any of them, so
    /// an encoder never writes a partial frame into the buffer.
    pub fn reserve(&mut self, n: usize) -> Result<(), WriteBufferFull> {
        if n > self.free_space() {
            Err(WriteBufferFull)
        } else {
            Ok(())
        }
    }

    /// Push a single byte. Callers must have already reserved space for it.
    pub fn push_u8(&mut self, byte: u8) {
        debug_assert!(self.free_space() > 0);
        self.buf[self.head] = byte;
        self.head = (self.head + 1) % BUFFER_CAPACITY;
    }

    pub fn push_u16(&mut self, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.push_u8(lo);
        self.push_u8(hi);
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.push_u8(b);
        }
    }

    /// Write the next contiguous run of queued bytes to the socket.
    pub fn drain(&mut self, socket: &mut impl Write) -> Result<(), TransportError> {
        if self.is_empty() {
            return Ok(());
        }

        let run = if self.head > self.tail {
            self.head - self.tail
        } else {
            BUFFER_CAPACITY - self.tail
        };

        match socket.write(&self.buf[self.tail..self.tail + run]) {
            Ok(0) => Err(TransportError::PeerClosed),
            Ok(n) => {
                self.tail = (self.tail + n) % BUFFER_CAPACITY;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(TransportError::WouldBlock),
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => Err(TransportError::PeerReset),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => self.drain(socket),
            Err(e) => Err(TransportError::Io(e)),
        }
    }
}

impl Default for WriteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct MockSocket {
        chunks: VecDeque<Vec<u8>>,
        written: Vec<u8>,
    }

    impl MockSocket {
        fn new(chunks: Vec<Vec<u8>>) -> Self {
            Self {
                chunks: chunks.into(),
                written: Vec::new(),
            }
        }
    }

    impl Read for MockSocket {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None => Err(io::Error::from(io::ErrorKind::WouldBlock)),
            }
        }
    }

    impl Write for MockSocket {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn read_buffer_accumulates_partial_reads() {
        let mut socket = MockSocket::new(vec![vec![1, 2], vec![3]]);
        let mut buf = ReadBuffer::new();
        assert!(!buf.is_ready());
        buf.pull(&mut socket).unwrap();
        assert!(!buf.is_ready());
        buf.pull(&mut socket).unwrap();
        assert!(buf.is_ready());
        assert_eq!(buf.read_u8(), Some(1));
        assert_eq!(buf.read_u16(), Some(u16::from_le_bytes([2, 3])));
    }

    #[test]
    fn read_buffer_reports_would_block_then_peer_closed() {
        let mut socket = MockSocket::new(vec![]);
        let mut buf = ReadBuffer::new();
        assert!(matches!(buf.pull(&mut socket), Err(TransportError::WouldBlock)));

        let mut socket = MockSocket::new(vec![vec![0u8; 0]]);
        let mut buf = ReadBuffer::new();
        // A zero-length chunk models an orderly shutdown.
        socket.chunks.push_back(Vec::new());
        assert!(matches!(buf.pull(&mut socket), Err(TransportError::PeerClosed)));
    }

    #[test]
    fn write_buffer_reserve_rejects_oversize_frame_without_mutating() {
        let mut buf = WriteBuffer::new();
        assert!(buf.reserve(BUFFER_CAPACITY).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn write_buffer_round_trips_through_a_mock_socket() {
        let mut buf = WriteBuffer::new();
        buf.reserve(4).unwrap();
        buf.push_u8(9);
        buf.push_u16(0x1234);
        buf.push_u8(1);

        let mut socket = MockSocket::new(vec![]);
        buf.drain(&mut socket).unwrap();
        assert!(buf.is_empty());
        assert_eq!(socket.written, vec![9, 0x34, 0x12, 1]);
    }
}
