use crate::error::Result;

/// A non-blocking, byte-oriented duplex stream.
///
/// The protocol engine only ever consumes what [`available`](Stream::available)
/// reports, so implementations must never wait for data inside
/// [`read`](Stream::read) or for buffer space inside [`write`](Stream::write).
pub trait Stream {
    /// Number of bytes that can be read right now without blocking.
    fn available(&mut self) -> Result<usize>;

    /// Read up to `buf.len()` bytes. Returns the count actually read, which may
    /// be smaller than requested (including zero).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write as much of `data` as the link accepts right now. Returns the count
    /// actually written; a short write is not an error.
    fn write(&mut self, data: &[u8]) -> Result<usize>;
}

impl<S: Stream + ?Sized> Stream for &mut S {
    fn available(&mut self) -> Result<usize> {
        (**self).available()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }
}

impl<S: Stream + ?Sized> Stream for Box<S> {
    fn available(&mut self) -> Result<usize> {
        (**self).available()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }
}
