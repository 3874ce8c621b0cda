use std::io::{ErrorKind, Read, Write};
use std::net::SocketAddr;

use bytes::{Buf, BytesMut};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::Stream;

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// TCP listener producing non-blocking [`TcpStream`]s.
///
/// Useful for talking to a device simulator, or to a real device through a
/// serial-to-TCP bridge.
pub struct TcpListener {
    listener: std::net::TcpListener,
    addr: SocketAddr,
}

impl TcpListener {
    /// Bind and listen on `addr` (e.g. `127.0.0.1:7000`, port 0 for ephemeral).
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = std::net::TcpListener::bind(addr).map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;
        let local = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;

        info!(addr = %local, "listening on tcp");

        Ok(Self {
            listener,
            addr: local,
        })
    }

    /// Accept an incoming connection (blocking), then switch it to non-blocking.
    pub fn accept(&self) -> Result<TcpStream> {
        let (stream, peer) = self
            .listener
            .accept()
            .map_err(|e| TransportError::Accept {
                addr: self.addr,
                source: e,
            })?;
        debug!(%peer, "accepted connection");
        TcpStream::from_std(stream)
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Non-blocking TCP [`Stream`].
///
/// `available()` drains whatever the socket holds into a read-ahead buffer, so
/// the count it reports can always be read without blocking.
pub struct TcpStream {
    inner: std::net::TcpStream,
    pending: BytesMut,
    eof: bool,
}

impl TcpStream {
    /// Connect to a listening peer (blocking connect, non-blocking afterwards).
    pub fn connect(addr: &str) -> Result<Self> {
        let stream = std::net::TcpStream::connect(addr).map_err(|e| TransportError::Connect {
            addr: addr.to_string(),
            source: e,
        })?;
        debug!(addr, "connected over tcp");
        Self::from_std(stream)
    }

    /// Wrap an already connected std stream.
    pub fn from_std(stream: std::net::TcpStream) -> Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            inner: stream,
            pending: BytesMut::with_capacity(READ_CHUNK_SIZE),
            eof: false,
        })
    }

    /// Address of the remote end.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.inner.peer_addr().map_err(Into::into)
    }

    fn fill(&mut self) -> Result<()> {
        if self.eof {
            return Ok(());
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) => {
                    debug!("tcp peer closed the connection");
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl Stream for TcpStream {
    fn available(&mut self) -> Result<usize> {
        self.fill()?;
        if self.eof && self.pending.is_empty() {
            return Err(TransportError::Closed);
        }
        Ok(self.pending.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.pending.is_empty() {
            self.fill()?;
        }
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        loop {
            match self.inner.write(data) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(0),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl std::fmt::Debug for TcpStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpStream")
            .field("peer", &self.inner.peer_addr().ok())
            .field("pending", &self.pending.len())
            .field("eof", &self.eof)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn wait_available(stream: &mut TcpStream, want: usize) -> usize {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let n = stream.available().unwrap();
            if n >= want || Instant::now() >= deadline {
                return n;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_bind_accept_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().to_string();

        let handle = std::thread::spawn(move || {
            let mut client = TcpStream::connect(&addr).unwrap();
            assert_eq!(client.write(b"hello").unwrap(), 5);
            client
        });

        let mut server = listener.accept().unwrap();
        let _client = handle.join().unwrap();

        assert_eq!(wait_available(&mut server, 5), 5);
        let mut buf = [0u8; 5];
        assert_eq!(server.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_available_is_zero_without_data() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().to_string();
        let handle = std::thread::spawn(move || TcpStream::connect(&addr).unwrap());

        let mut server = listener.accept().unwrap();
        let _client = handle.join().unwrap();

        assert_eq!(server.available().unwrap(), 0);
        let mut buf = [0u8; 4];
        assert_eq!(server.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_closed_after_peer_drop() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().to_string();
        let handle = std::thread::spawn(move || {
            let mut client = TcpStream::connect(&addr).unwrap();
            client.write(b"bye").unwrap();
        });

        let mut server = listener.accept().unwrap();
        handle.join().unwrap();

        assert_eq!(wait_available(&mut server, 3), 3);
        let mut buf = [0u8; 3];
        server.read(&mut buf).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let closed = loop {
            match server.available() {
                Err(TransportError::Closed) => break true,
                Ok(_) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(5));
                }
                _ => break false,
            }
        };
        assert!(closed, "stream should report closed after peer drop");
    }

    #[test]
    fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().to_string();
        drop(listener);

        let result = TcpStream::connect(&addr);
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[test]
    fn test_bind_rejects_bad_address() {
        let result = TcpListener::bind("not-an-address");
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }
}
