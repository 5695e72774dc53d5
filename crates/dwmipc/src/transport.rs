//! Byte stream abstraction underneath a [`Connection`](crate::Connection)

use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;

/// A bidirectional byte stream that a connection can own
///
/// Implemented for [`UnixStream`]. Reads are expected to block unless
/// [`set_nonblocking`](Transport::set_nonblocking) switched them off.
pub trait Transport: Read + Write + Send {
    /// Switch reads between blocking and non-blocking mode
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()>;

    /// Shut down both directions of the stream
    fn shutdown(&self) -> io::Result<()>;
}

impl Transport for UnixStream {
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        UnixStream::set_nonblocking(self, nonblocking)
    }

    fn shutdown(&self) -> io::Result<()> {
        UnixStream::shutdown(self, Shutdown::Both)
    }
}
