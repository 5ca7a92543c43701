use nix::sys::socket::{self, MsgFlags};
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::net::UnixStream;

/// Companion socket whose writes never raise `SIGPIPE`.
pub struct CompanionChannel(UnixStream);

impl From<OwnedFd> for CompanionChannel {
    fn from(fd: OwnedFd) -> Self {
        Self(UnixStream::from(fd))
    }
}

impl Read for CompanionChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for CompanionChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(socket::send(self.0.as_raw_fd(), buf, MsgFlags::MSG_NOSIGNAL)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
