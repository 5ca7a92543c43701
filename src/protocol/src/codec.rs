use std::io::{self, ErrorKind, Read, Write};

/// Writes the whole buffer, retrying interrupted writes.
pub fn write_all<W: Write + ?Sized>(channel: &mut W, buffer: &[u8]) -> io::Result<()> {
    let mut written = 0;

    while written < buffer.len() {
        match channel.write(&buffer[written..]) {
            Ok(0) => return Err(ErrorKind::WriteZero.into()),
            Ok(n) => written += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }

    Ok(())
}

/// Fills `buffer`, retrying interrupted reads.
///
/// Returns the number of bytes read, which is short of `buffer.len()` only
/// when the peer closed the stream first.
pub fn read_all<R: Read + ?Sized>(channel: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut read = 0;

    while read < buffer.len() {
        match channel.read(&mut buffer[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }

    Ok(read)
}
