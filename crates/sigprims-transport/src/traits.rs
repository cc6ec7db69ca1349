use std::io::{self, ErrorKind, Read, Write};

/// Non-blocking source of bytes.
///
/// `read_some` returns immediately with whatever is available. `Ok(0)` is a
/// valid result meaning "nothing right now, try again later"; it is never an
/// error by itself.
pub trait ByteSource {
    /// Read up to `buf.len()` bytes into `buf`, returning the count read.
    fn read_some(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Sink that accepts whole byte slices.
pub trait ByteSink {
    /// Write every byte of `buf`.
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Flush buffered bytes to the underlying medium.
    fn flush_bytes(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_some(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_some(buf)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read_some(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_some(buf)
    }
}

impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write_bytes(buf)
    }

    fn flush_bytes(&mut self) -> io::Result<()> {
        (**self).flush_bytes()
    }
}

impl<S: ByteSink + ?Sized> ByteSink for Box<S> {
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write_bytes(buf)
    }

    fn flush_bytes(&mut self) -> io::Result<()> {
        (**self).flush_bytes()
    }
}

impl ByteSink for Vec<u8> {
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        self.extend_from_slice(buf);
        Ok(())
    }
}

/// Adapts any `Read` into a [`ByteSource`].
///
/// `WouldBlock` and `Interrupted` become `Ok(0)`. A zero-length read on a
/// non-empty buffer marks the source as exhausted (see [`IoSource::is_eof`]).
#[derive(Debug)]
pub struct IoSource<R> {
    inner: R,
    eof: bool,
}

impl<R: Read> IoSource<R> {
    /// Wrap a reader.
    pub fn new(inner: R) -> Self {
        Self { inner, eof: false }
    }

    /// True once the wrapped reader has reported end of stream.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Borrow the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutably borrow the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the adapter and return the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ByteSource for IoSource<R> {
    fn read_some(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match read_available(&mut self.inner, buf)? {
            Some(n) => Ok(n),
            None => {
                self.eof = true;
                Ok(0)
            }
        }
    }
}

/// Adapts any `Write` into a [`ByteSink`].
#[derive(Debug)]
pub struct IoSink<W> {
    inner: W,
}

impl<W: Write> IoSink<W> {
    /// Wrap a writer.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Borrow the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Consume the adapter and return the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ByteSink for IoSink<W> {
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        write_fully(&mut self.inner, buf)
    }

    fn flush_bytes(&mut self) -> io::Result<()> {
        flush_fully(&mut self.inner)
    }
}

/// One non-blocking read. `Ok(None)` signals end of stream.
pub(crate) fn read_available<R: Read + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
) -> io::Result<Option<usize>> {
    match reader.read(buf) {
        Ok(0) => Ok(None),
        Ok(n) => Ok(Some(n)),
        Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(Some(0)),
        Err(err) if err.kind() == ErrorKind::Interrupted => Ok(Some(0)),
        Err(err) => Err(err),
    }
}

pub(crate) fn write_fully<W: Write + ?Sized>(writer: &mut W, buf: &[u8]) -> io::Result<()> {
    let mut offset = 0usize;
    while offset < buf.len() {
        match writer.write(&buf[offset..]) {
            Ok(0) => return Err(io::Error::from(ErrorKind::WriteZero)),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

pub(crate) fn flush_fully<W: Write + ?Sized>(writer: &mut W) -> io::Result<()> {
    loop {
        match writer.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(err),
        }
    }
}
