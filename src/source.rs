//! Random-access byte sources and payload references into them.
//!
//! Parsed media data is not copied: an `mdat` (and any large opaque box)
//! keeps a [`SourceRange`] pointing back into the [`ByteSource`] it came
//! from, and the bytes are only read when the box is written. The source
//! must stay unchanged for as long as any range refers to it; truncating or
//! rewriting the underlying file while ranges are outstanding is a caller
//! error and surfaces as [`Error::Truncated`] or wrong bytes on write.

use crate::error::{Error, Result};
use bytes::Bytes;
use std::cell::RefCell;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::rc::Rc;

const COPY_BUF: usize = 64 * 1024;

pub trait ByteSource {
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read up to `buf.len()` bytes at `offset`; 0 means end of source.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    fn read_range(&self, offset: u64, len: u64) -> Result<Bytes> {
        let mut buf = vec![0u8; len as usize];
        let mut filled = 0usize;
        while filled < buf.len() {
            let n = self.read_at(offset + filled as u64, &mut buf[filled..])?;
            if n == 0 {
                return Err(Error::Truncated { needed: (buf.len() - filled) as u64 });
            }
            filled += n;
        }
        Ok(Bytes::from(buf))
    }

    fn copy_range(&self, offset: u64, len: u64, out: &mut dyn Write) -> Result<()> {
        let mut buf = vec![0u8; COPY_BUF.min(len as usize)];
        let mut done = 0u64;
        while done < len {
            let want = buf.len().min((len - done) as usize);
            let n = self.read_at(offset + done, &mut buf[..want])?;
            if n == 0 {
                return Err(Error::Truncated { needed: len - done });
            }
            out.write_all(&buf[..n])?;
            done += n as u64;
        }
        Ok(())
    }
}

impl ByteSource for Bytes {
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let start = (offset as usize).min(<[u8]>::len(self));
        let n = buf.len().min(<[u8]>::len(self) - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }

    fn read_range(&self, offset: u64, len: u64) -> Result<Bytes> {
        let end = offset.saturating_add(len);
        let have = <[u8]>::len(self) as u64;
        if end > have {
            return Err(Error::Truncated { needed: end - have });
        }
        Ok(self.slice(offset as usize..end as usize))
    }
}

/// A seekable reader (usually a file) shared behind a `RefCell`.
pub struct ReaderSource<R> {
    inner: RefCell<R>,
    len: u64,
}

impl<R: Read + Seek> ReaderSource<R> {
    pub fn new(mut inner: R) -> io::Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self { inner: RefCell::new(inner), len })
    }
}

impl ReaderSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<R: Read + Seek> ByteSource for ReaderSource<R> {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut r = self.inner.borrow_mut();
        r.seek(SeekFrom::Start(offset))?;
        r.read(buf)
    }
}

/// Sequential `Read` over a shared source, tracking its absolute position.
pub struct SourceReader {
    source: Rc<dyn ByteSource>,
    pos: u64,
}

impl SourceReader {
    pub fn new(source: Rc<dyn ByteSource>, pos: u64) -> Self {
        Self { source, pos }
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn seek_to(&mut self, pos: u64) {
        self.pos = pos;
    }

    pub fn source(&self) -> &Rc<dyn ByteSource> {
        &self.source
    }

    /// Take the next `len` bytes, advancing past them.
    pub fn take(&mut self, len: u64) -> Result<Bytes> {
        let b = self.source.read_range(self.pos, len)?;
        self.pos += len;
        Ok(b)
    }

    /// Lazy reference to the next `len` bytes, advancing past them.
    pub fn take_range(&mut self, len: u64) -> Result<SourceRange> {
        let end = self.pos.saturating_add(len);
        if end > self.source.len() {
            return Err(Error::Truncated { needed: end - self.source.len() });
        }
        let range = SourceRange::new(Rc::clone(&self.source), self.pos, len);
        self.pos = end;
        Ok(range)
    }
}

impl Seek for SourceReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(d) => self.source.len().checked_add_signed(d),
            SeekFrom::Current(d) => self.pos.checked_add_signed(d),
        };
        self.pos = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of source")
        })?;
        Ok(self.pos)
    }
}

impl Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.source.read_at(self.pos, buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

/// `len` bytes at `offset` of a shared source.
#[derive(Clone)]
pub struct SourceRange {
    pub source: Rc<dyn ByteSource>,
    pub offset: u64,
    pub len: u64,
}

impl SourceRange {
    pub fn new(source: Rc<dyn ByteSource>, offset: u64, len: u64) -> Self {
        Self { source, offset, len }
    }

    pub fn same_source(&self, other: &SourceRange) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.source), Rc::as_ptr(&other.source))
    }

    /// `next` starts exactly where `self` ends, in the same source.
    pub fn is_followed_by(&self, next: &SourceRange) -> bool {
        self.same_source(next) && self.offset + self.len == next.offset
    }
}

impl fmt::Debug for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRange")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

/// Bytes held either in memory or as a lazy reference into a source.
///
/// This is also the representation of a track sample.
#[derive(Debug, Clone)]
pub enum Payload {
    Memory(Bytes),
    Range(SourceRange),
}

impl Payload {
    pub fn len(&self) -> u64 {
        match self {
            Payload::Memory(b) => b.len() as u64,
            Payload::Range(r) => r.len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn write_to(&self, w: &mut dyn Write) -> Result<()> {
        match self {
            Payload::Memory(b) => Ok(w.write_all(b)?),
            Payload::Range(r) => r.source.copy_range(r.offset, r.len, w),
        }
    }

    /// Materialize the bytes (reads lazy ranges from their source).
    pub fn to_bytes(&self) -> Result<Bytes> {
        match self {
            Payload::Memory(b) => Ok(b.clone()),
            Payload::Range(r) => r.source.read_range(r.offset, r.len),
        }
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Payload::Memory(b)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(v: Vec<u8>) -> Self {
        Payload::Memory(Bytes::from(v))
    }
}

impl From<SourceRange> for Payload {
    fn from(r: SourceRange) -> Self {
        Payload::Range(r)
    }
}
