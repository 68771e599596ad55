use crate::boxes::FourCC;
use crate::error::{ParseError, Result};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{self, Read, Seek, SeekFrom};

/// Bounded big-endian reader over a seekable byte source.
///
/// Tracks the absolute offset itself so that reads can be checked against
/// `limit` before touching the stream. A failed read leaves the position
/// where it was.
pub struct ByteCursor<R> {
    inner: R,
    pos: u64,
    limit: u64,
    stream_len: u64,
}

impl<R: Read + Seek> ByteCursor<R> {
    /// Wrap `inner`, bounding reads by the length of the stream.
    pub fn new(mut inner: R) -> Result<Self> {
        let pos = inner.stream_position()?;
        let limit = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(pos))?;
        Ok(Self {
            inner,
            pos,
            limit,
            stream_len: limit,
        })
    }

    /// Wrap `inner`, bounding reads by a caller-supplied absolute offset.
    pub fn with_limit(mut inner: R, limit: u64) -> Result<Self> {
        let pos = inner.stream_position()?;
        let stream_len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(pos))?;
        Ok(Self {
            inner,
            pos,
            limit,
            stream_len,
        })
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Length of the underlying stream, which may be shorter than `limit`.
    pub fn stream_len(&self) -> u64 {
        self.stream_len
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.pos)
    }

    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.pos = offset;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_with(1, |r| r.read_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_with(2, |r| r.read_u16::<BigEndian>())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_with(4, |r| r.read_u32::<BigEndian>())
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_with(8, |r| r.read_u64::<BigEndian>())
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.read_with(N as u64, |r| {
            let mut buf = [0u8; N];
            r.read_exact(&mut buf)?;
            Ok(buf)
        })
    }

    pub fn read_fourcc(&mut self) -> Result<FourCC> {
        self.read_array::<4>().map(FourCC)
    }

    pub fn read_bytes(&mut self, n: u64) -> Result<Vec<u8>> {
        self.read_with(n, |r| {
            let mut v = vec![0u8; n as usize];
            r.read_exact(&mut v)?;
            Ok(v)
        })
    }

    fn read_with<T>(&mut self, n: u64, f: impl FnOnce(&mut R) -> io::Result<T>) -> Result<T> {
        if self.remaining() < n {
            return Err(ParseError::TruncatedInput {
                offset: self.pos,
                needed: n,
            });
        }
        match f(&mut self.inner) {
            Ok(v) => {
                self.pos += n;
                Ok(v)
            }
            Err(e) => {
                // rewind a partial read
                self.inner.seek(SeekFrom::Start(self.pos))?;
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    Err(ParseError::TruncatedInput {
                        offset: self.pos,
                        needed: n,
                    })
                } else {
                    Err(ParseError::Io(e))
                }
            }
        }
    }
}
