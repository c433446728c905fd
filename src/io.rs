// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - io.rs
 *
 * Copyright (C) 2024 rawdev contributors
 *
 * This library is free software: you can redistribute it and/or
 * modify it under the terms of the GNU Lesser General Public License
 * as published by the Free Software Foundation, either version 3 of
 * the License, or (at your option) any later version.
 *
 * This library is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
 * Lesser General Public License for more details.
 *
 * You should have received a copy of the GNU Lesser General Public
 * License along with this library.  If not, see
 * <http://www.gnu.org/licenses/>.
 */

//! Stream IO. The byte order is a property of the stream at the
//! current point, not a process global. Parsers that switch it use
//! [`Stream::scoped_endian`] which restores the previous order on
//! drop, including on error paths.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

use crate::container::Endian;
use crate::Result;

/// The trait for any IO.
pub trait ReadAndSeek: std::io::Read + std::io::Seek {}

impl ReadAndSeek for std::fs::File {}
impl ReadAndSeek for std::io::Cursor<&[u8]> {}
impl ReadAndSeek for std::io::Cursor<Vec<u8>> {}

/// A seekable byte source with a current byte order.
pub struct Stream {
    inner: Box<dyn ReadAndSeek>,
    endian: Endian,
}

impl Stream {
    pub fn new(inner: Box<dyn ReadAndSeek>) -> Stream {
        Stream {
            inner,
            endian: Endian::Little,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Switch the byte order for the duration of the returned guard.
    /// The previous order is restored when the guard drops.
    pub fn scoped_endian(&mut self, endian: Endian) -> EndianScope<'_> {
        let saved = self.endian;
        self.endian = endian;
        EndianScope {
            stream: self,
            saved,
        }
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        Ok(self.inner.seek(pos)?)
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    pub fn len(&mut self) -> Result<u64> {
        let pos = self.inner.stream_position()?;
        let end = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(end)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.inner.read_u8()?)
    }

    /// Read a 16-bit value in the stream's current byte order.
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(match self.endian {
            Endian::Little => self.inner.read_u16::<LittleEndian>()?,
            Endian::Big => self.inner.read_u16::<BigEndian>()?,
        })
    }

    /// Read a 32-bit value in the stream's current byte order.
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(match self.endian {
            Endian::Little => self.inner.read_u32::<LittleEndian>()?,
            Endian::Big => self.inner.read_u32::<BigEndian>()?,
        })
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.read_u16().map(|v| v as i16)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_u32().map(|v| v as i32)
    }

    /// Read `count` 16-bit values in the current byte order.
    pub fn read_u16_array(&mut self, count: usize) -> Result<Vec<u16>> {
        let mut v = Vec::new();
        v.try_reserve_exact(count)?;
        for _ in 0..count {
            v.push(self.read_u16()?);
        }
        Ok(v)
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        Ok(self.inner.read_exact(buf)?)
    }

    /// Read up to `buf.len()` bytes. Short reads are not an error.
    pub fn read_some(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            let n = self.inner.read(&mut buf[total..])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }

    /// Read `len` bytes at `offset`, leaving the cursor after them.
    pub fn read_vec_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.seek(SeekFrom::Start(offset))?;
        self.read_vec(len)
    }

    pub fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        data.try_reserve_exact(len)?;
        data.resize(len, 0);
        self.inner.read_exact(data.as_mut_slice())?;
        Ok(data)
    }
}

/// Guard returned by [`Stream::scoped_endian`].
pub struct EndianScope<'a> {
    stream: &'a mut Stream,
    saved: Endian,
}

impl Drop for EndianScope<'_> {
    fn drop(&mut self) {
        self.stream.endian = self.saved;
    }
}

impl std::ops::Deref for EndianScope<'_> {
    type Target = Stream;
    fn deref(&self) -> &Stream {
        self.stream
    }
}

impl std::ops::DerefMut for EndianScope<'_> {
    fn deref_mut(&mut self) -> &mut Stream {
        self.stream
    }
}

#[cfg(test)]
mod test {
    use std::io::SeekFrom;

    use super::Stream;
    use crate::container::Endian;

    #[test]
    fn test_stream_endian() {
        let buffer = b"\x01\x02\x03\x04".to_vec();
        let mut stream = Stream::new(Box::new(std::io::Cursor::new(buffer)));

        assert_eq!(stream.endian(), Endian::Little);
        assert_eq!(stream.read_u16().unwrap(), 0x0201);
        stream.set_endian(Endian::Big);
        assert_eq!(stream.read_u16().unwrap(), 0x0304);
    }

    #[test]
    fn test_scoped_endian_restores() {
        let buffer = b"\x01\x02\x03\x04".to_vec();
        let mut stream = Stream::new(Box::new(std::io::Cursor::new(buffer)));

        {
            let mut scoped = stream.scoped_endian(Endian::Big);
            assert_eq!(scoped.read_u16().unwrap(), 0x0102);
            // Early exit path: the guard drops here.
        }
        assert_eq!(stream.endian(), Endian::Little);
        assert_eq!(stream.read_u16().unwrap(), 0x0403);

        stream.seek(SeekFrom::Start(0)).unwrap();
        let result: crate::Result<()> = (|| {
            let mut scoped = stream.scoped_endian(Endian::Big);
            scoped.seek(SeekFrom::Start(100))?;
            scoped.read_u32()?;
            Ok(())
        })();
        assert!(result.is_err());
        // Restored on the error path too.
        assert_eq!(stream.endian(), Endian::Little);
    }
}
