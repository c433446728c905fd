/*
 * rawdev - tiff.rs
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

//! Image File Directory machinery, the main data structure of TIFF
//! used by Exif and most RAW formats.

mod dir;
mod entry;
pub mod exif;
pub(crate) mod makernote;
pub(crate) mod parse;

pub use dir::Dir;
pub use entry::Entry;

use crate::container::Endian;
use crate::io::Stream;
use crate::{Error, Result};

/// Read a TIFF header at the current position. Sets the stream byte
/// order from the II/MM magic and returns the offset of the first
/// IFD, relative to the header.
pub(crate) fn read_header(stream: &mut Stream) -> Result<u32> {
    let mut magic = [0_u8; 2];
    stream.read_exact(&mut magic)?;
    let endian = Endian::from_magic(&magic).ok_or(Error::InvalidFormat)?;
    stream.set_endian(endian);
    let version = stream.read_u16()?;
    if version != 42 && version != 0x4f52 && version != 0x5352 && version != 85 {
        // 42 is TIFF, "OR"/"SR" are Olympus and Sony variants, 85 is
        // Panasonic RW2.
        return Err(Error::InvalidFormat);
    }
    stream.read_u32()
}

#[cfg(test)]
mod test {
    use super::read_header;
    use crate::container::Endian;
    use crate::io::Stream;

    #[test]
    fn test_read_header() {
        let data = b"II\x2a\x00\x08\x00\x00\x00".to_vec();
        let mut stream = Stream::new(Box::new(std::io::Cursor::new(data)));
        assert_eq!(read_header(&mut stream).unwrap(), 8);
        assert_eq!(stream.endian(), Endian::Little);

        let data = b"MM\x00\x2a\x00\x00\x00\x08".to_vec();
        let mut stream = Stream::new(Box::new(std::io::Cursor::new(data)));
        assert_eq!(read_header(&mut stream).unwrap(), 8);
        assert_eq!(stream.endian(), Endian::Big);

        let data = b"XX\x00\x2a\x00\x00\x00\x08".to_vec();
        let mut stream = Stream::new(Box::new(std::io::Cursor::new(data)));
        assert!(read_header(&mut stream).is_err());
    }
}
