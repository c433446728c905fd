/*
 * rawdev - container.rs
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

//! Byte order of a container. A RAW file is a bunch of containers,
//! possibly with different byte orders.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Endian of the container.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl Endian {
    /// The endian indicated by a TIFF byte order magic, if any.
    pub fn from_magic(magic: &[u8]) -> Option<Endian> {
        match magic {
            b"II" => Some(Endian::Little),
            b"MM" => Some(Endian::Big),
            _ => None,
        }
    }
}

/// Allow converting a `byteorder::ByteOrder` type to an
/// `Endian` value.
pub(crate) trait EndianType: ByteOrder {
    fn endian() -> Endian;
}

impl EndianType for LittleEndian {
    fn endian() -> Endian {
        Endian::Little
    }
}

impl EndianType for BigEndian {
    fn endian() -> Endian {
        Endian::Big
    }
}

#[cfg(test)]
mod test {
    use super::Endian;

    #[test]
    fn test_from_magic() {
        assert_eq!(Endian::from_magic(b"II"), Some(Endian::Little));
        assert_eq!(Endian::from_magic(b"MM"), Some(Endian::Big));
        assert_eq!(Endian::from_magic(b"XX"), None);
    }
}
