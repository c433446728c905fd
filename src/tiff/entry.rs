/*
 * rawdev - tiff/entry.rs
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

//! IFD entries.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::container::Endian;
use crate::utils;

/// TIFF value types.
#[derive(Clone, Copy, Debug, Eq, PartialEq, num_enum::TryFromPrimitive)]
#[repr(u16)]
pub enum TagType {
    Byte = 1,
    Ascii = 2,
    Short = 3,
    Long = 4,
    Rational = 5,
    SByte = 6,
    Undefined = 7,
    SShort = 8,
    SLong = 9,
    SRational = 10,
    Float = 11,
    Double = 12,
}

/// Size of one element of a type.
pub(crate) fn tag_unit_size(type_: u16) -> usize {
    match TagType::try_from(type_) {
        Ok(TagType::Byte) | Ok(TagType::Ascii) | Ok(TagType::SByte) | Ok(TagType::Undefined) => 1,
        Ok(TagType::Short) | Ok(TagType::SShort) => 2,
        Ok(TagType::Long) | Ok(TagType::SLong) | Ok(TagType::Float) => 4,
        Ok(TagType::Rational) | Ok(TagType::SRational) | Ok(TagType::Double) => 8,
        Err(_) => 1,
    }
}

/// One IFD entry, with its data made self-contained at parse time.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub tag: u16,
    pub type_: u16,
    pub count: u32,
    /// Value offset in the file, for entries that did not fit inline.
    pub offset: Option<u64>,
    endian: Endian,
    data: Vec<u8>,
}

impl Entry {
    pub(crate) fn new(
        tag: u16,
        type_: u16,
        count: u32,
        endian: Endian,
        data: Vec<u8>,
        offset: Option<u64>,
    ) -> Entry {
        Entry {
            tag,
            type_,
            count,
            offset,
            endian,
            data,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn read_u16(&self, buf: &[u8]) -> u16 {
        match self.endian {
            Endian::Little => LittleEndian::read_u16(buf),
            Endian::Big => BigEndian::read_u16(buf),
        }
    }

    fn read_u32(&self, buf: &[u8]) -> u32 {
        match self.endian {
            Endian::Little => LittleEndian::read_u32(buf),
            Endian::Big => BigEndian::read_u32(buf),
        }
    }

    /// Unsigned integer at `index`, accepting BYTE, SHORT or LONG.
    pub fn uint_at(&self, index: usize) -> Option<u32> {
        if index >= self.count as usize {
            return None;
        }
        match TagType::try_from(self.type_).ok()? {
            TagType::Byte | TagType::Undefined => self.data.get(index).map(|v| *v as u32),
            TagType::Short => {
                let off = index * 2;
                self.data
                    .get(off..off + 2)
                    .map(|buf| self.read_u16(buf) as u32)
            }
            TagType::Long => {
                let off = index * 4;
                self.data.get(off..off + 4).map(|buf| self.read_u32(buf))
            }
            _ => None,
        }
    }

    pub fn uint(&self) -> Option<u32> {
        self.uint_at(0)
    }

    /// Value at `index` as a float, following the TIFF numeric types
    /// the way Exif readers do.
    pub fn real_at(&self, index: usize) -> Option<f64> {
        if index >= self.count as usize {
            return None;
        }
        let unit = tag_unit_size(self.type_);
        let off = index * unit;
        let buf = self.data.get(off..off + unit)?;
        match TagType::try_from(self.type_).ok()? {
            TagType::Byte | TagType::Ascii | TagType::Undefined => Some(buf[0] as f64),
            TagType::SByte => Some(buf[0] as i8 as f64),
            TagType::Short => Some(self.read_u16(buf) as f64),
            TagType::SShort => Some(self.read_u16(buf) as i16 as f64),
            TagType::Long => Some(self.read_u32(buf) as f64),
            TagType::SLong => Some(self.read_u32(buf) as i32 as f64),
            TagType::Rational => {
                let den = self.read_u32(&buf[4..]);
                if den == 0 {
                    Some(0.0)
                } else {
                    Some(self.read_u32(buf) as f64 / den as f64)
                }
            }
            TagType::SRational => {
                let den = self.read_u32(&buf[4..]) as i32;
                if den == 0 {
                    Some(0.0)
                } else {
                    Some(self.read_u32(buf) as i32 as f64 / den as f64)
                }
            }
            TagType::Float => Some(f32::from_bits(self.read_u32(buf)) as f64),
            TagType::Double => {
                let mut bytes = [0_u8; 8];
                bytes.copy_from_slice(buf);
                let bits = match self.endian {
                    Endian::Little => u64::from_le_bytes(bytes),
                    Endian::Big => u64::from_be_bytes(bytes),
                };
                Some(f64::from_bits(bits))
            }
        }
    }

    pub fn real(&self) -> Option<f64> {
        self.real_at(0)
    }

    /// All the values as floats.
    pub fn real_array(&self) -> Vec<f64> {
        (0..self.count as usize)
            .filter_map(|i| self.real_at(i))
            .collect()
    }

    /// The ASCII value, nul-terminated in the file.
    pub fn string(&self) -> Option<String> {
        if self.type_ == TagType::Ascii as u16 || self.type_ == TagType::Byte as u16 {
            Some(utils::from_maybe_nul_terminated(&self.data))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Entry, TagType};
    use crate::container::Endian;

    #[test]
    fn test_uint() {
        let e = Entry::new(
            0x100,
            TagType::Short as u16,
            2,
            Endian::Little,
            vec![0x34, 0x12, 0x78, 0x56],
            None,
        );
        assert_eq!(e.uint(), Some(0x1234));
        assert_eq!(e.uint_at(1), Some(0x5678));
        assert_eq!(e.uint_at(2), None);
    }

    #[test]
    fn test_real_rational() {
        let e = Entry::new(
            0x11a,
            TagType::Rational as u16,
            1,
            Endian::Big,
            vec![0, 0, 0, 72, 0, 0, 0, 2],
            None,
        );
        assert_eq!(e.real(), Some(36.0));
    }

    #[test]
    fn test_string() {
        let e = Entry::new(
            0x10f,
            TagType::Ascii as u16,
            6,
            Endian::Little,
            b"Nikon\0".to_vec(),
            None,
        );
        assert_eq!(e.string().as_deref(), Some("Nikon"));
    }
}
