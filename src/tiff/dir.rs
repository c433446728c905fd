/*
 * rawdev - tiff/dir.rs
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

//! Reading of one IFD.

use std::collections::HashMap;
use std::io::SeekFrom;

use log::debug;

use crate::io::Stream;
use crate::tiff::entry::{tag_unit_size, Entry};
use crate::Result;

/// One parsed directory. Entries keep file order; later entries for
/// the same tag override earlier ones in `entry()`.
pub struct Dir {
    entries: Vec<Entry>,
    index: HashMap<u16, usize>,
    /// Offset of the next IFD, 0 if this was the last one.
    pub next: u32,
    /// Base the value offsets are relative to.
    pub base: u64,
}

impl Dir {
    /// Read the IFD at `offset` relative to `base`, in the stream's
    /// current byte order. The cursor is restored to the next entry
    /// position after every tag; sub-parsers are never trusted to do
    /// so. Entries with unreadable data are skipped, not fatal.
    pub fn read(stream: &mut Stream, base: u64, offset: u32) -> Result<Dir> {
        stream.seek(SeekFrom::Start(base + offset as u64))?;
        let num_entries = stream.read_u16()?;
        let mut entries = Vec::with_capacity(num_entries as usize);
        let mut index = HashMap::new();

        for n in 0..num_entries {
            let entry_pos = base + offset as u64 + 2 + n as u64 * 12;
            stream.seek(SeekFrom::Start(entry_pos))?;
            let tag = stream.read_u16()?;
            let type_ = stream.read_u16()?;
            let count = stream.read_u32()?;

            let data_size = tag_unit_size(type_).saturating_mul(count as usize);
            let entry = if data_size <= 4 {
                let mut inline = [0_u8; 4];
                stream.read_exact(&mut inline)?;
                Entry::new(
                    tag,
                    type_,
                    count,
                    stream.endian(),
                    inline[..data_size].to_vec(),
                    None,
                )
            } else {
                let value_offset = stream.read_u32()? as u64 + base;
                match stream.read_vec_at(value_offset, data_size) {
                    Ok(data) => Entry::new(
                        tag,
                        type_,
                        count,
                        stream.endian(),
                        data,
                        Some(value_offset),
                    ),
                    Err(_) => {
                        debug!("tag {:#x}: unreadable value at {:#x}", tag, value_offset);
                        continue;
                    }
                }
            };
            debug!("entry {:#x} type {} count {}", tag, type_, count);
            index.insert(tag, entries.len());
            entries.push(entry);
        }

        // Never trust a sub-parser with the cursor.
        stream.seek(SeekFrom::Start(
            base + offset as u64 + 2 + num_entries as u64 * 12,
        ))?;
        let next = stream.read_u32().unwrap_or(0);
        Ok(Dir {
            entries,
            index,
            next,
            base,
        })
    }

    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Entries in file order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// The entry for `tag`. The last occurrence wins.
    pub fn entry(&self, tag: u16) -> Option<&Entry> {
        self.index.get(&tag).map(|idx| &self.entries[*idx])
    }

    pub fn uint(&self, tag: u16) -> Option<u32> {
        self.entry(tag).and_then(Entry::uint)
    }

    pub fn uint_at(&self, tag: u16, index: usize) -> Option<u32> {
        self.entry(tag).and_then(|e| e.uint_at(index))
    }

    pub fn real(&self, tag: u16) -> Option<f64> {
        self.entry(tag).and_then(Entry::real)
    }

    pub fn string(&self, tag: u16) -> Option<String> {
        self.entry(tag).and_then(Entry::string)
    }
}

#[cfg(test)]
mod test {
    use super::Dir;
    use crate::io::Stream;

    /// A little-endian IFD with width/height/make entries.
    fn test_ifd() -> Vec<u8> {
        let mut d = b"II\x2a\x00\x08\x00\x00\x00".to_vec();
        d.extend_from_slice(&3_u16.to_le_bytes());
        // 0x100 Short 1: 640
        d.extend_from_slice(&0x100_u16.to_le_bytes());
        d.extend_from_slice(&3_u16.to_le_bytes());
        d.extend_from_slice(&1_u32.to_le_bytes());
        d.extend_from_slice(&640_u16.to_le_bytes());
        d.extend_from_slice(&0_u16.to_le_bytes());
        // 0x101 Long 1: 480
        d.extend_from_slice(&0x101_u16.to_le_bytes());
        d.extend_from_slice(&4_u16.to_le_bytes());
        d.extend_from_slice(&1_u32.to_le_bytes());
        d.extend_from_slice(&480_u32.to_le_bytes());
        // 0x10f Ascii 6 at offset 50
        d.extend_from_slice(&0x10f_u16.to_le_bytes());
        d.extend_from_slice(&2_u16.to_le_bytes());
        d.extend_from_slice(&6_u32.to_le_bytes());
        d.extend_from_slice(&50_u32.to_le_bytes());
        // next IFD
        d.extend_from_slice(&0_u32.to_le_bytes());
        while d.len() < 50 {
            d.push(0);
        }
        d.extend_from_slice(b"Nikon\0");
        d
    }

    #[test]
    fn test_read() {
        let data = test_ifd();
        let mut stream = Stream::new(Box::new(std::io::Cursor::new(data)));
        let offset = crate::tiff::read_header(&mut stream).unwrap();
        let dir = Dir::read(&mut stream, 0, offset).unwrap();
        assert_eq!(dir.num_entries(), 3);
        assert_eq!(dir.uint(0x100), Some(640));
        assert_eq!(dir.uint(0x101), Some(480));
        assert_eq!(dir.string(0x10f).as_deref(), Some("Nikon"));
        assert_eq!(dir.next, 0);
        assert_eq!(dir.entry(0x9999), None);
    }
}
